use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::cli::Cli;

/// Everything a run needs, saved and loaded as a JSON profile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    // Performance
    pub threads: usize,
    /// Seconds slept after each completed request.
    pub delay: f64,
    pub batch_size: usize,
    /// Seconds slept between batches.
    pub batch_delay: f64,

    // Files
    pub output: Option<String>,
    pub tokens: String,
    pub processed: String,
    pub input_prefix: String,
    pub input_ext: String,
    pub start_index: usize,

    // Request
    pub url: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub request: Option<String>,

    // Classification
    pub found_marker: Option<String>,
    pub rate_limit_marker: String,

    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: 50,
            delay: 0.0,
            batch_size: 2000,
            batch_delay: 0.5,
            output: None,
            tokens: "tokens.txt".to_string(),
            processed: "processed.txt".to_string(),
            input_prefix: "phone".to_string(),
            input_ext: "txt".to_string(),
            start_index: 1,
            url: None,
            headers: vec![
                ("Authorization".to_string(), "pload1".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: r#"{"mobile":"pload2"}"#.to_string(),
            request: None,
            found_marker: None,
            rate_limit_marker: "TOO_MANY_REQUEST".to_string(),
            verbose: false,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        serde_json::from_str(&content).context("Invalid profile format")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context("Failed to write profile file")?;
        Ok(())
    }

    /// Overlay every flag given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(v) = cli.threads {
            self.threads = v;
        }
        if let Some(v) = cli.delay {
            self.delay = v;
        }
        if let Some(v) = cli.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = cli.batch_delay {
            self.batch_delay = v;
        }
        if let Some(v) = &cli.output {
            self.output = Some(v.clone());
        }
        if let Some(v) = &cli.tokens {
            self.tokens = v.clone();
        }
        if let Some(v) = &cli.processed {
            self.processed = v.clone();
        }
        if let Some(v) = &cli.input_prefix {
            self.input_prefix = v.clone();
        }
        if let Some(v) = &cli.input_ext {
            self.input_ext = v.clone();
        }
        if let Some(v) = cli.start_index {
            self.start_index = v;
        }
        if let Some(v) = &cli.url {
            self.url = Some(v.clone());
        }
        for raw in &cli.header {
            let (name, value) = raw
                .split_once(':')
                .ok_or_else(|| anyhow!("Header '{}' is not 'Name: value'", raw))?;
            let name = name.trim().to_string();
            self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
            self.headers.push((name, value.trim().to_string()));
        }
        if let Some(v) = &cli.body {
            self.body = v.clone();
        }
        if let Some(v) = &cli.request {
            self.request = Some(v.clone());
        }
        if let Some(v) = &cli.found_marker {
            self.found_marker = Some(v.clone());
        }
        if let Some(v) = &cli.rate_limit_marker {
            self.rate_limit_marker = v.clone();
        }
        if cli.verbose {
            self.verbose = true;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(anyhow!("Thread count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        for (name, value) in [("delay", self.delay), ("batch delay", self.batch_delay)] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("The {} must be a non-negative number of seconds", name));
            }
        }
        Ok(())
    }

    /// Output path, defaulting to a timestamped file.
    pub fn output_path(&self) -> String {
        self.output.clone().unwrap_or_else(|| {
            format!("found_{}.txt", chrono::Local::now().format("%Y%m%d_%H%M%S"))
        })
    }
}
