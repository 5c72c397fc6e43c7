//! Templated HTTP intruder.
//!
//! Candidates come from numbered files, tokens rotate by position in the batch,
//! every attempt lands in a checkpoint log and hits land in a separate log. A
//! streak of rate-limited responses permanently lowers concurrency by one.

pub mod checkpoint;
pub mod dispatcher;
pub mod engine;
pub mod input;
pub mod state;
pub mod stats;
pub mod template;
pub mod throttle;

use anyhow::{anyhow, Context, Result};
use colored::*;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::RunConfig;
use crate::utils::{prompt_multiline, prompt_yes_no};
use checkpoint::CheckpointStore;
use dispatcher::Dispatcher;
use engine::{Engine, EngineSettings};
use input::{load_lines, InputSupplier};
use state::{Classifier, RunState};
use template::{RequestTemplate, CANDIDATE_PLACEHOLDER, TOKEN_PLACEHOLDER};

fn print_banner() {
    println!("{}", "╔═══════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║                  Templated HTTP Intruder                  ║".cyan());
    println!("{}", "║   Token rotation, checkpoint resume, adaptive throttle    ║".cyan());
    println!("{}", "╚═══════════════════════════════════════════════════════════╝".cyan());
    println!("{}", "For authorized testing only.".dimmed());
    println!();
}

/// Pick the request template: a raw request file, else an interactively entered
/// raw request, else the built-in url/headers/body. A raw request that fails to
/// parse is reported and the built-in template is used instead.
fn resolve_template(config: &RunConfig, interactive: bool) -> Result<RequestTemplate> {
    let builtin = || -> Result<RequestTemplate> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("No usable request template: pass --url or --request"))?;
        RequestTemplate::new(url, config.headers.clone(), &config.body).map_err(Into::into)
    };

    let raw = if let Some(path) = &config.request {
        Some(std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?)
    } else if interactive && prompt_yes_no("Use a custom raw request?", false)? {
        println!("Paste the request, end with two empty lines. Example:");
        println!("{}", "POST /api/check HTTP/1.1".dimmed());
        println!("{}", "Host: example.com".dimmed());
        println!("{}", format!("Authorization: {}", TOKEN_PLACEHOLDER).dimmed());
        println!();
        println!("{}", format!("{{\"mobile\":\"{}\"}}", CANDIDATE_PLACEHOLDER).dimmed());
        Some(prompt_multiline()?)
    } else {
        None
    };

    match raw.map(|text| RequestTemplate::parse_raw(&text)) {
        Some(Ok(template)) => {
            println!("{}", "[+] Parsed custom request".green());
            Ok(template)
        }
        Some(Err(e)) => {
            println!("{}", format!("[-] Could not parse custom request: {}", e).red());
            println!("{}", "[*] Falling back to the built-in template".cyan());
            builtin()
        }
        None => builtin(),
    }
}

fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

/// Run the intruder with a fully merged configuration. `interactive` enables the
/// raw request and confirmation prompts.
pub async fn run(config: RunConfig, interactive: bool) -> Result<()> {
    print_banner();
    config.validate()?;

    let found_marker = config
        .found_marker
        .clone()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| anyhow!("A found marker is required (--found-marker)"))?;

    let tokens = load_lines(Path::new(&config.tokens));
    if tokens.is_empty() {
        return Err(anyhow!("No tokens loaded from {}", config.tokens));
    }
    println!("[*] Loaded {} tokens", tokens.len());

    let supplier = InputSupplier::new(&config.input_prefix, &config.input_ext);
    let Some((first, _)) = supplier.find_next(config.start_index) else {
        return Err(anyhow!(
            "No candidate file found at or after {}",
            supplier.path_for(config.start_index).display()
        ));
    };

    let template = resolve_template(&config, interactive)?;
    for name in template.invalid_header_names() {
        println!("{}", format!("[!] Header '{}' is not valid and will be skipped", name).yellow());
    }

    let checkpoint = CheckpointStore::open(&config.processed);
    let output = config.output_path();

    println!("[*] Target:          {}", template.url.as_str().cyan());
    println!("[*] Headers:         {}", template.headers.len());
    println!("[*] First file:      {}", first.display());
    println!("[*] Checkpoint:      {} ({} recorded)", checkpoint.path().display(), checkpoint.len());
    println!("[*] Found log:       {}", output);
    println!("[*] Workers:         {}", config.threads);
    println!("[*] Request delay:   {}s", config.delay);
    println!("[*] Batch size:      {}", config.batch_size);
    println!("[*] Batch delay:     {}s", config.batch_delay);

    if interactive && !prompt_yes_no("Start run?", false)? {
        println!("{}", "[*] Cancelled".yellow());
        return Ok(());
    }

    let classifier = Classifier {
        found_marker,
        rate_limit_marker: config.rate_limit_marker.clone(),
    };
    let state = RunState::new(config.threads, checkpoint, classifier, &output);
    let engine = Engine::new(
        Dispatcher::new(template, config.verbose)?,
        state,
        supplier,
        tokens,
        EngineSettings {
            batch_size: config.batch_size,
            request_delay: seconds(config.delay),
            batch_delay: seconds(config.batch_delay),
            start_index: config.start_index,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    println!(
        "\n{}",
        format!("Starting run... {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")).blue().bold()
    );
    let report = engine.run(shutdown_rx).await?;

    if report.interrupted {
        println!("\n\n{}", "[!] Run interrupted by user".yellow().bold());
    } else {
        println!("\n\n{}", "[+] All candidate files processed".green().bold());
    }
    engine.state().lock().await.stats.print_final(&output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn request_file_wins_over_builtin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("req.txt");
        fs::write(&path, "POST /v2/check HTTP/1.1\nHost: api.example.com\n\n{\"m\":\"pload2\"}").unwrap();
        let config = RunConfig {
            url: Some("https://other.example.com/".into()),
            request: Some(path.to_string_lossy().to_string()),
            ..RunConfig::default()
        };
        let template = resolve_template(&config, false).unwrap();
        assert_eq!(template.url.as_str(), "https://api.example.com/v2/check");
    }

    #[test]
    fn bad_request_file_falls_back_to_builtin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("req.txt");
        fs::write(&path, "garbage without a body").unwrap();
        let config = RunConfig {
            url: Some("https://builtin.example.com/api".into()),
            request: Some(path.to_string_lossy().to_string()),
            ..RunConfig::default()
        };
        let template = resolve_template(&config, false).unwrap();
        assert_eq!(template.url.as_str(), "https://builtin.example.com/api");
        assert_eq!(template.body, r#"{"mobile":"pload2"}"#);
    }

    #[test]
    fn no_template_at_all_is_an_error() {
        assert!(resolve_template(&RunConfig::default(), false).is_err());
    }

    #[tokio::test]
    async fn missing_inputs_end_the_run_cleanly() {
        let dir = tempdir().unwrap();
        let tokens = dir.path().join("tokens.txt");
        let base = RunConfig {
            url: Some("https://example.com/api".into()),
            found_marker: Some("dup".into()),
            tokens: tokens.to_string_lossy().to_string(),
            input_prefix: dir.path().join("phone").to_string_lossy().to_string(),
            ..RunConfig::default()
        };

        // no tokens
        assert!(run(base.clone(), false).await.is_err());

        // tokens but no candidate files
        fs::write(&tokens, "T1\n").unwrap();
        let err = run(base.clone(), false).await.unwrap_err();
        assert!(err.to_string().contains("No candidate file"));

        // no found marker
        let config = RunConfig { found_marker: None, ..base };
        assert!(run(config, false).await.is_err());
    }
}
