use colored::*;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

/// A progress line is printed every this many completed requests.
pub const PROGRESS_EVERY: u64 = 5;

/// Counters for one run. Lives inside the shared run state and is only touched
/// while that lock is held.
#[derive(Debug)]
pub struct RunStats {
    pub total: u64,
    pub success: u64,
    pub found: u64,
    pub errors: u64,
    pub concurrency: usize,
    pub files_processed: usize,
    start_time: Instant,
    unique_errors: HashMap<String, usize>,
}

impl RunStats {
    pub fn new(concurrency: usize) -> Self {
        Self {
            total: 0,
            success: 0,
            found: 0,
            errors: 0,
            concurrency: concurrency.max(1),
            files_processed: 0,
            start_time: Instant::now(),
            unique_errors: HashMap::new(),
        }
    }

    pub fn record_error(&mut self, msg: &str) {
        self.errors += 1;
        *self.unique_errors.entry(msg.to_string()).or_insert(0) += 1;
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn rate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.total as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Most frequent error descriptions, highest count first.
    pub fn top_errors(&self, n: usize) -> Vec<(&str, usize)> {
        let mut sorted: Vec<_> = self
            .unique_errors
            .iter()
            .map(|(msg, count)| (msg.as_str(), *count))
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sorted.truncate(n);
        sorted
    }

    pub fn print_progress(&self) {
        print!(
            "\r{} {} requests | {} OK | {} found | {} err | {} workers | {:.2} req/s    ",
            "[Progress]".cyan(),
            self.total.to_string().bold(),
            self.success.to_string().green(),
            self.found.to_string().green().bold(),
            self.errors.to_string().red(),
            self.concurrency,
            self.rate()
        );
        let _ = std::io::stdout().flush();
    }

    pub fn print_final(&self, output: &str) {
        println!();
        let elapsed = self.elapsed_secs();

        println!("{}", "=== Statistics ===".bold());
        println!("  Files processed:   {}", self.files_processed);
        println!("  Total requests:    {}", self.total);
        println!("  HTTP 200:          {}", self.success.to_string().green());
        println!("  Found:             {}", self.found.to_string().green().bold());
        println!("  Errors:            {}", self.errors.to_string().red());
        println!("  Final workers:     {}", self.concurrency);
        println!("  Elapsed time:      {:.2}s", elapsed);
        println!("  Average rate:      {:.2} req/s", self.rate());
        println!("  Found log:         {}", output);

        let top = self.top_errors(5);
        if !top.is_empty() {
            println!("\n{}", "Top Errors:".bold());
            for (msg, count) in top {
                println!("  - {}: {}", msg.yellow(), count);
            }
        }
    }
}
