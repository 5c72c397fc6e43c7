use colored::*;
use std::path::PathBuf;

use super::checkpoint::{append_line, CheckpointStore};
use super::dispatcher::ProbeOutcome;
use super::stats::{RunStats, PROGRESS_EVERY};
use super::throttle::{Throttle, ThrottleEvent};

/// Literal markers looked for in response bodies.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub found_marker: String,
    pub rate_limit_marker: String,
}

impl Classifier {
    pub fn is_rate_limited(&self, outcome: &ProbeOutcome) -> bool {
        !self.rate_limit_marker.is_empty() && outcome.body.contains(&self.rate_limit_marker)
    }

    /// Only a real response can carry the success marker.
    pub fn is_found(&self, outcome: &ProbeOutcome) -> bool {
        !outcome.error && !self.found_marker.is_empty() && outcome.body.contains(&self.found_marker)
    }
}

/// Effect of one absorbed outcome that the calling task has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub found: bool,
    pub throttle: ThrottleEvent,
}

/// Everything the dispatch tasks share. Guarded by a single lock; each call to
/// `absorb` is one logical update.
#[derive(Debug)]
pub struct RunState {
    pub stats: RunStats,
    pub checkpoint: CheckpointStore,
    throttle: Throttle,
    classifier: Classifier,
    found_log: PathBuf,
}

impl RunState {
    pub fn new(
        concurrency: usize,
        checkpoint: CheckpointStore,
        classifier: Classifier,
        found_log: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stats: RunStats::new(concurrency),
            checkpoint,
            throttle: Throttle::default(),
            classifier,
            found_log: found_log.into(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.stats.concurrency
    }

    /// Count the outcome, run the throttle, checkpoint the candidate and log a hit.
    pub fn absorb(&mut self, outcome: &ProbeOutcome) -> Verdict {
        self.stats.total += 1;

        let rate_limited = self.classifier.is_rate_limited(outcome);
        let event = self.throttle.observe(rate_limited, &mut self.stats.concurrency);
        report_throttle(event, self.throttle.streak(), self.stats.concurrency);

        if let Err(e) = self.checkpoint.record(&outcome.candidate) {
            println!("\n{}", format!("[-] Checkpoint write failed: {:#}", e).red());
        }

        let found = self.classifier.is_found(outcome);
        if found {
            self.stats.found += 1;
            if let Err(e) = append_line(&self.found_log, &outcome.candidate) {
                println!("\n{}", format!("[-] Found log write failed: {:#}", e).red());
            }
            announce_found(outcome);
        }

        if outcome.status == Some(200) {
            self.stats.success += 1;
        }
        if outcome.error {
            self.stats.record_error(&outcome.body);
        }

        if self.stats.total % PROGRESS_EVERY == 0 {
            self.stats.print_progress();
        }

        Verdict {
            found,
            throttle: event,
        }
    }
}

fn report_throttle(event: ThrottleEvent, streak: u32, concurrency: usize) {
    match event {
        ThrottleEvent::Hit { streak } => {
            println!(
                "\n{}",
                format!("[!] Rate limited ({} in a row), workers: {}", streak, concurrency).yellow()
            );
        }
        ThrottleEvent::Reduced { from, to } => {
            println!(
                "\n{}",
                format!("[!] Rate limit streak hit the threshold, workers {} -> {}", from, to)
                    .red()
                    .bold()
            );
        }
        ThrottleEvent::Recovered { streak: cleared } => {
            println!(
                "\n{}",
                format!("[+] Normal response, rate limit streak {} -> {}", cleared, streak).green()
            );
        }
        ThrottleEvent::Clear => {}
    }
}

fn announce_found(outcome: &ProbeOutcome) {
    let preview: String = outcome.body.chars().take(200).collect();
    println!("\n\n{}", "=".repeat(60).green().bold());
    println!("{} FOUND: {}", "[+]".green().bold(), outcome.candidate.bright_white().bold());
    println!("{} Response: {}...", " >".cyan(), preview);
    println!("{}\n", "=".repeat(60).green().bold());
}
