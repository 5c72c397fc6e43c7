use anyhow::Result;
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;

use super::checkpoint::FILTER_CHUNK;
use super::dispatcher::Dispatcher;
use super::input::{load_lines, InputSupplier};
use super::state::RunState;
use super::throttle::COOLDOWN;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_size: usize,
    pub request_delay: Duration,
    pub batch_delay: Duration,
    pub start_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub interrupted: bool,
    pub files_processed: usize,
}

/// Walks the candidate files in order and pushes each one through the dispatcher
/// in fixed-size batches.
pub struct Engine {
    dispatcher: Arc<Dispatcher>,
    state: Arc<Mutex<RunState>>,
    supplier: InputSupplier,
    tokens: Arc<Vec<String>>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        dispatcher: Dispatcher,
        state: RunState,
        supplier: InputSupplier,
        tokens: Vec<String>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            state: Arc::new(Mutex::new(state)),
            supplier,
            tokens: Arc::new(tokens),
            settings,
        }
    }

    pub fn state(&self) -> Arc<Mutex<RunState>> {
        Arc::clone(&self.state)
    }

    /// Run until every file is exhausted or `shutdown` flips to true. In-flight
    /// requests of an interrupted batch are aborted and awaited before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<RunReport> {
        let batch_size = self.settings.batch_size.max(1);
        let mut next_index = self.settings.start_index;
        let mut report = RunReport {
            interrupted: false,
            files_processed: 0,
        };

        if self.tokens.is_empty() {
            anyhow::bail!("No tokens to rotate");
        }

        while let Some((path, file_index)) = self.supplier.find_next(next_index) {
            next_index = file_index + 1;
            if *shutdown.borrow() {
                report.interrupted = true;
                return Ok(report);
            }

            println!(
                "\n{}",
                format!("[*] Processing {} (index {})", path.display(), file_index).cyan().bold()
            );
            let candidates = load_lines(&path);
            if candidates.is_empty() {
                println!("{}", format!("[!] {} has no candidates, skipping", path.display()).yellow());
                continue;
            }
            let total = candidates.len();
            let pending = {
                let state = self.state.lock().await;
                state.checkpoint.filter_pending(candidates, FILTER_CHUNK)
            };
            println!(
                "[*] {} total | {} already processed | {} pending",
                total,
                total - pending.len(),
                pending.len().to_string().bold()
            );

            let batch_count = pending.len().div_ceil(batch_size);
            for (n, batch) in pending.chunks(batch_size).enumerate() {
                println!(
                    "\n[*] Batch {}/{} ({} - {})",
                    n + 1,
                    batch_count,
                    n * batch_size + 1,
                    n * batch_size + batch.len()
                );
                if self.run_batch(batch, &mut shutdown).await {
                    report.interrupted = true;
                    return Ok(report);
                }

                let more = n + 1 < batch_count;
                if more && !self.settings.batch_delay.is_zero() {
                    let interrupted = tokio::select! {
                        _ = sleep(self.settings.batch_delay) => false,
                        _ = cancelled(&mut shutdown) => true,
                    };
                    if interrupted {
                        report.interrupted = true;
                        return Ok(report);
                    }
                }
            }

            report.files_processed += 1;
            self.state.lock().await.stats.files_processed = report.files_processed;
            println!("\n{}", format!("[+] Finished {}", path.display()).green());
        }

        Ok(report)
    }

    /// Dispatch one batch. Returns true when interrupted.
    async fn run_batch(&self, batch: &[String], shutdown: &mut watch::Receiver<bool>) -> bool {
        // Capacity is fixed for the whole batch; a reduction mid-batch applies to the next one.
        let permits = self.state.lock().await.concurrency();
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut set = JoinSet::new();

        for (position, candidate) in batch.iter().enumerate() {
            let token = self.tokens[position % self.tokens.len()].clone();
            set.spawn(probe_task(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.state),
                Arc::clone(&semaphore),
                token,
                candidate.clone(),
                self.settings.request_delay,
            ));
        }

        let interrupted = tokio::select! {
            _ = drain(&mut set) => false,
            _ = cancelled(shutdown) => true,
        };
        if interrupted {
            println!("\n{}", "[!] Interrupted, cancelling in-flight requests...".yellow());
            set.abort_all();
            drain(&mut set).await;
        }
        interrupted
    }
}

async fn probe_task(
    dispatcher: Arc<Dispatcher>,
    state: Arc<Mutex<RunState>>,
    semaphore: Arc<Semaphore>,
    token: String,
    candidate: String,
    delay: Duration,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };
    if state.lock().await.checkpoint.contains(&candidate) {
        return;
    }

    let outcome = dispatcher.probe(&token, &candidate).await;
    {
        let mut state = state.lock().await;
        let verdict = state.absorb(&outcome);
        if verdict.throttle.needs_cooldown() {
            // Holding the lock stalls every other task's classification too.
            sleep(COOLDOWN).await;
        }
    }

    if !delay.is_zero() {
        sleep(delay).await;
    }
}

async fn drain(set: &mut JoinSet<()>) {
    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                println!("\n{}", format!("[-] Task panicked: {}", e).red());
            }
        }
    }
}

/// Resolves once the shutdown flag is set. Never resolves if the sender is gone.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
