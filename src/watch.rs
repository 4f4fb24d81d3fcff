//! Periodic re-scanning.
//!
//! Each cycle runs on its own thread and tags its result with a token from
//! a shared generation counter. Starting a cycle advances the counter, so a
//! slow cycle that finishes after a newer one started is recognised as
//! stale and dropped instead of overwriting fresher output.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::config::{Config, ConfigError};
use crate::engine::{self, EngineError, ScanReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(u64);

/// Monotonic counter shared between the loop and its workers.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier token.
    pub fn advance(&self) -> Token {
        Token(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: Token) -> bool {
        self.0.load(Ordering::SeqCst) == token.0
    }

    /// Unwrap a tagged value if it still belongs to the latest generation.
    pub fn accept<T>(&self, tagged: Tagged<T>) -> Option<T> {
        if self.is_current(tagged.token) {
            Some(tagged.value)
        } else {
            tracing::debug!(token = tagged.token.0, "discarding stale result");
            None
        }
    }
}

#[derive(Debug)]
pub struct Tagged<T> {
    pub token: Token,
    pub value: T,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("scan worker exited without reporting")]
    WorkerLost,
}

fn spawn_cycle(config: &Config, generation: &Generation, tx: &mpsc::Sender<Tagged<Result<ScanReport, EngineError>>>) -> Result<Token, WatchError> {
    let source = config.file_source()?;
    let token = generation.advance();
    let config = config.clone();
    let tx = tx.clone();

    thread::spawn(move || {
        let value = engine::run(&config, source.as_ref());
        // receiver gone means the loop has finished
        let _ = tx.send(Tagged { token, value });
    });

    Ok(token)
}

/// Scan every `config.watch_interval` and hand each fresh report to
/// `on_report`. Runs `cycles` times, or forever when `None`.
///
/// Failed cycles are logged and skipped. The last cycle waits for its own
/// result before returning.
pub fn run<F>(config: &Config, cycles: Option<usize>, mut on_report: F) -> Result<(), WatchError>
where
    F: FnMut(ScanReport),
{
    let generation = Generation::new();
    let (tx, rx) = mpsc::channel();
    let mut completed = 0usize;

    loop {
        let token = spawn_cycle(config, &generation, &tx)?;
        completed += 1;
        let last = cycles.is_some_and(|limit| completed >= limit);
        let deadline = Instant::now() + config.watch_interval;

        loop {
            let received = if last {
                rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                rx.recv_timeout(remaining)
            };

            let tagged = match received {
                Ok(tagged) => tagged,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(WatchError::WorkerLost),
            };

            let own = tagged.token == token;
            match generation.accept(tagged) {
                Some(Ok(report)) => on_report(report),
                Some(Err(e)) => tracing::warn!(error = %e, "scan failed"),
                None => {}
            }

            if last && own {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Selection;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn newer_generation_invalidates_older_tokens() {
        let generation = Generation::new();
        let first = generation.advance();
        assert!(generation.is_current(first));

        let second = generation.advance();
        assert!(second > first);
        assert!(!generation.is_current(first));
        assert_eq!(generation.accept(Tagged { token: first, value: 1 }), None);
        assert_eq!(generation.accept(Tagged { token: second, value: 2 }), Some(2));
    }

    #[test]
    fn clones_share_the_counter() {
        let generation = Generation::new();
        let worker = generation.clone();
        let token = worker.advance();
        assert!(generation.is_current(token));
    }

    #[test]
    fn runs_requested_cycles_against_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("20250810-080000.csv"),
            "ROLL_ID,PAPER_CODE,WIDTH,ESTADO,COMPLETA,LOCATION,DEPO\nA,P,1,STOCK,Saldo,L,Planta SFM\n",
        )
        .unwrap();

        let config = Config {
            selection: Selection::Directory(dir.path().to_path_buf()),
            stamps: crate::source::TimestampSource::FileName,
            watch_interval: Duration::ZERO,
            ..Config::default()
        };

        let mut reports = Vec::new();
        run(&config, Some(2), |report| reports.push(report)).unwrap();

        assert!(!reports.is_empty());
        let last = reports.last().unwrap();
        assert_eq!(last.current.as_ref().unwrap().name, "20250810-080000.csv");
    }

    #[test]
    fn missing_source_stops_the_loop() {
        let err = run(&Config::default(), Some(1), |_| {}).unwrap_err();
        assert!(matches!(err, WatchError::Config(ConfigError::NoSource)));
    }
}
