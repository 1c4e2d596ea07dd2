use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::modules::painting::{PaintingEngine, PassSummary};
use crate::modules::system::logger;

/// Runs one pass and returns, unless cancelled first.
pub async fn run_once(engine: &PaintingEngine, cancel: &CancellationToken) -> Option<PassSummary> {
    tokio::select! {
        summary = engine.run_pass() => Some(summary),
        _ = cancel.cancelled() => {
            logger::log_warn("[Scheduler] Pass interrupted by shutdown");
            None
        }
    }
}

/// Repeats passes with `interval` between the end of one pass and the start
/// of the next, until `cancel` fires. Returns the number of completed passes.
pub async fn run_continuous(
    engine: &PaintingEngine,
    interval: Duration,
    cancel: CancellationToken,
) -> usize {
    logger::log_info(&format!(
        "[Scheduler] Continuous painting started, {}s between passes",
        interval.as_secs()
    ));
    let mut completed = 0usize;

    loop {
        let Some(summary) = run_once(engine, &cancel).await else {
            break;
        };
        completed += 1;
        logger::log_info(&format!(
            "[Scheduler] Pass {} done: painted={}, failed={}, unavailable={}; next pass in {}s",
            completed,
            summary.cells_painted,
            summary.failed,
            summary.unavailable,
            interval.as_secs()
        ));

        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    logger::log_info(&format!(
        "[Scheduler] Continuous painting stopped after {} passes",
        completed
    ));
    completed
}
