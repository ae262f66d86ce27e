use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::orchestrator::CycleOrchestrator;

/// Run cycles on the configured interval until `shutdown` flips to `true`
/// (or its sender is dropped). Returns the number of cycles run.
///
/// Shutdown is only observed between cycles: a cycle in flight always runs
/// to RECORDING, and no new cycle starts once shutdown is requested.
pub async fn run_scheduled(orchestrator: &mut CycleOrchestrator, mut shutdown: watch::Receiver<bool>) -> u64 {
    let period = orchestrator.cycle_config().interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    if !orchestrator.cycle_config().run_immediately {
        // first tick of a tokio interval completes immediately
        ticker.tick().await;
    }

    info!("Scheduler started, interval {:?}", period);
    let mut cycles = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }
        if *shutdown.borrow() {
            break;
        }
        orchestrator.run_cycle().await;
        cycles += 1;
    }

    info!("Scheduler stopped after {} cycle(s)", cycles);
    cycles
}
