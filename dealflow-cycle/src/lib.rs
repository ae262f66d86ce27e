pub mod dispatch;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

pub use dispatch::{dispatch, DispatchReport, FanoutPublisher};
pub use metrics::CycleMetrics;
pub use models::{CycleError, CycleState, SourceOutcome};
pub use orchestrator::CycleOrchestrator;
pub use retry::{fetch_with_retry, RetryPolicy};
pub use scheduler::run_scheduled;
