mod scheduler;
mod usage;

pub use scheduler::{ExecutionOrderTracker, ReadyExecutable};
pub use usage::{ResourceUsageTrackingService, UsageBatch, UsageStamp};
