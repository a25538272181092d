pub mod engine;
pub mod scheduler;

pub use engine::{days_without_sales, revenue_by_item, PricingEngine, NO_CHANGES_MESSAGE};
pub use scheduler::{PriceScheduler, SchedulerStatus, Trigger, ALREADY_RUNNING, JOB_NAME};
