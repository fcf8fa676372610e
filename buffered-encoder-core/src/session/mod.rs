pub mod buffered;
pub mod capture_worker;
pub mod drain_worker;
pub mod flags;
pub mod notifier;
pub mod pipeline;
