pub mod error;
pub mod health;
pub mod metrics;
pub mod queue;
pub mod upload;
