pub mod ai;
pub mod handlers;
pub mod image_processing;
pub mod job_store;
pub mod media;
pub mod queue;
