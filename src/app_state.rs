use crate::services::{
    media::MediaLibrary,
    queue::{JobQueue, StatusReporter},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub status: StatusReporter,
    pub media: MediaLibrary,
    pub max_files_per_batch: usize,
}

impl AppState {
    pub fn new(queue: JobQueue, media: MediaLibrary, max_files_per_batch: usize) -> Self {
        Self {
            status: queue.reporter(),
            queue,
            media,
            max_files_per_batch,
        }
    }
}
