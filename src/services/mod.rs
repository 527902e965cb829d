pub mod cleanup;
pub mod converter;
pub mod storage;

pub use cleanup::{retry_backoff, CleanupHandle, CleanupService, SWEEP_RETRY_BACKOFF};
pub use converter::DocumentConverter;
pub use storage::{allowed_file, output_name, sanitize_filename, Storage};
