//! docconvert
//!
//! Document conversion service: images to PDF, PDF merge, PDF page-range
//! split and PDF metadata, over a shared storage directory that a
//! background sweeper keeps bounded.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::{create_router, AppState};
