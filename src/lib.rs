pub mod cancellation;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod importer;
pub mod library;
pub mod logging;
pub mod models;
pub mod offset;
pub mod paginator;
pub mod progress;
pub mod segmenter;
pub mod settings;
pub mod state;

pub use error::{Error, Result};
