//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `extractor` - Vision extraction service client (chat completions)
//! - `export` - Attendance tally output to a delimited file
//! - `server` - Web UI and JSON API (hyper)

pub mod export;
pub mod extractor;
pub mod server;

// Re-export commonly used types
pub use export::{ExportError, Exporter};
pub use extractor::{ExtractNames, ServiceError, VisionExtractor};
