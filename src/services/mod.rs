//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `session` - Session state and submission orchestration
//! - `normalizer` - Name normalization for raw extraction responses

pub mod normalizer;
pub mod session;

// Re-export commonly used types
pub use normalizer::Normalizer;
pub use session::{RosterSnapshot, Session};
