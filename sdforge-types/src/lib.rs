#![deny(missing_docs)]
//! Shared ids, error taxonomy, and small cross-cutting enums for the
//! sdforge workspace: the one crate every other `sdforge-*` crate
//! depends on.

pub mod error;
pub mod id;
pub mod types;

pub use error::SdForgeError;
pub use id::{ContextKey, JobId, LoraName, UserId};
pub use types::{
    Confidence, ContentRating, JobState, LoraCategory, Priority, SafetyLevel, StylePreference,
};
