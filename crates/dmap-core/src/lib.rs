//! Core types shared across all dmap module crates

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod trust;
pub mod utils;

pub use config::*;
pub use envelope::*;
pub use error::*;
pub use event::WebhookEventType;
pub use trust::TrustMaterial;
pub use utils::*;
