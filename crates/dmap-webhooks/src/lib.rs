//! # dmap-webhooks
//!
//! Webhook side of a dmap module.
//!
//! This crate provides functionality for:
//! - Declaring webhook subscriptions (callback path or full callback URL)
//! - Registering them with the controller before any outbound traffic
//! - Receiving pushed events on an HTTP listener and handing the decoded
//!   messages to a pluggable observer

mod error;
mod events;
mod handlers;
mod listener;
mod observer;
mod registration;

pub use dmap_core::WebhookEventType;
pub use error::WebhookError;
pub use events::{InboundEvent, WebhookSubscription, WebhookTarget};
pub use handlers::{AckStyle, ListenerRoute, DEFAULT_MAX_BODY_BYTES};
pub use listener::InboundListener;
pub use observer::{ChannelObserver, EventObserver, LoggingObserver};
pub use registration::{RegistrationLifecycle, RegistrationOutcome, RegistrationPolicy};
