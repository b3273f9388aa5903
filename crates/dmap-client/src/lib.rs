//! # dmap-client
//!
//! HTTP client for the dmap controller API.
//!
//! Every call is authenticated with the module's basic-auth credentials and
//! uses the same TLS verification policy. The [`ControllerApi`] trait is the
//! seam the registration lifecycle and send loop depend on.

mod client;
mod error;
mod models;
mod traits;

pub use client::ControllerClient;
pub use error::ControllerError;
pub use models::{
    ControllerPushRequest, Endpoint, ModuleSendRequest, RegisterWebhookRequest,
    RegisterWebhookResponse,
};
pub use traits::ControllerApi;
