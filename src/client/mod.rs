//! Client controller.
//!
//! Drives the generate → poll → display lifecycle against the proxy:
//! renders the model's form, uploads files, submits generations, polls task
//! status on a fixed timer and keeps a history of finished results.

pub mod controller;
pub mod error;
pub mod form;
pub mod key_store;
pub mod poller;
pub mod proxy_client;
pub mod session;
pub mod task;

pub use controller::{ClientState, Effect, Event, Phase, MAX_POLL_ERRORS, POLL_INTERVAL};
pub use error::ClientError;
pub use key_store::ApiKeyStore;
pub use proxy_client::{HttpProxyClient, ProxyApi, UploadFile};
pub use session::Session;
pub use task::{GenerationTask, HistoryEntry, TaskStatus, UploadState};
