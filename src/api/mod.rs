//! HTTP proxy layer.
//!
//! - `POST /generate` forwards a generation request to the selected model
//! - `GET /status` relays the status of a generation task
//! - `POST /upload` re-hosts an image or video on the public file host
//! - `GET /models` lists the model registry
//! - `GET /health` reports liveness

pub mod auth;
pub mod error;
mod generate;
pub mod routes;
mod status;
pub mod types;
mod upload;
pub mod upstream;

pub use error::ApiError;
pub use generate::sanitize_params;
pub use routes::{router, serve, AppState};
pub use upload::{check_size, validate_media_type, FILE_FIELD};
