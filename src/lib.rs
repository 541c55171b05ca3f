//! # Motion Proxy
//!
//! Thin proxy and client for motion-transfer video generation: a character
//! image and a reference video go in, a generated video comes out.
//!
//! This library provides:
//! - An HTTP proxy that uploads media to a public file host and relays
//!   generate and status calls to the generation API
//! - A static registry of models and their form schemas
//! - A client controller that submits a generation and polls it to completion
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use motion_proxy::client::{Event, HttpProxyClient, Session};
//!
//! let mut session = Session::new(Arc::new(HttpProxyClient::new("http://127.0.0.1:3000")));
//! session.dispatch(Event::GenerateRequested).await;
//! let phase = session.run_until_settled(|_| {}).await;
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod models;

pub use config::Config;
