//! Quizflow Client: stage operations against the statistics backend
//!
//! The `PipelineClient` trait is the only way the orchestrator talks to the
//! backend. `HttpPipelineClient` is the production adapter; the `fakes`
//! module provides a scripted in-memory client for tests.

mod client;
mod config;
mod error;
pub mod fakes;
mod http;

pub use client::{ClientResult, PipelineClient};
pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
pub use error::ClientError;
pub use http::HttpPipelineClient;
