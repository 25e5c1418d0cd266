//! Relay for Gemini image editing.
//!
//! Accepts an image plus a text prompt over HTTP, forwards them to Gemini's
//! `generateContent` endpoint with bounded, jittered retries, and returns the
//! generated image (or a structured error) to the caller.

pub mod ai;
pub mod error;
pub mod models;
pub mod request;
pub mod retry;
pub mod server;

pub use error::{Error, Result};
