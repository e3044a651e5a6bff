//! HTTP client module
//!
//! Minimal HTTP client used to check that the gateway answers.

mod client;

pub use client::{base_url, HttpClient, HttpError};
