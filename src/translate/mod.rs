//! API translation between Anthropic and `OpenAI` formats.
//!
//! The core of the proxy: converts requests, responses, and streaming events
//! between the two API formats. Nothing in here performs I/O; the backend
//! round-trips live in [`crate::proxy`].

pub mod anthropic_types;
pub mod content;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;
