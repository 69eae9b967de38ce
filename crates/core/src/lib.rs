//! # ragstream core
//!
//! Domain types, traits, and error definitions for the ragstream gateway.
//! This crate has **no HTTP dependencies**: it defines the request model,
//! the prompt composer, the SSE token framer, and the `Backend` trait that
//! the transport crates implement against.

pub mod backend;
pub mod error;
pub mod framing;
pub mod prompt;
pub mod request;

// Re-export key types at crate root for ergonomics
pub use backend::{Backend, FragmentReceiver, FragmentResult};
pub use error::{BackendError, Error, Result};
pub use framing::{PayloadEncoding, TokenFramer, WireEvent};
pub use prompt::compose;
pub use request::{GeneratedDoc, GenerationParameters, GenerationRequest};
