//! Core protocol types for the FR24 grpc-web feed.
//!
//! This crate holds the transport-independent half of the client: the
//! length-prefixed frame codec and the trailer parsing that turns
//! out-of-band status frames into typed errors. The HTTP side lives in
//! `fr24-grpc-client`.
//!
//! ## Modules
//!
//! - `envelope`: Frame encoding and decoding
//! - `trailer`: Trailer frame parsing
//! - `error`: Status codes and framing error types

mod envelope;
mod error;
mod trailer;

pub use envelope::*;
pub use error::*;
pub use trailer::*;
