//! Serializations for Tiddly Store.
//!
//! The core never inspects wire formats. It asks a [`CodecRegistry`] for a
//! [`Codec`] matching the request's media type and calls `decode_*` before a
//! write or `encode_*` before handing a result to the transport.
//!
//! Built-in codecs:
//!
//! - [`JsonCodec`] -- `application/json`
//! - [`TextCodec`] -- `text/plain`, header lines then the tiddler text

pub mod error;
pub mod json;
pub mod registry;
pub mod segment;
pub mod text;
pub mod timestamp;
pub mod traits;

pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use registry::CodecRegistry;
pub use text::TextCodec;
pub use traits::Codec;
