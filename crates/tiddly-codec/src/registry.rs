use std::sync::Arc;

use crate::error::{CodecError, CodecResult};
use crate::json::JsonCodec;
use crate::text::TextCodec;
use crate::traits::Codec;

/// Codecs keyed by media type. The first registered codec is the default.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// JSON (default) and plain text.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonCodec));
        registry.register(Arc::new(TextCodec));
        registry
    }

    /// Add a codec, replacing any existing codec for the same media type.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.retain(|c| c.media_type() != codec.media_type());
        self.codecs.push(codec);
    }

    pub fn media_types(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.media_type()).collect()
    }

    /// Codec for a `Content-Type` value. Parameters such as `charset` are
    /// ignored.
    pub fn for_content_type(&self, content_type: &str) -> CodecResult<Arc<dyn Codec>> {
        let essence = essence(content_type);
        self.codecs
            .iter()
            .find(|c| c.media_type() == essence)
            .cloned()
            .ok_or_else(|| CodecError::UnsupportedMediaType(content_type.to_string()))
    }

    /// Split a registered extension off a path segment.
    ///
    /// `soup.txt` yields `("soup", "text/plain")`. Segments without a
    /// registered extension, or with nothing before it, yield `None`.
    pub fn split_extension<'a>(&self, segment: &'a str) -> Option<(&'a str, &'static str)> {
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        self.codecs
            .iter()
            .find(|c| c.extension() == ext)
            .map(|c| (stem, c.media_type()))
    }

    /// Pick a codec for an `Accept` header.
    ///
    /// Entries are tried in listed order; `*/*` or a missing header selects
    /// the default codec. Quality values are not weighed.
    pub fn negotiate(&self, accept: Option<&str>) -> CodecResult<Arc<dyn Codec>> {
        let default = self
            .codecs
            .first()
            .cloned()
            .ok_or_else(|| CodecError::UnsupportedMediaType("no codecs registered".into()))?;

        let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
            return Ok(default);
        };

        for candidate in accept.split(',').map(essence) {
            if candidate == "*/*" {
                return Ok(default);
            }
            if let Some(codec) = self.codecs.iter().find(|c| c.media_type() == candidate) {
                return Ok(Arc::clone(codec));
            }
        }
        Err(CodecError::UnsupportedMediaType(accept.to_string()))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("media_types", &self.media_types())
            .finish()
    }
}

fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or_default().trim()
}
