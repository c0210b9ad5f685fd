use tiddly_model::{Bag, Recipe, Tiddler};

use crate::error::CodecResult;

/// A serialization for Tiddly Store entities.
///
/// Decoding is always an explicit, field-by-field mapping onto a fixed
/// schema. Store-assigned attributes (`bag`, `revision`) and internal flags
/// (`ephemeral`) can never be set through a codec.
pub trait Codec: Send + Sync {
    /// The media type this codec reads and writes, e.g. `application/json`.
    fn media_type(&self) -> &'static str;

    /// File extension selecting this codec in a URL path, without the dot.
    fn extension(&self) -> &'static str;

    fn encode_tiddler(&self, tiddler: &Tiddler) -> CodecResult<String>;

    /// Decode a tiddler body for the tiddler named `title`.
    ///
    /// A title inside the body must agree with `title`.
    fn decode_tiddler(&self, input: &str, title: &str) -> CodecResult<Tiddler>;

    /// Encode a listing of tiddlers (metadata only, no text).
    fn encode_tiddlers(&self, tiddlers: &[Tiddler]) -> CodecResult<String>;

    fn encode_bag(&self, bag: &Bag) -> CodecResult<String>;

    fn decode_bag(&self, input: &str, name: &str) -> CodecResult<Bag>;

    fn encode_recipe(&self, recipe: &Recipe) -> CodecResult<String>;

    fn decode_recipe(&self, input: &str, name: &str) -> CodecResult<Recipe>;

    /// Encode a list of bag or recipe names.
    fn encode_names(&self, names: &[String]) -> CodecResult<String>;
}
