//! Name validation for tiddlers, bags, and recipes.
//!
//! Bag and recipe names appear as single URL path segments, so they must be
//! non-empty, must not contain `/`, and must not contain control characters.
//! Tiddler titles are more permissive: anything non-blank without control
//! characters is accepted, including `/`.
//!
//! Extension field keys and tags appear in header lines of the text format,
//! so they are held to the stricter rules in [`validate_field_key`] and
//! [`validate_tag`].

use crate::error::{ModelError, ModelResult};
use crate::tiddler::RESERVED_FIELDS;

/// Validate a bag name.
///
/// ```
/// use tiddly_model::names::validate_bag_name;
///
/// assert!(validate_bag_name("cooking").is_ok());
/// assert!(validate_bag_name("").is_err());
/// assert!(validate_bag_name("a/b").is_err());
/// ```
pub fn validate_bag_name(name: &str) -> ModelResult<()> {
    validate_container_name("bag", name)
}

/// Validate a recipe name.
pub fn validate_recipe_name(name: &str) -> ModelResult<()> {
    validate_container_name("recipe", name)
}

fn validate_container_name(entity: &'static str, name: &str) -> ModelResult<()> {
    let invalid = |reason: &str| ModelError::InvalidName {
        entity,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.contains('/') {
        return Err(invalid("must not contain '/'"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}

/// Validate a tiddler title.
pub fn validate_title(title: &str) -> ModelResult<()> {
    if title.trim().is_empty() {
        return Err(ModelError::InvalidTitle {
            title: title.to_string(),
            reason: "title must not be empty".into(),
        });
    }
    if title.chars().any(char::is_control) {
        return Err(ModelError::InvalidTitle {
            title: title.to_string(),
            reason: "must not contain control characters".into(),
        });
    }
    Ok(())
}

/// Validate an extension field key.
///
/// Keys must be non-empty, carry no leading or trailing whitespace, contain
/// neither control characters nor `:`, and not shadow a core attribute.
pub fn validate_field_key(key: &str) -> ModelResult<()> {
    let invalid = |reason: &str| ModelError::InvalidField {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.trim().is_empty() {
        return Err(invalid("field name must not be empty"));
    }
    if key.trim() != key {
        return Err(invalid("must not start or end with whitespace"));
    }
    if key.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    if key.contains(':') {
        return Err(invalid("must not contain ':'"));
    }
    if RESERVED_FIELDS.contains(&key) {
        return Err(invalid("shadows a core attribute"));
    }
    Ok(())
}

/// Validate a tag.
///
/// ```
/// use tiddly_model::names::validate_tag;
///
/// assert!(validate_tag("winter meal").is_ok());
/// assert!(validate_tag("[[x").is_ok());
/// assert!(validate_tag("a]]b").is_err());
/// ```
pub fn validate_tag(tag: &str) -> ModelResult<()> {
    let invalid = |reason: &str| ModelError::InvalidTag {
        tag: tag.to_string(),
        reason: reason.to_string(),
    };

    if tag.trim().is_empty() {
        return Err(invalid("tag must not be blank"));
    }
    if tag.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    if tag.contains("]]") {
        return Err(invalid("must not contain ']]'"));
    }
    Ok(())
}
