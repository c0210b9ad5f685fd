use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::names::{validate_bag_name, validate_field_key, validate_tag, validate_title};

/// A store-assigned revision number. Always `>= 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct Revision(u64);

impl Revision {
    /// The first revision of every tiddler.
    pub const FIRST: Revision = Revision(1);

    /// Validate a caller-supplied revision number.
    pub fn new(value: i64) -> ModelResult<Self> {
        if value < 1 {
            return Err(ModelError::InvalidRevision(value));
        }
        Ok(Self(value as u64))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// The revision that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl TryFrom<i64> for Revision {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Revision> for u64 {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Core attribute names that may not be shadowed by extension fields.
pub const RESERVED_FIELDS: &[&str] = &[
    "title",
    "text",
    "tags",
    "fields",
    "bag",
    "revision",
    "modifier",
    "modified",
    "created",
    "type",
];

/// A named, versioned unit of content.
///
/// Identified by `(bag, title)`. `revision` is `None` until the store
/// assigns one; when set on a lookup it selects a specific revision rather
/// than the latest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tiddler {
    pub title: String,
    pub bag: Option<String>,
    pub revision: Option<Revision>,
    pub text: String,
    pub tags: Vec<String>,
    pub fields: BTreeMap<String, String>,
    pub modifier: Option<String>,
    pub modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

impl Tiddler {
    /// Create an empty tiddler with a validated title.
    pub fn new(title: impl Into<String>) -> ModelResult<Self> {
        let title = title.into();
        validate_title(&title)?;
        Ok(Self {
            title,
            bag: None,
            revision: None,
            text: String::new(),
            tags: Vec::new(),
            fields: BTreeMap::new(),
            modifier: None,
            modified: None,
            created: None,
            content_type: None,
        })
    }

    /// Create a tiddler already placed in a bag.
    pub fn in_bag(title: impl Into<String>, bag: impl Into<String>) -> ModelResult<Self> {
        let mut tiddler = Self::new(title)?;
        let bag = bag.into();
        validate_bag_name(&bag)?;
        tiddler.bag = Some(bag);
        Ok(tiddler)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set an extension field. See [`validate_field_key`] for the key rules.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) -> ModelResult<()> {
        let key = key.into();
        validate_field_key(&key)?;
        self.fields.insert(key, value.into());
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Re-check every invariant. Used after decoding untrusted input.
    pub fn validate(&self) -> ModelResult<()> {
        validate_title(&self.title)?;
        if let Some(bag) = &self.bag {
            validate_bag_name(bag)?;
        }
        for key in self.fields.keys() {
            validate_field_key(key)?;
        }
        for tag in &self.tags {
            validate_tag(tag)?;
        }
        Ok(())
    }

    /// Equality over caller-controlled attributes, ignoring store-assigned
    /// `bag` and `revision`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.title == other.title
            && self.text == other.text
            && self.tags == other.tags
            && self.fields == other.fields
            && self.modifier == other.modifier
            && self.modified == other.modified
            && self.created == other.created
            && self.content_type == other.content_type
    }
}
