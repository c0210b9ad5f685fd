//! Recipe filter expressions.
//!
//! A filter narrows which tiddlers of a bag are visible through a recipe
//! entry. Syntax: `;`-separated terms, all of which must hold. Each term is
//! `kind:argument`, optionally negated with a leading `!`:
//!
//! | Term | Holds when |
//! |------|-----------|
//! | `title:X` | the title equals `X` |
//! | `prefix:X` | the title starts with `X` |
//! | `suffix:X` | the title ends with `X` |
//! | `tag:X` | the tiddler carries tag `X` |
//! | `field:K=V` | extension field `K` equals `V` |
//!
//! Title terms are decided from the name alone. `tag` and `field` terms need
//! the tiddler itself.

use std::fmt;
use std::str::FromStr;

use tiddly_model::Tiddler;

use crate::error::{RecipeError, RecipeResult};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Term {
    Title(String),
    Prefix(String),
    Suffix(String),
    Tag(String),
    Field { key: String, value: String },
}

impl Term {
    fn needs_content(&self) -> bool {
        matches!(self, Self::Tag(_) | Self::Field { .. })
    }

    /// `None` when the term cannot be decided from the title.
    fn eval_title(&self, title: &str) -> Option<bool> {
        match self {
            Self::Title(t) => Some(title == t),
            Self::Prefix(p) => Some(title.starts_with(p.as_str())),
            Self::Suffix(s) => Some(title.ends_with(s.as_str())),
            Self::Tag(_) | Self::Field { .. } => None,
        }
    }

    fn eval(&self, tiddler: &Tiddler) -> bool {
        match self {
            Self::Tag(tag) => tiddler.has_tag(tag),
            Self::Field { key, value } => tiddler.fields.get(key) == Some(value),
            other => other.eval_title(&tiddler.title).unwrap_or(false),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Condition {
    term: Term,
    negated: bool,
}

impl Condition {
    fn eval_title(&self, title: &str) -> Option<bool> {
        self.term.eval_title(title).map(|hit| hit != self.negated)
    }

    fn eval(&self, tiddler: &Tiddler) -> bool {
        self.term.eval(tiddler) != self.negated
    }
}

/// A parsed filter expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    source: String,
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn parse(source: &str) -> RecipeResult<Self> {
        let invalid = |reason: String| RecipeError::InvalidFilter {
            filter: source.to_string(),
            reason,
        };

        let mut conditions = Vec::new();
        for raw in source.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest.trim_start()),
                None => (false, raw),
            };
            let (kind, arg) = body
                .split_once(':')
                .ok_or_else(|| invalid(format!("term {body:?} is missing ':'")))?;
            if arg.is_empty() {
                return Err(invalid(format!("term {kind:?} has an empty argument")));
            }
            let term = match kind.trim() {
                "title" => Term::Title(arg.to_string()),
                "prefix" => Term::Prefix(arg.to_string()),
                "suffix" => Term::Suffix(arg.to_string()),
                "tag" => Term::Tag(arg.to_string()),
                "field" => {
                    let (key, value) = arg
                        .split_once('=')
                        .ok_or_else(|| invalid(format!("field term {arg:?} is missing '='")))?;
                    if key.is_empty() {
                        return Err(invalid("field term has an empty key".into()));
                    }
                    Term::Field {
                        key: key.to_string(),
                        value: value.to_string(),
                    }
                }
                other => return Err(invalid(format!("unknown term kind {other:?}"))),
            };
            conditions.push(Condition { term, negated });
        }

        if conditions.is_empty() {
            return Err(invalid("filter has no terms".into()));
        }
        Ok(Self {
            source: source.to_string(),
            conditions,
        })
    }

    /// Whether evaluating this filter requires loading the tiddler.
    pub fn needs_content(&self) -> bool {
        self.conditions.iter().any(|c| c.term.needs_content())
    }

    /// Decide from the title alone.
    ///
    /// Returns `Some(false)` as soon as any title term fails, `Some(true)`
    /// when every term is a title term and all hold, and `None` when content
    /// terms remain undecided.
    pub fn matches_title(&self, title: &str) -> Option<bool> {
        let mut undecided = false;
        for condition in &self.conditions {
            match condition.eval_title(title) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => undecided = true,
            }
        }
        if undecided {
            None
        } else {
            Some(true)
        }
    }

    /// Full evaluation against a tiddler.
    pub fn matches(&self, tiddler: &Tiddler) -> bool {
        self.conditions.iter().all(|c| c.eval(tiddler))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Filter {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
