//! `text/plain` serialization.
//!
//! A tiddler is a block of `key: value` header lines, a blank line, then the
//! text verbatim:
//!
//! ```text
//! modifier: alice
//! modified: 20240102030405
//! tags: food [[winter meal]]
//! servings: 4
//!
//! Boil water. Add vegetables.
//! ```
//!
//! Headers other than the core attributes become extension fields. Bags and
//! recipes use the same header block; a recipe lists one entry per body line
//! as `/bags/<bag>/tiddlers` with an optional `?<filter>` suffix. The bag
//! segment is percent-encoded.

use tiddly_model::{Bag, History, Operation, Policy, Recipe, RecipeEntry, Tiddler};

use crate::error::{CodecError, CodecResult};
use crate::segment;
use crate::timestamp;
use crate::traits::Codec;

const MEDIA_TYPE: &str = "text/plain";

/// `text/plain` serialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Render tags space-separated, bracketing any tag that contains whitespace
/// or itself starts with `[[`.
pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| {
            if tag.contains(char::is_whitespace) || tag.starts_with("[[") {
                format!("[[{tag}]]")
            } else {
                tag.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a tag string written by [`format_tags`].
///
/// A bracketed tag closes at the last two characters of the first run of
/// `]`, so a tag may itself end in a single `]`.
pub fn parse_tags(input: &str) -> CodecResult<Vec<String>> {
    let mut tags = Vec::new();
    let mut rest = input.trim_start();
    while !rest.is_empty() {
        if let Some(open) = rest.strip_prefix("[[") {
            let mut close = open.find("]]").ok_or_else(|| {
                CodecError::malformed(MEDIA_TYPE, format!("unterminated tag in {input:?}"))
            })?;
            while open[close + 2..].starts_with(']') {
                close += 1;
            }
            tags.push(open[..close].to_string());
            rest = open[close + 2..].trim_start();
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tags.push(rest[..end].to_string());
            rest = rest[end..].trim_start();
        }
    }
    Ok(tags)
}

// ---------------------------------------------------------------------------
// Header blocks
// ---------------------------------------------------------------------------

fn push_header(out: &mut String, key: &str, value: &str) -> CodecResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(CodecError::Unrepresentable {
            media_type: MEDIA_TYPE,
            reason: format!("header {key:?} contains a line break"),
        });
    }
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
    Ok(())
}

/// Split input into header pairs and body.
fn split_document(input: &str) -> CodecResult<(Vec<(String, String)>, &str)> {
    let (head, body) = if let Some(body) = input.strip_prefix('\n') {
        ("", body)
    } else {
        input.split_once("\n\n").unwrap_or((input, ""))
    };

    let mut headers = Vec::new();
    for line in head.lines().filter(|l| !l.trim().is_empty()) {
        let (key, value) = line.split_once(':').ok_or_else(|| {
            CodecError::malformed(MEDIA_TYPE, format!("header line {line:?} is missing ':'"))
        })?;
        let value = value.strip_prefix(' ').unwrap_or(value);
        headers.push((key.trim().to_string(), value.to_string()));
    }
    Ok((headers, body))
}

fn push_policy(out: &mut String, policy: &Policy) -> CodecResult<()> {
    if let Some(owner) = &policy.owner {
        push_header(out, "owner", owner)?;
    }
    for op in Operation::ALL {
        let list = policy.list(op);
        if !list.is_empty() {
            push_header(out, op.as_str(), &list.join(", "))?;
        }
    }
    Ok(())
}

/// Apply a policy header. Returns `false` when `key` is not a policy key.
fn apply_policy_header(policy: &mut Policy, key: &str, value: &str) -> bool {
    if key == "owner" {
        policy.owner = Some(value.trim().to_string()).filter(|o| !o.is_empty());
        return true;
    }
    match key.parse::<Operation>() {
        Ok(op) => {
            *policy.list_mut(op) = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            true
        }
        Err(_) => false,
    }
}

fn parse_history(value: &str) -> CodecResult<History> {
    match value.trim() {
        "full" => Ok(History::Full),
        "latest-only" => Ok(History::LatestOnly),
        other => Err(CodecError::malformed(
            MEDIA_TYPE,
            format!("unknown history mode {other:?}"),
        )),
    }
}

fn history_label(history: History) -> &'static str {
    match history {
        History::Full => "full",
        History::LatestOnly => "latest-only",
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

impl Codec for TextCodec {
    fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn encode_tiddler(&self, t: &Tiddler) -> CodecResult<String> {
        t.validate()?;
        let mut out = String::new();
        if let Some(modifier) = &t.modifier {
            push_header(&mut out, "modifier", modifier)?;
        }
        if let Some(modified) = &t.modified {
            push_header(&mut out, "modified", &timestamp::format(modified))?;
        }
        if let Some(created) = &t.created {
            push_header(&mut out, "created", &timestamp::format(created))?;
        }
        if !t.tags.is_empty() {
            push_header(&mut out, "tags", &format_tags(&t.tags))?;
        }
        if let Some(content_type) = &t.content_type {
            push_header(&mut out, "type", content_type)?;
        }
        for (key, value) in &t.fields {
            push_header(&mut out, key, value)?;
        }
        out.push('\n');
        out.push_str(&t.text);
        Ok(out)
    }

    fn decode_tiddler(&self, input: &str, title: &str) -> CodecResult<Tiddler> {
        let (headers, body) = split_document(input)?;
        let mut tiddler = Tiddler::new(title)?;
        tiddler.text = body.to_string();

        let parse_ts = |v: &str| timestamp::parse(v).map_err(|e| CodecError::malformed(MEDIA_TYPE, e));

        for (key, value) in headers {
            match key.as_str() {
                "title" => {
                    if value != title {
                        return Err(CodecError::TitleMismatch {
                            expected: title.to_string(),
                            found: value,
                        });
                    }
                }
                // Store-assigned; never settable from input.
                "bag" | "revision" => {}
                "modifier" => tiddler.modifier = Some(value),
                "modified" => tiddler.modified = Some(parse_ts(&value)?),
                "created" => tiddler.created = Some(parse_ts(&value)?),
                "tags" => tiddler.tags = parse_tags(&value)?,
                "type" => tiddler.content_type = Some(value),
                _ => tiddler.set_field(key, value)?,
            }
        }
        tiddler.validate()?;
        Ok(tiddler)
    }

    fn encode_tiddlers(&self, tiddlers: &[Tiddler]) -> CodecResult<String> {
        let mut out = String::new();
        for t in tiddlers {
            out.push_str(&t.title);
            if let Some(rev) = t.revision {
                out.push('\t');
                out.push_str(&rev.to_string());
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn encode_bag(&self, bag: &Bag) -> CodecResult<String> {
        let mut out = String::new();
        push_header(&mut out, "desc", &bag.description)?;
        push_header(&mut out, "history", history_label(bag.history))?;
        push_policy(&mut out, &bag.policy)?;
        Ok(out)
    }

    fn decode_bag(&self, input: &str, name: &str) -> CodecResult<Bag> {
        let (headers, _) = split_document(input)?;
        let mut bag = Bag::new(name)?;
        for (key, value) in headers {
            match key.as_str() {
                "desc" => bag.description = value,
                "history" => bag.history = parse_history(&value)?,
                other if apply_policy_header(&mut bag.policy, other, &value) => {}
                other => {
                    return Err(CodecError::malformed(
                        MEDIA_TYPE,
                        format!("unknown bag header {other:?}"),
                    ))
                }
            }
        }
        Ok(bag)
    }

    fn encode_recipe(&self, recipe: &Recipe) -> CodecResult<String> {
        let mut out = String::new();
        push_header(&mut out, "desc", &recipe.description)?;
        push_policy(&mut out, &recipe.policy)?;
        out.push('\n');
        for entry in &recipe.entries {
            out.push_str("/bags/");
            out.push_str(&segment::encode(&entry.bag));
            out.push_str("/tiddlers");
            if let Some(filter) = entry.filter() {
                out.push('?');
                out.push_str(filter);
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn decode_recipe(&self, input: &str, name: &str) -> CodecResult<Recipe> {
        let (headers, body) = split_document(input)?;
        let mut recipe = Recipe::new(name)?;
        for (key, value) in headers {
            match key.as_str() {
                "desc" => recipe.description = value,
                other if apply_policy_header(&mut recipe.policy, other, &value) => {}
                other => {
                    return Err(CodecError::malformed(
                        MEDIA_TYPE,
                        format!("unknown recipe header {other:?}"),
                    ))
                }
            }
        }

        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let (path, filter) = match line.split_once('?') {
                Some((path, filter)) => (path, Some(filter)),
                None => (line, None),
            };
            let bag = path
                .strip_prefix("/bags/")
                .and_then(|rest| rest.strip_suffix("/tiddlers"))
                .and_then(segment::decode)
                .ok_or_else(|| {
                    CodecError::malformed(MEDIA_TYPE, format!("bad recipe line {line:?}"))
                })?;
            recipe.entries.push(match filter {
                Some(f) if !f.trim().is_empty() => RecipeEntry::filtered(bag, f),
                _ => RecipeEntry::new(bag),
            });
        }
        recipe.validate()?;
        Ok(recipe)
    }

    fn encode_names(&self, names: &[String]) -> CodecResult<String> {
        Ok(names.iter().map(|n| format!("{n}\n")).collect())
    }
}
