use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tiddly_model::{Bag, History, Policy, Recipe, RecipeEntry, Tiddler};

use crate::error::{CodecError, CodecResult};
use crate::timestamp;
use crate::traits::Codec;

const MEDIA_TYPE: &str = "application/json";

// ---------------------------------------------------------------------------
// Wire documents
// ---------------------------------------------------------------------------

/// JSON shape of a tiddler. Unknown keys are rejected on decode.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TiddlerDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    /// Output only; ignored on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bag: Option<String>,
    /// Output only; ignored on input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

impl TiddlerDoc {
    fn from_tiddler(t: &Tiddler, with_text: bool) -> Self {
        Self {
            title: Some(t.title.clone()),
            bag: t.bag.clone(),
            revision: t.revision.map(|r| r.get()),
            text: with_text.then(|| t.text.clone()),
            tags: t.tags.clone(),
            fields: t.fields.clone(),
            modifier: t.modifier.clone(),
            modified: t.modified.as_ref().map(timestamp::format),
            created: t.created.as_ref().map(timestamp::format),
            content_type: t.content_type.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDoc {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    read: Vec<String>,
    #[serde(default)]
    write: Vec<String>,
    #[serde(default)]
    create: Vec<String>,
    #[serde(default)]
    delete: Vec<String>,
    #[serde(default)]
    manage: Vec<String>,
}

impl From<&Policy> for PolicyDoc {
    fn from(p: &Policy) -> Self {
        Self {
            owner: p.owner.clone(),
            read: p.read.clone(),
            write: p.write.clone(),
            create: p.create.clone(),
            delete: p.delete.clone(),
            manage: p.manage.clone(),
        }
    }
}

impl From<PolicyDoc> for Policy {
    fn from(doc: PolicyDoc) -> Self {
        Policy {
            owner: doc.owner,
            read: doc.read,
            write: doc.write,
            create: doc.create,
            delete: doc.delete,
            manage: doc.manage,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BagDoc {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    policy: Option<PolicyDoc>,
    #[serde(default)]
    history: History,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeDoc {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    policy: Option<PolicyDoc>,
    /// `[bag, filter]` pairs; an empty filter means none.
    #[serde(default)]
    recipe: Vec<(String, String)>,
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// `application/json` serialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    fn to_string<T: Serialize>(value: &T) -> CodecResult<String> {
        serde_json::to_string(value).map_err(|e| CodecError::Unrepresentable {
            media_type: MEDIA_TYPE,
            reason: e.to_string(),
        })
    }

    fn from_str<'de, T: Deserialize<'de>>(input: &'de str) -> CodecResult<T> {
        serde_json::from_str(input).map_err(|e| CodecError::malformed(MEDIA_TYPE, e))
    }
}

impl Codec for JsonCodec {
    fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode_tiddler(&self, tiddler: &Tiddler) -> CodecResult<String> {
        Self::to_string(&TiddlerDoc::from_tiddler(tiddler, true))
    }

    fn decode_tiddler(&self, input: &str, title: &str) -> CodecResult<Tiddler> {
        let doc: TiddlerDoc = Self::from_str(input)?;
        if let Some(found) = doc.title.filter(|t| t != title) {
            return Err(CodecError::TitleMismatch {
                expected: title.to_string(),
                found,
            });
        }

        let parse_ts = |raw: Option<String>| {
            raw.map(|s| timestamp::parse(&s))
                .transpose()
                .map_err(|e| CodecError::malformed(MEDIA_TYPE, e))
        };

        let mut tiddler = Tiddler::new(title)?;
        tiddler.text = doc.text.unwrap_or_default();
        tiddler.tags = doc.tags;
        tiddler.modifier = doc.modifier;
        tiddler.modified = parse_ts(doc.modified)?;
        tiddler.created = parse_ts(doc.created)?;
        tiddler.content_type = doc.content_type;
        for (key, value) in doc.fields {
            tiddler.set_field(key, value)?;
        }
        tiddler.validate()?;
        Ok(tiddler)
    }

    fn encode_tiddlers(&self, tiddlers: &[Tiddler]) -> CodecResult<String> {
        let docs: Vec<TiddlerDoc> = tiddlers
            .iter()
            .map(|t| TiddlerDoc::from_tiddler(t, false))
            .collect();
        Self::to_string(&docs)
    }

    fn encode_bag(&self, bag: &Bag) -> CodecResult<String> {
        Self::to_string(&BagDoc {
            desc: bag.description.clone(),
            policy: Some(PolicyDoc::from(&bag.policy)),
            history: bag.history,
        })
    }

    fn decode_bag(&self, input: &str, name: &str) -> CodecResult<Bag> {
        let doc: BagDoc = Self::from_str(input)?;
        let bag = Bag::new(name)?
            .with_description(doc.desc)
            .with_policy(doc.policy.map(Policy::from).unwrap_or_default())
            .with_history(doc.history);
        Ok(bag)
    }

    fn encode_recipe(&self, recipe: &Recipe) -> CodecResult<String> {
        Self::to_string(&RecipeDoc {
            desc: recipe.description.clone(),
            policy: Some(PolicyDoc::from(&recipe.policy)),
            recipe: recipe
                .entries
                .iter()
                .map(|e| (e.bag.clone(), e.filter.clone().unwrap_or_default()))
                .collect(),
        })
    }

    fn decode_recipe(&self, input: &str, name: &str) -> CodecResult<Recipe> {
        let doc: RecipeDoc = Self::from_str(input)?;
        let mut recipe = Recipe::new(name)?
            .with_description(doc.desc)
            .with_policy(doc.policy.map(Policy::from).unwrap_or_default());
        recipe.entries = doc
            .recipe
            .into_iter()
            .map(|(bag, filter)| {
                if filter.trim().is_empty() {
                    RecipeEntry::new(bag)
                } else {
                    RecipeEntry::filtered(bag, filter)
                }
            })
            .collect();
        recipe.validate()?;
        Ok(recipe)
    }

    fn encode_names(&self, names: &[String]) -> CodecResult<String> {
        Self::to_string(&names)
    }
}
