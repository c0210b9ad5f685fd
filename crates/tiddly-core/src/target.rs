use std::fmt;

/// What a tiddler operation addresses: a bag directly, or a recipe that
/// resolves to a bag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Bag(String),
    Recipe(String),
}

impl Target {
    pub fn bag(name: impl Into<String>) -> Self {
        Self::Bag(name.into())
    }

    pub fn recipe(name: impl Into<String>) -> Self {
        Self::Recipe(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Bag(name) | Self::Recipe(name) => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bag(name) => write!(f, "bag {name:?}"),
            Self::Recipe(name) => write!(f, "recipe {name:?}"),
        }
    }
}
