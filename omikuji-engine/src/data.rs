use crate::constants::{DEFAULT_CONTENT_WEIGHT, TAG_SOURCE, TAG_SOURCE_FALLBACK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque metadata attached to a content item.
pub type ContentTags = BTreeMap<String, serde_json::Value>;

/// A single candidate text shown in a fortune category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub text: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub tags: ContentTags,
}

fn default_weight() -> f64 {
    DEFAULT_CONTENT_WEIGHT
}

impl ContentItem {
    /// Create an item with the default weight and no tags.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            weight: DEFAULT_CONTENT_WEIGHT,
            tags: ContentTags::new(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Whether this item was synthesized because no pool content was usable.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.tags
            .get(TAG_SOURCE)
            .and_then(serde_json::Value::as_str)
            .is_some_and(|source| source == TAG_SOURCE_FALLBACK)
    }
}

/// Emotional register of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionTone {
    Positive,
    Neutral,
    Negative,
}

impl EmotionTone {
    /// Fixed selection order used for cumulative sampling.
    pub const ALL: [Self; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for EmotionTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one of the five required fortune categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    Deployment,
    CodeReview,
    Debugging,
    Learning,
    Teamwork,
}

impl CategoryId {
    /// Every required category, in presentation order.
    pub const ALL: [Self; 5] = [
        Self::Deployment,
        Self::CodeReview,
        Self::Debugging,
        Self::Learning,
        Self::Teamwork,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::CodeReview => "code_review",
            Self::Debugging => "debugging",
            Self::Learning => "learning",
            Self::Teamwork => "teamwork",
        }
    }

    /// Position of this category in [`CategoryId::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Deployment => 0,
            Self::CodeReview => 1,
            Self::Debugging => 2,
            Self::Learning => 3,
            Self::Teamwork => 4,
        }
    }

    #[must_use]
    pub const fn spec(self) -> CategorySpec {
        CategorySpec::of(self)
    }

    /// Parse the snake-case identifier produced by [`CategoryId::as_str`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value.trim())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category identifier paired with its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "CategoryId")]
pub struct CategorySpec {
    pub id: CategoryId,
    pub name: &'static str,
}

impl CategorySpec {
    #[must_use]
    pub const fn of(id: CategoryId) -> Self {
        let name = match id {
            CategoryId::Deployment => "Deployment",
            CategoryId::CodeReview => "Code Review",
            CategoryId::Debugging => "Debugging",
            CategoryId::Learning => "Learning",
            CategoryId::Teamwork => "Teamwork",
        };
        Self { id, name }
    }

    /// Specs for every required category, in presentation order.
    #[must_use]
    pub fn all() -> [Self; 5] {
        CategoryId::ALL.map(Self::of)
    }
}

impl<'de> Deserialize<'de> for CategorySpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        CategoryId::deserialize(deserializer).map(Self::of)
    }
}

impl From<CategoryId> for CategorySpec {
    fn from(id: CategoryId) -> Self {
        Self::of(id)
    }
}

impl From<CategorySpec> for CategoryId {
    fn from(spec: CategorySpec) -> Self {
        spec.id
    }
}
