//! Draw results and their completeness invariant.
use crate::data::{CategoryId, CategorySpec, ContentItem, EmotionTone};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

/// Chosen content for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySelection {
    pub category: CategorySpec,
    pub content: Arc<ContentItem>,
    pub tone: EmotionTone,
}

impl CategorySelection {
    #[must_use]
    pub fn new(category: CategoryId, content: Arc<ContentItem>, tone: EmotionTone) -> Self {
        Self {
            category: category.spec(),
            content,
            tone,
        }
    }

    /// Copy of this selection carrying different content.
    #[must_use]
    pub fn with_content(&self, content: Arc<ContentItem>) -> Self {
        Self {
            category: self.category,
            content,
            tone: self.tone,
        }
    }

    #[must_use]
    pub const fn category_id(&self) -> CategoryId {
        self.category.id
    }

    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content.id
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.content.is_fallback()
    }
}

/// Selection storage sized for the five required categories.
pub type Selections = SmallVec<[CategorySelection; 5]>;

/// Reason a selection set fails the completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletenessViolation {
    WrongCount(usize),
    Duplicate(CategoryId),
    Missing(CategoryId),
}

impl std::fmt::Display for CompletenessViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongCount(count) => write!(f, "expected 5 selections, got {count}"),
            Self::Duplicate(category) => write!(f, "category {category} selected twice"),
            Self::Missing(category) => write!(f, "category {category} missing"),
        }
    }
}

/// Check that `selections` covers each required category exactly once.
///
/// # Errors
///
/// Returns the first violation found.
pub fn check_completeness(selections: &[CategorySelection]) -> Result<(), CompletenessViolation> {
    if selections.len() != CategoryId::ALL.len() {
        return Err(CompletenessViolation::WrongCount(selections.len()));
    }
    let mut seen = HashSet::with_capacity(CategoryId::ALL.len());
    for selection in selections {
        if !seen.insert(selection.category_id()) {
            return Err(CompletenessViolation::Duplicate(selection.category_id()));
        }
    }
    if let Some(missing) = CategoryId::ALL.into_iter().find(|c| !seen.contains(c)) {
        return Err(CompletenessViolation::Missing(missing));
    }
    Ok(())
}

/// Exactly one selection per required category, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResult")]
pub struct RandomizationResult {
    pub fortune_rank: i32,
    selections: Selections,
}

impl RandomizationResult {
    /// Validate and wrap a set of selections, ordering them canonically.
    ///
    /// # Errors
    ///
    /// Returns the completeness violation if the set is not exactly the five
    /// required categories.
    pub fn new(
        fortune_rank: i32,
        mut selections: Selections,
    ) -> Result<Self, CompletenessViolation> {
        check_completeness(&selections)?;
        selections.sort_by_key(|selection| selection.category_id().index());
        Ok(Self {
            fortune_rank,
            selections,
        })
    }

    #[must_use]
    pub fn selections(&self) -> &[CategorySelection] {
        &self.selections
    }

    #[must_use]
    pub fn get(&self, category: CategoryId) -> Option<&CategorySelection> {
        self.selections
            .iter()
            .find(|selection| selection.category_id() == category)
    }

    /// Ids of every chosen content item, in category order.
    #[must_use]
    pub fn content_ids(&self) -> Vec<String> {
        self.selections
            .iter()
            .map(|selection| selection.content.id.clone())
            .collect()
    }

    #[must_use]
    pub fn fallback_count(&self) -> usize {
        self.selections.iter().filter(|s| s.is_fallback()).count()
    }
}

/// Wire form, validated by [`RandomizationResult::new`] on the way in.
#[derive(Deserialize)]
struct RawResult {
    fortune_rank: i32,
    selections: Selections,
}

impl TryFrom<RawResult> for RandomizationResult {
    type Error = CompletenessViolation;

    fn try_from(raw: RawResult) -> Result<Self, Self::Error> {
        Self::new(raw.fortune_rank, raw.selections)
    }
}

/// Fortune outcome, optionally carrying the five randomized categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FortuneReading {
    pub rank: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<RandomizationResult>,
}

impl FortuneReading {
    #[must_use]
    pub const fn new(rank: i32) -> Self {
        Self {
            rank,
            categories: None,
        }
    }

    #[must_use]
    pub fn with_categories(self, categories: RandomizationResult) -> Self {
        Self {
            categories: Some(categories),
            ..self
        }
    }

    #[must_use]
    pub const fn has_categories(&self) -> bool {
        self.categories.is_some()
    }
}
