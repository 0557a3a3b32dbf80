//! Keyword scoring of free text against category keyword lists

use serde::{Deserialize, Serialize};

use crate::domain::category::{Category, CategoryId};

/// Weights for keyword scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchWeights {
    /// Points for every keyword found in the text (default: 2)
    pub base_weight: u32,
    /// Extra points when the keyword starts inside the early window (default: 1)
    pub early_bonus: u32,
    /// Width of the early window in characters (default: 20)
    pub early_window: usize,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self { base_weight: 2, early_bonus: 1, early_window: 20 }
    }
}

/// Score of one category against one text, with the keywords that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category_id: CategoryId,
    pub category_name: String,
    pub score: u32,
    pub matched_keywords: Vec<String>,
}

/// Flat keyword matcher
#[derive(Debug, Clone, Default)]
pub struct CategoryMatcher {
    weights: MatchWeights,
}

impl CategoryMatcher {
    /// Create a matcher with default weights
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom weights
    pub fn with_weights(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> MatchWeights {
        self.weights
    }

    /// Score a category against text that is already lower-cased.
    pub fn score(&self, lowered_text: &str, category: &Category) -> u32 {
        self.matches(lowered_text, category).map(|(_, points)| points).sum()
    }

    /// Highest-scoring category for `text`. The first category wins a tie and
    /// `None` is returned when nothing scores above zero.
    pub fn find_best<'a, I>(&self, text: &str, categories: I) -> Option<&'a Category>
    where
        I: IntoIterator<Item = &'a Category>,
    {
        if text.trim().is_empty() {
            return None;
        }
        let lowered = text.to_lowercase();

        let mut best: Option<(&'a Category, u32)> = None;
        for category in categories {
            let score = self.score(&lowered, category);
            if score > best.map_or(0, |(_, top)| top) {
                best = Some((category, score));
            }
        }

        best.map(|(category, _)| category)
    }

    /// Every category with a non-zero score, best first. Equal scores keep
    /// catalog order.
    pub fn explain<'a, I>(&self, text: &str, categories: I) -> Vec<CategoryScore>
    where
        I: IntoIterator<Item = &'a Category>,
    {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let lowered = text.to_lowercase();

        let mut scores: Vec<CategoryScore> = categories
            .into_iter()
            .filter_map(|category| {
                let matched: Vec<(String, u32)> = self.matches(&lowered, category).collect();
                let score = matched.iter().map(|(_, points)| points).sum::<u32>();
                (score > 0).then(|| CategoryScore {
                    category_id: category.id.clone(),
                    category_name: category.name.clone(),
                    score,
                    matched_keywords: matched.into_iter().map(|(keyword, _)| keyword).collect(),
                })
            })
            .collect();

        scores.sort_by(|left, right| right.score.cmp(&left.score));
        scores
    }

    fn matches<'c>(
        &'c self,
        lowered_text: &'c str,
        category: &'c Category,
    ) -> impl Iterator<Item = (String, u32)> + 'c {
        category.keywords.iter().filter_map(move |keyword| {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                return None;
            }
            let offset = lowered_text.find(&keyword)?;
            let mut points = self.weights.base_weight;
            if lowered_text[..offset].chars().count() < self.weights.early_window {
                points += self.weights.early_bonus;
            }
            Some((keyword, points))
        })
    }
}

/// Best category for `text` using the default weights.
pub fn find_category_by_keywords<'a>(text: &str, categories: &'a [Category]) -> Option<&'a Category> {
    CategoryMatcher::new().find_best(text, categories)
}
