use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::CategoryIndex;
use crate::domain::category::Category;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read category catalog `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse category catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid category catalog: {0}")]
    Invalid(String),
}

/// A catalog is either one flat list or the three level files merged into
/// one document.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Flat(Vec<Category>),
    Levels(LeveledCatalog),
}

#[derive(Deserialize)]
struct LeveledCatalog {
    #[serde(alias = "L1")]
    l1: Vec<Category>,
    #[serde(default, alias = "L2")]
    l2: Vec<Category>,
    #[serde(default, alias = "L3")]
    l3: Vec<Category>,
}

pub fn parse_categories(raw: &str) -> Result<Vec<Category>, CatalogError> {
    let categories = match serde_json::from_str::<CatalogDocument>(raw)? {
        CatalogDocument::Flat(categories) => categories,
        CatalogDocument::Levels(levels) => {
            let mut merged = Vec::with_capacity(levels.l1.len() + levels.l2.len() + levels.l3.len());
            for (level, categories) in [(1u8, levels.l1), (2, levels.l2), (3, levels.l3)] {
                merged.extend(categories.into_iter().map(|mut category| {
                    category.level.get_or_insert(level);
                    category
                }));
            }
            merged
        }
    };

    if let Some(blank) = categories.iter().find(|category| category.id.0.trim().is_empty()) {
        return Err(CatalogError::Invalid(format!("category `{}` has an empty id", blank.name)));
    }
    if let Some(bad) = categories.iter().find(|category| matches!(category.level, Some(level) if !(1..=3).contains(&level))) {
        return Err(CatalogError::Invalid(format!(
            "category `{}` declares level {:?}; levels run from 1 to 3",
            bad.id,
            bad.level.unwrap_or_default()
        )));
    }

    Ok(categories)
}

pub fn load_categories(path: &Path) -> Result<Vec<Category>, CatalogError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
    parse_categories(&raw)
}

impl CategoryIndex {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let categories = load_categories(path)?;
        let index = Self::new(categories);
        tracing::info!(
            event_name = "catalog.loaded",
            path = %path.display(),
            categories = index.len(),
            roots = index.l1().len(),
            "category catalog loaded"
        );
        Ok(index)
    }
}
