use std::fmt;

use serde::{Deserialize, Serialize};

use super::IdRepr;
use crate::subids::format::get_category_sigla;

/// Sigla used for products whose category could not be resolved.
pub const UNKNOWN_SIGLA: &str = "UNK";
pub const UNKNOWN_CATEGORY_NAME: &str = "unknown";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct CategoryId(pub String);

impl From<IdRepr> for CategoryId {
    fn from(value: IdRepr) -> Self {
        Self(value.into())
    }
}

impl From<CategoryId> for String {
    fn from(value: CategoryId) -> Self {
        value.0
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sigla: Option<String>,
    /// Declared depth from the source catalog, when it carries one.
    #[serde(default)]
    pub level: Option<u8>,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CategoryId(id.into()),
            name: name.into(),
            parent_id: None,
            keywords: Vec::new(),
            sigla: None,
            level: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(CategoryId(parent_id.into()));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sigla(mut self, sigla: impl Into<String>) -> Self {
        self.sigla = Some(sigla.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Explicit sigla when the catalog assigns one, otherwise derived from the name.
    pub fn effective_sigla(&self) -> String {
        self.sigla
            .as_deref()
            .map(str::trim)
            .filter(|sigla| !sigla.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| get_category_sigla(&self.name))
    }

    pub fn info(&self) -> CategoryInfo {
        CategoryInfo {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            sigla: self.effective_sigla(),
        }
    }
}

/// The resolved category data sub-id generation needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: Option<CategoryId>,
    pub name: String,
    pub sigla: String,
}

impl CategoryInfo {
    pub fn new(name: impl Into<String>, sigla: impl Into<String>) -> Self {
        Self { id: None, name: name.into(), sigla: sigla.into() }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_CATEGORY_NAME, UNKNOWN_SIGLA)
    }

    pub fn is_unknown(&self) -> bool {
        self.id.is_none() && self.name == UNKNOWN_CATEGORY_NAME
    }
}
