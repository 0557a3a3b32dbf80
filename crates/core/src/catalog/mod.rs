//! Category catalog: the loaded index, keyword matching and category repair.

mod loader;
mod matcher;
mod repair;

pub use loader::{load_categories, parse_categories, CatalogError};
pub use matcher::{find_category_by_keywords, CategoryMatcher, CategoryScore, MatchWeights};
pub use repair::{
    assign_category, needs_repair, repair_product_categories, suggest_category, RepairReport,
};

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::domain::category::{Category, CategoryId, CategoryInfo};
use crate::domain::product::Product;
use crate::subids::get_category_sigla;

pub const MAX_DEPTH: usize = 3;
pub const UNKNOWN_SEGMENT: &str = "Desconhecido";
pub const UNKNOWN_CATEGORY_PATH: &str = "Categoria Desconhecida";
const PATH_SEPARATOR: &str = " > ";

/// One entry of the flattened category picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub id: CategoryId,
    pub label: String,
    pub sigla: String,
    pub depth: u8,
    pub parent_id: Option<CategoryId>,
}

/// Read-only category lookup structure, built once after loading.
#[derive(Clone, Debug, Default)]
pub struct CategoryIndex {
    categories: Vec<Category>,
    positions: HashMap<CategoryId, usize>,
    children: HashMap<CategoryId, Vec<usize>>,
}

impl CategoryIndex {
    /// Later duplicates of an id are ignored so lookups stay deterministic.
    pub fn new(categories: Vec<Category>) -> Self {
        let mut index = Self::default();
        for category in categories {
            if index.positions.contains_key(&category.id) {
                tracing::warn!(category_id = %category.id, "duplicate category id ignored");
                continue;
            }
            let position = index.categories.len();
            index.positions.insert(category.id.clone(), position);
            if let Some(parent_id) = &category.parent_id {
                index.children.entry(parent_id.clone()).or_default().push(position);
            }
            index.categories.push(category);
        }

        for (sigla, ids) in index.sigla_collisions() {
            tracing::warn!(
                sigla = %sigla,
                categories = ?ids.iter().map(|id| id.0.as_str()).collect::<Vec<_>>(),
                "categories share a sigla; their s5 counters are shared"
            );
        }

        index
    }

    pub fn get(&self, id: &CategoryId) -> Option<&Category> {
        self.positions.get(id).map(|&position| &self.categories[position])
    }

    pub fn contains(&self, id: &CategoryId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// All categories in load order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Case-insensitive lookup by display name, first match in load order.
    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        let wanted = name.trim().to_lowercase();
        self.categories.iter().find(|category| category.name.trim().to_lowercase() == wanted)
    }

    /// 1, 2 or 3 for known categories, 0 when the id is unknown. A declared
    /// level wins over the depth found by walking parents.
    pub fn level(&self, id: &CategoryId) -> u8 {
        match self.get(id) {
            None => 0,
            Some(category) => category.level.unwrap_or_else(|| self.walked_depth(category)),
        }
    }

    /// Category names from the root down to `id`.
    pub fn path(&self, id: &CategoryId) -> Vec<String> {
        let Some(category) = self.get(id) else {
            return Vec::new();
        };

        let mut segments = vec![category.name.clone()];
        let mut cursor = category;
        while segments.len() < MAX_DEPTH {
            let Some(parent_id) = &cursor.parent_id else {
                break;
            };
            match self.get(parent_id) {
                Some(parent) => {
                    segments.push(parent.name.clone());
                    cursor = parent;
                }
                None => {
                    let declared = usize::from(category.level.unwrap_or(0)).min(MAX_DEPTH);
                    segments.push(UNKNOWN_SEGMENT.to_string());
                    while segments.len() < declared {
                        segments.push(UNKNOWN_SEGMENT.to_string());
                    }
                    break;
                }
            }
        }

        segments.reverse();
        segments
    }

    /// `"L1 > L2 > L3"` display path. Never fails: missing ancestors show as
    /// `Desconhecido` and an unknown id as `Categoria Desconhecida`.
    pub fn full_path(&self, id: &CategoryId) -> String {
        if !self.contains(id) {
            return UNKNOWN_CATEGORY_PATH.to_string();
        }
        self.path(id).join(PATH_SEPARATOR)
    }

    pub fn l1(&self) -> Vec<&Category> {
        self.categories.iter().filter(|category| category.is_root()).collect()
    }

    pub fn l2(&self, parent_id: &CategoryId) -> Vec<&Category> {
        self.children_of(parent_id)
    }

    pub fn l3(&self, parent_id: &CategoryId) -> Vec<&Category> {
        self.children_of(parent_id)
    }

    pub fn children_of(&self, parent_id: &CategoryId) -> Vec<&Category> {
        self.children
            .get(parent_id)
            .map(|positions| positions.iter().map(|&position| &self.categories[position]).collect())
            .unwrap_or_default()
    }

    /// Depth-first flattening of the hierarchy with labels indented by level.
    pub fn select_options(&self) -> Vec<SelectOption> {
        let mut options = Vec::with_capacity(self.categories.len());
        for root in self.l1() {
            self.push_options(root, 1, &mut options);
        }
        options
    }

    /// Siglas claimed by more than one category.
    pub fn sigla_collisions(&self) -> BTreeMap<String, Vec<CategoryId>> {
        let mut by_sigla: BTreeMap<String, Vec<CategoryId>> = BTreeMap::new();
        for category in &self.categories {
            by_sigla.entry(category.effective_sigla()).or_default().push(category.id.clone());
        }
        by_sigla.retain(|_, ids| ids.len() > 1);
        by_sigla
    }

    pub fn info(&self, id: &CategoryId) -> Option<CategoryInfo> {
        self.get(id).map(Category::info)
    }

    /// Category data for sub-id generation. Tries the product's category id,
    /// then its own category name and sigla, then keyword matching, and
    /// falls back to `unknown`/`UNK`.
    pub fn resolve(&self, product: &Product, matcher: &CategoryMatcher) -> CategoryInfo {
        self.resolve_known(product)
            .or_else(|| matcher.find_best(&product.haystack(), &self.categories).map(Category::info))
            .unwrap_or_else(CategoryInfo::unknown)
    }

    /// Category data the product already carries, without keyword matching.
    pub fn resolve_known(&self, product: &Product) -> Option<CategoryInfo> {
        if let Some(info) = product.category_id.as_ref().and_then(|id| self.info(id)) {
            return Some(info);
        }

        let name = product.category_name.as_deref().map(str::trim).filter(|name| !name.is_empty())?;
        if let Some(category) = self.find_by_name(name) {
            return Some(category.info());
        }
        let sigla = product
            .category_sigla
            .as_deref()
            .map(str::trim)
            .filter(|sigla| !sigla.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| get_category_sigla(name));
        Some(CategoryInfo { id: product.category_id.clone(), name: name.to_string(), sigla })
    }

    fn walked_depth(&self, category: &Category) -> u8 {
        let mut depth = 1;
        let mut cursor = category;
        while let Some(parent_id) = &cursor.parent_id {
            if usize::from(depth) >= MAX_DEPTH {
                break;
            }
            depth += 1;
            match self.get(parent_id) {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        depth
    }

    fn push_options(&self, category: &Category, depth: u8, options: &mut Vec<SelectOption>) {
        let indent = "--".repeat(usize::from(depth) - 1);
        let label = if indent.is_empty() {
            category.name.clone()
        } else {
            format!("{indent} {}", category.name)
        };
        options.push(SelectOption {
            id: category.id.clone(),
            label,
            sigla: category.effective_sigla(),
            depth,
            parent_id: category.parent_id.clone(),
        });

        if usize::from(depth) < MAX_DEPTH {
            for child in self.children_of(&category.id) {
                self.push_options(child, depth + 1, options);
            }
        }
    }
}
