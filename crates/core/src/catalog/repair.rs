use serde::Serialize;

use super::{CategoryIndex, CategoryMatcher};
use crate::domain::category::Category;
use crate::domain::product::Product;

/// Outcome of an automatic category repair pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Products that already had a known category.
    pub untouched: Vec<Product>,
    pub updated: Vec<Product>,
    /// Products no keyword matched; they need manual categorization.
    pub failed: Vec<Product>,
}

impl RepairReport {
    pub fn total(&self) -> usize {
        self.untouched.len() + self.updated.len() + self.failed.len()
    }

    /// Share of products that end the pass with a known category.
    pub fn categorized_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 100.0;
        }
        (total - self.failed.len()) as f64 * 100.0 / total as f64
    }
}

/// A product needs repair when it has no category id or the id is not in
/// the catalog.
pub fn needs_repair(product: &Product, index: &CategoryIndex) -> bool {
    product.category_id.as_ref().map_or(true, |id| !index.contains(id))
}

pub fn suggest_category<'a>(
    product: &Product,
    index: &'a CategoryIndex,
    matcher: &CategoryMatcher,
) -> Option<&'a Category> {
    matcher.find_best(&product.haystack(), index.categories())
}

pub fn assign_category(product: &mut Product, category: &Category) {
    product.category_id = Some(category.id.clone());
    product.category_name = Some(category.name.clone());
    product.category_sigla = Some(category.effective_sigla());
}

pub fn repair_product_categories(
    products: Vec<Product>,
    index: &CategoryIndex,
    matcher: &CategoryMatcher,
) -> RepairReport {
    let mut report = RepairReport::default();

    for mut product in products {
        if !needs_repair(&product, index) {
            report.untouched.push(product);
            continue;
        }

        match suggest_category(&product, index, matcher) {
            Some(category) => {
                tracing::debug!(
                    event_name = "catalog.repair.assigned",
                    product_id = product.id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
                    category_id = %category.id,
                    "category assigned from keywords"
                );
                assign_category(&mut product, category);
                report.updated.push(product);
            }
            None => report.failed.push(product),
        }
    }

    tracing::info!(
        event_name = "catalog.repair.completed",
        updated = report.updated.len(),
        failed = report.failed.len(),
        categorized_percent = report.categorized_percent(),
        "category repair finished"
    );

    report
}
