use std::path::Path;

use affilink_core::catalog::{repair_product_categories, CategoryMatcher};
use affilink_core::domain::product::Product;
use affilink_db::{ProductRepository, SqlProductRepository};
use serde::Serialize;

use crate::commands::{
    load_catalog, load_config, open_store, read_products, runtime, CommandFailure, CommandResult,
};

#[derive(Debug, Serialize)]
struct RepairedProduct {
    product_id: Option<String>,
    name: String,
    category_id: Option<String>,
    category_name: Option<String>,
    category_sigla: Option<String>,
}

impl From<&Product> for RepairedProduct {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id.as_ref().map(ToString::to_string),
            name: product.name.clone(),
            category_id: product.category_id.as_ref().map(ToString::to_string),
            category_name: product.category_name.clone(),
            category_sigla: product.category_sigla.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RepairSummary {
    total: usize,
    untouched: usize,
    categorized_percent: f64,
    applied: bool,
    updated: Vec<RepairedProduct>,
    failed: Vec<RepairedProduct>,
}

pub fn run(products_path: &Path, apply: bool) -> CommandResult {
    match repair(products_path, apply) {
        Ok(summary) => {
            let message = format!(
                "{} products updated, {} need manual categorization",
                summary.updated.len(),
                summary.failed.len()
            );
            CommandResult::success_with("repair", message, summary)
        }
        Err(failure) => failure.into_result("repair"),
    }
}

fn repair(products_path: &Path, apply: bool) -> Result<RepairSummary, CommandFailure> {
    let config = load_config()?;
    let index = load_catalog(&config)?;
    let products = read_products(products_path)?;
    let matcher = CategoryMatcher::with_weights(config.matching.weights());

    let report = repair_product_categories(products, &index, &matcher);

    if apply && !report.updated.is_empty() {
        let runtime = runtime()?;
        runtime.block_on(async {
            let pool = open_store(&config).await?;
            let repository = SqlProductRepository::new(pool.clone());
            for product in &report.updated {
                repository.save(product.clone()).await?;
            }
            pool.close().await;
            Ok::<(), CommandFailure>(())
        })?;
    }

    Ok(RepairSummary {
        total: report.total(),
        untouched: report.untouched.len(),
        categorized_percent: report.categorized_percent(),
        applied: apply,
        updated: report.updated.iter().map(RepairedProduct::from).collect(),
        failed: report.failed.iter().map(RepairedProduct::from).collect(),
    })
}
