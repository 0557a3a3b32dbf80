use std::path::Path;
use std::sync::Arc;

use affilink_core::batch::{BatchReport, LinkGenerator, SequentialOptions};
use affilink_core::catalog::CategoryMatcher;
use affilink_core::subids::SubIdEngine;
use affilink_db::{SqlLinkRepository, SqlProductRepository};

use crate::commands::{
    load_catalog, load_config, open_store, read_products, runtime, CommandFailure, CommandResult,
};

pub fn run(products_path: &Path, start: u32, campaign: Option<&str>) -> CommandResult {
    match generate(products_path, start, campaign) {
        Ok(report) => {
            let message = format!(
                "{} of {} links generated",
                report.success_count, report.total_processed
            );
            CommandResult::success_with("sequential", message, report)
        }
        Err(failure) => failure.into_result("sequential"),
    }
}

fn generate(
    products_path: &Path,
    start: u32,
    campaign: Option<&str>,
) -> Result<BatchReport, CommandFailure> {
    if start == 0 {
        return Err(CommandFailure::new("input", "starting sequence must be at least 1", 6));
    }

    let config = load_config()?;
    let index = load_catalog(&config)?;
    let engine = SubIdEngine::new(config.template.to_template())?;
    let generator = LinkGenerator::new(
        engine,
        Arc::new(index),
        CategoryMatcher::with_weights(config.matching.weights()),
    );
    let products = read_products(products_path)?;

    let mut options = SequentialOptions { starting_sequence: start, ..SequentialOptions::default() };
    if let Some(campaign) = campaign.map(str::trim).filter(|campaign| !campaign.is_empty()) {
        options.campaign_id = campaign.to_string();
    }

    let runtime = runtime()?;
    runtime.block_on(async {
        let pool = open_store(&config).await?;
        let lookup = SqlProductRepository::new(pool.clone());
        let sink = SqlLinkRepository::new(pool.clone());

        let report = generator.generate_sequential_links(products, &options, &lookup, &sink).await;

        pool.close().await;
        Ok(report)
    })
}
