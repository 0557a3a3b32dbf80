use affilink_core::domain::category::CategoryInfo;
use affilink_core::domain::product::Product;
use affilink_core::subids::{CounterState, SubIdBreakdown, SubIdEngine, SubIdTuple};
use affilink_db::{CounterRepository, SqlCounterRepository};
use serde::Serialize;

use crate::commands::{
    load_catalog, load_config, open_store, runtime, CommandFailure, CommandResult,
};

#[derive(Debug, Serialize)]
struct SubIdsIssued {
    category: CategoryInfo,
    sub_ids: SubIdTuple,
    breakdown: SubIdBreakdown,
}

pub fn run(category: &str, sigla: Option<&str>) -> CommandResult {
    match issue_sub_ids(category, sigla) {
        Ok((category, sub_ids)) => {
            let message = format!("issued {} / {}", sub_ids.s4, sub_ids.s5);
            let breakdown = sub_ids.breakdown();
            CommandResult::success_with(
                "subids",
                message,
                SubIdsIssued { category, sub_ids, breakdown },
            )
        }
        Err(failure) => failure.into_result("subids"),
    }
}

/// Resolves the category and issues the next counter values in one store
/// transaction.
pub(crate) fn issue_sub_ids(
    category: &str,
    sigla: Option<&str>,
) -> Result<(CategoryInfo, SubIdTuple), CommandFailure> {
    let category = category.trim();
    if category.is_empty() {
        return Err(CommandFailure::new("input", "category name is required", 6));
    }

    let config = load_config()?;
    let index = load_catalog(&config)?;
    let engine = SubIdEngine::new(config.template.to_template())?;

    let subject = Product {
        category_name: Some(category.to_string()),
        category_sigla: sigla.map(str::to_string),
        ..Product::default()
    };
    let info = index.resolve_known(&subject).unwrap_or_else(CategoryInfo::unknown);

    let runtime = runtime()?;
    let sub_ids = runtime.block_on(async {
        let pool = open_store(&config).await?;
        let counters = SqlCounterRepository::new(pool.clone());
        let issued = counters
            .issue(|state: &CounterState| engine.generate_sub_ids(&subject, &info, state))
            .await;
        pool.close().await;
        Ok::<SubIdTuple, CommandFailure>(issued?)
    })?;

    tracing::info!(
        event_name = "cli.subids.issued",
        category = %info.name,
        sigla = %info.sigla,
        product_code = %sub_ids.s4,
        "sub-ids issued"
    );

    Ok((info, sub_ids))
}
