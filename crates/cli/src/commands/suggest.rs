use affilink_core::catalog::{CategoryMatcher, CategoryScore};
use serde::Serialize;

use crate::commands::{load_catalog, load_config, CommandFailure, CommandResult};

const MAX_CANDIDATES: usize = 5;

#[derive(Debug, Serialize)]
struct Suggestion {
    category_id: String,
    category_name: String,
    sigla: String,
    full_path: String,
    score: u32,
}

#[derive(Debug, Serialize)]
struct SuggestReport {
    suggestion: Option<Suggestion>,
    candidates: Vec<CategoryScore>,
}

pub fn run(text: &str) -> CommandResult {
    match suggest(text) {
        Ok(report) => {
            let message = match &report.suggestion {
                Some(suggestion) => format!("suggested category: {}", suggestion.full_path),
                None => "no category matched the text".to_string(),
            };
            CommandResult::success_with("suggest", message, report)
        }
        Err(failure) => failure.into_result("suggest"),
    }
}

fn suggest(text: &str) -> Result<SuggestReport, CommandFailure> {
    let config = load_config()?;
    let index = load_catalog(&config)?;
    let matcher = CategoryMatcher::with_weights(config.matching.weights());

    let mut candidates = matcher.explain(text, index.categories());
    let suggestion = matcher.find_best(text, index.categories()).map(|category| Suggestion {
        category_id: category.id.to_string(),
        category_name: category.name.clone(),
        sigla: category.effective_sigla(),
        full_path: index.full_path(&category.id),
        score: candidates
            .iter()
            .find(|candidate| candidate.category_id == category.id)
            .map_or(0, |candidate| candidate.score),
    });
    candidates.truncate(MAX_CANDIDATES);

    tracing::debug!(
        event_name = "cli.suggest.completed",
        matched = suggestion.is_some(),
        candidates = candidates.len(),
        "category suggestion computed"
    );

    Ok(SuggestReport { suggestion, candidates })
}
