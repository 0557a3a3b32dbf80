use affilink_core::domain::category::CategoryInfo;
use affilink_core::subids::{generate_link, parse_offer_url, SubIdTuple};
use serde::Serialize;

use crate::commands::subids::issue_sub_ids;
use crate::commands::{CommandFailure, CommandResult};

#[derive(Debug, Serialize)]
struct GeneratedLink {
    affiliate_url: String,
    category: CategoryInfo,
    sub_ids: SubIdTuple,
}

pub fn run(url: &str, category: &str, sigla: Option<&str>) -> CommandResult {
    match build(url, category, sigla) {
        Ok(link) => {
            let message = link.affiliate_url.clone();
            CommandResult::success_with("link", message, link)
        }
        Err(failure) => failure.into_result("link"),
    }
}

fn build(url: &str, category: &str, sigla: Option<&str>) -> Result<GeneratedLink, CommandFailure> {
    // Reject a bad URL before any counter value is consumed.
    parse_offer_url(url)?;

    let (category, sub_ids) = issue_sub_ids(category, sigla)?;
    let affiliate_url = generate_link(url, &sub_ids.as_array())?;

    Ok(GeneratedLink { affiliate_url, category, sub_ids })
}
