use url::Url;

use super::SUB_ID_COUNT;
use crate::errors::DomainError;

pub const SUBIDS_QUERY_PARAM: &str = "subids";

/// Sets `subids=s1,s2,s3,s4,s5` on the offer link, replacing any existing
/// `subids` parameter and keeping the rest of the query untouched.
pub fn generate_link<S: AsRef<str>>(offer_base_url: &str, sub_ids: &[S]) -> Result<String, DomainError> {
    if sub_ids.len() != SUB_ID_COUNT {
        return Err(DomainError::Input(format!(
            "expected {SUB_ID_COUNT} sub-ids, got {}",
            sub_ids.len()
        )));
    }
    let mut url = parse_offer_url(offer_base_url)?;

    let joined = sub_ids.iter().map(AsRef::as_ref).collect::<Vec<&str>>().join(",");
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SUBIDS_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut().clear().extend_pairs(kept).append_pair(SUBIDS_QUERY_PARAM, &joined);

    Ok(url.to_string())
}

/// Parses an offer link, rejecting blank and relative input.
pub fn parse_offer_url(offer_base_url: &str) -> Result<Url, DomainError> {
    let offer_base_url = offer_base_url.trim();
    if offer_base_url.is_empty() {
        return Err(DomainError::Input("offer link is required".to_string()));
    }
    Url::parse(offer_base_url)
        .map_err(|err| DomainError::Input(format!("offer link `{offer_base_url}` is not a valid url: {err}")))
}
