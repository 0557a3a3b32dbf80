use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::ProductId;
use crate::subids::SubIdTuple;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffiliateLinkId(pub String);

impl AffiliateLinkId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// A generated affiliate link as handed to persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub id: AffiliateLinkId,
    pub product_id: ProductId,
    pub name: String,
    pub original_url: Option<String>,
    pub affiliate_url: String,
    pub sub_ids: Option<SubIdTuple>,
    /// `seqNNN` in sequential runs; the product's own sub-id in bulk runs.
    pub sub_id: Option<String>,
    pub campaign: String,
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
