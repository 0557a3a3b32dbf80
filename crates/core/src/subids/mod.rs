//! Affiliate sub-id generation.
//!
//! Every link carries five ordered sub-ids: two fixed tokens identifying the
//! tool and the analytics partner, the category slug, a global sequence code
//! and a per-category sequence code. Counters are an explicit
//! [`CounterState`] value passed in and handed back so callers own persistence.

mod counters;
mod engine;
pub mod format;
mod link;
mod template;
mod validation;

pub use counters::{CounterScope, CounterState, FIRST_COUNTER_VALUE};
pub use engine::SubIdEngine;
pub use format::{get_category_sigla, prepare_category_slug};
pub use link::{generate_link, parse_offer_url, SUBIDS_QUERY_PARAM};
pub use template::{SubIdTemplate, TemplateRegistry};
pub use validation::{SubIdValidator, ValidationReport};

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Number of sub-id slots in an affiliate link.
pub const SUB_ID_COUNT: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubIdTuple {
    pub s1: String,
    pub s2: String,
    pub s3: String,
    pub s4: String,
    pub s5: String,
}

impl SubIdTuple {
    pub fn as_array(&self) -> [&str; SUB_ID_COUNT] {
        [&self.s1, &self.s2, &self.s3, &self.s4, &self.s5]
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.as_array().iter().map(|value| value.to_string()).collect()
    }

    pub fn try_from_slice<S: AsRef<str>>(values: &[S]) -> Result<Self, DomainError> {
        match values {
            [s1, s2, s3, s4, s5] => Ok(Self {
                s1: s1.as_ref().to_string(),
                s2: s2.as_ref().to_string(),
                s3: s3.as_ref().to_string(),
                s4: s4.as_ref().to_string(),
                s5: s5.as_ref().to_string(),
            }),
            _ => Err(DomainError::Input(format!(
                "expected {SUB_ID_COUNT} sub-ids, got {}",
                values.len()
            ))),
        }
    }

    pub fn breakdown(&self) -> SubIdBreakdown {
        SubIdBreakdown {
            affiliate: self.s1.clone(),
            analytics: self.s2.clone(),
            category: self.s3.clone(),
            product_code: self.s4.clone(),
            campaign_code: self.s5.clone(),
        }
    }
}

/// Labelled view of a stored sub-id tuple for reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubIdBreakdown {
    pub affiliate: String,
    pub analytics: String,
    pub category: String,
    pub product_code: String,
    pub campaign_code: String,
}

impl SubIdBreakdown {
    /// Parses a stored `{"s1": .., "s5": ..}` document. Missing fields are
    /// empty; malformed input yields an empty breakdown.
    pub fn parse_stored(raw: Option<&str>) -> Self {
        #[derive(Default, Deserialize)]
        #[serde(default)]
        struct Stored {
            s1: String,
            s2: String,
            s3: String,
            s4: String,
            s5: String,
        }

        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };

        match serde_json::from_str::<Stored>(raw) {
            Ok(stored) => Self {
                affiliate: stored.s1,
                analytics: stored.s2,
                category: stored.s3,
                product_code: stored.s4,
                campaign_code: stored.s5,
            },
            Err(error) => {
                tracing::debug!(error = %error, "stored sub-ids are not valid json");
                Self::default()
            }
        }
    }
}
