pub mod category;
pub mod link;
pub mod product;

use serde::Deserialize;

/// Identifiers arrive as JSON strings or numbers depending on the source
/// (catalog files use numbers, the product database uses strings).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum IdRepr {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<IdRepr> for String {
    fn from(value: IdRepr) -> Self {
        match value {
            IdRepr::Text(text) => text.trim().to_string(),
            IdRepr::Signed(number) => number.to_string(),
            IdRepr::Unsigned(number) => number.to_string(),
        }
    }
}
