use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::category::CategoryId;
use super::IdRepr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct ProductId(pub String);

impl From<IdRepr> for ProductId {
    fn from(value: IdRepr) -> Self {
        Self(value.into())
    }
}

impl From<ProductId> for String {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical product shape seen by the matcher and the sub-id engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Option<Decimal>,
    pub offer_url: Option<String>,
    pub image_url: Option<String>,
    pub commission_rate: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub category_sigla: Option<String>,
    pub sub_id: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: Some(ProductId(id.into())), name: name.into(), ..Self::default() }
    }

    /// Name, price and offer link are all present; otherwise a detail lookup is needed.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && self.price.is_some() && self.offer_url.is_some()
    }

    /// Text scored by the category matcher.
    pub fn haystack(&self) -> String {
        format!("{} {}", self.name, self.description)
    }

    /// Overlays looked-up details on top of this product. Fields present in
    /// `details` win; fields it lacks keep their current value.
    pub fn absorb(self, details: Product) -> Product {
        Product {
            id: self.id.or(details.id),
            name: if details.name.trim().is_empty() { self.name } else { details.name },
            description: if details.description.trim().is_empty() {
                self.description
            } else {
                details.description
            },
            price: details.price.or(self.price),
            offer_url: details.offer_url.or(self.offer_url),
            image_url: details.image_url.or(self.image_url),
            commission_rate: details.commission_rate.or(self.commission_rate),
            category_id: details.category_id.or(self.category_id),
            category_name: details.category_name.or(self.category_name),
            category_sigla: details.category_sigla.or(self.category_sigla),
            sub_id: self.sub_id.or(details.sub_id),
        }
    }
}

/// Any of the product shapes produced by search results, imports and the
/// product table. Normalised into [`Product`] before it reaches the engine.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    item_id: Option<IdRepr>,
    id: Option<IdRepr>,
    name: Option<String>,
    product_name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    price_min: Option<Decimal>,
    original_price: Option<Decimal>,
    offer_link: Option<String>,
    url: Option<String>,
    product_link: Option<String>,
    image: Option<String>,
    #[serde(alias = "image_url")]
    image_url: Option<String>,
    #[serde(alias = "commission_rate")]
    commission_rate: Option<Decimal>,
    #[serde(alias = "category_id")]
    category_id: Option<IdRepr>,
    #[serde(alias = "category_name")]
    category_name: Option<String>,
    #[serde(alias = "category_sigla")]
    category_sigla: Option<String>,
    #[serde(alias = "sub_id")]
    sub_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

impl From<RawProduct> for Product {
    fn from(raw: RawProduct) -> Self {
        let id = raw
            .item_id
            .or(raw.id)
            .map(String::from)
            .filter(|id| !id.is_empty())
            .map(ProductId);

        Product {
            id,
            name: non_blank(raw.name).or_else(|| non_blank(raw.product_name)).unwrap_or_default(),
            description: non_blank(raw.description).unwrap_or_default(),
            price: raw.price.or(raw.price_min).or(raw.original_price),
            offer_url: non_blank(raw.offer_link)
                .or_else(|| non_blank(raw.url))
                .or_else(|| non_blank(raw.product_link)),
            image_url: non_blank(raw.image).or_else(|| non_blank(raw.image_url)),
            commission_rate: raw.commission_rate,
            category_id: raw
                .category_id
                .map(String::from)
                .filter(|id| !id.is_empty())
                .map(CategoryId),
            category_name: non_blank(raw.category_name),
            category_sigla: non_blank(raw.category_sigla),
            sub_id: non_blank(raw.sub_id),
        }
    }
}

/// Parses a JSON array of products in any supported shape.
pub fn parse_products(raw: &str) -> Result<Vec<Product>, serde_json::Error> {
    let raw_products: Vec<RawProduct> = serde_json::from_str(raw)?;
    Ok(raw_products.into_iter().map(Product::from).collect())
}
