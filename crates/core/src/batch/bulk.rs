use serde::Serialize;

use crate::catalog::CategoryIndex;
use crate::domain::category::CategoryInfo;
use crate::domain::product::{Product, ProductId};
use crate::subids::{CounterState, SubIdEngine, SubIdTuple};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplatePreview {
    pub product_id: Option<ProductId>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_ids: Option<SubIdTuple>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Previews the selected template over a product list.
///
/// Counters are local to the call and start at 1, so the preview never
/// consumes persisted sequence values. Products without category data use
/// `unknown`/`UNK`; keyword matching is not attempted.
pub fn apply_bulk_template(
    engine: &SubIdEngine,
    index: &CategoryIndex,
    products: &[Product],
) -> Vec<TemplatePreview> {
    let mut counters = CounterState::default();

    products
        .iter()
        .map(|product| {
            let category = index.resolve_known(product).unwrap_or_else(CategoryInfo::unknown);
            match engine.generate_sub_ids(product, &category, &counters) {
                Ok((sub_ids, next)) => {
                    counters = next;
                    TemplatePreview {
                        product_id: product.id.clone(),
                        success: true,
                        sub_ids: Some(sub_ids),
                        error: None,
                    }
                }
                Err(error) => TemplatePreview {
                    product_id: product.id.clone(),
                    success: false,
                    sub_ids: None,
                    error: Some(error.to_string()),
                },
            }
        })
        .collect()
}
