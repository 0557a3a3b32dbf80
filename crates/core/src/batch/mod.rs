//! Link generation over product batches.
//!
//! Products are processed one at a time in input order so counter values are
//! issued in a single well-defined sequence. A failing product is recorded
//! and skipped; it never aborts the batch.

mod bulk;

pub use bulk::{apply_bulk_template, TemplatePreview};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{CategoryIndex, CategoryMatcher};
use crate::domain::category::CategoryInfo;
use crate::domain::link::{AffiliateLink, AffiliateLinkId};
use crate::domain::product::{Product, ProductId};
use crate::errors::{ApplicationError, DomainError};
use crate::subids::format::sequence_sub_id;
use crate::subids::{generate_link, CounterState, SubIdEngine, SubIdTuple};

pub const DEFAULT_CAMPAIGN: &str = "seq";

/// Source of full product details for products that arrive incomplete.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<Product>, ApplicationError>;
}

/// Builds one link from the stored counters and returns it with the
/// advanced counter state.
pub type MintLink<'a> =
    dyn Fn(&CounterState) -> Result<(AffiliateLink, CounterState), DomainError> + Send + Sync + 'a;

/// Destination for generated links.
#[async_trait]
pub trait LinkSink: Send + Sync {
    /// Runs `mint` against the stored counters, then stores the link and the
    /// advanced counters in one commit. No other writer may issue counter
    /// values between the read and the commit.
    async fn store_minted(
        &self,
        mint: &MintLink<'_>,
    ) -> Result<(AffiliateLink, CounterState), ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequentialOptions {
    pub starting_sequence: u32,
    pub campaign_id: String,
    pub correlation_id: String,
}

impl Default for SequentialOptions {
    fn default() -> Self {
        Self {
            starting_sequence: 1,
            campaign_id: DEFAULT_CAMPAIGN.to_string(),
            correlation_id: format!("batch-{}", Uuid::new_v4()),
        }
    }
}

/// Per-product result entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkOutcome {
    pub product_id: Option<ProductId>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_id: Option<AffiliateLinkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliate_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_ids: Option<SubIdTuple>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
}

impl LinkOutcome {
    fn succeeded(link: &AffiliateLink) -> Self {
        Self {
            product_id: Some(link.product_id.clone()),
            success: true,
            link_id: Some(link.id.clone()),
            name: Some(link.name.clone()),
            affiliate_url: Some(link.affiliate_url.clone()),
            sub_id: link.sub_id.clone(),
            sub_ids: link.sub_ids.clone(),
            error: None,
            error_class: None,
        }
    }

    fn failed(product_id: Option<ProductId>, sub_id: Option<String>, error: &ApplicationError) -> Self {
        Self {
            product_id,
            success: false,
            link_id: None,
            name: None,
            affiliate_url: None,
            sub_id,
            sub_ids: None,
            error: Some(error.to_string()),
            error_class: Some(error.class().to_string()),
        }
    }
}

/// Totals plus one entry per input product, in input order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total_processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub links: Vec<LinkOutcome>,
    /// Counter state after the last issued link. Sequential runs leave it
    /// empty when no link was stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<CounterState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sequence: Option<u32>,
}

impl BatchReport {
    fn new(total: usize) -> Self {
        Self {
            total_processed: total,
            success_count: 0,
            error_count: 0,
            links: Vec::with_capacity(total),
            counters: None,
            next_sequence: None,
        }
    }

    fn record(&mut self, outcome: LinkOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.links.push(outcome);
    }
}

/// Drives category resolution, sub-id minting and link assembly for batches.
#[derive(Clone, Debug)]
pub struct LinkGenerator {
    engine: SubIdEngine,
    index: Arc<CategoryIndex>,
    matcher: CategoryMatcher,
}

impl LinkGenerator {
    pub fn new(engine: SubIdEngine, index: Arc<CategoryIndex>, matcher: CategoryMatcher) -> Self {
        Self { engine, index, matcher }
    }

    pub fn engine(&self) -> &SubIdEngine {
        &self.engine
    }

    pub fn resolve_category(&self, product: &Product) -> CategoryInfo {
        self.index.resolve(product, &self.matcher)
    }

    /// Mints sub-ids and the affiliate link for one product. Returns the link
    /// and the counter state to commit once the link has been stored.
    pub fn build_link(
        &self,
        product: &Product,
        counters: &CounterState,
        campaign: &str,
        sub_id: Option<String>,
    ) -> Result<(AffiliateLink, CounterState), DomainError> {
        let product_id = product
            .id
            .clone()
            .ok_or_else(|| DomainError::Input("product id is missing".to_string()))?;
        let offer_url = product
            .offer_url
            .as_deref()
            .ok_or_else(|| DomainError::Input("offer link is required".to_string()))?;

        let category = self.resolve_category(product);
        let (sub_ids, next_counters) = self.engine.generate_sub_ids(product, &category, counters)?;
        let affiliate_url = generate_link(offer_url, &sub_ids.as_array())?;

        let link = AffiliateLink {
            id: AffiliateLinkId::generate(),
            product_id,
            name: product.name.clone(),
            original_url: Some(offer_url.to_string()),
            affiliate_url,
            sub_ids: Some(sub_ids),
            sub_id,
            campaign: campaign.to_string(),
            category_name: Some(category.name),
            created_at: Utc::now(),
        };

        Ok((link, next_counters))
    }

    /// Generates one link per product with a per-batch `seqNNN` sub-id.
    ///
    /// Incomplete products are filled in from `lookup` first. The sequence
    /// advances for every product, failed or not. Counter values are read
    /// from `sink` per product and advance only for links it stored.
    pub async fn generate_sequential_links(
        &self,
        products: Vec<Product>,
        options: &SequentialOptions,
        lookup: &dyn ProductLookup,
        sink: &dyn LinkSink,
    ) -> BatchReport {
        let mut report = BatchReport::new(products.len());
        let mut sequence = options.starting_sequence;

        tracing::info!(
            event_name = "links.sequential.started",
            correlation_id = %options.correlation_id,
            products = products.len(),
            starting_sequence = options.starting_sequence,
            campaign = %options.campaign_id,
            "sequential link generation started"
        );

        for product in products {
            let sub_id = sequence_sub_id(sequence);
            sequence = sequence.saturating_add(1);
            let product_id = product.id.clone();

            let outcome = match self
                .sequential_entry(product, &options.campaign_id, &sub_id, lookup, sink)
                .await
            {
                Ok((link, next_counters)) => {
                    report.counters = Some(next_counters);
                    tracing::debug!(
                        event_name = "links.sequential.generated",
                        correlation_id = %options.correlation_id,
                        product_id = %link.product_id,
                        sub_id = %sub_id,
                        "affiliate link generated"
                    );
                    LinkOutcome::succeeded(&link)
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "links.sequential.failed",
                        correlation_id = %options.correlation_id,
                        product_id = product_id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
                        sub_id = %sub_id,
                        error_class = error.class(),
                        error = %error,
                        "affiliate link generation failed"
                    );
                    LinkOutcome::failed(product_id, Some(sub_id), &error)
                }
            };
            report.record(outcome);
        }

        report.next_sequence = Some(sequence);
        tracing::info!(
            event_name = "links.sequential.completed",
            correlation_id = %options.correlation_id,
            total_processed = report.total_processed,
            success_count = report.success_count,
            error_count = report.error_count,
            "sequential link generation finished"
        );

        report
    }

    async fn sequential_entry(
        &self,
        product: Product,
        campaign: &str,
        sub_id: &str,
        lookup: &dyn ProductLookup,
        sink: &dyn LinkSink,
    ) -> Result<(AffiliateLink, CounterState), ApplicationError> {
        let Some(product_id) = product.id.clone() else {
            return Err(DomainError::Input("product id is missing".to_string()).into());
        };

        let product = if product.is_complete() {
            product
        } else {
            match lookup.lookup(&product_id).await {
                Ok(Some(details)) => product.absorb(details),
                Ok(None) => product,
                Err(error) => {
                    return Err(DomainError::Lookup(format!(
                        "product {product_id} could not be looked up: {error}"
                    ))
                    .into())
                }
            }
        };

        let mint = |counters: &CounterState| {
            self.build_link(&product, counters, campaign, Some(sub_id.to_string()))
        };
        sink.store_minted(&mint).await
    }

    /// Generates links for products that already carry their offer link,
    /// without lookup or persistence. Each link keeps the product's own
    /// sub-id, or `default_sub_id` when the product has none.
    pub fn generate_bulk_links(
        &self,
        products: &[Product],
        mut counters: CounterState,
        default_sub_id: Option<&str>,
    ) -> BatchReport {
        let mut report = BatchReport::new(products.len());

        for product in products {
            let sub_id = product.sub_id.clone().or_else(|| default_sub_id.map(str::to_string));
            let outcome = match self.build_link(product, &counters, DEFAULT_CAMPAIGN, sub_id.clone())
            {
                Ok((link, next_counters)) => {
                    counters = next_counters;
                    LinkOutcome::succeeded(&link)
                }
                Err(error) => {
                    let error = ApplicationError::from(error);
                    tracing::warn!(
                        event_name = "links.bulk.failed",
                        product_id = product.id.as_ref().map(|id| id.0.as_str()).unwrap_or(""),
                        error = %error,
                        "affiliate link generation failed"
                    );
                    LinkOutcome::failed(product.id.clone(), sub_id, &error)
                }
            };
            report.record(outcome);
        }

        report.counters = Some(counters);
        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::{LinkGenerator, LinkSink, MintLink, ProductLookup, SequentialOptions};
    use crate::catalog::{CategoryIndex, CategoryMatcher};
    use crate::domain::category::Category;
    use crate::domain::link::AffiliateLink;
    use crate::domain::product::{Product, ProductId};
    use crate::errors::ApplicationError;
    use crate::subids::{CounterState, SubIdEngine, SubIdTemplate};

    #[derive(Default)]
    struct StubLookup {
        details: HashMap<String, Product>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl ProductLookup for StubLookup {
        async fn lookup(&self, product_id: &ProductId) -> Result<Option<Product>, ApplicationError> {
            if self.failing.contains(&product_id.0) {
                return Err(ApplicationError::Integration("shopee api timeout".to_string()));
            }
            Ok(self.details.get(&product_id.0).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        links: Mutex<Vec<AffiliateLink>>,
        counters: Mutex<CounterState>,
        reject_product: Option<String>,
    }

    #[async_trait]
    impl LinkSink for RecordingSink {
        async fn store_minted(
            &self,
            mint: &MintLink<'_>,
        ) -> Result<(AffiliateLink, CounterState), ApplicationError> {
            let mut counters = self.counters.lock().expect("counter lock");
            let (link, next) = mint(&*counters)?;
            if self.reject_product.as_deref() == Some(link.product_id.0.as_str()) {
                return Err(ApplicationError::Persistence("disk full".to_string()));
            }
            self.links.lock().expect("sink lock").push(link.clone());
            *counters = next.clone();
            Ok((link, next))
        }
    }

    fn generator() -> LinkGenerator {
        let index = CategoryIndex::new(vec![
            Category::new("1", "Eletrônicos").with_sigla("ELE").with_keywords(["fone", "celular"]),
            Category::new("2", "Moda Feminina Esportiva").with_keywords(["legging"]),
        ]);
        LinkGenerator::new(
            SubIdEngine::new(SubIdTemplate::default()).expect("engine"),
            Arc::new(index),
            CategoryMatcher::new(),
        )
    }

    fn complete(id: &str, name: &str) -> Product {
        Product {
            price: Some(Decimal::new(4990, 2)),
            offer_url: Some(format!("https://shope.ee/{id}")),
            ..Product::new(id, name)
        }
    }

    fn options() -> SequentialOptions {
        SequentialOptions { correlation_id: "test-batch".to_string(), ..SequentialOptions::default() }
    }

    #[tokio::test]
    async fn one_lookup_failure_leaves_the_rest_of_the_batch_intact() {
        let lookup = StubLookup { failing: vec!["p2".to_string()], ..StubLookup::default() };
        let sink = RecordingSink::default();
        let products = vec![
            complete("p1", "Fone Bluetooth"),
            Product::new("p2", "Legging"),
            complete("p3", "Legging Suplex"),
            complete("p4", "Capa para celular"),
        ];

        let report = generator()
            .generate_sequential_links(products, &options(), &lookup, &sink)
            .await;

        assert_eq!(report.total_processed, 4);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.links.len(), 4);
        assert!(!report.links[1].success);
        assert!(report.links[1].error.as_deref().is_some_and(|error| !error.is_empty()));
        assert_eq!(report.links[1].error_class.as_deref(), Some("lookup"));

        let sub_ids: Vec<&str> =
            report.links.iter().filter_map(|link| link.sub_id.as_deref()).collect();
        assert_eq!(sub_ids, vec!["seq001", "seq002", "seq003", "seq004"]);
        assert_eq!(report.next_sequence, Some(5));
        assert_eq!(sink.links.lock().expect("sink lock").len(), 3);
    }

    #[tokio::test]
    async fn counters_stay_gap_free_across_failures() {
        let lookup = StubLookup::default();
        let sink = RecordingSink { reject_product: Some("p2".to_string()), ..RecordingSink::default() };
        let products = vec![
            complete("p1", "Fone Bluetooth"),
            complete("p2", "Fone com fio"),
            complete("p3", "Celular Android"),
        ];

        let report = generator()
            .generate_sequential_links(products, &options(), &lookup, &sink)
            .await;

        let codes: Vec<(String, String)> = report
            .links
            .iter()
            .filter_map(|link| link.sub_ids.as_ref())
            .map(|sub_ids| (sub_ids.s4.clone(), sub_ids.s5.clone()))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("SM00001".to_string(), "SM_ELE00001".to_string()),
                ("SM00002".to_string(), "SM_ELE00002".to_string()),
            ]
        );
        assert_eq!(report.counters.as_ref().map(CounterState::peek_global), Some(3));
        assert_eq!(sink.counters.lock().expect("counter lock").peek_global(), 3);
        assert_eq!(report.links[1].error_class.as_deref(), Some("persistence"));
    }

    #[tokio::test]
    async fn incomplete_products_are_filled_from_lookup() {
        let mut details = HashMap::new();
        details.insert("p9".to_string(), complete("p9", "Legging Cintura Alta"));
        let lookup = StubLookup { details, ..StubLookup::default() };
        let sink = RecordingSink::default();

        let options = SequentialOptions {
            starting_sequence: 41,
            campaign_id: "black-friday".to_string(),
            ..options()
        };
        let report = generator()
            .generate_sequential_links(
                vec![Product::new("p9", "")],
                &options,
                &lookup,
                &sink,
            )
            .await;

        assert_eq!(report.success_count, 1);
        let outcome = &report.links[0];
        assert_eq!(outcome.sub_id.as_deref(), Some("seq041"));
        assert_eq!(outcome.name.as_deref(), Some("Legging Cintura Alta"));
        assert_eq!(outcome.sub_ids.as_ref().map(|ids| ids.s5.as_str()), Some("SM_MFE00001"));

        let stored = sink.links.lock().expect("sink lock");
        assert_eq!(stored[0].campaign, "black-friday");
        assert_eq!(stored[0].category_name.as_deref(), Some("Moda Feminina Esportiva"));
    }

    #[tokio::test]
    async fn products_without_ids_or_offer_links_fail_individually() {
        let lookup = StubLookup::default();
        let sink = RecordingSink::default();
        let products = vec![
            Product { id: None, ..complete("x", "Sem id") },
            Product::new("p2", "Sem link"),
            complete("p3", "Fone"),
        ];

        let report = generator()
            .generate_sequential_links(products, &options(), &lookup, &sink)
            .await;

        assert_eq!((report.success_count, report.error_count), (1, 2));
        assert!(report.links[0].error.as_deref().is_some_and(|error| error.contains("product id")));
        assert!(report.links[1].error.as_deref().is_some_and(|error| error.contains("offer link")));
        assert_eq!(report.links[2].sub_id.as_deref(), Some("seq003"));
    }

    #[tokio::test]
    async fn sequential_runs_continue_from_counters_already_in_the_sink() {
        let sink = RecordingSink::default();
        *sink.counters.lock().expect("counter lock") =
            CounterState::default().next_category_counter("ELE").1.next_global_counter().1;

        let report = generator()
            .generate_sequential_links(
                vec![complete("p1", "Fone Bluetooth")],
                &options(),
                &StubLookup::default(),
                &sink,
            )
            .await;

        let sub_ids = report.links[0].sub_ids.as_ref().expect("sub ids");
        assert_eq!((sub_ids.s4.as_str(), sub_ids.s5.as_str()), ("SM00002", "SM_ELE00002"));
    }

    #[tokio::test]
    async fn sequential_report_has_no_counters_when_nothing_was_stored() {
        let sink = RecordingSink::default();

        let report = generator()
            .generate_sequential_links(
                vec![Product::new("p1", "Sem link")],
                &options(),
                &StubLookup::default(),
                &sink,
            )
            .await;

        assert_eq!(report.error_count, 1);
        assert_eq!(report.counters, None);
    }

    #[test]
    fn bulk_links_keep_the_product_sub_id() {
        let products = vec![
            Product { sub_id: Some("promo".to_string()), ..complete("p1", "Fone") },
            complete("p2", "Panela"),
        ];

        let report =
            generator().generate_bulk_links(&products, CounterState::default(), Some("lote-3"));

        assert_eq!(report.success_count, 2);
        assert_eq!(report.links[0].sub_id.as_deref(), Some("promo"));
        assert_eq!(report.links[1].sub_id.as_deref(), Some("lote-3"));
        assert!(report.links[0]
            .affiliate_url
            .as_deref()
            .is_some_and(|url| !url.contains("promo")));
    }

    #[test]
    fn bulk_links_without_any_sub_id_leave_it_empty() {
        let report =
            generator().generate_bulk_links(&[complete("p1", "Fone")], CounterState::default(), None);

        assert_eq!(report.links[0].sub_id, None);
    }

    #[test]
    fn bulk_links_continue_from_supplied_counters() {
        let counters = CounterState::default().next_global_counter().1;
        let report = generator().generate_bulk_links(
            &[complete("p1", "Fone"), complete("p2", "Panela")],
            counters,
            None,
        );

        assert_eq!(report.success_count, 2);
        let first = report.links[0].sub_ids.as_ref().expect("sub ids");
        assert_eq!(first.s4, "SM00002");
        let second = report.links[1].sub_ids.as_ref().expect("sub ids");
        assert_eq!(second.s3, "unknown");
        assert_eq!(second.s5, "SM_UNK00001");
        assert!(report.links[0]
            .affiliate_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://shope.ee/p1?subids=salesmartins")));
        assert_eq!(report.next_sequence, None);
        assert_eq!(report.counters.as_ref().map(CounterState::peek_global), Some(4));
    }
}
