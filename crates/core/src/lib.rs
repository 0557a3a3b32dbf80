pub mod batch;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod subids;

pub use batch::{
    apply_bulk_template, BatchReport, LinkGenerator, LinkOutcome, LinkSink, MintLink,
    ProductLookup, SequentialOptions, TemplatePreview,
};
pub use catalog::{
    find_category_by_keywords, repair_product_categories, CatalogError, CategoryIndex,
    CategoryMatcher, CategoryScore, MatchWeights, RepairReport, SelectOption,
};
pub use domain::category::{Category, CategoryId, CategoryInfo};
pub use domain::link::{AffiliateLink, AffiliateLinkId};
pub use domain::product::{parse_products, Product, ProductId};
pub use errors::{ApplicationError, DomainError};
pub use subids::{
    generate_link, get_category_sigla, prepare_category_slug, CounterScope, CounterState,
    SubIdBreakdown, SubIdEngine, SubIdTemplate, SubIdTuple, TemplateRegistry, ValidationReport,
};
