use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use affilink_core::batch::{LinkSink, MintLink, ProductLookup};
use affilink_core::domain::link::{AffiliateLink, AffiliateLinkId};
use affilink_core::domain::product::{Product, ProductId};
use affilink_core::errors::{ApplicationError, DomainError};
use affilink_core::subids::CounterState;

use super::{CounterRepository, LinkRepository, ProductRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCounterRepository {
    state: RwLock<CounterState>,
}

#[async_trait::async_trait]
impl CounterRepository for InMemoryCounterRepository {
    async fn load(&self) -> Result<CounterState, RepositoryError> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &CounterState) -> Result<(), RepositoryError> {
        *self.state.write().await = state.clone();
        Ok(())
    }

    async fn issue<T, F>(&self, issue: F) -> Result<T, ApplicationError>
    where
        T: Send,
        F: FnOnce(&CounterState) -> Result<(T, CounterState), DomainError> + Send,
    {
        let mut state = self.state.write().await;
        let (issued, next) = issue(&*state)?;
        *state = next;
        Ok(issued)
    }
}

/// Links plus the counters they draw sub-ids from.
#[derive(Default)]
pub struct InMemoryLinkRepository {
    links: RwLock<Vec<AffiliateLink>>,
    counters: Arc<InMemoryCounterRepository>,
}

impl InMemoryLinkRepository {
    pub fn with_counters(counters: Arc<InMemoryCounterRepository>) -> Self {
        Self { links: RwLock::default(), counters }
    }
}

#[async_trait::async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn find_by_id(
        &self,
        id: &AffiliateLinkId,
    ) -> Result<Option<AffiliateLink>, RepositoryError> {
        let links = self.links.read().await;
        Ok(links.iter().find(|link| &link.id == id).cloned())
    }

    async fn save(&self, link: AffiliateLink) -> Result<(), RepositoryError> {
        let mut links = self.links.write().await;
        match links.iter_mut().find(|existing| existing.id == link.id) {
            Some(existing) => *existing = link,
            None => links.push(link),
        }
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AffiliateLink>, RepositoryError> {
        let links = self.links.read().await;
        let mut recent: Vec<AffiliateLink> = links.iter().rev().cloned().collect();
        recent.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

#[async_trait::async_trait]
impl LinkSink for InMemoryLinkRepository {
    async fn store_minted(
        &self,
        mint: &MintLink<'_>,
    ) -> Result<(AffiliateLink, CounterState), ApplicationError> {
        let mut counters = self.counters.state.write().await;
        let (link, next) = mint(&*counters)?;
        self.save(link.clone()).await?;
        *counters = next.clone();
        Ok((link, next))
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<String, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let Some(id) = product.id.as_ref().map(|id| id.0.clone()) else {
            return Err(RepositoryError::Decode("product without id cannot be saved".to_string()));
        };
        let mut products = self.products.write().await;
        products.insert(id, product);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by_key(|product| product.id.as_ref().map(|id| id.0.clone()));
        Ok(all)
    }
}

#[async_trait::async_trait]
impl ProductLookup for InMemoryProductRepository {
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(self.find_by_id(product_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use affilink_core::batch::{LinkGenerator, SequentialOptions};
    use affilink_core::catalog::{CategoryIndex, CategoryMatcher};
    use affilink_core::domain::category::{Category, CategoryId};
    use affilink_core::domain::link::{AffiliateLink, AffiliateLinkId};
    use affilink_core::domain::product::{Product, ProductId};
    use affilink_core::subids::{CounterState, SubIdEngine, SubIdTemplate};

    use crate::repositories::{
        CounterRepository, InMemoryCounterRepository, InMemoryLinkRepository,
        InMemoryProductRepository, LinkRepository, ProductRepository,
    };

    #[tokio::test]
    async fn in_memory_counter_repo_starts_at_initial_state() {
        let repo = InMemoryCounterRepository::default();
        assert_eq!(repo.load().await.expect("load"), CounterState::default());

        let (_, next) = CounterState::default().next_category_counter("ELE");
        repo.save(&next).await.expect("save");

        assert_eq!(repo.load().await.expect("reload"), next);
    }

    #[tokio::test]
    async fn in_memory_issue_is_applied_once_per_call() {
        let repo = Arc::new(InMemoryCounterRepository::default());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            tasks.push(tokio::spawn(async move {
                repo.issue(|state: &CounterState| Ok(state.next_global_counter())).await
            }));
        }
        let mut issued = Vec::new();
        for task in tasks {
            issued.push(task.await.expect("join").expect("issue"));
        }
        issued.sort_unstable();

        assert_eq!(issued, (1..=8).collect::<Vec<u64>>());
        assert_eq!(repo.load().await.expect("load").peek_global(), 9);
    }

    #[tokio::test]
    async fn in_memory_link_repo_round_trip() {
        let repo = InMemoryLinkRepository::default();
        let link = AffiliateLink {
            id: AffiliateLinkId("L-1".to_string()),
            product_id: ProductId("42".to_string()),
            name: "Fone XYZ".to_string(),
            original_url: None,
            affiliate_url: "https://s.shopee.com.br/abc".to_string(),
            sub_ids: None,
            sub_id: Some("seq001".to_string()),
            campaign: "seq".to_string(),
            category_name: None,
            created_at: Utc::now(),
        };

        repo.save(link.clone()).await.expect("save link");
        let found = repo.find_by_id(&link.id).await.expect("find link");

        assert_eq!(found, Some(link));
    }

    #[tokio::test]
    async fn in_memory_product_repo_round_trip() {
        let repo = InMemoryProductRepository::default();
        let product = Product {
            price: Some(Decimal::new(4990, 2)),
            ..Product::new("42", "Fone XYZ")
        };

        repo.save(product.clone()).await.expect("save product");
        let found = repo.find_by_id(&ProductId("42".to_string())).await.expect("find product");

        assert_eq!(found, Some(product));
    }

    #[tokio::test]
    async fn sequential_batch_persists_through_repositories() {
        let products = InMemoryProductRepository::default();
        products
            .save(Product {
                price: Some(Decimal::new(4990, 2)),
                offer_url: Some("https://shopee.com.br/product/1/42".to_string()),
                category_id: Some(CategoryId::from("1")),
                ..Product::new("42", "Fone XYZ")
            })
            .await
            .expect("seed product");
        let counters = Arc::new(InMemoryCounterRepository::default());
        let links = InMemoryLinkRepository::with_counters(Arc::clone(&counters));

        let index = CategoryIndex::new(vec![Category::new("1", "Eletrônicos").with_sigla("ELE")]);
        let engine = SubIdEngine::new(SubIdTemplate::default()).expect("engine");
        let generator = LinkGenerator::new(engine, Arc::new(index), CategoryMatcher::new());

        let report = generator
            .generate_sequential_links(
                vec![Product::new("42", "")],
                &SequentialOptions::default(),
                &products,
                &links,
            )
            .await;

        assert_eq!(report.success_count, 1);
        let stored = links.list_recent(10).await.expect("list links");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sub_id.as_deref(), Some("seq001"));
        assert_eq!(counters.load().await.expect("reload").peek_global(), 2);
    }
}
