use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use affilink_core::batch::ProductLookup;
use affilink_core::domain::category::CategoryId;
use affilink_core::domain::product::{Product, ProductId};
use affilink_core::errors::ApplicationError;

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, description, price, offer_url, image_url, \
     commission_rate, category_id, category_name, category_sigla, sub_id";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, RepositoryError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|text| {
        Decimal::from_str(&text)
            .map_err(|error| RepositoryError::Decode(format!("{column} `{text}`: {error}")))
    })
    .transpose()
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: Some(ProductId(row.try_get("id")?)),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: decode_decimal(row, "price")?,
        offer_url: row.try_get("offer_url")?,
        image_url: row.try_get("image_url")?,
        commission_rate: decode_decimal(row, "commission_rate")?,
        category_id: row.try_get::<Option<String>, _>("category_id")?.map(CategoryId),
        category_name: row.try_get("category_name")?,
        category_sigla: row.try_get("category_sigla")?,
        sub_id: row.try_get("sub_id")?,
    })
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let Some(id) = product.id.as_ref() else {
            return Err(RepositoryError::Decode("product without id cannot be saved".to_string()));
        };

        sqlx::query(
            r#"
            INSERT INTO product (
                id, name, description, price, offer_url, image_url, commission_rate,
                category_id, category_name, category_sigla, sub_id, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                offer_url = excluded.offer_url,
                image_url = excluded.image_url,
                commission_rate = excluded.commission_rate,
                category_id = excluded.category_id,
                category_name = excluded.category_name,
                category_sigla = excluded.category_sigla,
                sub_id = excluded.sub_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.map(|price| price.to_string()))
        .bind(&product.offer_url)
        .bind(&product.image_url)
        .bind(product.commission_rate.map(|rate| rate.to_string()))
        .bind(product.category_id.as_ref().map(|category| category.0.as_str()))
        .bind(&product.category_name)
        .bind(&product.category_sigla)
        .bind(&product.sub_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl ProductLookup for SqlProductRepository {
    async fn lookup(&self, product_id: &ProductId) -> Result<Option<Product>, ApplicationError> {
        Ok(self.find_by_id(product_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use affilink_core::batch::ProductLookup;
    use affilink_core::domain::category::CategoryId;
    use affilink_core::domain::product::{Product, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::{ProductRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProductRepository::new(pool)
    }

    fn headset() -> Product {
        Product {
            description: "Fone bluetooth com cancelamento de ruído".to_string(),
            price: Some(Decimal::new(19990, 2)),
            offer_url: Some("https://shopee.com.br/product/1/42".to_string()),
            commission_rate: Some(Decimal::new(8, 2)),
            category_id: Some(CategoryId::from("100")),
            category_name: Some("Eletrônicos".to_string()),
            category_sigla: Some("ELE".to_string()),
            ..Product::new("42", "Fone XYZ")
        }
    }

    #[tokio::test]
    async fn product_round_trip_keeps_decimal_precision() {
        let repo = repository().await;
        repo.save(headset()).await.expect("save");

        let found = repo.find_by_id(&ProductId("42".to_string())).await.expect("find");

        assert_eq!(found, Some(headset()));
    }

    #[tokio::test]
    async fn save_upserts_and_list_is_ordered_by_id() {
        let repo = repository().await;
        repo.save(headset()).await.expect("save");
        repo.save(Product::new("07", "Cabo USB")).await.expect("save cable");
        repo.save(Product { name: "Fone XYZ Pro".to_string(), ..headset() })
            .await
            .expect("update");

        let all = repo.list_all().await.expect("list");

        let names: Vec<&str> = all.iter().map(|product| product.name.as_str()).collect();
        assert_eq!(names, vec!["Cabo USB", "Fone XYZ Pro"]);
    }

    #[tokio::test]
    async fn product_without_id_is_rejected() {
        let repo = repository().await;
        let product = Product { id: None, ..headset() };

        let error = repo.save(product).await.expect_err("missing id");

        assert!(matches!(error, RepositoryError::Decode(_)));
    }

    #[tokio::test]
    async fn lookup_returns_none_for_unknown_products() {
        let repo = repository().await;

        let found = repo.lookup(&ProductId("missing".to_string())).await.expect("lookup");

        assert!(found.is_none());
    }
}
