use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use affilink_core::batch::{LinkSink, MintLink};
use affilink_core::domain::link::{AffiliateLink, AffiliateLinkId};
use affilink_core::domain::product::ProductId;
use affilink_core::errors::ApplicationError;
use affilink_core::subids::{CounterState, SubIdTuple};

use super::counters::{load_state, save_state};
use super::{LinkRepository, RepositoryError};
use crate::connection::{begin_immediate, finish_immediate};
use crate::DbPool;

const LINK_COLUMNS: &str = "id, product_id, name, original_url, affiliate_url, sub_ids_json, \
     sub_id, campaign, category_name, created_at";

pub struct SqlLinkRepository {
    pool: DbPool,
}

impl SqlLinkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn link_from_row(row: &SqliteRow) -> Result<AffiliateLink, RepositoryError> {
    let id: String = row.try_get("id")?;
    let sub_ids = row
        .try_get::<Option<String>, _>("sub_ids_json")?
        .map(|json| {
            serde_json::from_str::<SubIdTuple>(&json)
                .map_err(|error| RepositoryError::Decode(format!("sub_ids of link {id}: {error}")))
        })
        .transpose()?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|error| RepositoryError::Decode(format!("created_at of link {id}: {error}")))?
        .with_timezone(&Utc);

    Ok(AffiliateLink {
        product_id: ProductId(row.try_get("product_id")?),
        name: row.try_get("name")?,
        original_url: row.try_get("original_url")?,
        affiliate_url: row.try_get("affiliate_url")?,
        sub_ids,
        sub_id: row.try_get("sub_id")?,
        campaign: row.try_get("campaign")?,
        category_name: row.try_get("category_name")?,
        created_at,
        id: AffiliateLinkId(id),
    })
}

async fn insert_link(conn: &mut SqliteConnection, link: &AffiliateLink) -> Result<(), RepositoryError> {
    let sub_ids_json = link
        .sub_ids
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO affiliate_link (
            id, product_id, name, original_url, affiliate_url, sub_ids_json,
            sub_id, campaign, category_name, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&link.id.0)
    .bind(&link.product_id.0)
    .bind(&link.name)
    .bind(&link.original_url)
    .bind(&link.affiliate_url)
    .bind(sub_ids_json)
    .bind(&link.sub_id)
    .bind(&link.campaign)
    .bind(&link.category_name)
    .bind(link.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn mint_within(
    conn: &mut SqliteConnection,
    mint: &MintLink<'_>,
) -> Result<(AffiliateLink, CounterState), ApplicationError> {
    let counters = load_state(conn).await?;
    let (link, next) = mint(&counters)?;
    insert_link(conn, &link).await?;
    save_state(conn, &next).await?;
    Ok((link, next))
}

#[async_trait]
impl LinkRepository for SqlLinkRepository {
    async fn find_by_id(
        &self,
        id: &AffiliateLinkId,
    ) -> Result<Option<AffiliateLink>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LINK_COLUMNS} FROM affiliate_link WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(link_from_row).transpose()
    }

    async fn save(&self, link: AffiliateLink) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_link(&mut conn, &link).await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AffiliateLink>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LINK_COLUMNS} FROM affiliate_link ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(link_from_row).collect()
    }
}

#[async_trait]
impl LinkSink for SqlLinkRepository {
    async fn store_minted(
        &self,
        mint: &MintLink<'_>,
    ) -> Result<(AffiliateLink, CounterState), ApplicationError> {
        let mut conn = begin_immediate(&self.pool).await.map_err(RepositoryError::from)?;
        let result = mint_within(&mut conn, mint).await;
        finish_immediate(&mut conn, result).await
    }
}
