//! Postgres-backed [`CouponStore`].
//!
//! Batch operations go through single `UNNEST`-driven statements so that a
//! refill or flush of a thousand codes costs one round trip. The unique
//! constraint on `coupons.code` owns collision resolution: candidates lost to
//! `ON CONFLICT DO NOTHING` simply do not come back from the insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coupond_core::{CampaignStatus, Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::{CampaignRow, CouponStore};

#[derive(sqlx::FromRow)]
struct CampaignRecord {
    name: String,
    start_time: DateTime<Utc>,
    status: String,
}

/// [`CouponStore`] implementation over a `sqlx` Postgres pool.
#[derive(Clone)]
pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    /// Connects to Postgres and applies the embedded migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(Error::storage)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(Error::storage)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn insert_campaign(
        &self,
        name: &str,
        start_time: DateTime<Utc>,
        coupon_limit: i32,
    ) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO campaigns (name, start_time, coupon_limit)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(name)
        .bind(start_time)
        .bind(coupon_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::storage)?;

        Ok(id)
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<CampaignRow>> {
        let record: Option<CampaignRecord> = sqlx::query_as(
            "SELECT name, start_time, status
             FROM campaigns
             WHERE id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::storage)?;

        record
            .map(|rec| {
                let status = CampaignStatus::parse(&rec.status).ok_or_else(|| {
                    Error::storage(format!(
                        "campaign {campaign_id} has unknown status {:?}",
                        rec.status
                    ))
                })?;
                Ok(CampaignRow {
                    name: rec.name,
                    start_time: rec.start_time,
                    status,
                })
            })
            .transpose()
    }

    async fn list_issued_codes(&self, campaign_id: Uuid) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT code
             FROM coupons
             WHERE campaign_id = $1
             ORDER BY created_at",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)
    }

    async fn batch_reserve_codes(&self, codes: &[String]) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "INSERT INTO coupons (code)
             SELECT code FROM UNNEST($1::text[]) AS t (code)
             ON CONFLICT (code) DO NOTHING
             RETURNING code",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)
    }

    async fn batch_bind_codes(&self, bindings: &[(String, Uuid)]) -> Result<HashSet<String>> {
        let codes: Vec<String> = bindings.iter().map(|(code, _)| code.clone()).collect();
        let campaign_ids: Vec<Uuid> = bindings.iter().map(|(_, id)| *id).collect();

        let updated: Vec<String> = sqlx::query_scalar(
            "UPDATE coupons AS c
             SET campaign_id = i.campaign_id, issued = TRUE
             FROM UNNEST($1::text[], $2::uuid[]) AS i (code, campaign_id)
             WHERE c.code = i.code
               AND c.campaign_id IS NULL
               AND c.issued = FALSE
             RETURNING c.code",
        )
        .bind(&codes)
        .bind(&campaign_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)?;

        Ok(updated.into_iter().collect())
    }

    async fn set_status_if(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaigns
             SET status = $3
             WHERE id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_status(&self, campaign_id: Uuid, to: CampaignStatus) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns
             SET status = $2
             WHERE id = $1",
        )
        .bind(campaign_id)
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;

        Ok(())
    }
}
