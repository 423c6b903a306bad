//! Campaign repository

use crate::db::DatabasePool;
use crate::models::{Campaign, NewCampaign, UpdateCampaign};
use async_trait::async_trait;
use chrono::Utc;
use mailchats_common::types::CampaignId;
use mailchats_common::{Error, Result};

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, input: NewCampaign) -> Result<Campaign>;
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>>;
    async fn update(&self, id: CampaignId, update: UpdateCampaign) -> Result<Option<Campaign>>;
    async fn list(&self) -> Result<Vec<Campaign>>;
    async fn delete(&self, id: CampaignId) -> Result<Option<Campaign>>;
}

/// Database campaign repository
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn create(&self, input: NewCampaign) -> Result<Campaign> {
        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO email_campaigns (
                name, from_name, send_method, api_key, smtp_mode, smtp_host, smtp_port,
                smtp_username, smtp_password, rotate_smtp, send_speed, track_opens,
                track_links, track_replies, recipient_count, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.from_name)
        .bind(&input.send_method)
        .bind(&input.api_key)
        .bind(&input.smtp_mode)
        .bind(&input.smtp_host)
        .bind(input.smtp_port)
        .bind(&input.smtp_username)
        .bind(&input.smtp_password)
        .bind(input.rotate_smtp)
        .bind(input.send_speed)
        .bind(input.track_opens)
        .bind(input.track_links)
        .bind(input.track_replies)
        .bind(input.recipient_count)
        .bind(input.status.as_deref().unwrap_or("processing"))
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM email_campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, id: CampaignId, update: UpdateCampaign) -> Result<Option<Campaign>> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let current = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM email_campaigns WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let Some(mut campaign) = current else {
            return Ok(None);
        };
        update.apply(&mut campaign, Utc::now());

        let updated = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE email_campaigns SET
                name = $2, from_name = $3, send_method = $4, api_key = $5, smtp_mode = $6,
                smtp_host = $7, smtp_port = $8, smtp_username = $9, smtp_password = $10,
                rotate_smtp = $11, send_speed = $12, track_opens = $13, track_links = $14,
                track_replies = $15, recipient_count = $16, status = $17, completed_at = $18,
                updated_at = $19
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&campaign.name)
        .bind(&campaign.from_name)
        .bind(&campaign.send_method)
        .bind(&campaign.api_key)
        .bind(&campaign.smtp_mode)
        .bind(&campaign.smtp_host)
        .bind(campaign.smtp_port)
        .bind(&campaign.smtp_username)
        .bind(&campaign.smtp_password)
        .bind(campaign.rotate_smtp)
        .bind(campaign.send_speed)
        .bind(campaign.track_opens)
        .bind(campaign.track_links)
        .bind(campaign.track_replies)
        .bind(campaign.recipient_count)
        .bind(&campaign.status)
        .bind(campaign.completed_at)
        .bind(campaign.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Some(updated))
    }

    async fn list(&self) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM email_campaigns ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, id: CampaignId) -> Result<Option<Campaign>> {
        // email_statuses rows go with it via ON DELETE CASCADE
        sqlx::query_as::<_, Campaign>("DELETE FROM email_campaigns WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
