//! Email status repository

use crate::db::DatabasePool;
use crate::models::{EmailStatus, NewEmailStatus, UpdateEmailStatus};
use async_trait::async_trait;
use chrono::Utc;
use mailchats_common::types::{CampaignId, EmailStatusId};
use mailchats_common::{Error, Result};

/// Email status repository trait
#[async_trait]
pub trait EmailStatusRepository: Send + Sync {
    async fn create(&self, input: NewEmailStatus) -> Result<EmailStatus>;
    async fn get(&self, id: EmailStatusId) -> Result<Option<EmailStatus>>;
    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<EmailStatus>>;
    async fn update(
        &self,
        id: EmailStatusId,
        update: UpdateEmailStatus,
    ) -> Result<Option<EmailStatus>>;
    async fn delete(&self, id: EmailStatusId) -> Result<Option<EmailStatus>>;
}

/// Database email status repository
pub struct DbEmailStatusRepository {
    pool: DatabasePool,
}

impl DbEmailStatusRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailStatusRepository for DbEmailStatusRepository {
    async fn create(&self, input: NewEmailStatus) -> Result<EmailStatus> {
        sqlx::query_as::<_, EmailStatus>(
            r#"
            INSERT INTO email_statuses (campaign_id, email, subject, sent, failed, failure_reason, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $4 THEN NOW() ELSE NULL END)
            RETURNING *
            "#,
        )
        .bind(input.campaign_id)
        .bind(&input.email)
        .bind(&input.subject)
        .bind(input.sent)
        .bind(input.failed)
        .bind(&input.failure_reason)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Error::NotFound("Campaign not found".to_string())
            }
            _ => Error::Database(e.to_string()),
        })
    }

    async fn get(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        sqlx::query_as::<_, EmailStatus>("SELECT * FROM email_statuses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_campaign(&self, campaign_id: CampaignId) -> Result<Vec<EmailStatus>> {
        sqlx::query_as::<_, EmailStatus>(
            "SELECT * FROM email_statuses WHERE campaign_id = $1 ORDER BY id",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(
        &self,
        id: EmailStatusId,
        update: UpdateEmailStatus,
    ) -> Result<Option<EmailStatus>> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let current = sqlx::query_as::<_, EmailStatus>(
            "SELECT * FROM email_statuses WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let Some(mut status) = current else {
            return Ok(None);
        };
        update.apply(&mut status, Utc::now());

        let updated = sqlx::query_as::<_, EmailStatus>(
            r#"
            UPDATE email_statuses SET
                subject = $2, sent = $3, delivered = $4, opened = $5, clicked = $6,
                replied = $7, failed = $8, failure_reason = $9, sent_at = $10,
                opened_at = $11, clicked_at = $12, replied_at = $13, updated_at = $14
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&status.subject)
        .bind(status.sent)
        .bind(status.delivered)
        .bind(status.opened)
        .bind(status.clicked)
        .bind(status.replied)
        .bind(status.failed)
        .bind(&status.failure_reason)
        .bind(status.sent_at)
        .bind(status.opened_at)
        .bind(status.clicked_at)
        .bind(status.replied_at)
        .bind(status.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Some(updated))
    }

    async fn delete(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        sqlx::query_as::<_, EmailStatus>("DELETE FROM email_statuses WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
