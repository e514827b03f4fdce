//! Subscription engine (4.F): scheduled dashboard reports. CRUD here is a
//! thin, ungated persistence layer like `alerts`; `execute` is the part that
//! actually re-checks the owner's access before sending anything out.

use crate::cron_util::{self, CronError};
use chrono::Utc;
use mitsume_auth::roles::{self, RoleError};
use mitsume_core::models::{
    CreateSubscriptionInput, DashboardSubscription, NotificationChannel, NotificationMessage,
    SubscriptionChannelBinding, UpdateSubscriptionInput,
};
use mitsume_core::notifier::NotificationRouter;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionEngineError {
    #[error("not found")]
    NotFound,
    #[error("subscription has no bound channels")]
    NoChannels,
    #[error("owner no longer has access to the dashboard")]
    PermissionDenied,
    #[error("invalid cron expression: {0}")]
    CronInvalid(#[from] CronError),
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RoleError> for SubscriptionEngineError {
    fn from(e: RoleError) -> Self {
        match e {
            RoleError::NotFound => SubscriptionEngineError::NotFound,
            RoleError::Database(err) => SubscriptionEngineError::Database(err),
            other => SubscriptionEngineError::DispatchFailed(other.to_string()),
        }
    }
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<DashboardSubscription, SubscriptionEngineError> {
    sqlx::query_as::<_, DashboardSubscription>("SELECT * FROM dashboard_subscriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(SubscriptionEngineError::NotFound)
}

pub async fn list_for_owner(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<DashboardSubscription>, SubscriptionEngineError> {
    Ok(sqlx::query_as::<_, DashboardSubscription>(
        "SELECT * FROM dashboard_subscriptions WHERE owner_user_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create(
    pool: &PgPool,
    owner_user_id: Uuid,
    input: CreateSubscriptionInput,
) -> Result<DashboardSubscription, SubscriptionEngineError> {
    let next_run_at = cron_util::next_run_after(&input.cron_expression, &input.timezone, Utc::now())?;

    let mut tx = pool.begin().await?;
    let id = Uuid::new_v4();
    let subscription = sqlx::query_as::<_, DashboardSubscription>(
        r#"
        INSERT INTO dashboard_subscriptions (
            id, owner_user_id, dashboard_id, name, cron_expression, timezone, format,
            is_active, next_run_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8, now(), now())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(owner_user_id)
    .bind(input.dashboard_id)
    .bind(&input.name)
    .bind(&input.cron_expression)
    .bind(&input.timezone)
    .bind(input.format)
    .bind(next_run_at)
    .fetch_one(&mut *tx)
    .await?;

    for channel_id in &input.channel_ids {
        sqlx::query("INSERT INTO subscription_channel_bindings (subscription_id, channel_id) VALUES ($1, $2)")
            .bind(id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(subscription)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: UpdateSubscriptionInput,
) -> Result<DashboardSubscription, SubscriptionEngineError> {
    let existing = get(pool, id).await?;
    let next_run_at = if input.cron_expression.is_some() || input.timezone.is_some() {
        let cron = input.cron_expression.as_deref().unwrap_or(&existing.cron_expression);
        let tz = input.timezone.as_deref().unwrap_or(&existing.timezone);
        Some(cron_util::next_run_after(cron, tz, Utc::now())?)
    } else {
        None
    };

    let mut tx = pool.begin().await?;
    let subscription = sqlx::query_as::<_, DashboardSubscription>(
        r#"
        UPDATE dashboard_subscriptions SET
            name = COALESCE($2, name),
            cron_expression = COALESCE($3, cron_expression),
            timezone = COALESCE($4, timezone),
            format = COALESCE($5, format),
            is_active = COALESCE($6, is_active),
            next_run_at = COALESCE($7, next_run_at),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.cron_expression)
    .bind(&input.timezone)
    .bind(input.format)
    .bind(input.is_active)
    .bind(next_run_at)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(SubscriptionEngineError::NotFound)?;

    if let Some(channel_ids) = input.channel_ids {
        sqlx::query("DELETE FROM subscription_channel_bindings WHERE subscription_id = $1").bind(id).execute(&mut *tx).await?;
        for channel_id in channel_ids {
            sqlx::query("INSERT INTO subscription_channel_bindings (subscription_id, channel_id) VALUES ($1, $2)")
                .bind(id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;
    Ok(subscription)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), SubscriptionEngineError> {
    let result = sqlx::query("DELETE FROM dashboard_subscriptions WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(SubscriptionEngineError::NotFound);
    }
    Ok(())
}

async fn bound_channels(pool: &PgPool, subscription_id: Uuid) -> Result<Vec<NotificationChannel>, SubscriptionEngineError> {
    Ok(sqlx::query_as::<_, NotificationChannel>(
        r#"
        SELECT nc.* FROM notification_channels nc
        JOIN subscription_channel_bindings scb ON scb.channel_id = nc.id
        WHERE scb.subscription_id = $1
        "#,
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?)
}

/// Due subscriptions: `is_active AND (next_run_at IS NULL OR next_run_at <=
/// now)`, earliest first, capped at 100 per tick.
pub async fn due_set(pool: &PgPool) -> Result<Vec<DashboardSubscription>, SubscriptionEngineError> {
    Ok(sqlx::query_as::<_, DashboardSubscription>(
        r#"
        SELECT * FROM dashboard_subscriptions
        WHERE is_active = true AND (next_run_at IS NULL OR next_run_at <= now())
        ORDER BY next_run_at ASC NULLS FIRST
        LIMIT 100
        "#,
    )
    .fetch_all(pool)
    .await?)
}

/// Execute algorithm (4.F): reload channels, re-check the owner's access to
/// the dashboard, compose and dispatch. Returns the last non-null per-channel
/// error after attempting every channel, so one bad webhook never masks the
/// result of the rest.
pub async fn execute(
    pool: &PgPool,
    router: &NotificationRouter,
    subscription: &DashboardSubscription,
) -> Result<(), SubscriptionEngineError> {
    let channels = bound_channels(pool, subscription.id).await?;
    if channels.is_empty() {
        return Err(SubscriptionEngineError::NoChannels);
    }

    if !roles::can_view(pool, subscription.dashboard_id, subscription.owner_user_id).await? {
        return Err(SubscriptionEngineError::PermissionDenied);
    }

    let dashboard_name: (String,) = sqlx::query_as("SELECT name FROM dashboards WHERE id = $1")
        .bind(subscription.dashboard_id)
        .fetch_one(pool)
        .await?;

    let message = NotificationMessage {
        title: format!("Scheduled Report: {}", dashboard_name.0),
        body: format!(
            "Dashboard \"{}\", format {:?}, schedule `{}`.",
            dashboard_name.0, subscription.format, subscription.cron_expression
        ),
        attachment_filenames: Vec::new(),
    };

    let mut last_error = None;
    for channel in &channels {
        if let Err(e) = router.send(channel, &message).await {
            tracing::error!("subscription {} dispatch to channel {} failed: {}", subscription.id, channel.id, e);
            last_error = Some(e.to_string());
        }
    }

    match last_error {
        Some(e) => Err(SubscriptionEngineError::DispatchFailed(e)),
        None => Ok(()),
    }
}

/// Always called after a run attempt, success or failure: we prefer to skip
/// a cycle over repeatedly retrying a broken delivery.
pub async fn update_after_run(pool: &PgPool, subscription: &DashboardSubscription) -> Result<(), SubscriptionEngineError> {
    let next_run_at = cron_util::next_run_after(&subscription.cron_expression, &subscription.timezone, Utc::now())?;
    sqlx::query("UPDATE dashboard_subscriptions SET last_sent_at = now(), next_run_at = $2, updated_at = now() WHERE id = $1")
        .bind(subscription.id)
        .bind(next_run_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn trigger(
    pool: &PgPool,
    router: &NotificationRouter,
    subscription_id: Uuid,
) -> Result<(), SubscriptionEngineError> {
    let subscription = get(pool, subscription_id).await?;
    let result = execute(pool, router, &subscription).await;
    update_after_run(pool, &subscription).await?;
    result
}

pub async fn bindings_of(pool: &PgPool, subscription_id: Uuid) -> Result<Vec<SubscriptionChannelBinding>, SubscriptionEngineError> {
    Ok(sqlx::query_as::<_, SubscriptionChannelBinding>(
        "SELECT * FROM subscription_channel_bindings WHERE subscription_id = $1",
    )
    .bind(subscription_id)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mitsume_core::models::SubscriptionFormat;

    #[test]
    fn format_implements_debug_for_message_body() {
        assert_eq!(format!("{:?}", SubscriptionFormat::Pdf), "Pdf");
    }
}
