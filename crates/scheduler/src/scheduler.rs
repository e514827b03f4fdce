//! Scheduler loop (4.H): two independent 60 s jobs, `process-alerts` and
//! `process-subscriptions`, each bounded by a 5-minute per-tick deadline.
//! Neither job overlaps with its own previous run; the interval task
//! awaits its whole tick body (including the deadline) before sleeping
//! again, so a slow tick simply delays the next one rather than stacking
//! concurrent runs.

use crate::alerts::{self, AlertEngineError};
use crate::subscriptions::{self, SubscriptionEngineError};
use mitsume_core::executor::CachedExecutor;
use mitsume_core::models::DispatchStatus;
use mitsume_core::notifier::NotificationRouter;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const TICK_INTERVAL: Duration = Duration::from_secs(60);
const TICK_DEADLINE: Duration = Duration::from_secs(5 * 60);

pub struct SchedulerConfig {
    pub default_catalog: String,
    pub default_schema: String,
}

/// Owns the shared clients the two jobs need and the shutdown signal both
/// select on.
pub struct SchedulerLoop {
    pool: PgPool,
    executor: Arc<CachedExecutor>,
    router: Arc<NotificationRouter>,
    config: SchedulerConfig,
    shutdown: Arc<Notify>,
}

impl SchedulerLoop {
    pub fn new(pool: PgPool, executor: Arc<CachedExecutor>, router: Arc<NotificationRouter>, config: SchedulerConfig) -> Self {
        Self { pool, executor, router, config, shutdown: Arc::new(Notify::new()) }
    }

    /// Spawns both jobs and returns a handle that resolves once both have
    /// observed shutdown and drained their in-flight tick.
    pub fn spawn(self) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>, Arc<Notify>) {
        let shutdown = self.shutdown.clone();

        let alerts_handle = {
            let pool = self.pool.clone();
            let executor = self.executor.clone();
            let router = self.router.clone();
            let default_catalog = self.config.default_catalog.clone();
            let default_schema = self.config.default_schema.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(run_job("process-alerts", shutdown, move || {
                let pool = pool.clone();
                let executor = executor.clone();
                let router = router.clone();
                let default_catalog = default_catalog.clone();
                let default_schema = default_schema.clone();
                async move { process_alerts_tick(&pool, &executor, &router, &default_catalog, &default_schema).await }
            }))
        };

        let subscriptions_handle = {
            let pool = self.pool.clone();
            let router = self.router.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(run_job("process-subscriptions", shutdown, move || {
                let pool = pool.clone();
                let router = router.clone();
                async move { process_subscriptions_tick(&pool, &router).await }
            }))
        };

        (alerts_handle, subscriptions_handle, shutdown)
    }

    /// Signals both jobs to stop taking new ticks. Callers await the join
    /// handles returned by `spawn` to block until in-flight ticks finish.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

/// Drives one named job: sleep `TICK_INTERVAL`, then run one deadline-bound
/// tick, repeat, until a shutdown notification arrives between ticks.
async fn run_job<F, Fut>(name: &'static str, shutdown: Arc<Notify>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match tokio::time::timeout(TICK_DEADLINE, tick()).await {
                    Ok(()) => {}
                    Err(_) => tracing::warn!("{} tick exceeded its {:?} deadline", name, TICK_DEADLINE),
                }
            }
            _ = shutdown.notified() => {
                tracing::info!("{} received shutdown, no further ticks will start", name);
                break;
            }
        }
    }
}

async fn process_alerts_tick(
    pool: &PgPool,
    executor: &CachedExecutor,
    router: &NotificationRouter,
    default_catalog: &str,
    default_schema: &str,
) {
    let due = match alerts::due_set(pool).await {
        Ok(due) => due,
        Err(e) => {
            tracing::error!("failed to load due alerts: {}", e);
            return;
        }
    };

    for alert in due {
        if let Err(e) = process_one_alert(pool, executor, router, &alert, default_catalog, default_schema).await {
            tracing::error!("alert {} tick failed: {}", alert.id, e);
        }
    }
}

async fn process_one_alert(
    pool: &PgPool,
    executor: &CachedExecutor,
    router: &NotificationRouter,
    alert: &mitsume_core::models::QueryAlert,
    default_catalog: &str,
    default_schema: &str,
) -> Result<(), AlertEngineError> {
    let now = chrono::Utc::now();
    let next_check_at = alerts::next_check_at(alert, now);

    let evaluation = alerts::evaluate(pool, executor, alert, default_catalog, default_schema).await?;

    if let Some(err) = &evaluation.error {
        alerts::record_history(pool, alert.id, "", DispatchStatus::Error, serde_json::json!({}), Some(err)).await?;
        alerts::update_after_check(pool, alert.id, false, next_check_at).await?;
        return Ok(());
    }

    if evaluation.triggered {
        if alerts::in_cooldown(alert, now) {
            alerts::update_after_check(pool, alert.id, false, next_check_at).await?;
            return Ok(());
        }

        let bindings = alerts::bindings_of(pool, alert.id).await?;
        let mut per_channel = serde_json::Map::new();
        let mut any_ok = false;
        let mut any_fail = false;
        let mut last_error = None;

        for binding in &bindings {
            let channel = match sqlx::query_as::<_, mitsume_core::models::NotificationChannel>(
                "SELECT * FROM notification_channels WHERE id = $1",
            )
            .bind(binding.channel_id)
            .fetch_optional(pool)
            .await
            {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("failed to load channel {}: {}", binding.channel_id, e);
                    continue;
                }
            };

            let message = mitsume_core::models::NotificationMessage {
                title: format!("Alert triggered: {}", alert.name),
                body: format!(
                    "Column `{}` {:?} `{}`, observed `{}`.",
                    alert.condition_column, alert.operator, alert.condition_value_string, evaluation.observed_value
                ),
                attachment_filenames: Vec::new(),
            };

            match router.send(&channel, &message).await {
                Ok(()) => {
                    any_ok = true;
                    per_channel.insert(channel.id.to_string(), serde_json::json!({ "status": "sent" }));
                }
                Err(e) => {
                    any_fail = true;
                    last_error = Some(e.to_string());
                    per_channel.insert(channel.id.to_string(), serde_json::json!({ "status": "failed", "error": e.to_string() }));
                }
            }
        }

        let status = if !any_fail {
            DispatchStatus::Sent
        } else if any_ok {
            DispatchStatus::Partial
        } else {
            DispatchStatus::Error
        };

        alerts::record_history(
            pool,
            alert.id,
            &evaluation.observed_value,
            status,
            serde_json::Value::Object(per_channel),
            last_error.as_deref(),
        )
        .await?;
    }

    alerts::update_after_check(pool, alert.id, evaluation.triggered, next_check_at).await?;
    Ok(())
}

async fn process_subscriptions_tick(pool: &PgPool, router: &NotificationRouter) {
    let due = match subscriptions::due_set(pool).await {
        Ok(due) => due,
        Err(e) => {
            tracing::error!("failed to load due subscriptions: {}", e);
            return;
        }
    };

    for subscription in due {
        if let Err(e) = process_one_subscription(pool, router, &subscription).await {
            tracing::error!("subscription {} run failed: {}", subscription.id, e);
        }
    }
}

async fn process_one_subscription(
    pool: &PgPool,
    router: &NotificationRouter,
    subscription: &mitsume_core::models::DashboardSubscription,
) -> Result<(), SubscriptionEngineError> {
    let result = subscriptions::execute(pool, router, subscription).await;
    subscriptions::update_after_run(pool, subscription).await?;
    result
}
