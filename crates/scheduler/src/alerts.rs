//! Alert engine (4.E). CRUD is a thin, ungated persistence layer, same
//! division of responsibility as `mitsume_core::repository`: the HTTP layer
//! checks `owner_user_id` before calling through. `evaluate` and the
//! due-set/history bookkeeping are the part that actually earns the name.

use chrono::{DateTime, Duration, Utc};
use mitsume_core::executor::{CachedExecutor, Priority};
use mitsume_core::models::{
    Aggregation, AlertChannelBinding, AlertEvaluation, AlertHistoryRecord, ComparisonOperator,
    CreateAlertInput, DispatchStatus, QueryAlert, SavedQuery, UpdateAlertInput,
};
use serde_json::Value as Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AlertEngineError {
    #[error("not found")]
    NotFound,
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("no numeric values available for aggregation")]
    NoNumericValues,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<QueryAlert, AlertEngineError> {
    sqlx::query_as::<_, QueryAlert>("SELECT * FROM query_alerts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AlertEngineError::NotFound)
}

pub async fn list_for_owner(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<QueryAlert>, AlertEngineError> {
    Ok(sqlx::query_as::<_, QueryAlert>("SELECT * FROM query_alerts WHERE owner_user_id = $1 ORDER BY created_at DESC")
        .bind(owner_user_id)
        .fetch_all(pool)
        .await?)
}

pub async fn create(pool: &PgPool, owner_user_id: Uuid, input: CreateAlertInput) -> Result<QueryAlert, AlertEngineError> {
    let mut tx = pool.begin().await?;
    let id = Uuid::new_v4();
    let alert = sqlx::query_as::<_, QueryAlert>(
        r#"
        INSERT INTO query_alerts (
            id, owner_user_id, saved_query_id, name, condition_column, operator,
            condition_value_string, aggregation, check_interval_min, cooldown_min,
            is_active, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, now(), now())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(owner_user_id)
    .bind(input.saved_query_id)
    .bind(&input.name)
    .bind(&input.condition_column)
    .bind(input.operator)
    .bind(&input.condition_value_string)
    .bind(input.aggregation)
    .bind(input.check_interval_min)
    .bind(input.cooldown_min)
    .fetch_one(&mut *tx)
    .await?;

    for channel_id in &input.channel_ids {
        sqlx::query("INSERT INTO alert_channel_bindings (alert_id, channel_id) VALUES ($1, $2)")
            .bind(id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(alert)
}

pub async fn update(pool: &PgPool, id: Uuid, input: UpdateAlertInput) -> Result<QueryAlert, AlertEngineError> {
    let mut tx = pool.begin().await?;
    let alert = sqlx::query_as::<_, QueryAlert>(
        r#"
        UPDATE query_alerts SET
            name = COALESCE($2, name),
            condition_column = COALESCE($3, condition_column),
            operator = COALESCE($4, operator),
            condition_value_string = COALESCE($5, condition_value_string),
            aggregation = COALESCE($6, aggregation),
            check_interval_min = COALESCE($7, check_interval_min),
            cooldown_min = COALESCE($8, cooldown_min),
            is_active = COALESCE($9, is_active),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.condition_column)
    .bind(input.operator)
    .bind(&input.condition_value_string)
    .bind(input.aggregation)
    .bind(input.check_interval_min)
    .bind(input.cooldown_min)
    .bind(input.is_active)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AlertEngineError::NotFound)?;

    if let Some(channel_ids) = input.channel_ids {
        sqlx::query("DELETE FROM alert_channel_bindings WHERE alert_id = $1").bind(id).execute(&mut *tx).await?;
        for channel_id in channel_ids {
            sqlx::query("INSERT INTO alert_channel_bindings (alert_id, channel_id) VALUES ($1, $2)")
                .bind(id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;
    Ok(alert)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), AlertEngineError> {
    let result = sqlx::query("DELETE FROM query_alerts WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AlertEngineError::NotFound);
    }
    Ok(())
}

pub async fn bindings_of(pool: &PgPool, alert_id: Uuid) -> Result<Vec<AlertChannelBinding>, AlertEngineError> {
    Ok(sqlx::query_as::<_, AlertChannelBinding>("SELECT * FROM alert_channel_bindings WHERE alert_id = $1")
        .bind(alert_id)
        .fetch_all(pool)
        .await?)
}

/// Alerts due for a check: `is_active AND (next_check_at IS NULL OR
/// next_check_at <= now)`, earliest first, capped at 100 per tick.
pub async fn due_set(pool: &PgPool) -> Result<Vec<QueryAlert>, AlertEngineError> {
    Ok(sqlx::query_as::<_, QueryAlert>(
        r#"
        SELECT * FROM query_alerts
        WHERE is_active = true AND (next_check_at IS NULL OR next_check_at <= now())
        ORDER BY next_check_at ASC NULLS FIRST
        LIMIT 100
        "#,
    )
    .fetch_all(pool)
    .await?)
}

pub async fn update_after_check(
    pool: &PgPool,
    alert_id: Uuid,
    triggered: bool,
    next_check_at: DateTime<Utc>,
) -> Result<(), AlertEngineError> {
    sqlx::query(
        r#"
        UPDATE query_alerts SET
            last_checked_at = now(),
            last_triggered_at = CASE WHEN $2 THEN now() ELSE last_triggered_at END,
            next_check_at = $3,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(alert_id)
    .bind(triggered)
    .bind(next_check_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn record_history(
    pool: &PgPool,
    alert_id: Uuid,
    value_observed: &str,
    status: DispatchStatus,
    per_channel_details: Json,
    error_message: Option<&str>,
) -> Result<AlertHistoryRecord, AlertEngineError> {
    Ok(sqlx::query_as::<_, AlertHistoryRecord>(
        r#"
        INSERT INTO alert_history (id, alert_id, triggered_at, value_observed, dispatch_status, per_channel_details_json, error_message)
        VALUES ($1, $2, now(), $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(alert_id)
    .bind(value_observed)
    .bind(status)
    .bind(per_channel_details)
    .bind(error_message)
    .fetch_one(pool)
    .await?)
}

pub async fn history_for(pool: &PgPool, alert_id: Uuid) -> Result<Vec<AlertHistoryRecord>, AlertEngineError> {
    Ok(sqlx::query_as::<_, AlertHistoryRecord>(
        "SELECT * FROM alert_history WHERE alert_id = $1 ORDER BY triggered_at DESC",
    )
    .bind(alert_id)
    .fetch_all(pool)
    .await?)
}

fn value_to_string(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn value_to_f64(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn aggregate(values: &[Json], aggregation: Option<Aggregation>) -> Result<String, AlertEngineError> {
    match aggregation {
        None | Some(Aggregation::First) => Ok(values.first().map(value_to_string).unwrap_or_default()),
        Some(agg) => {
            let numbers: Vec<f64> = values.iter().filter_map(value_to_f64).collect();
            if numbers.is_empty() {
                return Err(AlertEngineError::NoNumericValues);
            }
            let result = match agg {
                Aggregation::Sum => numbers.iter().sum(),
                Aggregation::Avg => numbers.iter().sum::<f64>() / numbers.len() as f64,
                Aggregation::Count => numbers.len() as f64,
                Aggregation::Min => numbers.iter().cloned().fold(f64::INFINITY, f64::min),
                Aggregation::Max => numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                Aggregation::First => unreachable!(),
            };
            Ok(result.to_string())
        }
    }
}

fn compare(observed: &str, operator: ComparisonOperator, threshold: &str) -> bool {
    match operator {
        ComparisonOperator::Contains => observed.contains(threshold),
        ComparisonOperator::Eq | ComparisonOperator::Neq => {
            match (observed.parse::<f64>(), threshold.parse::<f64>()) {
                (Ok(o), Ok(t)) => {
                    if operator == ComparisonOperator::Eq {
                        o == t
                    } else {
                        o != t
                    }
                }
                _ => {
                    if operator == ComparisonOperator::Eq {
                        observed == threshold
                    } else {
                        observed != threshold
                    }
                }
            }
        }
        _ => match (observed.parse::<f64>(), threshold.parse::<f64>()) {
            (Ok(o), Ok(t)) => match operator {
                ComparisonOperator::Gt => o > t,
                ComparisonOperator::Lt => o < t,
                ComparisonOperator::Gte => o >= t,
                ComparisonOperator::Lte => o <= t,
                _ => unreachable!(),
            },
            _ => false,
        },
    }
}

/// Evaluation algorithm (4.E): run the saved query at `high` priority keyed
/// by the saved query id, locate the condition column, aggregate, compare.
pub async fn evaluate(
    pool: &PgPool,
    executor: &CachedExecutor,
    alert: &QueryAlert,
    default_catalog: &str,
    default_schema: &str,
) -> Result<AlertEvaluation, AlertEngineError> {
    let saved_query = sqlx::query_as::<_, SavedQuery>("SELECT * FROM saved_queries WHERE id = $1")
        .bind(alert.saved_query_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AlertEngineError::NotFound)?;

    let catalog = saved_query.catalog.as_deref().unwrap_or(default_catalog);
    let schema = saved_query.schema.as_deref().unwrap_or(default_schema);

    let result = match executor
        .execute_cached(
            &saved_query.query_text,
            catalog,
            schema,
            Priority::High,
            Some(saved_query.id),
            &BTreeMap::new(),
        )
        .await
    {
        Ok(r) => r,
        Err(e) => return Ok(AlertEvaluation { triggered: false, observed_value: String::new(), error: Some(e.to_string()) }),
    };

    if result.row_count == 0 {
        return Ok(AlertEvaluation { triggered: false, observed_value: String::new(), error: None });
    }

    let Some(col_index) = result.columns.iter().position(|c| c == &alert.condition_column) else {
        let err = AlertEngineError::ColumnNotFound(alert.condition_column.clone());
        return Ok(AlertEvaluation { triggered: false, observed_value: String::new(), error: Some(err.to_string()) });
    };

    let values: Vec<Json> = result.rows.iter().map(|row| row[col_index].clone()).collect();
    let observed = match aggregate(&values, alert.aggregation) {
        Ok(v) => v,
        Err(e) => return Ok(AlertEvaluation { triggered: false, observed_value: String::new(), error: Some(e.to_string()) }),
    };
    let triggered = compare(&observed, alert.operator, &alert.condition_value_string);

    Ok(AlertEvaluation { triggered, observed_value: observed, error: None })
}

/// `test(alertId, userId)`: evaluate once and return the outcome without
/// touching `last_checked_at`/`next_check_at` or writing history.
pub async fn test(
    pool: &PgPool,
    executor: &CachedExecutor,
    alert_id: Uuid,
    default_catalog: &str,
    default_schema: &str,
) -> Result<AlertEvaluation, AlertEngineError> {
    let alert = get(pool, alert_id).await?;
    evaluate(pool, executor, &alert, default_catalog, default_schema).await
}

pub fn next_check_at(alert: &QueryAlert, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(alert.check_interval_min as i64)
}

pub fn in_cooldown(alert: &QueryAlert, now: DateTime<Utc>) -> bool {
    match alert.last_triggered_at {
        Some(last) => now < last + Duration::minutes(alert.cooldown_min as i64),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_first_takes_the_raw_first_cell() {
        let values = vec![Json::String("abc".to_string()), Json::from(5)];
        assert_eq!(aggregate(&values, None).unwrap(), "abc");
    }

    #[test]
    fn aggregate_sum_skips_non_numeric_rows() {
        let values = vec![Json::from(1), Json::String("not a number".to_string()), Json::from(2)];
        assert_eq!(aggregate(&values, Some(Aggregation::Sum)).unwrap(), "3");
    }

    #[test]
    fn aggregate_numeric_with_no_numeric_rows_errors() {
        let values = vec![Json::String("nope".to_string())];
        assert!(matches!(aggregate(&values, Some(Aggregation::Avg)), Err(AlertEngineError::NoNumericValues)));
    }

    #[test]
    fn compare_numeric_operators() {
        assert!(compare("10", ComparisonOperator::Gt, "5"));
        assert!(!compare("not-a-number", ComparisonOperator::Gt, "5"));
        assert!(compare("abc", ComparisonOperator::Eq, "abc"));
        assert!(compare("needle-in-haystack", ComparisonOperator::Contains, "needle"));
    }
}
