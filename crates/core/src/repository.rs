//! Repository helpers for the dashboard & saved-query store (4.I).
//!
//! These are the raw persistence operations; permission gating (4.A) is the
//! caller's responsibility, handlers consult `mitsume_auth::roles` before
//! calling into here. Every lookup is scoped by the column that matters
//! (owner, dashboard) the way the template's `repository.rs` mandates
//! tenant-scoping at the data layer, adapted here to Mitsume's ownership
//! model rather than a tenant model.

use crate::models::{
    CreateChannelInput, CreateDashboardInput, CreateRoleInput, CreateSavedQueryInput, CreateWidgetInput,
    Dashboard, DashboardPermission, NotificationChannel, RegisterUserInput, Role, RoleCatalogGrant, SavedQuery,
    UpdateChannelInput, UpdateDashboardInput, UpdateRoleInput, UpdateSavedQueryInput, UpdateWidgetInput, User,
    UserRoleAssignment, Widget,
};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("resource not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

// ==================== Dashboards ====================

pub async fn get_dashboard(pool: &PgPool, id: Uuid) -> Result<Dashboard, RepoError> {
    sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn list_dashboards_for_owner(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<Dashboard>, RepoError> {
    Ok(sqlx::query_as::<_, Dashboard>("SELECT * FROM dashboards WHERE owner_user_id = $1 ORDER BY updated_at DESC")
        .bind(owner_user_id)
        .fetch_all(pool)
        .await?)
}

pub async fn create_dashboard(pool: &PgPool, owner_user_id: Uuid, input: CreateDashboardInput) -> Result<Dashboard, RepoError> {
    crate::layout::validate_layout(&input.layout_json).map_err(|e| RepoError::InvalidInput(e.0))?;
    Ok(sqlx::query_as::<_, Dashboard>(
        r#"
        INSERT INTO dashboards (id, owner_user_id, name, description, layout_json, is_public, parameters_json, is_draft, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, false, $6, false, now(), now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.layout_json)
    .bind(input.parameters_json.unwrap_or(serde_json::json!({})))
    .fetch_one(pool)
    .await?)
}

pub async fn update_dashboard(pool: &PgPool, id: Uuid, input: UpdateDashboardInput) -> Result<Dashboard, RepoError> {
    let existing = get_dashboard(pool, id).await?;
    if let Some(layout) = &input.layout_json {
        crate::layout::validate_layout(layout).map_err(|e| RepoError::InvalidInput(e.0))?;
    }
    Ok(sqlx::query_as::<_, Dashboard>(
        r#"
        UPDATE dashboards
        SET name = $2, description = $3, layout_json = $4, parameters_json = $5, is_public = $6, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.name.unwrap_or(existing.name))
    .bind(input.description.or(existing.description))
    .bind(input.layout_json.unwrap_or(existing.layout_json))
    .bind(input.parameters_json.unwrap_or(existing.parameters_json))
    .bind(input.is_public.unwrap_or(existing.is_public))
    .fetch_one(pool)
    .await?)
}

pub async fn delete_dashboard(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    let result = sqlx::query("DELETE FROM dashboards WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

/// `saveAsDraft`: a no-op when the dashboard is already a draft.
pub async fn save_as_draft(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    sqlx::query("UPDATE dashboards SET is_draft = true, updated_at = now() WHERE id = $1 AND is_draft = false")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `publishDraft`: idempotent regardless of current draft state.
pub async fn publish_draft(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    sqlx::query("UPDATE dashboards SET is_draft = false, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ==================== Widgets ====================

pub async fn list_widgets(pool: &PgPool, dashboard_id: Uuid) -> Result<Vec<Widget>, RepoError> {
    Ok(sqlx::query_as::<_, Widget>("SELECT * FROM widgets WHERE dashboard_id = $1 ORDER BY created_at")
        .bind(dashboard_id)
        .fetch_all(pool)
        .await?)
}

/// Transactional batch: deletes, then creates, then updates. A missing
/// widget id in `update` is skipped rather than aborting the batch.
pub async fn apply_widget_batch(
    pool: &PgPool,
    dashboard_id: Uuid,
    delete: Vec<Uuid>,
    create: Vec<CreateWidgetInput>,
    update: std::collections::HashMap<Uuid, UpdateWidgetInput>,
) -> Result<Vec<Widget>, RepoError> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    for widget_id in delete {
        sqlx::query("DELETE FROM widgets WHERE id = $1 AND dashboard_id = $2")
            .bind(widget_id)
            .bind(dashboard_id)
            .execute(&mut *tx)
            .await?;
    }

    for input in create {
        sqlx::query(
            r#"
            INSERT INTO widgets (id, dashboard_id, name, saved_query_id, chart_type, chart_config_json, position, responsive_positions_json, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dashboard_id)
        .bind(&input.name)
        .bind(input.saved_query_id)
        .bind(&input.chart_type)
        .bind(&input.chart_config_json)
        .bind(&input.position)
        .bind(&input.responsive_positions_json)
        .execute(&mut *tx)
        .await?;
    }

    for (widget_id, input) in update {
        let existing = sqlx::query_as::<_, Widget>("SELECT * FROM widgets WHERE id = $1 AND dashboard_id = $2")
            .bind(widget_id)
            .bind(dashboard_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(existing) = existing else {
            continue;
        };
        sqlx::query(
            r#"
            UPDATE widgets
            SET name = $2, saved_query_id = $3, chart_type = $4, chart_config_json = $5, position = $6, responsive_positions_json = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(widget_id)
        .bind(input.name.unwrap_or(existing.name))
        .bind(input.saved_query_id.or(existing.saved_query_id))
        .bind(input.chart_type.unwrap_or(existing.chart_type))
        .bind(input.chart_config_json.unwrap_or(existing.chart_config_json))
        .bind(input.position.unwrap_or(existing.position))
        .bind(input.responsive_positions_json.or(existing.responsive_positions_json))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    list_widgets(pool, dashboard_id).await
}

// ==================== Dashboard permissions ====================

pub async fn list_permissions(pool: &PgPool, dashboard_id: Uuid) -> Result<Vec<DashboardPermission>, RepoError> {
    Ok(sqlx::query_as::<_, DashboardPermission>("SELECT * FROM dashboard_permissions WHERE dashboard_id = $1")
        .bind(dashboard_id)
        .fetch_all(pool)
        .await?)
}

// Grant/revoke mutations live in `mitsume_auth::roles`, they need the
// owner-id and self-grant checks that are part of the resolver, not plain
// persistence.

// ==================== Saved queries ====================

pub async fn get_saved_query(pool: &PgPool, id: Uuid) -> Result<SavedQuery, RepoError> {
    sqlx::query_as::<_, SavedQuery>("SELECT * FROM saved_queries WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn list_saved_queries_for_owner(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<SavedQuery>, RepoError> {
    Ok(sqlx::query_as::<_, SavedQuery>("SELECT * FROM saved_queries WHERE owner_user_id = $1 ORDER BY updated_at DESC")
        .bind(owner_user_id)
        .fetch_all(pool)
        .await?)
}

pub async fn create_saved_query(pool: &PgPool, owner_user_id: Uuid, input: CreateSavedQueryInput) -> Result<SavedQuery, RepoError> {
    Ok(sqlx::query_as::<_, SavedQuery>(
        r#"
        INSERT INTO saved_queries (id, owner_user_id, name, description, query_text, catalog, schema, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.query_text)
    .bind(&input.catalog)
    .bind(&input.schema)
    .fetch_one(pool)
    .await?)
}

/// Callers must invoke `CachedExecutor::invalidate_saved_query` with this id
/// before the transaction that updates it commits (4.D invariant).
pub async fn update_saved_query(pool: &PgPool, id: Uuid, input: UpdateSavedQueryInput) -> Result<SavedQuery, RepoError> {
    let existing = get_saved_query(pool, id).await?;
    Ok(sqlx::query_as::<_, SavedQuery>(
        r#"
        UPDATE saved_queries
        SET name = $2, description = $3, query_text = $4, catalog = $5, schema = $6, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.name.unwrap_or(existing.name))
    .bind(input.description.or(existing.description))
    .bind(input.query_text.unwrap_or(existing.query_text))
    .bind(input.catalog.or(existing.catalog))
    .bind(input.schema.or(existing.schema))
    .fetch_one(pool)
    .await?)
}

pub async fn delete_saved_query(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    let result = sqlx::query("DELETE FROM saved_queries WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ==================== Single widget convenience wrappers ====================
// Thin wrappers over `apply_widget_batch` for the singular widget endpoints;
// the batch transaction is still the only place widget writes happen.

pub async fn create_widget(pool: &PgPool, dashboard_id: Uuid, input: CreateWidgetInput) -> Result<Widget, RepoError> {
    let widgets = apply_widget_batch(pool, dashboard_id, Vec::new(), vec![input], HashMap::new()).await?;
    widgets.into_iter().last().ok_or(RepoError::NotFound)
}

pub async fn update_widget(pool: &PgPool, dashboard_id: Uuid, widget_id: Uuid, input: UpdateWidgetInput) -> Result<Widget, RepoError> {
    let mut update = HashMap::new();
    update.insert(widget_id, input);
    let widgets = apply_widget_batch(pool, dashboard_id, Vec::new(), Vec::new(), update).await?;
    widgets.into_iter().find(|w| w.id == widget_id).ok_or(RepoError::NotFound)
}

pub async fn delete_widget(pool: &PgPool, dashboard_id: Uuid, widget_id: Uuid) -> Result<(), RepoError> {
    apply_widget_batch(pool, dashboard_id, vec![widget_id], Vec::new(), HashMap::new()).await?;
    Ok(())
}

// ==================== Users ====================
// Admin-mutated lifecycle (§3): created pending (or active for bootstrap),
// transitions only through approve/disable/enable; never destroyed.

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<User, RepoError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn get_user_by_identifier(pool: &PgPool, identifier: &str) -> Result<Option<User>, RepoError> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 OR username = $1")
        .bind(identifier)
        .fetch_optional(pool)
        .await?)
}

/// Lists users, optionally filtered to a single `status` (e.g. the
/// `?status=pending` admin queue).
pub async fn list_users(pool: &PgPool, status: Option<crate::models::UserStatus>) -> Result<Vec<User>, RepoError> {
    Ok(match status {
        Some(status) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE status = $1 ORDER BY created_at DESC")
                .bind(status)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
    })
}

/// Invariant: exactly one of email/username is non-null (enforced by the
/// caller before this is reached, the store does not re-validate).
pub async fn create_user(
    pool: &PgPool,
    input: RegisterUserInput,
    password_hash: String,
    status: crate::models::UserStatus,
) -> Result<User, RepoError> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, username, password_hash, display_name, auth_provider, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'local', $6, now(), now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&input.email)
    .bind(&input.username)
    .bind(password_hash)
    .bind(&input.display_name)
    .bind(status)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            RepoError::Conflict("a user with that email or username is already registered".to_string())
        }
        other => other.into(),
    })
}

pub async fn approve_user(pool: &PgPool, id: Uuid, approved_by: Uuid) -> Result<User, RepoError> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET status = 'active', approved_at = now(), approved_by = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(approved_by)
    .fetch_optional(pool)
    .await?
    .ok_or(RepoError::NotFound)
}

pub async fn disable_user(pool: &PgPool, id: Uuid) -> Result<User, RepoError> {
    sqlx::query_as::<_, User>("UPDATE users SET status = 'disabled', updated_at = now() WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn enable_user(pool: &PgPool, id: Uuid) -> Result<User, RepoError> {
    sqlx::query_as::<_, User>("UPDATE users SET status = 'active', updated_at = now() WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

// ==================== Roles, catalog grants, assignments ====================
// Plain persistence; `admin` is a protected system role (§3) that cannot be
// renamed or deleted.

pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, RepoError> {
    Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name").fetch_all(pool).await?)
}

pub async fn get_role(pool: &PgPool, id: Uuid) -> Result<Role, RepoError> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn create_role(pool: &PgPool, input: CreateRoleInput) -> Result<Role, RepoError> {
    sqlx::query_as::<_, Role>(
        "INSERT INTO roles (id, name, description, is_system, created_at, updated_at) VALUES ($1, $2, $3, false, now(), now()) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&input.name)
    .bind(&input.description)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            RepoError::Conflict(format!("role name '{}' already exists", input.name))
        }
        other => other.into(),
    })
}

/// Rejects a rename of the reserved `admin` role; other edits pass through.
pub async fn update_role(pool: &PgPool, id: Uuid, input: UpdateRoleInput) -> Result<Role, RepoError> {
    let existing = get_role(pool, id).await?;
    if existing.is_system && input.name.as_deref().is_some_and(|n| n != existing.name) {
        return Err(RepoError::InvalidInput("the admin role cannot be renamed".to_string()));
    }
    Ok(sqlx::query_as::<_, Role>(
        "UPDATE roles SET name = $2, description = $3, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.name.unwrap_or(existing.name))
    .bind(input.description.or(existing.description))
    .fetch_one(pool)
    .await?)
}

pub async fn delete_role(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    let role = get_role(pool, id).await?;
    if role.is_system {
        return Err(RepoError::InvalidInput("the admin role cannot be deleted".to_string()));
    }
    sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub async fn catalog_grants_for_role(pool: &PgPool, role_id: Uuid) -> Result<Vec<RoleCatalogGrant>, RepoError> {
    Ok(sqlx::query_as::<_, RoleCatalogGrant>("SELECT * FROM role_catalog_grants WHERE role_id = $1")
        .bind(role_id)
        .fetch_all(pool)
        .await?)
}

/// Replaces the role's entire catalog grant set with `catalogs` (PUT
/// semantics, matching `PUT /roles/:id/catalogs`).
pub async fn set_catalog_grants(pool: &PgPool, role_id: Uuid, catalogs: Vec<String>) -> Result<(), RepoError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM role_catalog_grants WHERE role_id = $1").bind(role_id).execute(&mut *tx).await?;
    for catalog in catalogs {
        sqlx::query("INSERT INTO role_catalog_grants (role_id, catalog_name) VALUES ($1, $2)")
            .bind(role_id)
            .bind(catalog)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn roles_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Role>, RepoError> {
    Ok(sqlx::query_as::<_, Role>(
        r#"
        SELECT r.* FROM roles r
        JOIN user_role_assignments ura ON ura.role_id = r.id
        WHERE ura.user_id = $1
        ORDER BY r.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn assign_role(pool: &PgPool, user_id: Uuid, role_id: Uuid, assigned_by: Uuid) -> Result<UserRoleAssignment, RepoError> {
    Ok(sqlx::query_as::<_, UserRoleAssignment>(
        r#"
        INSERT INTO user_role_assignments (user_id, role_id, assigned_at, assigned_by)
        VALUES ($1, $2, now(), $3)
        ON CONFLICT (user_id, role_id) DO UPDATE SET assigned_at = user_role_assignments.assigned_at
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(role_id)
    .bind(assigned_by)
    .fetch_one(pool)
    .await?)
}

pub async fn unassign_role(pool: &PgPool, user_id: Uuid, role_id: Uuid) -> Result<(), RepoError> {
    let result = sqlx::query("DELETE FROM user_role_assignments WHERE user_id = $1 AND role_id = $2")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ==================== Notification channels ====================

pub async fn get_channel(pool: &PgPool, id: Uuid) -> Result<NotificationChannel, RepoError> {
    sqlx::query_as::<_, NotificationChannel>("SELECT * FROM notification_channels WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(RepoError::NotFound)
}

pub async fn list_channels_for_owner(pool: &PgPool, owner_user_id: Uuid) -> Result<Vec<NotificationChannel>, RepoError> {
    Ok(sqlx::query_as::<_, NotificationChannel>(
        "SELECT * FROM notification_channels WHERE owner_user_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn create_channel(pool: &PgPool, owner_user_id: Uuid, input: CreateChannelInput) -> Result<NotificationChannel, RepoError> {
    Ok(sqlx::query_as::<_, NotificationChannel>(
        r#"
        INSERT INTO notification_channels (id, owner_user_id, name, type, config_json, is_verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, false, now(), now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_user_id)
    .bind(&input.name)
    .bind(input.channel_type)
    .bind(&input.config_json)
    .fetch_one(pool)
    .await?)
}

/// Any config edit re-arms verification: a channel whose webhook URL just
/// changed has not actually been exercised yet.
pub async fn update_channel(pool: &PgPool, id: Uuid, input: UpdateChannelInput) -> Result<NotificationChannel, RepoError> {
    let existing = get_channel(pool, id).await?;
    let reverify = input.config_json.is_some();
    Ok(sqlx::query_as::<_, NotificationChannel>(
        r#"
        UPDATE notification_channels
        SET name = $2, config_json = $3, is_verified = CASE WHEN $4 THEN false ELSE is_verified END, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.name.unwrap_or(existing.name))
    .bind(input.config_json.unwrap_or(existing.config_json))
    .bind(reverify)
    .fetch_one(pool)
    .await?)
}

pub async fn delete_channel(pool: &PgPool, id: Uuid) -> Result<(), RepoError> {
    let result = sqlx::query("DELETE FROM notification_channels WHERE id = $1").bind(id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ==================== Query history ====================

#[allow(clippy::too_many_arguments)]
pub async fn record_query_history(
    pool: &PgPool,
    user_id: Uuid,
    query_text: &str,
    status: crate::models::QueryStatus,
    execution_ms: Option<i64>,
    row_count: Option<i64>,
    error_message: Option<&str>,
) -> Result<crate::models::QueryHistoryRecord, RepoError> {
    Ok(sqlx::query_as::<_, crate::models::QueryHistoryRecord>(
        r#"
        INSERT INTO query_history (id, user_id, query_text, status, execution_ms, row_count, error_message, executed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(query_text)
    .bind(status)
    .bind(execution_ms)
    .bind(row_count)
    .bind(error_message)
    .fetch_one(pool)
    .await?)
}

pub async fn list_query_history_for_user(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<crate::models::QueryHistoryRecord>, RepoError> {
    Ok(sqlx::query_as::<_, crate::models::QueryHistoryRecord>(
        "SELECT * FROM query_history WHERE user_id = $1 ORDER BY executed_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Every catalog name ever granted to any role; used as the "known
/// catalogs" set for admins, who bypass the grant table but still need a
/// concrete list to list/search against.
pub async fn list_known_catalogs(pool: &PgPool) -> Result<Vec<String>, RepoError> {
    Ok(sqlx::query_scalar::<_, String>("SELECT DISTINCT catalog_name FROM role_catalog_grants ORDER BY catalog_name")
        .fetch_all(pool)
        .await?)
}
