//! Identity & role resolver (4.A), the authorisation fabric. Every call is
//! a fresh store lookup; nothing here is cached, because grants mutate at
//! human timescales but must take effect immediately for safety.

use mitsume_core::models::{
    AllowedCatalogs, EffectivePermission, GrantPermissionInput, PermissionLevel, ADMIN_ROLE_NAME,
};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub async fn is_admin(pool: &PgPool, user_id: Uuid) -> Result<bool, RoleError> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT 1 FROM user_role_assignments ura
        JOIN roles r ON r.id = ura.role_id
        WHERE ura.user_id = $1 AND r.name = $2
        "#,
    )
    .bind(user_id)
    .bind(ADMIN_ROLE_NAME)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Returns `All` for admins (who bypass the catalog allow-list entirely);
/// otherwise the deduplicated union of catalog grants across the user's
/// roles.
pub async fn allowed_catalogs(pool: &PgPool, user_id: Uuid) -> Result<AllowedCatalogs, RoleError> {
    if is_admin(pool, user_id).await? {
        return Ok(AllowedCatalogs::All);
    }

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT rcg.catalog_name
        FROM user_role_assignments ura
        JOIN role_catalog_grants rcg ON rcg.role_id = ura.role_id
        WHERE ura.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(AllowedCatalogs::Named(rows.into_iter().map(|(name,)| name).collect()))
}

/// Algorithm (4.A):
/// 1. Owner short-circuits everything, including admin status.
/// 2. Admin resolves to at least `edit` on every dashboard they don't own,
///    regardless of any explicit grant (§8 property 2) — checked before the
///    grant lookups so a `view` grant can never pull an admin down.
/// 3. An explicit user grant, if any, wins outright (even over a stronger
///    role grant, direct beats derived).
/// 4. Otherwise the maximum role-grant level across the user's roles.
/// 5. Otherwise `view` if the dashboard is public.
/// 6. Otherwise `none`.
pub async fn permission_level(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<EffectivePermission, RoleError> {
    let owner_user_id: Option<(Uuid,)> = sqlx::query_as("SELECT owner_user_id FROM dashboards WHERE id = $1")
        .bind(dashboard_id)
        .fetch_optional(pool)
        .await?;
    let Some((owner_user_id,)) = owner_user_id else {
        return Err(RoleError::NotFound);
    };
    if owner_user_id == user_id {
        return Ok(EffectivePermission::Owner);
    }

    if is_admin(pool, user_id).await? {
        return Ok(EffectivePermission::Edit);
    }

    let user_grant: Option<(PermissionLevel,)> = sqlx::query_as(
        "SELECT level FROM dashboard_permissions WHERE dashboard_id = $1 AND user_id = $2",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    if let Some((level,)) = user_grant {
        return Ok(level_to_effective(level));
    }

    // `level` is a text column, so ordering in SQL would be lexical
    // (`'edit' < 'view'`); fetch every role grant and take the max via the
    // derived `Ord` on `PermissionLevel` instead.
    let role_grants: Vec<(PermissionLevel,)> = sqlx::query_as(
        r#"
        SELECT dp.level
        FROM dashboard_permissions dp
        JOIN user_role_assignments ura ON ura.role_id = dp.role_id
        WHERE dp.dashboard_id = $1 AND ura.user_id = $2
        "#,
    )
    .bind(dashboard_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    if let Some(max_level) = role_grants.into_iter().map(|(level,)| level).max() {
        return Ok(level_to_effective(max_level));
    }

    let is_public: (bool,) = sqlx::query_as("SELECT is_public FROM dashboards WHERE id = $1")
        .bind(dashboard_id)
        .fetch_one(pool)
        .await?;
    if is_public.0 {
        return Ok(EffectivePermission::View);
    }

    Ok(EffectivePermission::None)
}

fn level_to_effective(level: PermissionLevel) -> EffectivePermission {
    match level {
        PermissionLevel::View => EffectivePermission::View,
        PermissionLevel::Edit => EffectivePermission::Edit,
    }
}

pub async fn can_edit(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<bool, RoleError> {
    Ok(matches!(
        permission_level(pool, dashboard_id, user_id).await?,
        EffectivePermission::Owner | EffectivePermission::Edit
    ))
}

pub async fn can_view(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<bool, RoleError> {
    Ok(!matches!(permission_level(pool, dashboard_id, user_id).await?, EffectivePermission::None))
}

/// Fails with `InvalidRequest` if neither or both of user/role are set, the
/// level isn't view/edit, or the target is the dashboard owner.
pub async fn grant(
    pool: &PgPool,
    dashboard_id: Uuid,
    grantor: Uuid,
    input: GrantPermissionInput,
) -> Result<Uuid, RoleError> {
    let owner_user_id: (Uuid,) = sqlx::query_as("SELECT owner_user_id FROM dashboards WHERE id = $1")
        .bind(dashboard_id)
        .fetch_optional(pool)
        .await?
        .ok_or(RoleError::NotFound)?;

    match (input.user_id, input.role_id) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(RoleError::InvalidRequest("exactly one of user_id/role_id must be set".to_string()))
        }
        (Some(uid), None) if uid == owner_user_id.0 => {
            return Err(RoleError::InvalidRequest("self-grant on the owner is rejected".to_string()))
        }
        _ => {}
    }

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO dashboard_permissions (id, dashboard_id, user_id, role_id, level, granted_at, granted_by)
        VALUES ($1, $2, $3, $4, $5, now(), $6)
        "#,
    )
    .bind(id)
    .bind(dashboard_id)
    .bind(input.user_id)
    .bind(input.role_id)
    .bind(input.level)
    .bind(grantor)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Idempotent at the permission-id level: a missing id is `NotFound`.
pub async fn revoke(pool: &PgPool, permission_id: Uuid) -> Result<(), RoleError> {
    let result = sqlx::query("DELETE FROM dashboard_permissions WHERE id = $1").bind(permission_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(RoleError::NotFound);
    }
    Ok(())
}

pub async fn set_visibility(pool: &PgPool, dashboard_id: Uuid, public: bool) -> Result<(), RoleError> {
    let result = sqlx::query("UPDATE dashboards SET is_public = $2, updated_at = now() WHERE id = $1")
        .bind(dashboard_id)
        .bind(public)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RoleError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_spec() {
        assert!(EffectivePermission::None < EffectivePermission::View);
        assert!(EffectivePermission::View < EffectivePermission::Edit);
        assert!(EffectivePermission::Edit < EffectivePermission::Owner);
    }
}
