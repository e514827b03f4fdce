use serde::{Deserialize, Serialize};
use sqlx::types::{
    chrono::{DateTime, Utc},
    Uuid,
};

// ==================== User ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub auth_provider: AuthProvider,
    pub status: UserStatus,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub display_name: String,
}

// ==================== Role ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ADMIN_ROLE_NAME: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct CreateRoleInput {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleCatalogGrant {
    pub role_id: Uuid,
    pub catalog_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<Uuid>,
}

/// The set of catalogs a user may query. Admins bypass this entirely;
/// `allowed_catalogs` never constructs `All` for a non-admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedCatalogs {
    All,
    Named(Vec<String>),
}

// ==================== Dashboard ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dashboard {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub layout_json: serde_json::Value,
    pub is_public: bool,
    pub parameters_json: serde_json::Value,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDashboardInput {
    pub name: String,
    pub description: Option<String>,
    pub layout_json: serde_json::Value,
    pub parameters_json: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDashboardInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub layout_json: Option<serde_json::Value>,
    pub parameters_json: Option<serde_json::Value>,
    pub is_public: Option<bool>,
}

// ==================== Widget ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Widget {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub name: String,
    pub saved_query_id: Option<Uuid>,
    pub chart_type: String,
    pub chart_config_json: serde_json::Value,
    pub position: serde_json::Value,
    pub responsive_positions_json: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWidgetInput {
    pub name: String,
    pub saved_query_id: Option<Uuid>,
    pub chart_type: String,
    pub chart_config_json: serde_json::Value,
    pub position: serde_json::Value,
    pub responsive_positions_json: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWidgetInput {
    pub name: Option<String>,
    pub saved_query_id: Option<Uuid>,
    pub chart_type: Option<String>,
    pub chart_config_json: Option<serde_json::Value>,
    pub position: Option<serde_json::Value>,
    pub responsive_positions_json: Option<serde_json::Value>,
}

/// Batch body for `POST /dashboards/:id/widgets/batch`, deletes first, then
/// creates, then updates, all in one transaction. A missing id in `update` is
/// skipped rather than aborting the whole batch.
#[derive(Debug, Deserialize)]
pub struct WidgetBatchInput {
    #[serde(default)]
    pub delete: Vec<Uuid>,
    #[serde(default)]
    pub create: Vec<CreateWidgetInput>,
    #[serde(default)]
    pub update: std::collections::HashMap<Uuid, UpdateWidgetInput>,
}

// ==================== Dashboard permissions ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PermissionLevel {
    View,
    Edit,
}

/// The resolver's answer to "what can this user do with this dashboard".
/// Ordered `None < View < Edit < Owner`; `Owner` is never granted, only held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectivePermission {
    None,
    View,
    Edit,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardPermission {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub level: PermissionLevel,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionInput {
    pub user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub level: PermissionLevel,
}

// ==================== Saved query ====================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SavedQuery {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub query_text: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSavedQueryInput {
    pub name: String,
    pub description: Option<String>,
    pub query_text: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSavedQueryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub query_text: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueryHistoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query_text: String,
    pub status: QueryStatus,
    pub execution_ms: Option<i64>,
    pub row_count: Option<i64>,
    pub error_message: Option<String>,
    pub executed_at: DateTime<Utc>,
}

// ==================== Alerts ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ComparisonOperator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Neq,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueryAlert {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub saved_query_id: Uuid,
    pub name: String,
    pub condition_column: String,
    pub operator: ComparisonOperator,
    pub condition_value_string: String,
    pub aggregation: Option<Aggregation>,
    pub check_interval_min: i32,
    pub cooldown_min: i32,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAlertInput {
    pub saved_query_id: Uuid,
    pub name: String,
    pub condition_column: String,
    pub operator: ComparisonOperator,
    pub condition_value_string: String,
    pub aggregation: Option<Aggregation>,
    pub check_interval_min: i32,
    pub cooldown_min: i32,
    #[serde(default)]
    pub channel_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertInput {
    pub name: Option<String>,
    pub condition_column: Option<String>,
    pub operator: Option<ComparisonOperator>,
    pub condition_value_string: Option<String>,
    pub aggregation: Option<Aggregation>,
    pub check_interval_min: Option<i32>,
    pub cooldown_min: Option<i32>,
    pub is_active: Option<bool>,
    pub channel_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertChannelBinding {
    pub alert_id: Uuid,
    pub channel_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum DispatchStatus {
    Sent,
    Partial,
    Error,
    SkippedCooldown,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertHistoryRecord {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub value_observed: String,
    pub dispatch_status: DispatchStatus,
    pub per_channel_details_json: serde_json::Value,
    pub error_message: Option<String>,
}

/// The outcome of evaluating one alert against its saved query, produced by
/// the alert engine and consumed by the scheduler loop.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvaluation {
    pub triggered: bool,
    pub observed_value: String,
    pub error: Option<String>,
}

// ==================== Subscriptions ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SubscriptionFormat {
    Pdf,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DashboardSubscription {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub dashboard_id: Uuid,
    pub name: String,
    pub cron_expression: String,
    pub timezone: String,
    pub format: SubscriptionFormat,
    pub is_active: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionInput {
    pub dashboard_id: Uuid,
    pub name: String,
    pub cron_expression: String,
    pub timezone: String,
    pub format: SubscriptionFormat,
    #[serde(default)]
    pub channel_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionInput {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub timezone: Option<String>,
    pub format: Option<SubscriptionFormat>,
    pub is_active: Option<bool>,
    pub channel_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionChannelBinding {
    pub subscription_id: Uuid,
    pub channel_id: Uuid,
}

// ==================== Notification channels ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
pub enum ChannelType {
    Slack,
    Email,
    GoogleChat,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationChannel {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub config_json: serde_json::Value,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelInput {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub config_json: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChannelInput {
    pub name: Option<String>,
    pub config_json: Option<serde_json::Value>,
}

/// A message ready for a notifier to dispatch; channel-agnostic.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    pub attachment_filenames: Vec<String>,
}
