use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::statutory_rules::{RuleSet, RuleSetDraft};
use crate::rules;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct RulesQuery {
    #[schema(example = "KE")]
    pub jurisdiction: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ActiveRulesQuery {
    #[schema(example = "KE")]
    pub jurisdiction: Option<String>,

    /// Instant to resolve the rule set for. Defaults to now.
    #[param(value_type = Option<String>)]
    #[schema(example = "2026-01-31T00:00:00Z", value_type = Option<String>, format = "date-time")]
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct RulesListResponse {
    pub data: Vec<RuleSet>,
    pub total: usize,
}

#[utoipa::path(
    post,
    path = "/api/rules",
    request_body = RuleSetDraft,
    responses(
        (status = 201, description = "Rule set published", body = RuleSet),
        (status = 400, description = "Rule set failed validation"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory Rules"
)]
pub async fn publish_rules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RuleSetDraft>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let published = rules::publish_rules(
        pool.get_ref(),
        auth.organization_id,
        auth.user_id,
        payload.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Created().json(published))
}

#[utoipa::path(
    get,
    path = "/api/rules/active",
    params(ActiveRulesQuery),
    responses(
        (status = 200, body = RuleSet),
        (status = 404, description = "No rule set in force")
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory Rules"
)]
pub async fn get_active_rules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<ActiveRulesQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let jurisdiction = query
        .jurisdiction
        .clone()
        .unwrap_or_else(|| config.default_jurisdiction.clone());
    let rule_set = match query.as_of {
        // historical lookups bypass the cache
        Some(as_of) => rules::fetch_active(pool.get_ref(), &jurisdiction, as_of).await?,
        None => rules::active_rules(pool.get_ref(), &jurisdiction).await?.as_ref().clone(),
    };
    Ok(HttpResponse::Ok().json(rule_set))
}

#[utoipa::path(
    get,
    path = "/api/rules",
    params(RulesQuery),
    responses(
        (status = 200, body = RulesListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Statutory Rules"
)]
pub async fn list_rules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<RulesQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let jurisdiction = query
        .jurisdiction
        .clone()
        .unwrap_or_else(|| config.default_jurisdiction.clone());
    let versions = rules::list_rules(pool.get_ref(), &jurisdiction).await?;
    Ok(HttpResponse::Ok().json(RulesListResponse { total: versions.len(), data: versions }))
}
