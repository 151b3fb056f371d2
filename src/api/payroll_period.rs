use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::error::PayrollError;
use crate::engine::generator::GenerationReport;
use crate::engine::summary::PeriodSummary;
use crate::engine::{entries, generator, lifecycle, summary};
use crate::model::payroll_period::PayrollPeriod;
use crate::providers;

#[derive(Deserialize, ToSchema)]
pub struct CreatePeriod {
    #[schema(example = "January 2026")]
    pub name: String,

    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(example = "2026-01-31", value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PeriodQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl PeriodQuery {
    fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(10).clamp(1, 100)
    }

    /// Row offset, widened so a page number near `u32::MAX` cannot overflow.
    fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.per_page() as i64
    }
}

#[derive(Serialize, ToSchema)]
pub struct PeriodListResponse {
    pub data: Vec<PayrollPeriod>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    post,
    path = "/api/periods",
    request_body = CreatePeriod,
    responses(
        (status = 201, description = "Payroll period created", body = PayrollPeriod),
        (status = 400, description = "Invalid date range or name"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn create_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePeriod>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::create_period(
        pool.get_ref(),
        auth.organization_id,
        &payload.name,
        payload.start_date,
        payload.end_date,
        auth.user_id,
    )
    .await?;

    Ok(HttpResponse::Created().json(period))
}

#[utoipa::path(
    get,
    path = "/api/periods",
    params(PeriodQuery),
    responses(
        (status = 200, body = PeriodListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn list_periods(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PeriodQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let page = query.page();
    let per_page = query.per_page();

    let total: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payroll_periods WHERE organization_id = ?")
            .bind(auth.organization_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(PayrollError::from)?;

    let data = sqlx::query_as::<_, PayrollPeriod>(
        "SELECT id, organization_id, name, start_date, end_date, total_days, is_finalized, \
         is_archived, finalized_at, finalized_by, archived_at, archived_by \
         FROM payroll_periods WHERE organization_id = ? \
         ORDER BY start_date DESC, id DESC LIMIT ? OFFSET ?",
    )
    .bind(auth.organization_id)
    .bind(per_page as i64)
    .bind(query.offset())
    .fetch_all(pool.get_ref())
    .await
    .map_err(PayrollError::from)?;

    Ok(HttpResponse::Ok().json(PeriodListResponse { data, page, per_page, total }))
}

#[utoipa::path(
    get,
    path = "/api/periods/{period_id}",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, body = PayrollPeriod),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn get_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::fetch_period(pool.get_ref(), auth.organization_id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/finalize",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "Period finalized", body = PayrollPeriod),
        (status = 404),
        (status = 409, description = "Period already finalized or archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn finalize_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::finalize_period(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/unfinalize",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "Period reopened for edits", body = PayrollPeriod),
        (status = 404),
        (status = 409, description = "Period is not finalized or is archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn unfinalize_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::unfinalize_period(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/archive",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "Period archived", body = PayrollPeriod),
        (status = 404),
        (status = 409, description = "Period is not finalized or already archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn archive_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::archive_period(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/unarchive",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "Period unarchived", body = PayrollPeriod),
        (status = 404),
        (status = 409, description = "Period is not archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn unarchive_period(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period = lifecycle::unarchive_period(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(period))
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/generate",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "Generation report", body = GenerationReport),
        (status = 404),
        (status = 409, description = "Period is finalized or archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let report = generator::generate_entries(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        &config.default_jurisdiction,
        config.generate_concurrency,
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    get,
    path = "/api/periods/{period_id}/summary",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, body = PeriodSummary),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn period_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period_id = path.into_inner();
    lifecycle::fetch_period(pool.get_ref(), auth.organization_id, period_id).await?;
    let rows = entries::list_entries(pool.get_ref(), auth.organization_id, period_id).await?;
    Ok(HttpResponse::Ok().json(summary::summarize(period_id, &rows)))
}

#[utoipa::path(
    get,
    path = "/api/periods/{period_id}/export",
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 200, description = "CSV export of the period's entries", content_type = "text/csv"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Periods"
)]
pub async fn export_period_csv(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period_id = path.into_inner();
    lifecycle::fetch_period(pool.get_ref(), auth.organization_id, period_id).await?;
    let rows = entries::list_entries(pool.get_ref(), auth.organization_id, period_id).await?;
    let names: HashMap<u64, String> = providers::staff::names_by_id(pool.get_ref(), auth.organization_id)
        .await
        .map_err(PayrollError::from)?
        .into_iter()
        .collect();

    let csv = summary::render_csv(&rows, &names);
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"payroll_period_{period_id}.csv\""),
        ))
        .body(csv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_clamps_and_never_overflows() {
        let q = PeriodQuery { page: Some(u32::MAX), per_page: Some(7) };
        assert_eq!(q.per_page(), 7);
        assert_eq!(q.offset(), (u32::MAX as i64 - 1) * 7);

        let defaults = PeriodQuery { page: None, per_page: None };
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.offset(), 0);
    }
}
