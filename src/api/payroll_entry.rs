use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::engine::deductions::DeductionBreakdown;
use crate::engine::{entries, generator};
use crate::model::payroll_entry::PayrollEntry;
use crate::model::staff::PayMethod;

#[derive(Deserialize, ToSchema)]
pub struct AddStaff {
    #[schema(example = 1001)]
    pub staff_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateEntry {
    /// Overrides the pay method for this entry only.
    pub pay_method: Option<PayMethod>,

    #[schema(example = 250000)]
    pub allowances_cents: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkPaid {
    #[serde(default)]
    #[schema(example = "MPESA-QW12RT34")]
    pub payment_reference: Option<String>,
}

/// Entry as served to clients: the stored row with the deduction breakdown
/// parsed back out of its snapshot column.
#[derive(Serialize, ToSchema)]
pub struct EntryResponse {
    pub id: u64,
    pub payroll_period_id: u64,
    pub staff_id: u64,
    pub base_salary_cents: i64,
    #[schema(example = "prorated")]
    pub pay_method: String,
    pub worked_units: f64,
    pub paid_leave_units: u32,
    pub unpaid_leave_units: u32,
    pub absent_units: u32,
    pub payable_base_cents: i64,
    pub allowances_total_cents: i64,
    pub deductions_total_cents: i64,
    pub gross_pay_cents: i64,
    pub net_pay_cents: i64,
    pub deductions: Option<DeductionBreakdown>,
    pub is_paid: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
}

impl From<PayrollEntry> for EntryResponse {
    fn from(entry: PayrollEntry) -> Self {
        let deductions = entry.deduction_details.as_deref().and_then(|raw| {
            serde_json::from_str::<DeductionBreakdown>(raw)
                .map_err(|e| {
                    tracing::warn!(
                        entry_id = entry.id,
                        error = %e,
                        "Stored deduction breakdown is unreadable"
                    );
                })
                .ok()
        });
        EntryResponse {
            id: entry.id,
            payroll_period_id: entry.payroll_period_id,
            staff_id: entry.staff_id,
            base_salary_cents: entry.base_salary_cents,
            pay_method: entry.pay_method,
            worked_units: entry.worked_units,
            paid_leave_units: entry.paid_leave_units,
            unpaid_leave_units: entry.unpaid_leave_units,
            absent_units: entry.absent_units,
            payable_base_cents: entry.payable_base_cents,
            allowances_total_cents: entry.allowances_total_cents,
            deductions_total_cents: entry.deductions_total_cents,
            gross_pay_cents: entry.gross_pay_cents,
            net_pay_cents: entry.net_pay_cents,
            deductions,
            is_paid: entry.is_paid,
            paid_at: entry.paid_at,
            payment_reference: entry.payment_reference,
        }
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct EntryQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl EntryQuery {
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
pub struct EntryListResponse {
    pub data: Vec<EntryResponse>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[utoipa::path(
    post,
    path = "/api/periods/{period_id}/entries",
    request_body = AddStaff,
    params(
        ("period_id", description = "Payroll period ID")
    ),
    responses(
        (status = 201, description = "Entry created", body = EntryResponse),
        (status = 404, description = "Period or staff member not found"),
        (status = 409, description = "Staff already has an entry, or period is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn add_staff(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<AddStaff>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let entry = generator::add_staff_to_payroll(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        payload.staff_id,
        &config.default_jurisdiction,
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Created().json(EntryResponse::from(entry)))
}

#[utoipa::path(
    get,
    path = "/api/periods/{period_id}/entries",
    params(
        ("period_id", description = "Payroll period ID"),
        EntryQuery
    ),
    responses(
        (status = 200, body = EntryListResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn list_entries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<EntryQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let period_id = path.into_inner();
    let page = query.page();
    let per_page = query.per_page();

    let rows = entries::list_entries_page(
        pool.get_ref(),
        auth.organization_id,
        period_id,
        per_page as i64,
        query.offset(),
    )
    .await?;
    let total = entries::count_entries(pool.get_ref(), auth.organization_id, period_id).await?;

    let data: Vec<EntryResponse> = rows.into_iter().map(EntryResponse::from).collect();
    Ok(HttpResponse::Ok().json(EntryListResponse { data, page, per_page, total }))
}

#[utoipa::path(
    get,
    path = "/api/periods/{period_id}/entries/staff/{staff_id}",
    params(
        ("period_id", description = "Payroll period ID"),
        ("staff_id", description = "Staff member ID")
    ),
    responses(
        (status = 200, body = EntryResponse),
        (status = 403, description = "Staff may only view their own entry"),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn entry_for_staff(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    let (period_id, staff_id) = path.into_inner();
    auth.require_self_or_payroll_manager(staff_id)?;

    let entry =
        entries::entry_for_staff(pool.get_ref(), auth.organization_id, period_id, staff_id)
            .await?;
    Ok(HttpResponse::Ok().json(EntryResponse::from(entry)))
}

#[utoipa::path(
    get,
    path = "/api/entries/{entry_id}",
    params(
        ("entry_id", description = "Payroll entry ID")
    ),
    responses(
        (status = 200, body = EntryResponse),
        (status = 403),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn get_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let entry = entries::fetch_entry(pool.get_ref(), auth.organization_id, path.into_inner())
        .await?;
    auth.require_self_or_payroll_manager(entry.staff_id)?;

    Ok(HttpResponse::Ok().json(EntryResponse::from(entry)))
}

#[utoipa::path(
    put,
    path = "/api/entries/{entry_id}",
    request_body = UpdateEntry,
    params(
        ("entry_id", description = "Payroll entry ID")
    ),
    responses(
        (status = 200, description = "Entry repriced", body = EntryResponse),
        (status = 400, description = "Negative allowances"),
        (status = 404),
        (status = 409, description = "Period is not a draft")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn update_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEntry>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let entry = entries::update_entry(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        &config.default_jurisdiction,
        payload.pay_method,
        payload.allowances_cents,
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(EntryResponse::from(entry)))
}

#[utoipa::path(
    post,
    path = "/api/entries/{entry_id}/pay",
    request_body = MarkPaid,
    params(
        ("entry_id", description = "Payroll entry ID")
    ),
    responses(
        (status = 200, description = "Entry marked paid", body = EntryResponse),
        (status = 400, description = "Already paid"),
        (status = 404),
        (status = 409, description = "Period is archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn mark_paid(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<MarkPaid>>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let payment_reference = payload.and_then(|body| body.into_inner().payment_reference);
    let entry = entries::mark_entry_paid(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        payment_reference,
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(EntryResponse::from(entry)))
}

#[utoipa::path(
    post,
    path = "/api/entries/{entry_id}/unpay",
    params(
        ("entry_id", description = "Payroll entry ID")
    ),
    responses(
        (status = 200, description = "Payment mark reverted", body = EntryResponse),
        (status = 400, description = "Not marked paid"),
        (status = 404),
        (status = 409, description = "Period is archived")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll Entries"
)]
pub async fn unmark_paid(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_payroll_manager()?;

    let entry = entries::unmark_entry_paid(
        pool.get_ref(),
        auth.organization_id,
        path.into_inner(),
        auth.user_id,
    )
    .await?;
    Ok(HttpResponse::Ok().json(EntryResponse::from(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_clamps_and_never_overflows() {
        let q = EntryQuery { page: Some(u32::MAX), per_page: Some(1_000) };
        assert_eq!(q.per_page(), 100);
        assert_eq!(q.offset(), (u32::MAX as i64 - 1) * 100);

        let defaults = EntryQuery { page: None, per_page: None };
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.per_page(), 10);
        assert_eq!(defaults.offset(), 0);

        let zeroes = EntryQuery { page: Some(0), per_page: Some(0) };
        assert_eq!(zeroes.page(), 1);
        assert_eq!(zeroes.per_page(), 1);
        assert_eq!(zeroes.offset(), 0);
    }
}
