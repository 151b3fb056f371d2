use crate::api::payroll_entry::{
    AddStaff, EntryListResponse, EntryQuery, EntryResponse, MarkPaid, UpdateEntry,
};
use crate::api::payroll_period::{CreatePeriod, PeriodListResponse, PeriodQuery};
use crate::api::statutory_rules::{ActiveRulesQuery, RulesListResponse, RulesQuery};
use crate::engine::deductions::{CalculationValidation, DeductionBreakdown, NssfBreakdown};
use crate::engine::generator::{GenerationFailure, GenerationReport};
use crate::engine::summary::PeriodSummary;
use crate::model::payroll_period::{PayrollPeriod, PeriodState};
use crate::model::staff::PayMethod;
use crate::model::statutory_rules::{PayeBand, RuleSet, RuleSetDraft};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payroll Engine API",
        version = "1.0.0",
        description = r#"
## Payroll Computation Engine

This API powers the **payroll engine** of an HR platform: it turns attendance and
pay configuration into auditable, integer-cents payroll figures.

### 🔹 Key Features
- **Payroll Periods**
  - Create periods and walk them through Draft → Finalized → Archived
- **Payroll Generation**
  - One computed entry per staff member: proration, PAYE, NSSF tiers, levies
- **Payroll Entries**
  - Reprice entries in draft, mark them paid once finalized
- **Statutory Rules**
  - Versioned tax tables with one active version per jurisdiction

### 🔐 Security
All endpoints are protected using **JWT Bearer authentication** minted by the
identity service. Payroll operations require the **Admin**, **HR** or **System**
role; staff can read their own entries.

### 📦 Response Format
- JSON-based RESTful responses, all money as integer cents
- Pagination supported for list endpoints
- CSV export for finalized period figures

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::payroll_period::create_period,
        crate::api::payroll_period::list_periods,
        crate::api::payroll_period::get_period,
        crate::api::payroll_period::finalize_period,
        crate::api::payroll_period::unfinalize_period,
        crate::api::payroll_period::archive_period,
        crate::api::payroll_period::unarchive_period,
        crate::api::payroll_period::generate_payroll,
        crate::api::payroll_period::period_summary,
        crate::api::payroll_period::export_period_csv,

        crate::api::payroll_entry::add_staff,
        crate::api::payroll_entry::list_entries,
        crate::api::payroll_entry::entry_for_staff,
        crate::api::payroll_entry::get_entry,
        crate::api::payroll_entry::update_entry,
        crate::api::payroll_entry::mark_paid,
        crate::api::payroll_entry::unmark_paid,

        crate::api::statutory_rules::publish_rules,
        crate::api::statutory_rules::get_active_rules,
        crate::api::statutory_rules::list_rules
    ),
    components(
        schemas(
            CreatePeriod,
            PeriodQuery,
            PeriodListResponse,
            PayrollPeriod,
            PeriodState,
            AddStaff,
            UpdateEntry,
            MarkPaid,
            EntryQuery,
            EntryResponse,
            EntryListResponse,
            PayMethod,
            GenerationReport,
            GenerationFailure,
            PeriodSummary,
            DeductionBreakdown,
            NssfBreakdown,
            CalculationValidation,
            RuleSet,
            RuleSetDraft,
            PayeBand,
            RulesQuery,
            ActiveRulesQuery,
            RulesListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Payroll Periods", description = "Period lifecycle and batch generation APIs"),
        (name = "Payroll Entries", description = "Per-staff payroll figure APIs"),
        (name = "Statutory Rules", description = "Versioned statutory deduction table APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
