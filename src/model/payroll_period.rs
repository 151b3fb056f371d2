use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle position of a period, derived from the two stored flags.
/// Archive implies finalized; there is no Draft+Archived combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    Draft,
    Finalized,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 12,
        "organization_id": 1,
        "name": "January 2026",
        "start_date": "2026-01-01",
        "end_date": "2026-01-31",
        "total_days": 31,
        "is_finalized": false,
        "is_archived": false,
        "finalized_at": null,
        "finalized_by": null,
        "archived_at": null,
        "archived_by": null
    })
)]
pub struct PayrollPeriod {
    #[schema(example = 12)]
    pub id: u64,

    #[schema(example = 1)]
    pub organization_id: u64,

    #[schema(example = "January 2026")]
    pub name: String,

    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,

    #[schema(example = "2026-01-31", value_type = String, format = "date")]
    pub end_date: NaiveDate,

    /// Inclusive day count, computed once at creation.
    #[schema(example = 31)]
    pub total_days: u32,

    #[schema(example = false)]
    pub is_finalized: bool,

    #[schema(example = false)]
    pub is_archived: bool,

    #[schema(example = json!(null), value_type = Option<String>, format = "date-time")]
    pub finalized_at: Option<DateTime<Utc>>,

    #[schema(example = json!(null), nullable = true)]
    pub finalized_by: Option<u64>,

    #[schema(example = json!(null), value_type = Option<String>, format = "date-time")]
    pub archived_at: Option<DateTime<Utc>>,

    #[schema(example = json!(null), nullable = true)]
    pub archived_by: Option<u64>,
}

impl PayrollPeriod {
    pub fn state(&self) -> PeriodState {
        if self.is_archived {
            PeriodState::Archived
        } else if self.is_finalized {
            PeriodState::Finalized
        } else {
            PeriodState::Draft
        }
    }
}
