use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Hard failures surfaced to callers. Calculation anomalies (negative net
/// pay, uncovered taxable pay) are deliberately not here: they are recorded
/// on the entry's deduction breakdown so a batch run can complete.
#[derive(Debug, Display)]
pub enum PayrollError {
    /// Malformed input rejected before any persistence.
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    /// Mutation attempted on a finalized period.
    #[display(fmt = "payroll period is finalized")]
    PeriodFinalized,

    /// Archive requested on a period that was never finalized.
    #[display(fmt = "payroll period is not finalized")]
    NotFinalized,

    /// Mutation attempted on an archived period.
    #[display(fmt = "payroll period is archived")]
    PeriodArchived,

    /// Unarchive requested on a period that is not archived.
    #[display(fmt = "payroll period is not archived")]
    NotArchived,

    #[display(fmt = "staff {} already has an entry in this period", staff_id)]
    DuplicateEntry { staff_id: u64 },

    #[display(fmt = "database error")]
    Database(sqlx::Error),

    #[display(fmt = "{}", _0)]
    Internal(String),
}

impl From<sqlx::Error> for PayrollError {
    fn from(err: sqlx::Error) -> Self {
        PayrollError::Database(err)
    }
}

/// SQLSTATE 23000 is MySQL's integrity-constraint violation; with the
/// `(payroll_period_id, staff_id)` unique key it means a concurrent writer
/// won the insert race.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23000"),
        _ => false,
    }
}

impl ResponseError for PayrollError {
    fn status_code(&self) -> StatusCode {
        match self {
            PayrollError::Validation(_) => StatusCode::BAD_REQUEST,
            PayrollError::NotFound(_) => StatusCode::NOT_FOUND,
            PayrollError::PeriodFinalized
            | PayrollError::NotFinalized
            | PayrollError::PeriodArchived
            | PayrollError::NotArchived
            | PayrollError::DuplicateEntry { .. } => StatusCode::CONFLICT,
            PayrollError::Database(_) | PayrollError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let PayrollError::Database(e) = self {
            tracing::error!(error = %e, "Database failure");
            // do not leak driver details to the caller
            return HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            }));
        }

        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            PayrollError::Validation("bad dates".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PayrollError::NotFound("payroll period").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(PayrollError::PeriodFinalized.status_code(), StatusCode::CONFLICT);
        assert_eq!(PayrollError::NotFinalized.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            PayrollError::DuplicateEntry { staff_id: 9 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PayrollError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_name_the_condition() {
        assert_eq!(
            PayrollError::DuplicateEntry { staff_id: 9 }.to_string(),
            "staff 9 already has an entry in this period"
        );
        assert_eq!(PayrollError::NotFound("payroll period").to_string(), "payroll period not found");
        assert_eq!(PayrollError::NotFinalized.to_string(), "payroll period is not finalized");
    }
}
