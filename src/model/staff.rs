use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

/// How a staff member's payable base is derived for a period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayMethod {
    /// Full configured monthly salary regardless of attendance.
    Fixed,
    /// Monthly salary scaled by worked hours over the period's nominal hours.
    Prorated,
    /// Hourly rate times worked hours.
    Hourly,
    /// Shift rate per 8-hour unit of worked time.
    PerShift,
}

/// Staff profile as served by the staff-profile collaborator. This service
/// only reads these rows; pay configuration is maintained elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1001,
        "organization_id": 1,
        "full_name": "Achieng Odhiambo",
        "status": "active",
        "pay_method": "prorated",
        "monthly_salary_cents": 5000000,
        "hourly_rate_cents": 25000,
        "shift_rate_cents": 180000,
        "daily_rate_cents": 230000
    })
)]
pub struct StaffProfile {
    #[schema(example = 1001)]
    pub id: u64,

    #[schema(example = 1)]
    pub organization_id: u64,

    #[schema(example = "Achieng Odhiambo")]
    pub full_name: String,

    #[schema(example = "active")]
    pub status: String,

    /// Stored as text by the collaborator; parsed into [`PayMethod`] before
    /// any computation.
    #[schema(example = "prorated")]
    pub pay_method: String,

    #[schema(example = 5000000)]
    pub monthly_salary_cents: i64,

    #[schema(example = 25000)]
    pub hourly_rate_cents: i64,

    #[schema(example = 180000)]
    pub shift_rate_cents: i64,

    #[schema(example = 230000)]
    pub daily_rate_cents: i64,
}

impl StaffProfile {
    pub fn pay_method(&self) -> Result<PayMethod, String> {
        self.pay_method
            .parse()
            .map_err(|_| format!("staff {} has unknown pay method '{}'", self.id, self.pay_method))
    }

    /// The configured rate backing the given pay method.
    pub fn rate_for(&self, method: PayMethod) -> i64 {
        match method {
            PayMethod::Fixed | PayMethod::Prorated => self.monthly_salary_cents,
            PayMethod::Hourly => self.hourly_rate_cents,
            PayMethod::PerShift => self.shift_rate_cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pay_method_round_trips_through_strings() {
        assert_eq!("per_shift".parse::<PayMethod>().unwrap(), PayMethod::PerShift);
        assert_eq!(PayMethod::PerShift.as_ref(), "per_shift");
        assert_eq!("fixed".parse::<PayMethod>().unwrap(), PayMethod::Fixed);
        assert!("weekly".parse::<PayMethod>().is_err());
    }

    #[test]
    fn unknown_stored_method_is_reported() {
        let staff = StaffProfile {
            id: 7,
            organization_id: 1,
            full_name: "Test".to_string(),
            status: "active".to_string(),
            pay_method: "weekly".to_string(),
            monthly_salary_cents: 0,
            hourly_rate_cents: 0,
            shift_rate_cents: 0,
            daily_rate_cents: 0,
        };
        let err = staff.pay_method().unwrap_err();
        assert!(err.contains("unknown pay method"));
    }
}
