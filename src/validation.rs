use chrono::{DateTime, NaiveDate, Utc};
use lettre::Address;
use serde::Deserialize;

use crate::error::AppError;

pub const MIN_DESTINATION_LEN: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct TripOwner {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTripRequest {
    pub destination: String,
    pub starts_at: String,
    pub ends_at: String,
    pub owner: TripOwner,
    #[serde(default)]
    pub emails_to_invite: Vec<String>,
}

/// A creation request that passed validation, with dates in canonical form.
/// Emails are carried through exactly as submitted.
#[derive(Debug, Clone)]
pub struct NormalizedTrip {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub owner: TripOwner,
    pub emails_to_invite: Vec<String>,
}

/// Checks a creation request against `now` and normalizes it. Pure; callers
/// inject the clock so the date rules stay deterministic under test.
///
/// Rules run in order and the first failure wins: shape checks, then the
/// start-in-the-past rule, then the date-range rule. Equality is valid in
/// both date rules (a trip may start right now and may span a single day).
pub fn validate_create_trip(
    request: CreateTripRequest,
    now: DateTime<Utc>,
) -> Result<NormalizedTrip, AppError> {
    if request.destination.chars().count() < MIN_DESTINATION_LEN {
        return Err(AppError::InvalidRequest {
            field: "destination",
            reason: format!("must be at least {MIN_DESTINATION_LEN} characters long"),
        });
    }
    if request.owner.name.trim().is_empty() {
        return Err(AppError::InvalidRequest {
            field: "owner.name",
            reason: "must not be empty".into(),
        });
    }
    check_email("owner.email", &request.owner.email)?;
    for email in &request.emails_to_invite {
        check_email("emails_to_invite", email)?;
    }

    let starts_at = parse_datetime("starts_at", &request.starts_at)?;
    let ends_at = parse_datetime("ends_at", &request.ends_at)?;

    if starts_at < now {
        return Err(AppError::PastStartDate);
    }
    if ends_at < starts_at {
        return Err(AppError::InvalidDateRange);
    }

    Ok(NormalizedTrip {
        destination: request.destination,
        starts_at,
        ends_at,
        owner: request.owner,
        emails_to_invite: request.emails_to_invite,
    })
}

fn check_email(field: &'static str, value: &str) -> Result<(), AppError> {
    value
        .parse::<Address>()
        .map(|_| ())
        .map_err(|_| AppError::InvalidRequest {
            field,
            reason: format!("\"{value}\" is not a valid email address"),
        })
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD`, which is read as
/// midnight UTC.
fn parse_datetime(field: &'static str, value: &str) -> Result<DateTime<Utc>, AppError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(AppError::InvalidRequest {
        field,
        reason: format!("\"{value}\" is not a valid date"),
    })
}
