#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::participant::Participant;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Derived from the participants' confirmation flags, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripStatus {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "partially_confirmed")]
    PartiallyConfirmed,
    #[serde(rename = "confirmed")]
    Confirmed,
}

impl TripStatus {
    pub fn derive(participants: &[Participant]) -> Self {
        let pending = participants.iter().filter(|p| !p.is_confirmed).count();
        if pending == 0 {
            return TripStatus::Confirmed;
        }
        let confirmed_invitees = participants
            .iter()
            .filter(|p| !p.is_owner && p.is_confirmed)
            .count();
        if confirmed_invitees > 0 {
            TripStatus::PartiallyConfirmed
        } else {
            TripStatus::Created
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Created => "created",
            TripStatus::PartiallyConfirmed => "partially_confirmed",
            TripStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
