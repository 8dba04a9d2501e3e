use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{participant::Participant, trip::Trip},
    validation::NormalizedTrip,
};

/// Participant row to be written as part of trip creation.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub name: Option<String>,
    pub email: String,
    pub is_owner: bool,
    pub is_confirmed: bool,
}

#[derive(Clone)]
pub struct TripStore {
    db: DbPool,
}

impl TripStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Inserts the trip and its full participant set in one transaction, so a
    /// trip without its participants is never observable. Returns the new id.
    pub async fn create_trip(
        &self,
        request: &NormalizedTrip,
        participants: &[NewParticipant],
    ) -> Result<String, AppError> {
        let trip_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO trips (id, destination, starts_at, ends_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&trip_id)
        .bind(&request.destination)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        for participant in participants {
            sqlx::query(
                "INSERT INTO participants (id, trip_id, name, email, is_owner, is_confirmed, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&trip_id)
            .bind(&participant.name)
            .bind(&participant.email)
            .bind(participant.is_owner)
            .bind(participant.is_confirmed)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(trip_id)
    }

    pub async fn find_trip(&self, trip_id: &str) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(
            "SELECT id, destination, starts_at, ends_at, created_at FROM trips WHERE id = ?1",
        )
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(trip)
    }

    pub async fn list_participants(&self, trip_id: &str) -> Result<Vec<Participant>, AppError> {
        let participants = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, name, email, is_owner, is_confirmed, created_at FROM participants WHERE trip_id = ?1 ORDER BY is_owner DESC, id",
        )
        .bind(trip_id)
        .fetch_all(&self.db)
        .await?;
        Ok(participants)
    }

    pub async fn find_participant(
        &self,
        trip_id: &str,
        participant_id: &str,
    ) -> Result<Option<Participant>, AppError> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, name, email, is_owner, is_confirmed, created_at FROM participants WHERE id = ?1 AND trip_id = ?2",
        )
        .bind(participant_id)
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(participant)
    }

    pub async fn find_owner(&self, trip_id: &str) -> Result<Option<Participant>, AppError> {
        let participant = sqlx::query_as::<_, Participant>(
            "SELECT id, trip_id, name, email, is_owner, is_confirmed, created_at FROM participants WHERE trip_id = ?1 AND is_owner = 1",
        )
        .bind(trip_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(participant)
    }

    /// Setting an already-set flag is a semantic no-op, which is what makes
    /// duplicate confirmations safe.
    pub async fn mark_confirmed(&self, participant_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE participants SET is_confirmed = 1 WHERE id = ?1")
            .bind(participant_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
