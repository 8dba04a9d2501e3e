use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::{
    error::AppError,
    models::trip::TripStatus,
    services::lifecycle::ParticipantRef,
    state::AppState,
    validation::{validate_create_trip, CreateTripRequest},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/:trip_id", get(trip_details))
        .route("/trips/:trip_id/confirm", get(confirm_trip))
        .route("/trips/:trip_id/participants", get(participants_list))
        .route(
            "/trips/:trip_id/participants/:participant_id/confirm",
            get(confirm_participant),
        )
}

async fn create_trip(
    State(state): State<AppState>,
    Json(body): Json<CreateTripRequest>,
) -> Result<impl IntoResponse, AppError> {
    let normalized = validate_create_trip(body, Utc::now())?;
    let trip_id = state.lifecycle.create_trip(normalized).await?;

    // The trip is committed at this point; a failed delivery must not undo it.
    if let Err(err) = state.lifecycle.request_confirmation_emails(&trip_id).await {
        error!(trip_id = %trip_id, "confirmation email delivery failed: {err}");
    }

    Ok((StatusCode::CREATED, Json(json!({ "id": trip_id }))))
}

#[derive(Serialize)]
struct TripDetails {
    id: String,
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: TripStatus,
}

async fn trip_details(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<TripDetails>, AppError> {
    let (trip, _participants, status) = state.lifecycle.trip_overview(&trip_id).await?;
    Ok(Json(TripDetails {
        id: trip.id,
        destination: trip.destination,
        starts_at: trip.starts_at,
        ends_at: trip.ends_at,
        status,
    }))
}

#[derive(Serialize)]
struct ParticipantSummary {
    id: String,
    name: Option<String>,
    email: String,
    is_owner: bool,
    is_confirmed: bool,
}

async fn participants_list(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<ParticipantSummary>>, AppError> {
    let (_trip, participants, _status) = state.lifecycle.trip_overview(&trip_id).await?;
    let summaries = participants
        .into_iter()
        .map(|participant| ParticipantSummary {
            id: participant.id,
            name: participant.name,
            email: participant.email,
            is_owner: participant.is_owner,
            is_confirmed: participant.is_confirmed,
        })
        .collect();
    Ok(Json(summaries))
}

async fn confirm_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Owner)
        .await?;
    Ok(Json(json!({ "confirmed": true })))
}

async fn confirm_participant(
    State(state): State<AppState>,
    Path((trip_id, participant_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Id(participant_id))
        .await?;
    Ok(Json(json!({ "confirmed": true })))
}
