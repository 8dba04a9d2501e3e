use std::sync::Arc;

use tracing::info;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{
        participant::Participant,
        trip::{Trip, TripStatus},
    },
    services::{
        mailer::{format_date_pt_br, MailMessage, Notifier},
        store::{NewParticipant, TripStore},
    },
    validation::NormalizedTrip,
};

/// Which participant a confirmation request points at. The owner's emailed
/// link only carries the trip id, invitee links carry their participant id.
#[derive(Debug, Clone)]
pub enum ParticipantRef {
    Owner,
    Id(String),
}

#[derive(Clone)]
pub struct TripLifecycle {
    store: TripStore,
    notifier: Arc<dyn Notifier>,
    config: AppConfig,
}

impl TripLifecycle {
    pub fn new(store: TripStore, notifier: Arc<dyn Notifier>, config: AppConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Persists the trip with its owner (confirmed) and invitees (pending).
    pub async fn create_trip(&self, request: NormalizedTrip) -> Result<String, AppError> {
        let participants = self.participant_set(&request);
        let trip_id = self.store.create_trip(&request, &participants).await?;
        info!(trip_id = %trip_id, destination = %request.destination, "trip created");
        Ok(trip_id)
    }

    fn participant_set(&self, request: &NormalizedTrip) -> Vec<NewParticipant> {
        let mut participants = vec![NewParticipant {
            name: Some(request.owner.name.clone()),
            email: request.owner.email.clone(),
            is_owner: true,
            is_confirmed: true,
        }];
        let mut seen: Vec<&str> = vec![request.owner.email.as_str()];
        for email in &request.emails_to_invite {
            if self.config.dedupe_invitees {
                if seen.contains(&email.as_str()) {
                    continue;
                }
                seen.push(email.as_str());
            }
            participants.push(NewParticipant {
                name: None,
                email: email.clone(),
                is_owner: false,
                is_confirmed: false,
            });
        }
        participants
    }

    /// Emails a confirmation link for the trip: always to the owner, and to
    /// every still-pending invitee when invitee notification is switched on.
    /// The trip is already committed when this runs, so a delivery failure is
    /// returned to the caller without touching the stored state.
    pub async fn request_confirmation_emails(&self, trip_id: &str) -> Result<(), AppError> {
        let trip = self
            .store
            .find_trip(trip_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let participants = self.store.list_participants(trip_id).await?;
        let owner = participants
            .iter()
            .find(|p| p.is_owner)
            .ok_or(AppError::NotFound)?;

        let mut messages = vec![self.confirmation_message(
            &trip,
            owner,
            self.trip_confirmation_link(&trip.id),
        )];
        if self.config.notify_invitees {
            for participant in participants.iter().filter(|p| !p.is_owner && !p.is_confirmed) {
                messages.push(self.confirmation_message(
                    &trip,
                    participant,
                    self.participant_confirmation_link(&trip.id, &participant.id),
                ));
            }
        }

        for message in &messages {
            self.notifier.send(message).await?;
        }
        Ok(())
    }

    /// Transitions the referenced participant from pending to confirmed.
    /// Confirming an already-confirmed participant is a no-op, duplicate
    /// link clicks must not error.
    pub async fn confirm_participant(
        &self,
        trip_id: &str,
        participant: ParticipantRef,
    ) -> Result<(), AppError> {
        let target = match &participant {
            ParticipantRef::Owner => self.store.find_owner(trip_id).await?,
            ParticipantRef::Id(id) => self.store.find_participant(trip_id, id).await?,
        }
        .ok_or(AppError::NotFound)?;

        if target.is_confirmed {
            return Ok(());
        }
        self.store.mark_confirmed(&target.id).await?;
        info!(trip_id = %trip_id, participant_id = %target.id, "participant confirmed");
        Ok(())
    }

    /// Trip, participants, and the status derived from them.
    pub async fn trip_overview(
        &self,
        trip_id: &str,
    ) -> Result<(Trip, Vec<Participant>, TripStatus), AppError> {
        let trip = self
            .store
            .find_trip(trip_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let participants = self.store.list_participants(trip_id).await?;
        let status = TripStatus::derive(&participants);
        Ok((trip, participants, status))
    }

    fn trip_confirmation_link(&self, trip_id: &str) -> String {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        format!("{base}/trips/{trip_id}/confirm")
    }

    fn participant_confirmation_link(&self, trip_id: &str, participant_id: &str) -> String {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        format!("{base}/trips/{trip_id}/participants/{participant_id}/confirm")
    }

    fn confirmation_message(
        &self,
        trip: &Trip,
        participant: &Participant,
        link: String,
    ) -> MailMessage {
        let starts = format_date_pt_br(trip.starts_at);
        let ends = format_date_pt_br(trip.ends_at);
        let subject = format!(
            "Confirme sua viagem para {} em {}",
            trip.destination, starts
        );
        let intro = if participant.is_owner {
            format!(
                "Você solicitou a criação de uma viagem para <strong>{}</strong> nas datas de <strong>{starts}</strong> até <strong>{ends}</strong>.",
                trip.destination
            )
        } else {
            format!(
                "Você foi convidado(a) para participar de uma viagem para <strong>{}</strong> nas datas de <strong>{starts}</strong> até <strong>{ends}</strong>.",
                trip.destination
            )
        };
        let html_body = format!(
            r#"<div style="font-family: sans-serif; font-size: 16px; line-height: 1.6;">
    <p style="margin-bottom: 16px">{intro}</p>
    <p style="margin-bottom: 16px">Para confirmar sua viagem, clique no link abaixo:</p>
    <p style="margin-bottom: 16px">
        <a href="{link}">Confirmar viagem</a>
    </p>
    <p>Caso você não saiba do que se trata esse e-mail, apenas ignore esse e-mail.</p>
</div>"#
        );

        MailMessage {
            to_name: participant.name.clone(),
            to_email: participant.email.clone(),
            subject,
            html_body,
        }
    }
}
