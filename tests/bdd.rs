use std::{
    fmt,
    fs::File,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use cucumber::{given, then, when, World as _};
use planner::{
    config::AppConfig,
    db::init_pool,
    error::AppError,
    models::participant::Participant,
    services::{
        lifecycle::{ParticipantRef, TripLifecycle},
        mailer::{MailMessage, Notifier},
        store::TripStore,
    },
    state::AppState,
    validation::{validate_create_trip, CreateTripRequest, TripOwner},
};
use tempfile::TempDir;
use url::Url;

#[derive(Debug, cucumber::World, Default)]
struct PlannerWorld {
    state: Option<TestState>,
    last_trip_id: Option<String>,
    last_error: Option<AppError>,
}

impl PlannerWorld {
    fn app_state(&self) -> AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
            .clone()
    }

    fn trip_id(&self) -> String {
        self.last_trip_id
            .clone()
            .expect("a trip must have been created first")
    }

    fn outbox(&self) -> Vec<MailMessage> {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .outbox
            .lock()
            .expect("outbox lock")
            .clone()
    }

    async fn participants(&self) -> Vec<Participant> {
        let state = self.app_state();
        let (_trip, participants, _status) = state
            .lifecycle
            .trip_overview(&self.trip_id())
            .await
            .expect("trip overview");
        participants
    }
}

/// Captures outgoing mail instead of sending it.
#[derive(Clone, Default)]
struct RecordingNotifier {
    outbox: Arc<Mutex<Vec<MailMessage>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        self.outbox.lock().expect("outbox lock").push(message.clone());
        Ok(())
    }
}

struct TestState {
    app: AppState,
    outbox: Arc<Mutex<Vec<MailMessage>>>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new(dedupe_invitees: bool, notify_invitees: bool) -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            base_url: Url::parse("http://localhost:3333").context("parse base url")?,
            mail_from_name: "Equipe Planner".into(),
            mail_from_address: "oi@planner.er".into(),
            smtp: None,
            dedupe_invitees,
            notify_invitees,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let outbox = Arc::new(Mutex::new(Vec::new()));
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier {
            outbox: Arc::clone(&outbox),
        });
        let store = TripStore::new(db.clone());
        let lifecycle = TripLifecycle::new(store, notifier, config.clone());
        let app = AppState::new(config, db, lifecycle);

        Ok(Self {
            app,
            outbox,
            _root: root,
        })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh planner service")]
async fn given_fresh_service(world: &mut PlannerWorld) {
    world.state = Some(TestState::new(false, false).await.expect("state"));
    world.last_trip_id = None;
    world.last_error = None;
}

#[given("a fresh planner service with invitee notification enabled")]
async fn given_fresh_service_notifying(world: &mut PlannerWorld) {
    world.state = Some(TestState::new(false, true).await.expect("state"));
    world.last_trip_id = None;
    world.last_error = None;
}

#[given("a fresh planner service with invitee dedup enabled")]
async fn given_fresh_service_deduping(world: &mut PlannerWorld) {
    world.state = Some(TestState::new(true, false).await.expect("state"));
    world.last_trip_id = None;
    world.last_error = None;
}

#[when(
    regex = r#"^"([^"]+)" with email "([^"]+)" requests a trip to "([^"]+)" starting in (-?\d+) days and lasting (-?\d+) days$"#
)]
async fn when_request_trip(
    world: &mut PlannerWorld,
    name: String,
    email: String,
    destination: String,
    start_offset: i64,
    duration: i64,
) {
    request_trip(world, name, email, destination, start_offset, duration, Vec::new()).await;
}

#[when(
    regex = r#"^"([^"]+)" with email "([^"]+)" requests a trip to "([^"]+)" starting in (-?\d+) days and lasting (-?\d+) days with invitees "([^"]*)"$"#
)]
async fn when_request_trip_with_invitees(
    world: &mut PlannerWorld,
    name: String,
    email: String,
    destination: String,
    start_offset: i64,
    duration: i64,
    invitees: String,
) {
    let invitees = invitees
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();
    request_trip(world, name, email, destination, start_offset, duration, invitees).await;
}

async fn request_trip(
    world: &mut PlannerWorld,
    name: String,
    email: String,
    destination: String,
    start_offset: i64,
    duration: i64,
    invitees: Vec<String>,
) {
    let now = Utc::now();
    let starts_at = now + Duration::days(start_offset);
    let ends_at = starts_at + Duration::days(duration);
    let request = CreateTripRequest {
        destination,
        starts_at: starts_at.to_rfc3339(),
        ends_at: ends_at.to_rfc3339(),
        owner: TripOwner { name, email },
        emails_to_invite: invitees,
    };

    let state = world.app_state();
    world.last_trip_id = None;
    match validate_create_trip(request, now) {
        Ok(normalized) => match state.lifecycle.create_trip(normalized).await {
            Ok(trip_id) => {
                state
                    .lifecycle
                    .request_confirmation_emails(&trip_id)
                    .await
                    .expect("request confirmation emails");
                world.last_trip_id = Some(trip_id);
                world.last_error = None;
            }
            Err(err) => world.last_error = Some(err),
        },
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^the invitee "([^"]+)" follows their confirmation link$"#)]
async fn when_invitee_confirms(world: &mut PlannerWorld, email: String) {
    let state = world.app_state();
    let trip_id = world.trip_id();
    let participant = world
        .participants()
        .await
        .into_iter()
        .find(|p| p.email == email)
        .expect("invitee must exist");
    match state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Id(participant.id))
        .await
    {
        Ok(()) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
}

#[when("the owner confirmation link is followed")]
async fn when_owner_link_followed(world: &mut PlannerWorld) {
    let state = world.app_state();
    let trip_id = world.trip_id();
    match state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Owner)
        .await
    {
        Ok(()) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^the owner confirmation link is followed for trip "([^"]+)"$"#)]
async fn when_owner_link_for_trip(world: &mut PlannerWorld, trip_id: String) {
    let state = world.app_state();
    match state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Owner)
        .await
    {
        Ok(()) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
}

#[when("a confirmation is attempted for an unknown participant")]
async fn when_unknown_participant_confirms(world: &mut PlannerWorld) {
    let state = world.app_state();
    let trip_id = world.trip_id();
    match state
        .lifecycle
        .confirm_participant(&trip_id, ParticipantRef::Id("missing-participant".into()))
        .await
    {
        Ok(()) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
}

#[when("a creation request starting exactly at the validation instant is validated")]
async fn when_validated_at_instant(world: &mut PlannerWorld) {
    let now = Utc
        .with_ymd_and_hms(2030, 3, 10, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    let request = CreateTripRequest {
        destination: "Florianópolis".into(),
        starts_at: now.to_rfc3339(),
        ends_at: now.to_rfc3339(),
        owner: TripOwner {
            name: "Ana".into(),
            email: "ana@x.com".into(),
        },
        emails_to_invite: Vec::new(),
    };
    match validate_create_trip(request, now) {
        Ok(_) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
}

#[then("the request passes validation")]
async fn then_request_passes(world: &mut PlannerWorld) {
    assert!(
        world.last_error.is_none(),
        "unexpected error: {:?}",
        world.last_error
    );
}

#[then("the trip is created")]
async fn then_trip_created(world: &mut PlannerWorld) {
    assert!(
        world.last_error.is_none(),
        "unexpected error: {:?}",
        world.last_error
    );
    assert!(world.last_trip_id.is_some());
}

#[then("creation fails because the start date is in the past")]
async fn then_past_start_date(world: &mut PlannerWorld) {
    assert!(matches!(world.last_error, Some(AppError::PastStartDate)));
    assert!(world.last_trip_id.is_none());
}

#[then("creation fails because the date range is inverted")]
async fn then_invalid_date_range(world: &mut PlannerWorld) {
    assert!(matches!(world.last_error, Some(AppError::InvalidDateRange)));
    assert!(world.last_trip_id.is_none());
}

#[then(regex = r#"^creation fails naming field "([^"]+)"$"#)]
async fn then_invalid_request_field(world: &mut PlannerWorld, expected: String) {
    match &world.last_error {
        Some(AppError::InvalidRequest { field, .. }) => assert_eq!(*field, expected),
        other => panic!("expected InvalidRequest, got {other:?}"),
    }
}

#[then("no trip is persisted")]
async fn then_no_trip_persisted(world: &mut PlannerWorld) {
    let state = world.app_state();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(&state.db)
        .await
        .expect("count trips");
    assert_eq!(count, 0);
}

#[then(regex = r"^the trip has (\d+) participants$")]
async fn then_participant_count(world: &mut PlannerWorld, expected: usize) {
    assert_eq!(world.participants().await.len(), expected);
}

#[then("the trip has exactly one owner, already confirmed")]
async fn then_single_confirmed_owner(world: &mut PlannerWorld) {
    let participants = world.participants().await;
    let owners: Vec<_> = participants.iter().filter(|p| p.is_owner).collect();
    assert_eq!(owners.len(), 1);
    assert!(owners[0].is_confirmed);
}

#[then(regex = r"^(\d+) participants are pending$")]
async fn then_pending_count(world: &mut PlannerWorld, expected: usize) {
    let pending = world
        .participants()
        .await
        .iter()
        .filter(|p| !p.is_confirmed)
        .count();
    assert_eq!(pending, expected);
}

#[then(regex = r#"^the trip status is "([a-z_]+)"$"#)]
async fn then_trip_status(world: &mut PlannerWorld, expected: String) {
    let state = world.app_state();
    let (_trip, _participants, status) = state
        .lifecycle
        .trip_overview(&world.trip_id())
        .await
        .expect("trip overview");
    assert_eq!(status.as_str(), expected);
}

#[then(regex = r#"^the participant "([^"]+)" is confirmed$"#)]
async fn then_participant_confirmed(world: &mut PlannerWorld, email: String) {
    let participants = world.participants().await;
    let participant = participants
        .iter()
        .find(|p| p.email == email)
        .expect("participant must exist");
    assert!(participant.is_confirmed);
}

#[then(regex = r#"^the participant "([^"]+)" is pending$"#)]
async fn then_participant_pending(world: &mut PlannerWorld, email: String) {
    let participants = world.participants().await;
    let participant = participants
        .iter()
        .find(|p| p.email == email)
        .expect("participant must exist");
    assert!(!participant.is_confirmed);
}

#[then("the confirmation succeeds")]
async fn then_confirmation_succeeds(world: &mut PlannerWorld) {
    assert!(
        world.last_error.is_none(),
        "unexpected error: {:?}",
        world.last_error
    );
}

#[then("the confirmation fails with not found")]
async fn then_confirmation_not_found(world: &mut PlannerWorld) {
    assert!(matches!(world.last_error, Some(AppError::NotFound)));
}

#[then(regex = r"^(\d+) confirmation emails? (?:was|were) sent$")]
async fn then_emails_sent(world: &mut PlannerWorld, expected: usize) {
    assert_eq!(world.outbox().len(), expected);
}

#[then(regex = r#"^a confirmation email was sent to "([^"]+)" containing the trip confirmation link$"#)]
async fn then_email_with_trip_link(world: &mut PlannerWorld, email: String) {
    let link = format!("/trips/{}/confirm", world.trip_id());
    let outbox = world.outbox();
    let message = outbox
        .iter()
        .find(|m| m.to_email == email)
        .expect("message for recipient");
    assert!(
        message.html_body.contains(&link),
        "missing link {link} in body: {}",
        message.html_body
    );
}

#[then(regex = r#"^a confirmation email was sent to "([^"]+)" containing its participant confirmation link$"#)]
async fn then_email_with_participant_link(world: &mut PlannerWorld, email: String) {
    let trip_id = world.trip_id();
    let participants = world.participants().await;
    let participant = participants
        .iter()
        .find(|p| p.email == email)
        .expect("participant must exist");
    let link = format!("/trips/{trip_id}/participants/{}/confirm", participant.id);
    let outbox = world.outbox();
    let message = outbox
        .iter()
        .find(|m| m.to_email == email)
        .expect("message for recipient");
    assert!(
        message.html_body.contains(&link),
        "missing link {link} in body: {}",
        message.html_body
    );
}

#[tokio::main]
async fn main() {
    PlannerWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
