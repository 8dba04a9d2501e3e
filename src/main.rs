use std::sync::Arc;

use planner::config::AppConfig;
use planner::db::init_pool;
use planner::error::AppError;
use planner::routes::create_router;
use planner::services::{
    lifecycle::TripLifecycle,
    mailer::{LogNotifier, Notifier, SmtpNotifier},
    store::TripStore,
};
use planner::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&db).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(
            smtp.host.clone(),
            smtp.port,
            smtp.username.clone(),
            smtp.password.clone(),
            config.mail_from_name.clone(),
            config.mail_from_address.clone(),
        )),
        None => {
            info!("SMTP_HOST not set, confirmation mails will be logged instead of sent");
            Arc::new(LogNotifier::new())
        }
    };

    let store = TripStore::new(db.clone());
    let lifecycle = TripLifecycle::new(store, notifier, config.clone());

    let state = AppState::new(config.clone(), db.clone(), lifecycle);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,planner=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
