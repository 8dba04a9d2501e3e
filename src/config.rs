use std::{env, net::SocketAddr};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub base_url: Url,
    pub mail_from_name: String,
    pub mail_from_address: String,
    pub smtp: Option<SmtpConfig>,
    pub dedupe_invitees: bool,
    pub notify_invitees: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://planner.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3333".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        // Confirmation links embed this, so it must be the externally visible URL.
        let base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3333".to_string());
        let base_url = Url::parse(&base_url)
            .map_err(|err| AppError::Config(format!("invalid APP_BASE_URL: {err}")))?;

        let mail_from_name =
            env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Equipe Planner".to_string());
        let mail_from_address =
            env::var("MAIL_FROM_ADDRESS").unwrap_or_else(|_| "oi@planner.er".to_string());

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => {
                let port = env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .map_err(|err| AppError::Config(format!("invalid SMTP_PORT: {err}")))?;
                Some(SmtpConfig {
                    host,
                    port,
                    username: env::var("SMTP_USERNAME").unwrap_or_default(),
                    password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                })
            }
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            listen_addr,
            base_url,
            mail_from_name,
            mail_from_address,
            smtp,
            dedupe_invitees: env_flag("PLANNER_DEDUPE_INVITEES"),
            notify_invitees: env_flag("PLANNER_NOTIFY_INVITEES"),
        })
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
