// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use url::Url;

/// Seconds a freshly signed token stays valid when `JWT_EXPIRATION` is unset.
pub const DEFAULT_JWT_EXPIRATION: u64 = 86_400;

pub const DEFAULT_MAIL_FROM: &str = "no-reply@exam-manager.local";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
    /// Invitations are POSTed here when set; otherwise they are only logged.
    pub mail_webhook_url: Option<Url>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_JWT_EXPIRATION);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mail_webhook_url = env::var("MAIL_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Url::parse(&v).expect("MAIL_WEBHOOK_URL must be a valid URL"));

        let mail_from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            mail_webhook_url,
            mail_from,
        }
    }
}
