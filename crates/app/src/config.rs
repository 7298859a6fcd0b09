use std::env;

use exam_core::model::UserId;

pub const DEFAULT_DB_URL: &str = "sqlite://exam.sqlite3";
pub const DEFAULT_USER: &str = "local";

/// Settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_url: String,
    pub user: UserId,
    pub rust_log: String,
}

impl Settings {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_url = non_blank("QUIZ_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into());
        let user = non_blank("QUIZ_USER").unwrap_or_else(|| DEFAULT_USER.into());
        let rust_log = non_blank("RUST_LOG").unwrap_or_else(|| "info".into());

        Self {
            db_url,
            user: UserId::new(user.trim()),
            rust_log,
        }
    }
}
