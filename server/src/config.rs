use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use products_hr::{StoreSettings, env_bool};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store: StoreSettings,
    /// Report a replace that matched nothing as 404 instead of echoing it.
    pub strict_replace: bool,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            strict_replace: true,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let store = StoreSettings::from_env();
        let strict_replace = env_bool("EMPLOYEES_STRICT_REPLACE", true);

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();
        for origin in &cors_allowed_origins {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {origin:?}"))?;
        }

        Ok(Self {
            store,
            strict_replace,
            cors_allowed_origins,
        })
    }

    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }
}
