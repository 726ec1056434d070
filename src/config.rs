use std::env;
use std::path::PathBuf;

use anyhow::Context;
use clap::ValueEnum;
use tracing::{info, warn};

use crate::schema::PointSchema;
use crate::scoring::CulturalWinnerScope;

pub struct Config {
    pub database_url: Option<String>,
    pub schema_path: Option<PathBuf>,
    pub cultural_scope: CulturalWinnerScope,
}

impl Config {
    pub fn load() -> Self {
        Self {
            database_url: var("DATABASE_URL"),
            schema_path: var("POINTS_SCHEMA").map(PathBuf::from),
            cultural_scope: var("CULTURAL_WINNER_SCOPE")
                .and_then(|value| {
                    CulturalWinnerScope::from_str(&value, true)
                        .map_err(|e| warn!("Invalid CULTURAL_WINNER_SCOPE value: {e}"))
                        .ok()
                })
                .unwrap_or_else(|| {
                    info!("CULTURAL_WINNER_SCOPE not set, using default: all-students");
                    CulturalWinnerScope::default()
                }),
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }

    /// The schema named on the command line, else `POINTS_SCHEMA`, else
    /// the built-in default.
    pub fn point_schema(&self, override_path: Option<&PathBuf>) -> anyhow::Result<PointSchema> {
        match override_path.or(self.schema_path.as_ref()) {
            Some(path) => {
                info!("Loading point schema from {}", path.display());
                PointSchema::load(path)
            }
            None => Ok(PointSchema::default()),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
