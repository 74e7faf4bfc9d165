//! Private Configuration
//!
//! Credentials and connection details kept out of the release properties.
//!
//! # Example YAML Format
//!
//! ```yaml
//! mongo:
//!   production:
//!     hosts: [mongos-1.example.org:27017, mongos-2.example.org:27017]
//!     username: accessioner
//!     password: secret
//! postgres:
//!   development:
//!     host: pgsql.example.org
//!     port: 5432
//!     database: metadata
//!     username: evadev
//!     password: secret
//! evapro:
//!   host: pgsql.example.org
//!   user: evapro_writer
//!   database: evapro
//! import:
//!   python3_path: /usr/bin/python3
//!   insert_assembly_script_path: /opt/metadata/insert_new_assembly.py
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::error::{ReleaseError, Result};

/// Profile holding the production document store.
pub const PRODUCTION_PROFILE: &str = "production";

/// Profile holding the metadata database.
pub const DEVELOPMENT_PROFILE: &str = "development";

/// Default table tracking import progress.
pub const DEFAULT_IMPORT_PROGRESS_TABLE: &str = "dbsnp_ensembl_species.import_progress";

/// Parsed private configuration file.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PrivateConfig {
    #[serde(default)]
    pub mongo: HashMap<String, MongoProfile>,

    #[serde(default)]
    pub postgres: HashMap<String, PostgresProfile>,

    #[serde(default)]
    pub evapro: Option<EvaproSettings>,

    #[serde(default)]
    pub import: Option<ImportSettings>,
}

/// Document store credentials for one profile.
#[derive(Deserialize, Debug, Clone)]
pub struct MongoProfile {
    /// Replica set or mongos members, as `host` or `host:port`
    pub hosts: Vec<String>,
    pub username: String,
    pub password: String,
    #[serde(default = "default_authentication_database")]
    pub authentication_database: String,
}

fn default_authentication_database() -> String {
    "admin".to_string()
}

impl MongoProfile {
    /// Host name of the first listed member.
    ///
    /// Any member will do: the driver falls back to secondaries on its own.
    pub fn primary_host(&self) -> Result<&str> {
        let first = self
            .hosts
            .first()
            .ok_or_else(|| ReleaseError::MissingConfig("mongo profile lists no hosts".into()))?;
        Ok(first.split(':').next().unwrap_or(first))
    }
}

/// Relational store credentials for one profile.
#[derive(Deserialize, Debug, Clone)]
pub struct PostgresProfile {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_postgres_port() -> u16 {
    5432
}

impl PostgresProfile {
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

/// Target of the assembly registration script.
#[derive(Deserialize, Debug, Clone)]
pub struct EvaproSettings {
    pub host: String,
    pub user: String,
    pub database: String,
}

/// Tools used by the import finalizer.
#[derive(Deserialize, Debug, Clone)]
pub struct ImportSettings {
    pub python3_path: String,
    pub insert_assembly_script_path: String,
    #[serde(default = "default_import_progress_table")]
    pub import_progress_table: String,
}

fn default_import_progress_table() -> String {
    DEFAULT_IMPORT_PROGRESS_TABLE.to_string()
}

impl PrivateConfig {
    /// Loads the private configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ReleaseError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Private config loaded ({} bytes)", content.len());

        Self::from_yaml(&content).map_err(|source| ReleaseError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn mongo_profile(&self, profile: &str) -> Result<&MongoProfile> {
        self.mongo.get(profile).ok_or_else(|| ReleaseError::MissingProfile {
            kind: "mongo",
            profile: profile.to_string(),
        })
    }

    pub fn postgres_profile(&self, profile: &str) -> Result<&PostgresProfile> {
        self.postgres
            .get(profile)
            .ok_or_else(|| ReleaseError::MissingProfile {
                kind: "postgres",
                profile: profile.to_string(),
            })
    }

    pub fn evapro(&self) -> Result<&EvaproSettings> {
        self.evapro
            .as_ref()
            .ok_or_else(|| ReleaseError::MissingConfig("evapro section".into()))
    }

    pub fn import(&self) -> Result<&ImportSettings> {
        self.import
            .as_ref()
            .ok_or_else(|| ReleaseError::MissingConfig("import section".into()))
    }
}
