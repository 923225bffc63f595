use crate::application_port::{DEFAULT_AUTH_PATH_MARKERS, ServiceEndpoints, SessionConfig};
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub services: Services,
    #[serde(default)]
    pub session: Session,
    pub store: Store,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Services {
    pub auth: String,
    pub inventory: String,
    pub waiting_room: String,
    pub booking: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub auth_path_markers: Vec<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            auth_path_markers: DEFAULT_AUTH_PATH_MARKERS
                .iter()
                .map(|m| (*m).to_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Redis,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: StoreBackend,
    pub path: Option<String>,
    pub redis_url: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "boxoffice:session".to_owned()
}

impl Http {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints {
            auth: trim(&self.services.auth),
            inventory: trim(&self.services.inventory),
            waiting_room: trim(&self.services.waiting_room),
            booking: trim(&self.services.booking),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoints: self.endpoints(),
            auth_path_markers: self.session.auth_path_markers.clone(),
        }
    }
}

fn trim(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("BOXOFFICE").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
