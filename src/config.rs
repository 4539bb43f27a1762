use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, fs, path::Path};

/// On-disk layout: `selector` names the active profile, every other
/// top-level key is a profile.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    selector: String,
    #[serde(flatten)]
    profiles: HashMap<String, Value>,
}

/// The active profile. Built once at startup and never mutated.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(flatten)]
    pub odoo: OdooConfig,
    #[serde(flatten)]
    pub directory: DirectoryConfig,
    #[serde(flatten)]
    pub workflow: WorkflowConfig,
    pub users: HashMap<String, UserEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OdooConfig {
    #[serde(rename = "odoo_url")]
    pub url: String,
    #[serde(rename = "odoo_db")]
    pub db: String,
    #[serde(rename = "odoo_uid")]
    pub uid: i64,
    #[serde(rename = "odoo_api_key")]
    pub api_key: String,
}

/// Connection parameters of the customer directory (PostgreSQL).
#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Helpdesk ids that classify new tickets and drive the resolve workflow.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub area_id: i64,
    pub team_id: i64,
    pub ticket_type_id: i64,
    pub solved_stage_id: i64,
    pub auto_resolved_stage_id: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            area_id: 1,
            team_id: 5,
            ticket_type_id: 6,
            solved_stage_id: 68,
            auto_resolved_stage_id: 69,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserEntry {
    pub password: String,
    /// Anything else stored next to the password (display name, contact...).
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

fn default_pg_port() -> u16 {
    5432
}

pub fn load(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    from_json(&raw)
}

pub fn from_json(raw: &str) -> Result<Config> {
    let mut file: ConfigFile = serde_json::from_str(raw).context("config is not valid JSON")?;

    let profile = file
        .profiles
        .remove(&file.selector)
        .ok_or_else(|| anyhow!("selected profile '{}' not found in config", file.selector))?;

    serde_path_to_error::deserialize(profile)
        .map_err(|e| anyhow!("invalid config profile '{}': {}", file.selector, e))
}
