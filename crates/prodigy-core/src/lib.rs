//! Shared configuration and domain vocabulary for the Prodigy widget agent.

pub mod app_config;
pub mod buttons;
pub mod config;
pub mod environment;

use thiserror::Error;

pub use app_config::AgentConfig;
pub use buttons::{ConfigType, StandaloneName, TrackAction};
pub use config::{
    apply_script_tag, load_agent_config, load_agent_config_from_env, load_page_config,
};
pub use environment::{infer_host_quirk, resolve_environment, Endpoints, Environment, HostQuirk};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("neither a dealer id nor a website id is configured")]
    MissingIdentity,
}
