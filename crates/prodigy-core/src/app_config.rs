use std::path::PathBuf;

use crate::environment::{Endpoints, Environment};

/// Runtime configuration for one agent instance.
///
/// In the browser this came from attributes on the agent's script tag; here
/// it is loaded from environment variables (see [`crate::load_agent_config`])
/// and may be overlaid with script-tag attributes found in a host page
/// (see [`crate::apply_script_tag`]).
#[derive(Clone)]
pub struct AgentConfig {
    pub env: Environment,
    /// Legacy dealer identifier, superseded by `website_id`.
    pub dealer_id: Option<String>,
    pub website_id: Option<String>,
    /// Sales person credited with leads created from this page.
    pub sales_person_name: Option<String>,
    /// Append a `cacheBust` timestamp to button-group requests.
    pub bust_cache: bool,
    pub log_level: String,
    /// JSON file backing the deal identity store.
    pub storage_path: PathBuf,
    /// Hostname reported to the wizard as `referrerDomain`.
    pub referrer_domain: String,
    /// Host page URL; its UTM query parameters are forwarded to the wizard.
    pub page_url: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Transport-level retries per request.
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Quiet period before a pricing-group request is sent.
    pub debounce_ms: u64,
    /// Consecutive failed rounds a category retries on its own.
    pub fetch_retry_limit: u32,
    pub fetch_retry_backoff_ms: u64,
    /// Overlay fade duration.
    pub fade_ms: u64,
    pub api_base_override: Option<String>,
    pub tracking_url_override: Option<String>,
}

impl AgentConfig {
    /// Endpoints for the configured environment with any overrides applied.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = self.env.endpoints();
        if let Some(api_base) = &self.api_base_override {
            endpoints.api_base.clone_from(api_base);
        }
        if let Some(tracking) = &self.tracking_url_override {
            endpoints.tracking_base.clone_from(tracking);
        }
        endpoints
    }

    /// A configuration with defaults for everything but the identity, used
    /// by tests and embedders that do not read the process environment.
    #[must_use]
    pub fn for_dealer(dealer_id: &str) -> Self {
        Self {
            env: Environment::Production,
            dealer_id: Some(dealer_id.to_owned()),
            website_id: None,
            sales_person_name: None,
            bust_cache: false,
            log_level: "info".to_owned(),
            storage_path: PathBuf::from("./.prodigy/storage.json"),
            referrer_domain: "localhost".to_owned(),
            page_url: None,
            request_timeout_secs: 30,
            user_agent: "prodigy-agent/0.1".to_owned(),
            max_retries: 1,
            retry_backoff_base_ms: 500,
            debounce_ms: 200,
            fetch_retry_limit: 2,
            fetch_retry_backoff_ms: 1_000,
            fade_ms: 600,
            api_base_override: None,
            tracking_url_override: None,
        }
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("env", &self.env)
            .field("dealer_id", &self.dealer_id)
            .field("website_id", &self.website_id)
            .field(
                "sales_person_name",
                &self.sales_person_name.as_ref().map(|_| "[redacted]"),
            )
            .field("bust_cache", &self.bust_cache)
            .field("log_level", &self.log_level)
            .field("storage_path", &self.storage_path)
            .field("referrer_domain", &self.referrer_domain)
            .field("page_url", &self.page_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("debounce_ms", &self.debounce_ms)
            .field("fetch_retry_limit", &self.fetch_retry_limit)
            .field("fetch_retry_backoff_ms", &self.fetch_retry_backoff_ms)
            .field("fade_ms", &self.fade_ms)
            .field("api_base_override", &self.api_base_override)
            .field("tracking_url_override", &self.tracking_url_override)
            .finish()
    }
}
