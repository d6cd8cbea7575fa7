use std::path::PathBuf;

use crate::app_config::AgentConfig;
use crate::environment::Environment;
use crate::ConfigError;

/// Dealers that moved to website-scoped configuration but still embed the
/// agent with their old `dealerId` attribute.
const LEGACY_WEBSITE_DEALERS: [&str; 3] = [
    "germaintoyota",
    "lexus-of-lexington",
    "lexus-of-northborough",
];

/// Load agent configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or no dealer/website identity
/// is configured.
pub fn load_agent_config() -> Result<AgentConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_agent_config_from_env()
}

/// Load agent configuration from environment variables already in the process.
///
/// Unlike [`load_agent_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or no dealer/website identity
/// is configured.
pub fn load_agent_config_from_env() -> Result<AgentConfig, ConfigError> {
    build_agent_config(|key| std::env::var(key))
}

/// Load agent configuration for a page that embeds the agent's script tag.
///
/// The tag's attributes (see [`apply_script_tag`]) are overlaid on the
/// environment before the identity check, so a page that names its own
/// dealer needs no `PRODIGY_DEALER_ID`.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid or neither the environment
/// nor the tag configures an identity.
pub fn load_page_config<F>(attr: F, src: Option<&str>) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    dotenvy::dotenv().ok();
    let mut config = read_agent_config(|key| std::env::var(key))?;
    apply_script_tag(&mut config, attr, src);
    require_identity(config)
}

/// Build agent configuration using the provided env-var lookup function.
fn build_agent_config<F>(lookup: F) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    require_identity(read_agent_config(lookup)?)
}

fn require_identity(config: AgentConfig) -> Result<AgentConfig, ConfigError> {
    if config.dealer_id.is_none() && config.website_id.is_none() {
        return Err(ConfigError::MissingIdentity);
    }
    Ok(config)
}

fn read_agent_config<F>(lookup: F) -> Result<AgentConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(false),
            Ok(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        }
    };

    let env = Environment::from_tag(&or_default("PRODIGY_ENV", "production"));

    let mut dealer_id = optional("PRODIGY_DEALER_ID");
    let mut website_id = optional("PRODIGY_WEBSITE_ID");
    reroute_legacy_dealer(&mut dealer_id, &mut website_id);

    let sales_person_name = optional("PRODIGY_SALES_PERSON_NAME");
    let bust_cache = parse_bool("PRODIGY_BUST_CACHE")?;
    let log_level = or_default("PRODIGY_LOG_LEVEL", "info");
    let storage_path = PathBuf::from(or_default(
        "PRODIGY_STORAGE_PATH",
        "./.prodigy/storage.json",
    ));
    let referrer_domain = or_default("PRODIGY_REFERRER_DOMAIN", "localhost");
    let page_url = optional("PRODIGY_PAGE_URL");

    let request_timeout_secs = parse_u64("PRODIGY_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("PRODIGY_USER_AGENT", "prodigy-agent/0.1");
    let max_retries = parse_u32("PRODIGY_MAX_RETRIES", "1")?;
    let retry_backoff_base_ms = parse_u64("PRODIGY_RETRY_BACKOFF_BASE_MS", "500")?;
    let debounce_ms = parse_u64("PRODIGY_DEBOUNCE_MS", "200")?;
    let fetch_retry_limit = parse_u32("PRODIGY_FETCH_RETRY_LIMIT", "2")?;
    let fetch_retry_backoff_ms = parse_u64("PRODIGY_FETCH_RETRY_BACKOFF_MS", "1000")?;
    let fade_ms = parse_u64("PRODIGY_FADE_MS", "600")?;

    let api_base_override = optional("PRODIGY_API_BASE");
    let tracking_url_override = optional("PRODIGY_TRACKING_URL");

    Ok(AgentConfig {
        env,
        dealer_id,
        website_id,
        sales_person_name,
        bust_cache,
        log_level,
        storage_path,
        referrer_domain,
        page_url,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        debounce_ms,
        fetch_retry_limit,
        fetch_retry_backoff_ms,
        fade_ms,
        api_base_override,
        tracking_url_override,
    })
}

/// Overlay the attributes of the agent's `<script>` tag onto `config`.
///
/// `attr` looks up an attribute by name (`dealerId`, `websiteId`, `envType`,
/// `salesPersonName`, `bustCache`); `src` is the tag's `src`. An
/// `envType=<tag>` query string at the start of `src` takes precedence over
/// the `envType` attribute. Attributes that are absent leave the existing
/// value alone.
pub fn apply_script_tag<F>(config: &mut AgentConfig, attr: F, src: Option<&str>)
where
    F: Fn(&str) -> Option<String>,
{
    let present = |name: &str| attr(name).filter(|v| !v.trim().is_empty());

    if let Some(dealer_id) = present("dealerId") {
        config.dealer_id = Some(dealer_id);
    }
    if let Some(website_id) = present("websiteId") {
        config.website_id = Some(website_id);
    }
    if let Some(name) = present("salesPersonName") {
        config.sales_person_name = Some(name);
    }
    // Any non-empty attribute enables cache busting, including "false".
    if present("bustCache").is_some() {
        config.bust_cache = true;
    }

    let src_env = src
        .and_then(|s| s.split_once('?'))
        .map(|(_, query)| query)
        .filter(|query| query.starts_with("envType"))
        .and_then(|query| query.split('=').nth(1))
        .map(|value| value.split('&').next().unwrap_or(value).to_owned());

    if let Some(tag) = src_env.or_else(|| present("envType")) {
        config.env = Environment::from_tag(&tag);
    }

    reroute_legacy_dealer(&mut config.dealer_id, &mut config.website_id);
}

fn reroute_legacy_dealer(dealer_id: &mut Option<String>, website_id: &mut Option<String>) {
    if dealer_id
        .as_deref()
        .is_some_and(|id| LEGACY_WEBSITE_DEALERS.contains(&id))
    {
        *website_id = dealer_id.take();
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
