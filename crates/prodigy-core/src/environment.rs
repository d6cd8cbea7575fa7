//! Deployment environment resolution.
//!
//! Maps the `envType` tag a host page configures onto the widget API and
//! analytics endpoints, and sniffs the host page for known website vendors
//! whose DOM needs alternate mutation targeting.

/// Deployment environment the agent talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Staging,
    Testing,
    Production,
}

impl Environment {
    /// Parses an environment tag. Unknown or empty tags resolve to
    /// [`Environment::Production`] so a typo never takes the widget offline.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "local" => Self::Local,
            "dev" => Self::Dev,
            "staging" => Self::Staging,
            "testing" => Self::Testing,
            _ => Self::Production,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Dev => write!(f, "dev"),
            Environment::Staging => write!(f, "staging"),
            Environment::Testing => write!(f, "testing"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Base URLs for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Widget API host, without the `/widgets` suffix.
    pub api_base: String,
    /// Full URL of the analytics beacon.
    pub tracking_base: String,
}

/// Resolves an environment tag to its endpoints.
#[must_use]
pub fn resolve_environment(tag: &str) -> Endpoints {
    Environment::from_tag(tag).endpoints()
}

impl Environment {
    #[must_use]
    pub fn endpoints(self) -> Endpoints {
        let (api_base, tracking_base) = match self {
            Environment::Local => ("http://localhost:8888", "http://localhost:9999/timestamp"),
            Environment::Dev => (
                "https://dev-api.getprodigy.com",
                "https://analytics-dev.getprodigy.com/timestamp",
            ),
            Environment::Staging => (
                "https://staging-api.getprodigy.com",
                "https://analytics-staging.getprodigy.com/timestamp",
            ),
            Environment::Testing => (
                "https://testing-api.getprodigy.com",
                "https://analytics-testing.getprodigy.com/timestamp",
            ),
            Environment::Production => (
                "https://api.getprodigy.com",
                "https://analytics.getprodigy.com/timestamp",
            ),
        };
        Endpoints {
            api_base: api_base.to_owned(),
            tracking_base: tracking_base.to_owned(),
        }
    }
}

/// Host-site vendor whose page structure changes how mutations are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostQuirk {
    #[default]
    Default,
    /// Dealer Inspire sites re-render listing grids by replacing the children
    /// of a stable `.entry` wrapper.
    DealerInspire,
}

const DEALER_INSPIRE_MARKER: &str = "dealerinspire.com";

/// Infers the host vendor from the page's `<link>` stylesheet hrefs.
#[must_use]
pub fn infer_host_quirk<I, S>(head_links: I) -> HostQuirk
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if head_links
        .into_iter()
        .any(|href| href.as_ref().contains(DEALER_INSPIRE_MARKER))
    {
        HostQuirk::DealerInspire
    } else {
        HostQuirk::Default
    }
}
