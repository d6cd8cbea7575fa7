//! Widget API response and beacon types.
//!
//! ### `buttonGroups`
//! Keyed by VIN. Only VINs the server has a configuration for are present;
//! a requested VIN can be missing from the map entirely.
//!
//! ### `CSS`
//! An HTML fragment, normally a single `<style id="…">` element. The id is
//! what keeps the stylesheet from being injected twice.
//!
//! ### `standaloneConfig`
//! Only returned when `getStandaloneConfig=true` was requested. Values are
//! loosely typed (booleans, or objects describing the button); anything
//! truthy means the button is enabled.

use std::collections::HashMap;

use prodigy_core::StandaloneName;
use serde::{Deserialize, Serialize};

/// Response from `GET /widgets/buttonGroups`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonGroupsResponse {
    #[serde(default)]
    pub button_groups: HashMap<String, String>,

    /// Wizard base URL that button clicks open.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub is_group_website: bool,

    #[serde(rename = "CSS", default)]
    pub css: Option<String>,

    #[serde(default)]
    pub standalone_config: Option<StandaloneConfig>,
}

/// Response from `GET /widgets/standaloneButtons`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneButtonsResponse {
    #[serde(default)]
    pub standalone_buttons: HashMap<String, String>,

    #[serde(rename = "CSS", default)]
    pub css: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

impl StandaloneButtonsResponse {
    /// Markup for one standalone button, if the dealer has it configured.
    #[must_use]
    pub fn markup(&self, name: StandaloneName) -> Option<&str> {
        self.standalone_buttons.get(name.as_str()).map(String::as_str)
    }
}

/// Which standalone buttons a host-platform integration should render.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandaloneConfig {
    #[serde(default)]
    pub browse: serde_json::Value,
    #[serde(default)]
    pub preapproval: serde_json::Value,
    #[serde(default)]
    pub tradein: serde_json::Value,
}

impl StandaloneConfig {
    #[must_use]
    pub fn is_enabled(&self, name: StandaloneName) -> bool {
        let value = match name {
            StandaloneName::Browse => &self.browse,
            StandaloneName::PreApproval => &self.preapproval,
            StandaloneName::TradeIn => &self.tradein,
        };
        truthy(value)
    }
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// One analytics event posted to the tracking beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingEvent {
    /// `LOAD` or `CLICK`.
    pub action: String,
    /// Action id of the clicked button, absent for page loads.
    pub target: Option<String>,
    pub deal_id: Option<String>,
    pub dealer_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Serialize)]
struct TrackingPayload<'a> {
    action: &'a str,
    target: Option<&'a str>,
    deal_id: Option<&'a str>,
    dealer_id: Option<&'a str>,
}

#[derive(Serialize)]
pub(crate) struct TrackingEnvelope<'a> {
    payload: TrackingPayload<'a>,
    name: &'static str,
    timestamp: i64,
}

impl TrackingEvent {
    pub(crate) fn envelope(&self) -> TrackingEnvelope<'_> {
        TrackingEnvelope {
            payload: TrackingPayload {
                action: &self.action,
                target: self.target.as_deref(),
                deal_id: self.deal_id.as_deref(),
                dealer_id: self.dealer_id.as_deref(),
            },
            name: "widget:event",
            timestamp: self.timestamp,
        }
    }
}
