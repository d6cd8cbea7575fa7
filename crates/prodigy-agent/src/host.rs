//! Integration points a host platform and the embedding site plug into.

use prodigy_widgets::StandaloneConfig;
use serde::Deserialize;

use prodigy_core::StandaloneName;

use crate::dom::{Document, NodeId};
use crate::markup;

/// Named page location a host platform lets integrations render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotLocation {
    VehiclePricing,
    PrimaryBanner,
}

impl SlotLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SlotLocation::VehiclePricing => "vehicle-pricing",
            SlotLocation::PrimaryBanner => "primary-banner",
        }
    }
}

impl std::fmt::Display for SlotLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data the platform delivers alongside a slot element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlotMeta {
    #[serde(default)]
    pub vin: Option<String>,
}

/// The platform's page-load event passed to `start_ddc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLoadEvent {
    #[serde(default)]
    pub payload: PageLoadPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadPayload {
    #[serde(default)]
    pub search_page: bool,
}

/// A host platform that renders integration markup into named slots.
///
/// `insert` registers interest in a location; the platform later delivers
/// each matching slot through `AgentHandle::host_slot`.
pub trait HostPlatform: Send {
    fn insert(&mut self, location: SlotLocation);

    /// Places `child` inside the delivered slot `parent`.
    fn append(&mut self, doc: &mut Document, parent: NodeId, child: NodeId) {
        doc.append_child(parent, child);
    }

    /// Dealer code from the platform's data layer, forwarded to the wizard.
    fn dealer_code(&self) -> Option<String> {
        None
    }
}

/// Receives applicant details the wizard reports back.
pub trait LeadIntake: Send {
    fn post_lead(&mut self, source: &str, applicant: &serde_json::Value);
}

/// Builds the pricing marker for a `vehicle-pricing` slot. Returns `None`
/// when the slot carries no VIN.
pub fn pricing_slot(doc: &mut Document, meta: &SlotMeta, search_page: bool) -> Option<NodeId> {
    let vin = meta.vin.as_deref().filter(|v| !v.trim().is_empty())?;
    let config_type = if search_page { "SRP" } else { "VDP" };
    let container = doc.create_element("div");
    doc.add_class(container, markup::PRICING_GROUP_CLASS);
    doc.set_attr(container, "data-vin", vin);
    doc.set_attr(container, "data-config-type", config_type);
    Some(container)
}

/// Builds the standalone banner for a `primary-banner` slot, holding one
/// marker per enabled button.
pub fn standalone_slot(doc: &mut Document, config: &StandaloneConfig) -> NodeId {
    let wrapper = doc.create_element("div");
    doc.add_class(wrapper, markup::DDC_STANDALONE_CONTAINER_CLASS);
    for name in [
        StandaloneName::Browse,
        StandaloneName::PreApproval,
        StandaloneName::TradeIn,
    ] {
        if config.is_enabled(name) {
            let marker = doc.create_element("div");
            doc.add_class(marker, markup::standalone_marker_class(name));
            doc.append_child(wrapper, marker);
        }
    }
    wrapper
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_load_event_reads_search_flag() {
        let event: PageLoadEvent =
            serde_json::from_value(serde_json::json!({ "payload": { "searchPage": true } })).unwrap();
        assert!(event.payload.search_page);
        let event: PageLoadEvent = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!event.payload.search_page);
    }

    #[test]
    fn pricing_slot_marks_config_type_by_page_kind() {
        let mut doc = Document::new();
        let meta = SlotMeta {
            vin: Some("VIN1".to_owned()),
        };
        let srp = pricing_slot(&mut doc, &meta, true).unwrap();
        assert_eq!(doc.attr(srp, "data-config-type"), Some("SRP"));
        assert_eq!(doc.attr(srp, "data-vin"), Some("VIN1"));
        let vdp = pricing_slot(&mut doc, &meta, false).unwrap();
        assert_eq!(doc.attr(vdp, "data-config-type"), Some("VDP"));
        assert!(pricing_slot(&mut doc, &SlotMeta::default(), true).is_none());
    }

    #[test]
    fn standalone_slot_orders_enabled_buttons() {
        let mut doc = Document::new();
        let config: StandaloneConfig = serde_json::from_value(serde_json::json!({
            "browse": true,
            "preapproval": false,
            "tradein": { "label": "Trade" }
        }))
        .unwrap();
        let wrapper = standalone_slot(&mut doc, &config);
        let classes: Vec<_> = doc
            .children(wrapper)
            .iter()
            .filter_map(|c| doc.attr(*c, "class"))
            .collect();
        assert_eq!(
            classes,
            vec!["prodigy-standalone-browse-button", "prodigy-standalone-tradein-button"]
        );
    }
}
