//! Fixed markup the agent writes into the page on its own: loading
//! placeholders, the overlay, and the base stylesheet.

use prodigy_core::StandaloneName;

pub const PRICING_GROUP_CLASS: &str = "prodigy-pricing-button-group";
pub const DDC_STANDALONE_CONTAINER_CLASS: &str = "prodigy-standalone-button-container-ddc";

/// Elements that open the wizard when clicked.
pub const BUTTON_SELECTOR: &str = ".prodigy-button, .prodigy-button-image";

pub const OVERLAY_ID: &str = "prodigy-wizard-overlay";
pub const FRAME_ID: &str = "prodigy-online-container";
pub const BASE_STYLES_ID: &str = "prodigy-styles";

pub const PRICING_LOADING: &str = concat!(
    r#"<div class="prodigy-button-group-container prodigy-button-group-container-loading">"#,
    r#"<div class="prodigy-lead-capture-container"><span class="prodigy-msg">Loading...</span></div>"#,
    "</div>",
);

/// Placeholder for one standalone button while its markup loads.
#[must_use]
pub fn standalone_loading(name: StandaloneName) -> String {
    let inner = match name {
        StandaloneName::TradeIn => "trade-container",
        StandaloneName::PreApproval => "pre-approved-container",
        StandaloneName::Browse => "browse-container",
    };
    format!(
        r#"<div class="prodigy-standalone-button-container prodigy-standalone-button-container-loading"><div class="{inner}"></div></div>"#
    )
}

/// Marker class a standalone container is discovered by.
#[must_use]
pub fn standalone_marker_class(name: StandaloneName) -> &'static str {
    match name {
        StandaloneName::TradeIn => "prodigy-standalone-tradein-button",
        StandaloneName::PreApproval => "prodigy-standalone-preapproval-button",
        StandaloneName::Browse => "prodigy-standalone-browse-button",
    }
}

pub const BASE_STYLES: &str = concat!(
    "#prodigy-wizard-overlay{display:none;position:fixed;top:0;left:0;width:100%;height:100%;",
    "background:rgba(0,0,0,.6);z-index:2147483646;}",
    "#prodigy-online-container{display:none;border:0;background:#fff;z-index:2147483647;}",
    ".prodigy-button,.prodigy-button-image{cursor:pointer;}",
);
