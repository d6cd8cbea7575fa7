use serde::{Deserialize, Serialize};

/// Channel a pricing button group is configured for.
///
/// Serialized as the upper-case tag the widget API and the
/// `data-config-type` marker attribute use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfigType {
    /// Search results page.
    Srp,
    /// Vehicle detail page.
    Vdp,
    /// Buttons driven by the host's own JavaScript API.
    Api,
}

impl ConfigType {
    pub const ALL: [ConfigType; 3] = [ConfigType::Srp, ConfigType::Vdp, ConfigType::Api];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigType::Srp => "SRP",
            ConfigType::Vdp => "VDP",
            ConfigType::Api => "API",
        }
    }

    /// Parses the exact marker value. Matching is case-sensitive, like the
    /// server-side configuration keys.
    #[must_use]
    pub fn from_marker(value: &str) -> Option<Self> {
        match value {
            "SRP" => Some(ConfigType::Srp),
            "VDP" => Some(ConfigType::Vdp),
            "API" => Some(ConfigType::Api),
            _ => None,
        }
    }

    /// Comma-separated list of supported marker values, for error messages.
    #[must_use]
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-pricing buttons that are not tied to a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StandaloneName {
    #[serde(rename = "tradein")]
    TradeIn,
    #[serde(rename = "preapproval")]
    PreApproval,
    Browse,
}

impl StandaloneName {
    pub const ALL: [StandaloneName; 3] = [
        StandaloneName::TradeIn,
        StandaloneName::PreApproval,
        StandaloneName::Browse,
    ];

    /// Key used by the standalone-buttons response map.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StandaloneName::TradeIn => "tradein",
            StandaloneName::PreApproval => "preapproval",
            StandaloneName::Browse => "browse",
        }
    }
}

impl std::fmt::Display for StandaloneName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analytics action id derived from a button's `data-action` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAction {
    TradeIn,
    PaymentOptions,
    PreApproved,
    TestDrive,
    CreateDeal,
}

impl TrackAction {
    /// Maps a `data-action` value; anything unrecognised is a deal creation.
    #[must_use]
    pub fn from_button_action(action: Option<&str>) -> Self {
        match action {
            Some("tradeIn") => TrackAction::TradeIn,
            Some("paymentOptions") => TrackAction::PaymentOptions,
            Some("preApproved") => TrackAction::PreApproved,
            Some("testDrive") => TrackAction::TestDrive,
            _ => TrackAction::CreateDeal,
        }
    }

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            TrackAction::TradeIn => "TRADE_IN",
            TrackAction::PaymentOptions => "PAYMENT_OPTIONS",
            TrackAction::PreApproved => "PREAPPROVED",
            TrackAction::TestDrive => "TEST_DRIVE",
            TrackAction::CreateDeal => "CREATE_DEAL",
        }
    }
}
