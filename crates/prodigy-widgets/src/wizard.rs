//! Wizard URLs opened in the overlay frame when a button is clicked.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::Url;

const SOURCE: &str = "dealerwebsite";

/// Query parameters carried over from the host page URL.
const FORWARDED_PARAMS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

/// Characters escaped inside a query value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?');

/// Everything needed to build one wizard URL.
#[derive(Debug, Clone, Default)]
pub struct WizardSource<'a> {
    /// `baseUrl` from the last widget API response.
    pub base: &'a str,
    /// Wizard entry point, e.g. `tradeIn`, `browse` or `v`.
    pub action: &'a str,
    pub vin: Option<&'a str>,
    pub dealer_id: Option<&'a str>,
    pub website_id: Option<&'a str>,
    pub deal_id: Option<&'a str>,
    pub sales_person_name: Option<&'a str>,
    /// Collect contact details before anything else.
    pub pii_first: bool,
    pub is_group_website: bool,
    pub referrer_domain: &'a str,
    /// Host page URL whose UTM parameters are forwarded.
    pub page_url: Option<&'a str>,
    /// Dealer code published by the host platform's data layer.
    pub dealer_code: Option<&'a str>,
}

impl WizardSource<'_> {
    /// Builds the wizard URL.
    ///
    /// Returns `None` when neither a website id nor a dealer id is known,
    /// since the wizard cannot be addressed without one.
    #[must_use]
    pub fn build(&self) -> Option<String> {
        let base = self.base.trim_end_matches('/');
        let action = self.action;
        let vin = self.vin.filter(|v| !v.is_empty());
        let website_id = self.website_id.filter(|v| !v.is_empty());
        let dealer_id = self.dealer_id.filter(|v| !v.is_empty());
        let referrer = encode(self.referrer_domain);

        let mut url = match (self.pii_first, website_id, dealer_id) {
            (true, Some(site), _) => format!(
                "{base}/w/{site}/{}?action={action}&source={SOURCE}&referrerDomain={referrer}&iframe=true",
                vin.unwrap_or_default()
            ),
            (true, None, Some(dealer)) => format!(
                "{base}/{dealer}/{}?action={action}&source={SOURCE}&referrerDomain={referrer}&iframe=true",
                vin.unwrap_or_default()
            ),
            (false, Some(site), _) => format!(
                "{base}/w/{action}/{site}{}/?source={SOURCE}&referrerDomain={referrer}&iframe=true",
                vehicle_segment(action, vin)
            ),
            (false, None, Some(dealer)) => format!(
                "{base}/{action}/{dealer}{}/?source={SOURCE}&referrerDomain={referrer}&iframe=true",
                vehicle_segment(action, vin)
            ),
            (_, None, None) => return None,
        };

        if website_id.is_some() {
            if let Some(dealer) = dealer_id {
                push_param(&mut url, "dealerId", dealer);
            }
        }

        if let Some(vin) = vin {
            if self.pii_first || action != "v" {
                push_param(&mut url, "vin", vin);
            }
        }

        if let Some(name) = self.sales_person_name {
            push_param(&mut url, "salesPersonName", name);
        }

        if let Some(deal_id) = self.deal_id.map(str::trim).filter(|d| !d.is_empty()) {
            push_param(&mut url, "dealId", deal_id);
        }

        if self.is_group_website {
            url.push_str("&isGroupWebsite=true");
        }

        for (key, value) in forwarded_params(self.page_url) {
            push_param(&mut url, key, &value);
        }

        if let Some(code) = self.dealer_code.filter(|c| !c.is_empty()) {
            push_param(&mut url, "dealerCode", code);
        }

        Some(url)
    }
}

/// Vehicle-detail entry points carry the VIN in the path.
fn vehicle_segment(action: &str, vin: Option<&str>) -> String {
    match vin {
        Some(vin) if action == "v" => format!("/{vin}"),
        _ => String::new(),
    }
}

fn forwarded_params(page_url: Option<&str>) -> Vec<(&'static str, String)> {
    let Some(url) = page_url.and_then(|raw| Url::parse(raw).ok()) else {
        return Vec::new();
    };
    FORWARDED_PARAMS
        .iter()
        .filter_map(|param| {
            url.query_pairs()
                .find(|(k, v)| k == param && !v.is_empty())
                .map(|(_, v)| (*param, v.into_owned()))
        })
        .collect()
}

fn push_param(url: &mut String, key: &str, value: &str) {
    url.push('&');
    url.push_str(key);
    url.push('=');
    url.push_str(&encode(value));
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}
