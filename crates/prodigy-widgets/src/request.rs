//! Query construction for the widget API endpoints.

use prodigy_core::ConfigType;
use reqwest::Url;

use crate::error::WidgetError;

/// Parameters of one `buttonGroups` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonGroupsQuery {
    pub config_type: ConfigType,
    pub dealer_id: Option<String>,
    pub website_id: Option<String>,
    /// Already deduplicated and stripped of cached VINs by the caller.
    pub vehicle_ids: Vec<String>,
    pub deal_id: Option<String>,
    pub sales_person_name: Option<String>,
    /// Ask for the standalone-button configuration alongside the groups.
    pub standalone_config: bool,
    /// Millisecond timestamp appended as `cacheBust`.
    pub cache_bust: Option<i64>,
}

/// Parameters of one `standaloneButtons` request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StandaloneQuery {
    pub dealer_id: Option<String>,
    pub website_id: Option<String>,
    pub sales_person_name: Option<String>,
    pub deal_id: Option<String>,
}

impl ButtonGroupsQuery {
    /// Builds the request URL under `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::InvalidBaseUrl`] if `api_base` is not a valid
    /// URL base.
    pub fn to_url(&self, api_base: &str) -> Result<Url, WidgetError> {
        let mut url = endpoint_url(api_base, "buttonGroups")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("type", self.config_type.as_str());
            if let Some(dealer_id) = &self.dealer_id {
                pairs.append_pair("dealerId", dealer_id);
            }
            if let Some(website_id) = &self.website_id {
                pairs.append_pair("websiteId", website_id);
            }
            pairs.append_pair("vehicleIds", &self.vehicle_ids.join(","));
            if let Some(deal_id) = &self.deal_id {
                pairs.append_pair("dealId", deal_id);
            }
            if let Some(name) = &self.sales_person_name {
                pairs.append_pair("salesPersonName", name);
            }
            if self.standalone_config {
                pairs.append_pair("getStandaloneConfig", "true");
            }
            if let Some(stamp) = self.cache_bust {
                pairs.append_pair("cacheBust", &stamp.to_string());
            }
        }
        Ok(url)
    }
}

impl StandaloneQuery {
    /// Builds the request URL under `api_base`.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::InvalidBaseUrl`] if `api_base` is not a valid
    /// URL base.
    pub fn to_url(&self, api_base: &str) -> Result<Url, WidgetError> {
        let mut url = endpoint_url(api_base, "standaloneButtons")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(dealer_id) = &self.dealer_id {
                pairs.append_pair("dealerId", dealer_id);
            }
            if let Some(website_id) = &self.website_id {
                pairs.append_pair("websiteId", website_id);
            }
            if let Some(name) = &self.sales_person_name {
                pairs.append_pair("salesPersonName", name);
            }
            if let Some(deal_id) = &self.deal_id {
                pairs.append_pair("dealId", deal_id);
            }
        }
        Ok(url)
    }
}

fn endpoint_url(api_base: &str, endpoint: &str) -> Result<Url, WidgetError> {
    let raw = format!("{}/widgets/{endpoint}", api_base.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| WidgetError::InvalidBaseUrl {
        base_url: api_base.to_owned(),
        reason: e.to_string(),
    })
}
