//! HTTP client for the widget API and the analytics beacon.

use std::time::Duration;

use prodigy_core::{AgentConfig, Endpoints};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::WidgetError;
use crate::request::{ButtonGroupsQuery, StandaloneQuery};
use crate::retry::retry_with_backoff;
use crate::types::{ButtonGroupsResponse, StandaloneButtonsResponse, TrackingEvent};

/// Client for the widget API.
///
/// Non-2xx responses surface as [`WidgetError::UnexpectedStatus`]. Timeouts,
/// connection failures and 5xx responses are retried with back-off up to
/// `max_retries` additional attempts.
pub struct WidgetClient {
    client: Client,
    api_base: String,
    tracking_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl WidgetClient {
    /// Creates a client for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`WidgetError::InvalidBaseUrl`] if the
    /// tracking URL does not parse.
    pub fn new(
        endpoints: &Endpoints,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, WidgetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let tracking_url =
            Url::parse(&endpoints.tracking_base).map_err(|e| WidgetError::InvalidBaseUrl {
                base_url: endpoints.tracking_base.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_base: endpoints.api_base.trim_end_matches('/').to_owned(),
            tracking_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Creates a client from agent configuration.
    ///
    /// # Errors
    ///
    /// See [`WidgetClient::new`].
    pub fn from_config(config: &AgentConfig) -> Result<Self, WidgetError> {
        Self::new(
            &config.endpoints(),
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_ms,
        )
    }

    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Fetches pricing button markup for a set of VINs.
    ///
    /// # Errors
    ///
    /// - [`WidgetError::UnexpectedStatus`] on a non-2xx response.
    /// - [`WidgetError::Http`] on network failure after retries.
    /// - [`WidgetError::Deserialize`] if the body is not the expected shape.
    pub async fn fetch_button_groups(
        &self,
        query: &ButtonGroupsQuery,
    ) -> Result<ButtonGroupsResponse, WidgetError> {
        let url = query.to_url(&self.api_base)?;
        let context = format!(
            "buttonGroups(type={}, vins={})",
            query.config_type,
            query.vehicle_ids.len()
        );
        self.get_json(url, &context).await
    }

    /// Fetches the dealer's standalone button markup.
    ///
    /// # Errors
    ///
    /// Same as [`WidgetClient::fetch_button_groups`].
    pub async fn fetch_standalone_buttons(
        &self,
        query: &StandaloneQuery,
    ) -> Result<StandaloneButtonsResponse, WidgetError> {
        let url = query.to_url(&self.api_base)?;
        self.get_json(url, "standaloneButtons").await
    }

    /// Posts one analytics event. Not retried.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Http`] or [`WidgetError::UnexpectedStatus`];
    /// callers treat the beacon as fire-and-forget and only log these.
    pub async fn track(&self, event: &TrackingEvent) -> Result<(), WidgetError> {
        let response = self
            .client
            .post(self.tracking_url.clone())
            .json(&event.envelope())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WidgetError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.tracking_url.to_string(),
            });
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T, WidgetError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(url.clone())
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(WidgetError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<T>(&body).map_err(|e| WidgetError::Deserialize {
                    context: context.to_owned(),
                    source: e,
                })
            }
        })
        .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
