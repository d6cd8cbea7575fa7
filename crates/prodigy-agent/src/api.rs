//! The widget API as the agent sees it.

use std::future::Future;

use prodigy_widgets::{
    ButtonGroupsQuery, ButtonGroupsResponse, StandaloneButtonsResponse, StandaloneQuery,
    TrackingEvent, WidgetClient, WidgetError,
};

/// Remote calls the agent makes. Implemented by [`WidgetClient`]; tests
/// substitute scripted fakes.
pub trait WidgetApi: Send + Sync + 'static {
    fn button_groups(
        &self,
        query: ButtonGroupsQuery,
    ) -> impl Future<Output = Result<ButtonGroupsResponse, WidgetError>> + Send;

    fn standalone_buttons(
        &self,
        query: StandaloneQuery,
    ) -> impl Future<Output = Result<StandaloneButtonsResponse, WidgetError>> + Send;

    fn track(&self, event: TrackingEvent) -> impl Future<Output = Result<(), WidgetError>> + Send;
}

impl WidgetApi for WidgetClient {
    fn button_groups(
        &self,
        query: ButtonGroupsQuery,
    ) -> impl Future<Output = Result<ButtonGroupsResponse, WidgetError>> + Send {
        async move { self.fetch_button_groups(&query).await }
    }

    fn standalone_buttons(
        &self,
        query: StandaloneQuery,
    ) -> impl Future<Output = Result<StandaloneButtonsResponse, WidgetError>> + Send {
        async move { self.fetch_standalone_buttons(&query).await }
    }

    fn track(&self, event: TrackingEvent) -> impl Future<Output = Result<(), WidgetError>> + Send {
        async move { WidgetClient::track(self, &event).await }
    }
}
