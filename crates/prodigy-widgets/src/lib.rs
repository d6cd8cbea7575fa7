//! Client for the remote widget API: pricing button groups, standalone
//! buttons, the analytics beacon, and the wizard URLs buttons open.

pub mod client;
pub mod error;
pub mod request;
mod retry;
pub mod types;
pub mod wizard;

pub use client::WidgetClient;
pub use error::WidgetError;
pub use request::{ButtonGroupsQuery, StandaloneQuery};
pub use types::{
    ButtonGroupsResponse, StandaloneButtonsResponse, StandaloneConfig, TrackingEvent,
};
pub use wizard::WizardSource;
