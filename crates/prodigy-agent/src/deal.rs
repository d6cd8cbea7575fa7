//! The current deal identifier, shared with the wizard frame through
//! `dealId:` messages and sent along with every widget request.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::storage::KeyValueStore;

pub const DEAL_ID_KEY: &str = "prodigy:dealId";
pub const DEAL_SET_AT_KEY: &str = "prodigy:dealIdSetDate";

/// A stored deal id older than this reads as absent.
pub const DEAL_TTL_DAYS: i64 = 30;

/// What a [`DealStore::set`] did to the valid identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealChange {
    /// There was no valid identifier before.
    New,
    /// A different valid identifier was overwritten.
    Replaced { previous: String },
    /// The same identifier was written again; only its timestamp moved.
    Refreshed,
}

pub struct DealStore {
    store: Box<dyn KeyValueStore>,
}

impl DealStore {
    #[must_use]
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored identifier if it was set no more than 30 days before
    /// `now`. Expired records are left in place.
    #[must_use]
    pub fn get(&self, now: DateTime<Utc>) -> Option<String> {
        let value = self.read(DEAL_ID_KEY).filter(|v| !v.trim().is_empty())?;
        let set_at = self.set_at()?;
        if now.signed_duration_since(set_at) > Duration::days(DEAL_TTL_DAYS) {
            return None;
        }
        Some(value)
    }

    pub fn set(&mut self, id: &str, now: DateTime<Utc>) -> DealChange {
        let previous = self.get(now);
        self.write(DEAL_ID_KEY, id);
        self.write(DEAL_SET_AT_KEY, &format_timestamp(now));
        match previous {
            None => DealChange::New,
            Some(previous) if previous == id => DealChange::Refreshed,
            Some(previous) => DealChange::Replaced { previous },
        }
    }

    /// Starts the expiry clock on first contact, before any deal exists.
    pub fn touch_if_absent(&mut self, now: DateTime<Utc>) {
        if self.read(DEAL_SET_AT_KEY).is_none() {
            self.write(DEAL_SET_AT_KEY, &format_timestamp(now));
        }
    }

    fn set_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.read(DEAL_SET_AT_KEY)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "unreadable deal timestamp, treating deal as expired");
                None
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key, error = %e, "storage write failed");
        }
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
