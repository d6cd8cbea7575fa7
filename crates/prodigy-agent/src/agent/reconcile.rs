//! Writes fetch results back onto the containers registered *now*, which
//! may differ from the ones registered when the request went out.

use prodigy_core::ConfigType;
use prodigy_widgets::{ButtonGroupsResponse, StandaloneButtonsResponse};

use crate::dom::{Document, NodeId};
use crate::host::SlotLocation;
use crate::registry::{ButtonContainer, Category};

use super::AgentState;

/// Fills every registered `config_type` group whose VIN is cached and
/// drops it from the registry. Returns how many were filled.
pub(super) fn fill_cached(state: &mut AgentState, config_type: ConfigType) -> usize {
    let category = Category::Pricing(config_type);
    let ready: Vec<(NodeId, String)> = state
        .registry
        .iter()
        .filter(|c| c.category() == category)
        .filter_map(|c| {
            let html = state.cache.get(c.vin()?)?;
            Some((c.element(), html.to_owned()))
        })
        .collect();

    for (element, html) in &ready {
        state.document.set_inner_html(*element, html);
    }
    let cache = &state.cache;
    state.registry.remove(|c| {
        c.category() == category && c.vin().is_some_and(|vin| cache.contains(vin))
    });
    ready.len()
}

pub(super) fn pricing_success(
    state: &mut AgentState,
    config_type: ConfigType,
    requested: &[String],
    response: ButtonGroupsResponse,
) {
    let ButtonGroupsResponse {
        button_groups,
        base_url,
        is_group_website,
        css,
        standalone_config,
    } = response;
    let delivered = button_groups.len();
    state.cache.merge(button_groups);

    let filled = fill_cached(state, config_type);

    // Requested but not configured server side: nothing will ever arrive.
    let unanswered = state.registry.select(|c| {
        c.category() == Category::Pricing(config_type)
            && c.vin().is_some_and(|vin| requested.iter().any(|r| r == vin))
    });
    for container in &unanswered {
        state.document.set_inner_html(container.element(), "");
    }

    tracing::info!(
        config_type = %config_type,
        requested = requested.len(),
        delivered,
        filled,
        unanswered = unanswered.len(),
        "button groups applied"
    );

    if let Some(base_url) = base_url {
        state.base_url = Some(base_url);
    }
    state.is_group_website = is_group_website;
    rebind(state);
    if let Some(css) = css {
        inject_css(&mut state.document, &css);
    }

    if let (Some(platform), Some(config)) = (state.platform.as_mut(), standalone_config) {
        if !state.banner_registered {
            platform.insert(SlotLocation::PrimaryBanner);
            state.banner_registered = true;
            tracing::debug!("registered primary-banner slot");
        }
        state.banner_config = Some(config);
    }
}

/// Clears the loading state of every registered `config_type` group. The
/// groups stay registered for the next round.
pub(super) fn pricing_failure(state: &mut AgentState, config_type: ConfigType) {
    let containers = state
        .registry
        .select(|c| c.category() == Category::Pricing(config_type));
    for container in &containers {
        state.document.set_inner_html(container.element(), "");
    }
}

/// Applies standalone markup for `category`. API-triggered buttons are
/// host-rendered, so for them success only means binding their clicks.
pub(super) fn standalone_success(
    state: &mut AgentState,
    category: Category,
    response: &StandaloneButtonsResponse,
) {
    let standalone = state.registry.select(|c| c.category() == Category::Standalone);
    for container in &standalone {
        if let ButtonContainer::Standalone { element, name } = container {
            let html = response.markup(*name).unwrap_or_default();
            state.document.set_inner_html(*element, html);
        }
    }
    state
        .registry
        .remove(|c| c.category() == Category::Standalone);
    if category == Category::Api {
        state.registry.remove(|c| c.category() == Category::Api);
    }

    tracing::info!(category = %category, filled = standalone.len(), "standalone buttons applied");

    if let Some(base_url) = &response.base_url {
        state.base_url = Some(base_url.clone());
    }
    rebind(state);
    if let Some(css) = &response.css {
        inject_css(&mut state.document, css);
    }
}

/// Clears standalone placeholders. API-triggered buttons keep the content
/// the host gave them.
pub(super) fn standalone_failure(state: &mut AgentState) {
    let containers = state
        .registry
        .select(|c| c.category() == Category::Standalone);
    for container in &containers {
        state.document.set_inner_html(container.element(), "");
    }
}

/// Re-collects every clickable button in the page.
pub(super) fn rebind(state: &mut AgentState) {
    let body = state.document.body();
    state.bound_buttons = state
        .document
        .select(body, &super::BUTTONS)
        .into_iter()
        .collect();
}

/// Appends a stylesheet fragment to the body unless an element with the
/// fragment's id is already in the page.
pub(super) fn inject_css(doc: &mut Document, css: &str) {
    if css.trim().is_empty() {
        return;
    }
    let staging = doc.create_element("div");
    doc.set_inner_html(staging, css);
    let nodes = doc.children(staging).to_vec();

    let id = nodes
        .iter()
        .find_map(|n| doc.attr(*n, "id"))
        .filter(|id| !id.is_empty())
        .map(str::to_owned);
    if let Some(id) = &id {
        if doc.element_by_id(id).is_some() {
            return;
        }
    }

    let body = doc.body();
    for node in nodes {
        doc.append_child(body, node);
    }
    tracing::debug!(id = ?id, "injected stylesheet");
}
