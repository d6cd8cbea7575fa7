//! Catalog of discovered button containers and the markup already loaded
//! for them.

use std::collections::HashMap;
use std::sync::LazyLock;

use prodigy_core::{ConfigType, StandaloneName};

use crate::dom::{Document, NodeId, Selector};
use crate::error::DiscoveryError;
use crate::markup;

static PRICING_GROUP: LazyLock<Selector> = LazyLock::new(|| {
    format!(".{}", markup::PRICING_GROUP_CLASS)
        .parse()
        .expect("valid selector")
});
static API_TRIGGERED: LazyLock<Selector> =
    LazyLock::new(|| r#"[data-config-type="API"]"#.parse().expect("valid selector"));
static STANDALONE: LazyLock<[(StandaloneName, Selector); 3]> = LazyLock::new(|| {
    StandaloneName::ALL.map(|name| {
        let selector: Selector = format!(".{}", markup::standalone_marker_class(name))
            .parse()
            .expect("valid selector");
        (name, selector)
    })
});

/// A location in the page where server markup goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonContainer {
    PricingGroup {
        element: NodeId,
        config_type: ConfigType,
        vin: String,
    },
    Standalone {
        element: NodeId,
        name: StandaloneName,
    },
    /// Host-rendered buttons that only need click handling.
    ApiTriggered { element: NodeId },
}

/// Unit of fetching: each has its own request round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Pricing(ConfigType),
    Standalone,
    Api,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Pricing(ConfigType::Srp),
        Category::Pricing(ConfigType::Vdp),
        Category::Pricing(ConfigType::Api),
        Category::Standalone,
        Category::Api,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Pricing(t) => write!(f, "pricing:{t}"),
            Category::Standalone => f.write_str("standalone"),
            Category::Api => f.write_str("api"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Pricing,
    Standalone,
    Api,
}

impl ButtonContainer {
    #[must_use]
    pub fn element(&self) -> NodeId {
        match self {
            ButtonContainer::PricingGroup { element, .. }
            | ButtonContainer::Standalone { element, .. }
            | ButtonContainer::ApiTriggered { element } => *element,
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            ButtonContainer::PricingGroup { config_type, .. } => Category::Pricing(*config_type),
            ButtonContainer::Standalone { .. } => Category::Standalone,
            ButtonContainer::ApiTriggered { .. } => Category::Api,
        }
    }

    #[must_use]
    pub fn vin(&self) -> Option<&str> {
        match self {
            ButtonContainer::PricingGroup { vin, .. } => Some(vin),
            _ => None,
        }
    }

    fn kind(&self) -> Kind {
        match self {
            ButtonContainer::PricingGroup { .. } => Kind::Pricing,
            ButtonContainer::Standalone { .. } => Kind::Standalone,
            ButtonContainer::ApiTriggered { .. } => Kind::Api,
        }
    }
}

/// Outcome of one [`Registry::scan`].
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Containers registered by this scan, in discovery order.
    pub added: Vec<ButtonContainer>,
    /// Marker elements that could not be classified.
    pub errors: Vec<(NodeId, DiscoveryError)>,
}

impl ScanResult {
    /// Categories that gained containers, in [`Category::ALL`] order.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|cat| self.added.iter().any(|c| c.category() == *cat))
            .collect()
    }
}

/// Markup already delivered for each VIN. Entries only ever accumulate
/// until an explicit [`LoadedButtonsCache::clear`].
#[derive(Debug, Default, Clone)]
pub struct LoadedButtonsCache {
    markup: HashMap<String, String>,
}

impl LoadedButtonsCache {
    #[must_use]
    pub fn get(&self, vin: &str) -> Option<&str> {
        self.markup.get(vin).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, vin: &str) -> bool {
        self.markup.contains_key(vin)
    }

    pub fn merge(&mut self, groups: HashMap<String, String>) {
        self.markup.extend(groups);
    }

    pub fn clear(&mut self) {
        self.markup.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markup.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }
}

/// Containers waiting for markup. At most one entry per element and kind.
#[derive(Debug, Default)]
pub struct Registry {
    containers: Vec<ButtonContainer>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every marker element in `root`'s subtree, `root` included.
    /// Elements already registered are skipped. Invalid pricing markers are
    /// logged and reported in [`ScanResult::errors`].
    pub fn scan(&mut self, doc: &Document, root: NodeId) -> ScanResult {
        let mut result = ScanResult::default();

        for element in doc.select_inclusive(root, &PRICING_GROUP) {
            match classify_pricing(doc, element) {
                Ok((config_type, vin)) => self.register(
                    ButtonContainer::PricingGroup {
                        element,
                        config_type,
                        vin,
                    },
                    &mut result,
                ),
                Err(e) => {
                    tracing::error!(element = %element, error = %e, "invalid pricing button group");
                    result.errors.push((element, e));
                }
            }
        }

        for (name, selector) in STANDALONE.iter().take(2) {
            for element in doc.select_inclusive(root, selector) {
                self.register(
                    ButtonContainer::Standalone {
                        element,
                        name: *name,
                    },
                    &mut result,
                );
            }
        }

        for element in doc.select_inclusive(root, &API_TRIGGERED) {
            self.register(ButtonContainer::ApiTriggered { element }, &mut result);
        }

        for (name, selector) in STANDALONE.iter().skip(2) {
            for element in doc.select_inclusive(root, selector) {
                self.register(
                    ButtonContainer::Standalone {
                        element,
                        name: *name,
                    },
                    &mut result,
                );
            }
        }

        result
    }

    fn register(&mut self, container: ButtonContainer, result: &mut ScanResult) {
        let duplicate = self
            .containers
            .iter()
            .any(|c| c.kind() == container.kind() && c.element() == container.element());
        if duplicate {
            return;
        }
        self.containers.push(container.clone());
        result.added.push(container);
    }

    /// Writes loading markup into `containers`. Pricing groups whose VIN is
    /// already cached keep their content; API-triggered buttons are never
    /// touched.
    pub fn placeholder(
        doc: &mut Document,
        containers: &[ButtonContainer],
        cache: &LoadedButtonsCache,
    ) {
        for container in containers {
            match container {
                ButtonContainer::PricingGroup { element, vin, .. } => {
                    if !cache.contains(vin) {
                        doc.set_inner_html(*element, markup::PRICING_LOADING);
                    }
                }
                ButtonContainer::Standalone { element, name } => {
                    doc.set_inner_html(*element, &markup::standalone_loading(*name));
                }
                ButtonContainer::ApiTriggered { .. } => {}
            }
        }
    }

    /// Snapshot of the containers matching `predicate`.
    #[must_use]
    pub fn select(&self, predicate: impl Fn(&ButtonContainer) -> bool) -> Vec<ButtonContainer> {
        self.containers
            .iter()
            .filter(|c| predicate(c))
            .cloned()
            .collect()
    }

    /// Drops containers matching `predicate`. Returns how many were removed.
    pub fn remove(&mut self, predicate: impl Fn(&ButtonContainer) -> bool) -> usize {
        let before = self.containers.len();
        self.containers.retain(|c| !predicate(c));
        before - self.containers.len()
    }

    /// Drops containers whose element is no longer in the page.
    pub fn prune_detached(&mut self, doc: &Document) -> usize {
        let pruned = self.remove(|c| !doc.is_connected(c.element()));
        if pruned > 0 {
            tracing::debug!(pruned, "dropped containers removed from the page");
        }
        pruned
    }

    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.containers
            .iter()
            .filter(|c| c.category() == category)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ButtonContainer> {
        self.containers.iter()
    }
}

fn classify_pricing(doc: &Document, element: NodeId) -> Result<(ConfigType, String), DiscoveryError> {
    let raw_type = doc
        .attr(element, "data-config-type")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingConfigType)?;
    let config_type =
        ConfigType::from_marker(raw_type).ok_or_else(|| DiscoveryError::InvalidConfigType {
            value: raw_type.to_owned(),
            supported: ConfigType::supported(),
        })?;
    let vin = doc
        .attr(element, "data-vin")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(DiscoveryError::MissingVin { config_type })?;
    Ok((config_type, vin.to_owned()))
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
