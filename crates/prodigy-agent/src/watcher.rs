//! Turns host-page mutation records into registry scans.

use std::collections::BTreeSet;

use prodigy_core::HostQuirk;

use crate::dom::{Document, MutationRecord, NodeId};
use crate::registry::{Category, LoadedButtonsCache, Registry};

/// Subtree to re-scan for one record. Listing grids that re-render by
/// swapping children are scanned from their stable wrapper instead of the
/// individual rows.
#[must_use]
pub fn scan_root(doc: &Document, record: &MutationRecord, quirk: HostQuirk) -> Option<NodeId> {
    let target = record.target;
    let wrapper = (quirk == HostQuirk::DealerInspire && doc.has_class(target, "entry"))
        || doc.has_class(target, "listings-column")
        || doc.has_class(target, "listings-row")
        || (doc.tag(target) == Some("td") && doc.has_class(target, "tdicons"));
    if wrapper {
        Some(target)
    } else {
        record.added.first().copied()
    }
}

/// Processes one batch of records: prunes containers that left the page,
/// scans every added subtree, writes placeholders for what was found, and
/// returns the categories that gained containers.
pub fn process(
    doc: &mut Document,
    registry: &mut Registry,
    cache: &LoadedButtonsCache,
    records: &[MutationRecord],
    quirk: HostQuirk,
) -> BTreeSet<Category> {
    if records.iter().any(|r| !r.removed.is_empty()) {
        registry.prune_detached(doc);
    }

    let mut gained = BTreeSet::new();
    for record in records.iter().filter(|r| !r.added.is_empty()) {
        let Some(root) = scan_root(doc, record, quirk) else {
            continue;
        };
        if !doc.is_connected(root) {
            continue;
        }
        let result = registry.scan(doc, root);
        if result.added.is_empty() {
            continue;
        }
        Registry::placeholder(doc, &result.added, cache);
        gained.extend(result.categories());
    }

    if !gained.is_empty() {
        tracing::debug!(records = records.len(), categories = gained.len(), "mutations discovered containers");
    }
    gained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup;
    use prodigy_core::ConfigType;

    const GROUP: &str =
        r#"<div class="prodigy-pricing-button-group" data-config-type="SRP" data-vin="V1"></div>"#;

    #[test]
    fn listing_wrapper_is_scanned_instead_of_added_row() {
        let mut doc = Document::from_html(r#"<div id="grid" class="listings-row"></div>"#);
        let grid = doc.element_by_id("grid").unwrap();
        doc.set_inner_html(grid, GROUP);
        let records = doc.take_mutations();
        assert_eq!(scan_root(&doc, &records[0], HostQuirk::Default), Some(grid));
    }

    #[test]
    fn entry_wrapper_only_applies_to_dealer_inspire() {
        let mut doc = Document::from_html(r#"<div id="e" class="entry"></div>"#);
        let entry = doc.element_by_id("e").unwrap();
        let row = doc.create_element("div");
        doc.append_child(entry, row);
        let records = doc.take_mutations();
        assert_eq!(scan_root(&doc, &records[0], HostQuirk::DealerInspire), Some(entry));
        assert_eq!(scan_root(&doc, &records[0], HostQuirk::Default), Some(row));
    }

    #[test]
    fn process_scans_placeholders_and_reports_categories() {
        let mut doc = Document::from_html(r#"<div id="list"></div>"#);
        let list = doc.element_by_id("list").unwrap();
        let row = doc.create_element("div");
        doc.set_inner_html(row, GROUP);
        doc.append_child(list, row);
        let records = doc.take_mutations();

        let mut registry = Registry::new();
        let gained = process(
            &mut doc,
            &mut registry,
            &LoadedButtonsCache::default(),
            &records,
            HostQuirk::Default,
        );

        assert_eq!(gained.into_iter().collect::<Vec<_>>(), vec![Category::Pricing(ConfigType::Srp)]);
        assert_eq!(registry.len(), 1);
        let group = registry.iter().next().unwrap().element();
        assert_eq!(doc.inner_html(group), markup::PRICING_LOADING);
    }

    #[test]
    fn removal_only_batches_prune_without_scanning() {
        let mut doc = Document::from_html(&format!(r#"<div id="row">{GROUP}</div>"#));
        let mut registry = Registry::new();
        registry.scan(&doc, doc.body());
        let row = doc.element_by_id("row").unwrap();
        doc.remove(row);
        let records = doc.take_mutations();

        let gained = process(
            &mut doc,
            &mut registry,
            &LoadedButtonsCache::default(),
            &records,
            HostQuirk::Default,
        );
        assert!(gained.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn detached_roots_are_skipped() {
        let mut doc = Document::from_html(r#"<div id="list"></div>"#);
        let list = doc.element_by_id("list").unwrap();
        let row = doc.create_element("div");
        doc.set_inner_html(row, GROUP);
        doc.append_child(list, row);
        doc.remove(row);
        let records = doc.take_mutations();

        let mut registry = Registry::new();
        let gained = process(
            &mut doc,
            &mut registry,
            &LoadedButtonsCache::default(),
            &records,
            HostQuirk::Default,
        );
        assert!(gained.is_empty());
        assert!(registry.is_empty());
    }
}
