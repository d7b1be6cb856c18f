//! Facet filter selections.
//!
//! A [`FilterSelection`] maps facet IDs to the set of option values the
//! shopper has selected. Listing pages derive it from the URL query string,
//! mutate it by toggling individual `(facet, value)` pairs, and hand it to
//! the provider clients when fetching pages.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Query-string prefix that marks a parameter as a facet filter, keeping
/// facet names from colliding with `page`, `provider`, etc.
pub const QUERY_PREFIX: &str = "f_";

/// Selected filter values, keyed by facet ID.
///
/// Invariant: a facet key is present only while its value set is non-empty.
/// [`FilterSelection::toggle`] prunes a facet as soon as its last value is
/// removed, so `toggle` is its own inverse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection(BTreeMap<String, BTreeSet<String>>);

impl FilterSelection {
    /// An empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values selected for a facet, if any.
    #[must_use]
    pub fn selected(&self, facet: &str) -> Option<&BTreeSet<String>> {
        self.0.get(facet)
    }

    /// Whether a specific `(facet, value)` pair is selected.
    #[must_use]
    pub fn contains(&self, facet: &str, value: &str) -> bool {
        self.0.get(facet).is_some_and(|set| set.contains(value))
    }

    /// Toggle a single `(facet, value)` pair.
    ///
    /// Toggling an absent value adds it; toggling a present value removes it
    /// and drops the facet key entirely when its set becomes empty.
    pub fn toggle(&mut self, facet: &str, value: &str) {
        if let Some(set) = self.0.get_mut(facet) {
            if !set.remove(value) {
                set.insert(value.to_owned());
            }
            if set.is_empty() {
                self.0.remove(facet);
            }
        } else {
            let mut set = BTreeSet::new();
            set.insert(value.to_owned());
            self.0.insert(facet.to_owned(), set);
        }
    }

    /// Remove every selection.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterate facets with their selected values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a selection out of URL query pairs.
    ///
    /// Only keys carrying the `f_` prefix participate. Repeated keys
    /// accumulate and comma-separated values are split, so
    /// `f_brand=nike,adidas` and `f_brand=nike&f_brand=adidas` are
    /// equivalent. Empty values are ignored, preserving the non-empty-set
    /// invariant.
    pub fn from_query_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (key, value) in pairs {
            let Some(facet) = key.strip_prefix(QUERY_PREFIX) else {
                continue;
            };
            if facet.is_empty() {
                continue;
            }
            for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                map.entry(facet.to_owned())
                    .or_default()
                    .insert(part.to_owned());
            }
        }
        Self(map)
    }

    /// Render the selection back into `f_`-prefixed query pairs, with the
    /// values of each facet comma-joined in sorted order. The output is
    /// canonical: equal selections always produce equal pair lists, which
    /// makes it usable as a cache key component.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(facet, values)| {
                let joined = values.iter().cloned().collect::<Vec<_>>().join(",");
                (format!("{QUERY_PREFIX}{facet}"), joined)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_adds_then_removes() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        assert!(filters.contains("brand", "nike"));

        filters.toggle("brand", "nike");
        assert!(!filters.contains("brand", "nike"));
        assert!(filters.is_empty());
    }

    #[test]
    fn toggle_is_an_involution() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("size", "42");
        let before = filters.clone();

        filters.toggle("brand", "adidas");
        filters.toggle("brand", "adidas");
        assert_eq!(filters, before);
    }

    #[test]
    fn removing_last_value_drops_the_facet_key() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("brand", "adidas");
        filters.toggle("brand", "nike");
        assert!(filters.selected("brand").is_some());

        filters.toggle("brand", "adidas");
        assert!(filters.selected("brand").is_none());
    }

    #[test]
    fn no_facet_ever_maps_to_an_empty_set() {
        let mut filters = FilterSelection::new();
        for (facet, value) in [
            ("brand", "nike"),
            ("brand", "nike"),
            ("size", "42"),
            ("brand", "adidas"),
            ("size", "42"),
        ] {
            filters.toggle(facet, value);
            for (_, values) in filters.iter() {
                assert!(!values.is_empty());
            }
        }
    }

    #[test]
    fn clear_empties_everything() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("size", "42");
        filters.clear();
        assert!(filters.is_empty());
    }

    #[test]
    fn query_pairs_round_trip() {
        let mut filters = FilterSelection::new();
        filters.toggle("brand", "nike");
        filters.toggle("brand", "adidas");
        filters.toggle("size", "42");

        let pairs = filters.to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("f_brand".to_owned(), "adidas,nike".to_owned()),
                ("f_size".to_owned(), "42".to_owned()),
            ]
        );

        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(FilterSelection::from_query_pairs(borrowed), filters);
    }

    #[test]
    fn from_query_pairs_ignores_unprefixed_and_empty() {
        let filters = FilterSelection::from_query_pairs([
            ("page", "2"),
            ("f_brand", ""),
            ("f_", "nike"),
            ("f_size", "42, 43"),
        ]);
        assert!(filters.selected("brand").is_none());
        let sizes = filters.selected("size").expect("sizes selected");
        assert_eq!(sizes.len(), 2);
        assert!(sizes.contains("42") && sizes.contains("43"));
    }

    #[test]
    fn repeated_keys_accumulate() {
        let filters =
            FilterSelection::from_query_pairs([("f_brand", "nike"), ("f_brand", "adidas")]);
        assert_eq!(filters.selected("brand").map(BTreeSet::len), Some(2));
    }
}
