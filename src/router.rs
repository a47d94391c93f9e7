//! Operation name to variant routing table
//!
//! Built once before the server accepts connections and read-only afterwards.

use crate::entry::Kind;
use std::collections::hash_map::Entry as Slot;
use std::collections::HashMap;
use tracing::debug;

/// Maps an operation name to the variant that implements it.
///
/// Registration is first-match: when two variants declare the same operation
/// name, the variant registered first keeps it and the later one is shadowed.
#[derive(Debug, Clone)]
pub struct Router {
    routes: HashMap<&'static str, Kind>,
    shadowed: Vec<(&'static str, Kind)>,
}

impl Router {
    /// Router over every variant in [`Kind::PRIORITY`] order.
    pub fn new() -> Self {
        Self::build(
            Kind::PRIORITY
                .iter()
                .map(|&kind| (kind, kind.operations())),
        )
    }

    /// Register each variant's operations in iteration order.
    pub fn build<I>(registrations: I) -> Self
    where
        I: IntoIterator<Item = (Kind, &'static [&'static str])>,
    {
        let mut routes = HashMap::new();
        let mut shadowed = Vec::new();

        for (kind, operations) in registrations {
            for &op in operations {
                match routes.entry(op) {
                    Slot::Vacant(slot) => {
                        slot.insert(kind);
                    }
                    Slot::Occupied(slot) => {
                        debug!(op, winner = %slot.get(), shadowed = %kind, "operation already routed");
                        shadowed.push((op, kind));
                    }
                }
            }
        }

        Self { routes, shadowed }
    }

    /// Variant that originates a new entry for `op`, if any.
    pub fn resolve(&self, op: &str) -> Option<Kind> {
        self.routes.get(op).copied()
    }

    /// Operations that lost registration to an earlier variant.
    pub fn shadowed(&self) -> &[(&'static str, Kind)] {
        &self.shadowed
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes() {
        let router = Router::new();
        assert_eq!(router.resolve("set"), Some(Kind::String));
        assert_eq!(router.resolve("hget"), Some(Kind::Hash));
        assert_eq!(router.resolve("rpush"), Some(Kind::List));
        assert_eq!(router.resolve("sismember"), Some(Kind::Set));
        assert_eq!(router.resolve("zrange"), Some(Kind::SortedSet));
        assert_eq!(router.resolve("flushall"), None);
        assert!(router.shadowed().is_empty());
        assert_eq!(router.len(), 18);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let router = Router::new();
        assert_eq!(router.resolve("SET"), None);
    }

    #[test]
    fn test_first_registered_variant_wins() {
        const LIST_OPS: &[&str] = &["push", "pop"];
        const SET_OPS: &[&str] = &["push", "card"];
        let router = Router::build([(Kind::List, LIST_OPS), (Kind::Set, SET_OPS)]);

        assert_eq!(router.resolve("push"), Some(Kind::List));
        assert_eq!(router.resolve("card"), Some(Kind::Set));
        assert_eq!(router.shadowed(), &[("push", Kind::Set)]);
    }
}
