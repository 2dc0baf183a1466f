//! The assembled output of a build.
use crate::builder::StateMap;
use crate::category::ProductCategory;
use crate::store::{NodeId, Registry};
use indexmap::IndexMap;
use std::fmt::Write;

/// A model indexed by the fit category: one component per built state
/// combination, keyed by the fit category label.
#[derive(Debug, Clone)]
pub struct SimultaneousModel {
    name: String,
    fit_category: ProductCategory,
    components: IndexMap<String, NodeId>,
    state_map: StateMap,
}

impl SimultaneousModel {
    pub fn new(name: &str, fit_category: ProductCategory, state_map: StateMap) -> Self {
        Self { name: name.to_string(), fit_category, components: IndexMap::new(), state_map }
    }

    pub(crate) fn add_component(&mut self, label: String, component: NodeId) {
        self.components.insert(label, component);
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn fit_category(&self) -> &ProductCategory { &self.fit_category }
    pub fn state_map(&self) -> &StateMap { &self.state_map }

    pub fn component(&self, label: &str) -> Option<NodeId> {
        self.components.get(label).copied()
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.components.iter().map(|(label, &id)| (label.as_str(), id))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.components.len() }
    pub fn is_empty(&self) -> bool { self.components.is_empty() }

    /// One `label -> component` line per built state, in fit category order.
    pub fn summary(&self, registry: &Registry) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} indexed by {} ({} components)", self.name, self.fit_category.name, self.len());
        for (label, id) in self.components() {
            let _ = writeln!(out, "  {label} -> {}", registry.name(id));
        }
        out
    }
}
