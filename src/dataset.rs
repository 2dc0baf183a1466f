//! The dataset a build is configured against: named observables and the
//! fundamental categories that partition its entries.
use crate::category::FundamentalCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Names the dataset provides values for. Model variables with these names
/// are observables, every other variable is a parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableContext {
    names: HashSet<String>,
}

impl VariableContext {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn contains(&self, name: &str) -> bool { self.names.contains(name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetEntry<'a> {
    Observable(&'a str),
    Category(&'a FundamentalCategory),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub observables: Vec<String>,
    pub categories: IndexMap<String, FundamentalCategory>,
}

impl Dataset {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn with_observable(mut self, name: &str) -> Self {
        self.observables.push(name.to_string());
        self
    }

    pub fn with_category(mut self, category: FundamentalCategory) -> Self {
        self.categories.insert(category.name.clone(), category);
        self
    }

    /// The variable context every name in this dataset belongs to.
    pub fn get(&self) -> VariableContext {
        VariableContext::from_names(self.observables.iter().chain(self.categories.keys()).cloned())
    }

    pub fn find(&self, name: &str) -> Option<DatasetEntry<'_>> {
        if let Some(cat) = self.categories.get(name) {
            return Some(DatasetEntry::Category(cat));
        }
        self.observables
            .iter()
            .find(|o| o.as_str() == name)
            .map(|o| DatasetEntry::Observable(o.as_str()))
    }

    pub fn find_category(&self, name: &str) -> Option<&FundamentalCategory> {
        match self.find(name) {
            Some(DatasetEntry::Category(cat)) => Some(cat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_distinguishes_entries() {
        let ds = Dataset::new("D")
            .with_observable("x")
            .with_category(FundamentalCategory::with_states("C", ["C1", "C2"]));

        assert_eq!(ds.find("x"), Some(DatasetEntry::Observable("x")));
        assert!(matches!(ds.find("C"), Some(DatasetEntry::Category(c)) if c.states.len() == 2));
        assert_eq!(ds.find("m"), None);
        assert!(ds.find_category("x").is_none());

        let ctx = ds.get();
        assert!(ctx.contains("x") && ctx.contains("C"));
        assert!(!ctx.contains("m"));
    }
}
