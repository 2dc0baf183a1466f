//! Name resolution, product construction and state restrictions used while
//! assembling a build.
use super::error::CategoryError;
use super::types::{Category, FundamentalCategory, ProductCategory};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::rc::Rc;

/// The categories a splitting rule may name during one build: the declared
/// split categories (including the index category) followed by the accepted
/// auxiliary categories.
#[derive(Debug, Clone, Default)]
pub struct SplitCategorySet {
    declared: IndexMap<String, Rc<Category>>,
    auxiliary: IndexMap<String, Rc<Category>>,
}

impl SplitCategorySet {
    pub fn new() -> Self { Self::default() }

    pub fn declare(&mut self, category: FundamentalCategory) {
        self.declared.insert(category.name.clone(), Rc::new(Category::Fundamental(category)));
    }

    /// Accepts an auxiliary category if it is a function of declared
    /// categories only. Otherwise hands back the names of the foreign servers.
    pub fn add_auxiliary(&mut self, category: Category) -> Result<(), Vec<String>> {
        let foreign: Vec<String> = category
            .fundamental_servers()
            .iter()
            .filter(|s| !self.declared.contains_key(&s.name))
            .map(|s| s.name.clone())
            .collect();
        if !foreign.is_empty() {
            return Err(foreign);
        }
        self.auxiliary.insert(category.name().to_string(), Rc::new(category));
        Ok(())
    }

    /// Looks a name up among the declared categories first, then the auxiliary ones.
    pub fn resolve(&self, name: &str) -> Result<Rc<Category>, CategoryError> {
        self.declared
            .get(name)
            .or_else(|| self.auxiliary.get(name))
            .cloned()
            .ok_or_else(|| CategoryError::NotFound(name.to_string()))
    }

    pub fn declared(&self) -> impl Iterator<Item = &FundamentalCategory> {
        self.declared.values().filter_map(|c| c.as_fundamental())
    }

    pub fn auxiliary_names(&self) -> impl Iterator<Item = &str> {
        self.auxiliary.keys().map(String::as_str)
    }
}

/// Product categories built for multi-category splitting rules. Lives as long
/// as the builder so repeated builds reuse the same instances. A cached
/// product is only handed out while its constituents still equal the
/// requested ones; a redefined constituent replaces the entry.
#[derive(Debug, Default)]
pub struct CompositeTable {
    by_constituents: HashMap<Vec<String>, Rc<Category>>,
}

impl CompositeTable {
    pub fn new() -> Self { Self::default() }

    /// Returns the product of `constituents`, named by joining their names
    /// with commas. A product over the same multiset of categories is only
    /// built once.
    pub fn build_composite(&mut self, constituents: Vec<Rc<Category>>) -> Rc<Category> {
        let mut requested: Vec<&Rc<Category>> = constituents.iter().collect();
        requested.sort_by(|a, b| a.name().cmp(b.name()));
        let key: Vec<String> = requested.iter().map(|c| c.name().to_string()).collect();

        if let Some(cached) = self.by_constituents.get(&key) {
            if same_constituents(cached, &requested) {
                return cached.clone();
            }
        }

        let name = constituents.iter().map(|c| c.name()).collect::<Vec<_>>().join(",");
        let product = Rc::new(Category::Product(ProductCategory::new(&name, constituents)));
        self.by_constituents.insert(key, product.clone());
        product
    }

    pub fn len(&self) -> usize { self.by_constituents.len() }
    pub fn is_empty(&self) -> bool { self.by_constituents.is_empty() }
    pub fn clear(&mut self) { self.by_constituents.clear() }
}

/// Compares by value: every build resolves fresh category instances.
fn same_constituents(cached: &Category, requested: &[&Rc<Category>]) -> bool {
    let Category::Product(product) = cached else {
        return false;
    };
    let mut existing: Vec<&Rc<Category>> = product.constituents.iter().collect();
    existing.sort_by(|a, b| a.name().cmp(b.name()));
    existing.len() == requested.len() && existing.iter().zip(requested).all(|(a, b)| **a == **b)
}

/// Allowed-state lists for the split categories of one build.
#[derive(Debug, Clone, Default)]
pub struct Restrictions {
    allowed: IndexMap<String, IndexSet<String>>,
}

impl Restrictions {
    pub fn new() -> Self { Self::default() }

    /// Limits `category` to `labels`. Every label must be a state of the category.
    pub fn restrict<S: AsRef<str>>(&mut self, category: &FundamentalCategory, labels: &[S]) -> Result<(), CategoryError> {
        let mut allowed = IndexSet::new();
        for label in labels {
            let label = label.as_ref();
            if category.lookup_state(label).is_none() {
                return Err(CategoryError::UnknownState { category: category.name.clone(), label: label.to_string() });
            }
            allowed.insert(label.to_string());
        }
        self.allowed.insert(category.name.clone(), allowed);
        Ok(())
    }

    /// Unrestricted categories allow every label.
    pub fn allows(&self, category: &str, label: &str) -> bool {
        self.allowed.get(category).map_or(true, |allowed| allowed.contains(label))
    }
}

fn product_of<'a>(name: &str, cats: impl IntoIterator<Item = &'a FundamentalCategory>) -> ProductCategory {
    ProductCategory::new(name, cats.into_iter().map(|c| Rc::new(Category::Fundamental(c.clone()))))
}

/// The category customizers are keyed on: every split dimension, then the index category.
pub fn build_master_category(split: &[FundamentalCategory], index: Option<&FundamentalCategory>) -> ProductCategory {
    product_of("masterSplitCat", split.iter().chain(index))
}

/// The category the assembled model is indexed by: the index category, then
/// every split dimension.
pub fn build_fit_category(index: Option<&FundamentalCategory>, split: &[FundamentalCategory]) -> ProductCategory {
    product_of("fitCat", index.into_iter().chain(split))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{MappedCategory, StateAssignment};

    fn fundamental(name: &str, labels: &[&str]) -> FundamentalCategory {
        FundamentalCategory::with_states(name, labels.iter().copied())
    }

    fn split_set() -> SplitCategorySet {
        let mut set = SplitCategorySet::new();
        set.declare(fundamental("tag", &["Lep", "Kao", "NT"]));
        set.declare(fundamental("run", &["Run1", "Run2"]));
        set
    }

    #[test]
    fn test_resolve_prefers_declared() {
        let mut set = split_set();
        let tag = set.resolve("tag").unwrap();
        set.add_auxiliary(Category::Mapped(MappedCategory::new("tagMap", tag).with_default("Any")))
            .unwrap();

        assert!(matches!(*set.resolve("tag").unwrap(), Category::Fundamental(_)));
        assert!(matches!(*set.resolve("tagMap").unwrap(), Category::Mapped(_)));
        assert_eq!(set.resolve("bogus").unwrap_err(), CategoryError::NotFound("bogus".into()));
    }

    #[test]
    fn test_auxiliary_with_foreign_server_rejected() {
        let mut set = split_set();
        let other = Rc::new(Category::Fundamental(fundamental("other", &["A"])));
        let err = set
            .add_auxiliary(Category::Mapped(MappedCategory::new("otherMap", other)))
            .unwrap_err();
        assert_eq!(err, vec!["other".to_string()]);
        assert_eq!(set.auxiliary_names().count(), 0);
    }

    #[test]
    fn test_composite_is_idempotent() {
        let set = split_set();
        let mut table = CompositeTable::new();
        let first = table.build_composite(vec![set.resolve("tag").unwrap(), set.resolve("run").unwrap()]);
        let again = table.build_composite(vec![set.resolve("tag").unwrap(), set.resolve("run").unwrap()]);
        let swapped = table.build_composite(vec![set.resolve("run").unwrap(), set.resolve("tag").unwrap()]);

        assert!(Rc::ptr_eq(&first, &again));
        assert!(Rc::ptr_eq(&first, &swapped));
        assert_eq!(first.name(), "tag,run");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_composite_rebuilt_when_constituent_redefined() {
        let tag = Rc::new(Category::Fundamental(fundamental("tag", &["Lep", "Kao"])));
        let run = Rc::new(Category::Fundamental(fundamental("run", &["Run1", "Run2"])));
        let tag_map = |default: &str| {
            Rc::new(Category::Mapped(MappedCategory::new("tagMap", tag.clone()).with_default(default)))
        };
        let mut table = CompositeTable::new();

        let old = table.build_composite(vec![tag_map("Old"), run.clone()]);
        let same = table.build_composite(vec![tag_map("Old"), run.clone()]);
        let new = table.build_composite(vec![tag_map("New"), run.clone()]);

        assert!(Rc::ptr_eq(&old, &same));
        assert!(!Rc::ptr_eq(&old, &new));
        assert_eq!(table.len(), 1);

        let a: StateAssignment = [("tag", "Lep"), ("run", "Run1")].into_iter().collect();
        assert_eq!(new.label(&a).unwrap(), "{New;Run1}");
        // The replaced entry is what later requests get.
        assert!(Rc::ptr_eq(&new, &table.build_composite(vec![run, tag_map("New")])));
    }

    #[test]
    fn test_restrictions() {
        let tag = fundamental("tag", &["Lep", "Kao", "NT"]);
        let mut r = Restrictions::new();
        r.restrict(&tag, &["Lep", "Kao"]).unwrap();

        assert!(r.allows("tag", "Lep"));
        assert!(!r.allows("tag", "NT"));
        assert!(r.allows("run", "Run1"));
        assert_eq!(
            r.restrict(&tag, &["Lep", "Bogus"]).unwrap_err(),
            CategoryError::UnknownState { category: "tag".into(), label: "Bogus".into() }
        );
    }

    #[test]
    fn test_master_and_fit_ordering() {
        let split = [fundamental("tag", &["Lep"]), fundamental("run", &["Run1"])];
        let mode = fundamental("mode", &["A"]);

        let master = build_master_category(&split, Some(&mode));
        let fit = build_fit_category(Some(&mode), &split);
        let a = fit.assignments().next().unwrap();

        assert_eq!(master.label(&a).unwrap(), "{Lep;Run1;A}");
        assert_eq!(fit.label(&a).unwrap(), "{A;Lep;Run1}");
    }
}
