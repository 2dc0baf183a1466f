//! Clones a prototype model once per master-category state, replacing split
//! parameters with state-qualified copies.
use crate::analysis::topology;
use crate::category::{Category, LabelIndex, ProductCategory};
use crate::config::ParseError;
use crate::error::BuildError;
use crate::store::{NodeId, Registry};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

/// Split leaves shared by every customizer of one builder, keyed by leaf
/// name. Two customizers splitting `p` by the same label get the same `p_<label>`.
#[derive(Debug, Default)]
pub struct SplitLeafPool {
    leaves: HashMap<String, NodeId>,
}

impl SplitLeafPool {
    pub fn new() -> Self { Self::default() }
    pub fn get(&self, name: &str) -> Option<NodeId> { self.leaves.get(name).copied() }
    pub fn len(&self) -> usize { self.leaves.len() }
    pub fn is_empty(&self) -> bool { self.leaves.is_empty() }
    pub fn clear(&mut self) { self.leaves.clear() }

    /// Forgets leaves at or beyond `node_count`, after the registry was rolled back.
    pub fn forget_from(&mut self, node_count: usize) {
        self.leaves.retain(|_, id| id.index() < node_count);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneState {
    Unbuilt,
    Built(NodeId),
}

#[derive(Debug)]
pub struct Customizer {
    name: String,
    prototype: NodeId,
    master: Rc<ProductCategory>,
    /// Built on the first `build`, then reused for every later label.
    master_index: Option<LabelIndex>,
    prescriptions: IndexMap<NodeId, Rc<Category>>,
    built: IndexMap<String, NodeId>,
    owned: Vec<NodeId>,
}

impl Customizer {
    pub fn new(name: &str, prototype: NodeId, master: Rc<ProductCategory>) -> Self {
        Self {
            name: name.to_string(),
            prototype,
            master,
            master_index: None,
            prescriptions: IndexMap::new(),
            built: IndexMap::new(),
            owned: Vec::new(),
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn prototype(&self) -> NodeId { self.prototype }

    /// Nodes cloned by this customizer, split leaves excluded (those belong to the pool).
    pub fn owned_nodes(&self) -> &[NodeId] { &self.owned }

    pub fn prescriptions(&self) -> impl Iterator<Item = (NodeId, &Category)> {
        self.prescriptions.iter().map(|(&p, c)| (p, c.as_ref()))
    }

    pub fn state(&self, master_label: &str) -> CloneState {
        self.built.get(master_label).map_or(CloneState::Unbuilt, |&id| CloneState::Built(id))
    }

    /// Registers that every parameter in `params` is split by `category`. A
    /// parameter can only be split once; on conflict nothing is registered.
    pub fn split_args(&mut self, registry: &Registry, params: &[NodeId], category: Rc<Category>) -> Result<(), ParseError> {
        for (i, param) in params.iter().enumerate() {
            if self.prescriptions.contains_key(param) || params[..i].contains(param) {
                return Err(ParseError::DuplicatePrescription {
                    model: self.name.clone(),
                    param: registry.name(*param).to_string(),
                });
            }
        }
        for &param in params {
            self.prescriptions.insert(param, category.clone());
        }
        Ok(())
    }

    /// Returns the clone of the prototype for `master_label`, building it on
    /// first request. Nodes that do not depend on a split parameter are
    /// shared with the prototype; with nothing to split the prototype itself
    /// is returned.
    pub fn build(
        &mut self,
        registry: &mut Registry,
        pool: &mut SplitLeafPool,
        master_label: &str,
        verbose: bool,
    ) -> Result<NodeId, BuildError> {
        if let CloneState::Built(root) = self.state(master_label) {
            return Ok(root);
        }

        // Resolve every split label before touching the registry, so a
        // membership failure leaves nothing behind.
        let index = match self.master_index.take() {
            Some(index) => index,
            None => self.master.label_index()?,
        };
        let assignment = index.assignment_for(master_label);
        self.master_index = Some(index);
        let assignment = assignment?;
        let mut split_names = HashMap::with_capacity(self.prescriptions.len());
        for (&param, category) in &self.prescriptions {
            let label = category.label(&assignment)?;
            split_names.insert(param, format!("{}_{}", registry.name(param), label));
        }
        let order = topology::dependency_order(registry, &[self.prototype])?;

        let mark = registry.mark();
        let mut new_leaves = Vec::new();
        let mut cloned = Vec::new();
        let result = self.redirect(registry, pool, &order, &split_names, master_label, verbose, &mut new_leaves, &mut cloned);

        match result {
            Ok(root) => {
                pool.leaves.extend(new_leaves);
                self.owned.extend(cloned);
                self.built.insert(master_label.to_string(), root);
                Ok(root)
            }
            Err(e) => {
                registry.truncate(mark);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn redirect(
        &self,
        registry: &mut Registry,
        pool: &SplitLeafPool,
        order: &[NodeId],
        split_names: &HashMap<NodeId, String>,
        master_label: &str,
        verbose: bool,
        new_leaves: &mut Vec<(String, NodeId)>,
        cloned: &mut Vec<NodeId>,
    ) -> Result<NodeId, BuildError> {
        let mut replaced: HashMap<NodeId, NodeId> = HashMap::new();

        // Parents come before children in `order`, so every redirect target
        // exists by the time a consumer is cloned. Shared nodes appear once.
        for &node in order {
            if let Some(split_name) = split_names.get(&node) {
                let existing = pool
                    .get(split_name)
                    .or_else(|| new_leaves.iter().find(|(n, _)| n == split_name).map(|(_, id)| *id));
                let leaf = match existing {
                    Some(leaf) => leaf,
                    None => {
                        let leaf = registry.clone_node(node, split_name.clone(), &[])?;
                        log_clone(verbose, &self.name, registry.name(node), split_name);
                        new_leaves.push((split_name.clone(), leaf));
                        leaf
                    }
                };
                replaced.insert(node, leaf);
                continue;
            }

            let parents = registry.get_parents(node);
            if !parents.iter().any(|p| replaced.contains_key(p)) {
                continue;
            }
            let parents: Vec<NodeId> = parents.iter().map(|p| *replaced.get(p).unwrap_or(p)).collect();
            let clone_name = format!("{}_{}", registry.name(node), master_label);
            let clone = registry.clone_node(node, clone_name, &parents)?;
            log_clone(verbose, &self.name, registry.name(node), registry.name(clone));
            cloned.push(clone);
            replaced.insert(node, clone);
        }

        Ok(*replaced.get(&self.prototype).unwrap_or(&self.prototype))
    }
}

fn log_clone(verbose: bool, model: &str, original: &str, clone: &str) {
    if verbose {
        info!(model, "cloning {original} into {clone}");
    } else {
        debug!(model, "cloning {original} into {clone}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryError, FundamentalCategory, MappedCategory};
    use crate::error::BuildError;
    use crate::store::NodeKind;

    struct Fixture {
        reg: Registry,
        x: NodeId,
        m: NodeId,
        s: NodeId,
        k: NodeId,
        gauss: NodeId,
        argus: NodeId,
        pdf: NodeId,
    }

    /// pdf = gfrac * gauss(x; m, s) + argus(x; k)
    fn fixture() -> Fixture {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -10.0, 10.0);
        let m = reg.add_variable("m", 0.0, -10.0, 10.0);
        let s = reg.add_variable("s", 1.0, 0.0, 20.0);
        let k = reg.add_variable("k", -20.0, -50.0, 0.0);
        let gfrac = reg.add_variable("gfrac", 0.5, 0.0, 1.0);
        let gauss = reg.add_function("gauss", "Gaussian", &[x, m, s]).unwrap();
        let argus = reg.add_function("argus", "ArgusBG", &[x, k]).unwrap();
        let pdf = reg.add_function("pdf", "AddPdf", &[gauss, argus, gfrac]).unwrap();
        Fixture { reg, x, m, s, k, gauss, argus, pdf }
    }

    fn fundamental(name: &str, labels: &[&str]) -> Rc<Category> {
        Rc::new(Category::Fundamental(FundamentalCategory::with_states(name, labels.iter().copied())))
    }

    fn master_of(cats: &[Rc<Category>]) -> Rc<ProductCategory> {
        Rc::new(ProductCategory::new("masterSplitCat", cats.iter().cloned()))
    }

    #[test]
    fn test_split_renames_and_redirects() {
        let mut f = fixture();
        let c = fundamental("C", &["C1", "C2"]);
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[c.clone()]));
        cust.split_args(&f.reg, &[f.s], c).unwrap();
        let mut pool = SplitLeafPool::new();

        let c1 = cust.build(&mut f.reg, &mut pool, "C1", false).unwrap();
        let c2 = cust.build(&mut f.reg, &mut pool, "C2", false).unwrap();

        assert_eq!(f.reg.name(c1), "pdf_C1");
        assert_eq!(f.reg.name(c2), "pdf_C2");

        let gauss_c1 = f.reg.get_parents(c1)[0];
        assert_eq!(f.reg.name(gauss_c1), "gauss_C1");
        let gauss_parents = f.reg.get_parents(gauss_c1);
        assert_eq!(gauss_parents[0], f.x);
        assert_eq!(gauss_parents[1], f.m);
        assert_eq!(f.reg.name(gauss_parents[2]), "s_C1");
        assert_eq!(f.reg.kind(gauss_parents[2]), &NodeKind::Variable { value: 1.0, min: 0.0, max: 20.0 });

        // argus does not depend on s and stays shared
        assert_eq!(f.reg.get_parents(c1)[1], f.argus);
        assert_eq!(f.reg.get_parents(c2)[1], f.argus);
        // prototype untouched
        assert_eq!(f.reg.get_parents(f.gauss), &[f.x, f.m, f.s]);
        assert_eq!(cust.owned_nodes().len(), 4);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_build_is_memoized() {
        let mut f = fixture();
        let c = fundamental("C", &["C1", "C2"]);
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[c.clone()]));
        cust.split_args(&f.reg, &[f.s, f.k], c).unwrap();
        let mut pool = SplitLeafPool::new();

        assert_eq!(cust.state("C1"), CloneState::Unbuilt);
        let first = cust.build(&mut f.reg, &mut pool, "C1", true).unwrap();
        let count = f.reg.count();
        let again = cust.build(&mut f.reg, &mut pool, "C1", true).unwrap();

        assert_eq!(first, again);
        assert_eq!(f.reg.count(), count);
        assert_eq!(cust.state("C1"), CloneState::Built(first));
    }

    #[test]
    fn test_pool_shares_split_leaves_between_customizers() {
        let mut f = fixture();
        let other = f.reg.add_function("other", "Gaussian", &[f.x, f.m, f.s]).unwrap();
        let c = fundamental("C", &["C1", "C2"]);
        let master = master_of(&[c.clone()]);
        let mut pool = SplitLeafPool::new();

        let mut a = Customizer::new("pdf", f.pdf, master.clone());
        a.split_args(&f.reg, &[f.s], c.clone()).unwrap();
        let mut b = Customizer::new("other", other, master);
        b.split_args(&f.reg, &[f.s], c).unwrap();

        let pdf_c1 = a.build(&mut f.reg, &mut pool, "C1", false).unwrap();
        let other_c1 = b.build(&mut f.reg, &mut pool, "C1", false).unwrap();

        let s_from_a = f.reg.get_parents(f.reg.get_parents(pdf_c1)[0])[2];
        let s_from_b = f.reg.get_parents(other_c1)[2];
        assert_eq!(s_from_a, s_from_b);
        assert_eq!(pool.get("s_C1"), Some(s_from_a));
    }

    #[test]
    fn test_composite_split_label() {
        let mut f = fixture();
        let tag = fundamental("tag", &["Lep", "Kao"]);
        let run = fundamental("run", &["Run1", "Run2"]);
        let both = Rc::new(Category::Product(ProductCategory::new("tag,run", [tag.clone(), run.clone()])));
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[tag.clone(), run]));
        cust.split_args(&f.reg, &[f.k], both).unwrap();
        cust.split_args(&f.reg, &[f.m], tag).unwrap();
        let mut pool = SplitLeafPool::new();

        let root = cust.build(&mut f.reg, &mut pool, "{Kao;Run2}", false).unwrap();
        assert_eq!(f.reg.name(root), "pdf_{Kao;Run2}");
        assert!(f.reg.find("k_{Kao;Run2}").is_some());
        assert!(f.reg.find("m_Kao").is_some());
    }

    #[test]
    fn test_unsplit_model_returns_prototype() {
        let mut f = fixture();
        let c = fundamental("C", &["C1"]);
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[c]));
        let mut pool = SplitLeafPool::new();
        assert_eq!(cust.build(&mut f.reg, &mut pool, "C1", false).unwrap(), f.pdf);
    }

    #[test]
    fn test_duplicate_prescription_rejected() {
        let f = fixture();
        let c = fundamental("C", &["C1"]);
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[c.clone()]));
        cust.split_args(&f.reg, &[f.s], c.clone()).unwrap();

        let err = cust.split_args(&f.reg, &[f.k, f.s], c.clone()).unwrap_err();
        assert_eq!(err, ParseError::DuplicatePrescription { model: "pdf".into(), param: "s".into() });
        // nothing from the failed call was registered
        assert_eq!(cust.prescriptions().count(), 1);
        assert!(cust.split_args(&f.reg, &[f.k, f.k], c).is_err());
    }

    #[test]
    fn test_membership_failure_leaves_registry_untouched() {
        let mut f = fixture();
        let tag = fundamental("tag", &["Lep", "NT"]);
        let mapped = Rc::new(Category::Mapped(MappedCategory::new("tagMap", tag.clone()).map("Lep", "CutBased")));
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[tag.clone()]));
        cust.split_args(&f.reg, &[f.m], tag).unwrap();
        cust.split_args(&f.reg, &[f.s], mapped).unwrap();
        let mut pool = SplitLeafPool::new();
        let count = f.reg.count();

        let err = cust.build(&mut f.reg, &mut pool, "NT", false).unwrap_err();
        assert!(matches!(err, BuildError::CategoryMembership(_)), "{err}");
        assert_eq!(f.reg.count(), count);
        assert_eq!(cust.state("NT"), CloneState::Unbuilt);
        assert!(pool.is_empty());

        assert!(cust.build(&mut f.reg, &mut pool, "Lep", false).is_ok());
        assert!(f.reg.find("s_CutBased").is_some());
    }

    #[test]
    fn test_unknown_master_label() {
        let mut f = fixture();
        let c = fundamental("C", &["C1"]);
        let mut cust = Customizer::new("pdf", f.pdf, master_of(&[c]));
        let mut pool = SplitLeafPool::new();
        assert!(matches!(
            cust.build(&mut f.reg, &mut pool, "C9", false),
            Err(BuildError::CategoryMembership(CategoryError::UnknownCombination { .. }))
        ));
        assert_eq!(cust.build(&mut f.reg, &mut pool, "C1", false).unwrap(), f.pdf);
    }
}
