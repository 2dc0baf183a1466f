use crate::builder::SimModelBuilder;
use crate::category::FundamentalCategory;
use crate::config::BuildConfig;
use crate::dataset::Dataset;
use crate::display::trace;
use crate::store::{NodeId, Registry};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

#[pyclass(name = "_ModelStore")]
#[derive(Debug, Clone, Default)]
pub struct PyModelStore {
    registry: Registry,
}

#[pymethods]
impl PyModelStore {
    #[new]
    pub fn new() -> Self { Self::default() }

    pub fn add_variable(&mut self, name: &str, value: f64, min: f64, max: f64) -> usize {
        self.registry.add_variable(name, value, min, max).index()
    }

    pub fn add_constant(&mut self, name: &str, value: f64) -> usize {
        self.registry.add_constant(name, value).index()
    }

    pub fn add_function(&mut self, name: &str, class: &str, parents: Vec<usize>) -> PyResult<usize> {
        let p_ids: Vec<NodeId> = parents.into_iter().map(NodeId::new).collect();
        self.registry
            .add_function(name, class, &p_ids)
            .map(|id| id.index())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn trace_node(&self, node_id: usize) -> String {
        trace::format_tree(&self.registry, NodeId::new(node_id))
    }

    pub fn node_count(&self) -> usize { self.registry.count() }
}

#[pyclass(name = "_Dataset")]
#[derive(Debug, Clone)]
pub struct PyDataset {
    inner: Dataset,
}

#[pymethods]
impl PyDataset {
    #[new]
    pub fn new(name: &str) -> Self {
        Self { inner: Dataset::new(name) }
    }

    pub fn add_observable(&mut self, name: &str) {
        self.inner = self.inner.clone().with_observable(name);
    }

    pub fn add_category(&mut self, name: &str, states: Vec<String>) {
        let category = FundamentalCategory::with_states(name, states.iter().map(String::as_str));
        self.inner = self.inner.clone().with_category(category);
    }
}

/// The builder holds `Rc` handles to its categories, so it stays on the
/// thread that created it.
#[pyclass(name = "_ModelBuilder", unsendable)]
#[derive(Debug)]
pub struct PyModelBuilder {
    inner: SimModelBuilder,
}

#[pymethods]
impl PyModelBuilder {
    /// Takes a snapshot of `store`; later additions to the store are not seen.
    #[new]
    pub fn new(store: &PyModelStore, prototypes: Vec<String>) -> PyResult<Self> {
        SimModelBuilder::new(store.registry.clone(), prototypes.iter().map(String::as_str))
            .map(|inner| Self { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    pub fn proto_config(&self) -> HashMap<String, String> {
        let config = self.inner.create_proto_build_config();
        let mut fields = HashMap::new();
        fields.insert("physModels".to_string(), config.phys_models.clone());
        fields.insert("splitCats".to_string(), config.split_cats.clone());
        for (model, rules) in &config.rules {
            fields.insert(model.clone(), rules.clone());
        }
        fields
    }

    /// Builds from a `{field: value}` mapping and returns `{fit_label: component_name}`.
    #[pyo3(signature = (config, dataset, verbose = false))]
    pub fn build(&mut self, config: HashMap<String, String>, dataset: &PyDataset, verbose: bool) -> PyResult<HashMap<String, String>> {
        let mut build_config = BuildConfig::new();
        for (field, value) in &config {
            build_config.set(field, value);
        }
        let output = self
            .inner
            .build(&build_config, &dataset.inner, &[], verbose)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;

        let registry = self.inner.registry();
        Ok(output
            .model
            .components()
            .map(|(label, id)| (label.to_string(), registry.name(id).to_string()))
            .collect())
    }

    pub fn trace_node(&self, node_id: usize) -> String {
        trace::format_tree(self.inner.registry(), NodeId::new(node_id))
    }

    pub fn release(&mut self) -> usize { self.inner.release() }
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModelStore>()?;
    m.add_class::<PyDataset>()?;
    m.add_class::<PyModelBuilder>()?;
    Ok(())
}
