//! Assembles a simultaneous model from prototype models, a dataset and a
//! build configuration.
mod state_map;

pub use state_map::{first_model_only, resolve_model_ref, MappingOutcome, StateMap};

use crate::analysis::topology;
use crate::category::{
    build_fit_category, build_master_category, Category, CompositeTable, FundamentalCategory, ProductCategory,
    Restrictions, SplitCategorySet,
};
use crate::config::parser::{self, PhysModelsLine, PHYS_MODELS};
use crate::config::{BuildConfig, ModelRef, ParseError};
use crate::customizer::{Customizer, SplitLeafPool};
use crate::dataset::{Dataset, VariableContext};
use crate::error::{BuildError, BuildWarning, NameKind};
use crate::model::SimultaneousModel;
use crate::store::{NodeId, Registry, RegistryMark};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// A successful build: the assembled model and every warning raised on the way.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub model: SimultaneousModel,
    pub warnings: Vec<BuildWarning>,
}

/// Builds simultaneous models from a fixed set of prototype models.
///
/// The builder owns the registry holding the prototypes and everything
/// derived from them. Customizers, split leaves and product categories
/// outlive each `build` call, so consecutive builds on the same builder share
/// split parameters (`p_C1` is the same node in both). Nothing is reclaimed
/// until [`SimModelBuilder::release`].
///
/// Not meant for concurrent use; `build` takes `&mut self`.
#[derive(Debug)]
pub struct SimModelBuilder {
    registry: Registry,
    prototypes: IndexMap<String, NodeId>,
    origin: RegistryMark,
    composites: CompositeTable,
    split_leaves: SplitLeafPool,
    customizers: Vec<Customizer>,
}

fn report(warnings: &mut Vec<BuildWarning>, warning: BuildWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

impl SimModelBuilder {
    /// Takes ownership of `registry` and selects the nodes named in
    /// `prototypes` as the models that can be built.
    pub fn new<'a>(registry: Registry, prototypes: impl IntoIterator<Item = &'a str>) -> Result<Self, BuildError> {
        let mut protos = IndexMap::new();
        for name in prototypes {
            let id = registry
                .find(name)
                .ok_or_else(|| BuildError::unresolved(NameKind::Model, name, "is not registered"))?;
            topology::dependency_order(&registry, &[id])?;
            protos.insert(name.to_string(), id);
        }
        let origin = registry.mark();
        Ok(Self {
            registry,
            prototypes: protos,
            origin,
            composites: CompositeTable::new(),
            split_leaves: SplitLeafPool::new(),
            customizers: Vec::new(),
        })
    }

    pub fn registry(&self) -> &Registry { &self.registry }
    pub fn into_registry(self) -> Registry { self.registry }
    pub fn prototype(&self, name: &str) -> Option<NodeId> { self.prototypes.get(name).copied() }
    pub fn customizers(&self) -> &[Customizer] { &self.customizers }
    pub fn split_leaves(&self) -> &SplitLeafPool { &self.split_leaves }
    pub fn composites(&self) -> &CompositeTable { &self.composites }

    /// A blank configuration with an empty rule line for every prototype.
    pub fn create_proto_build_config(&self) -> BuildConfig {
        BuildConfig::for_models(self.prototypes.keys().map(String::as_str))
    }

    /// Builds a simultaneous model. On error nothing is returned and every
    /// node registered by this call is rolled back.
    pub fn build(
        &mut self,
        config: &BuildConfig,
        dataset: &Dataset,
        aux_split_cats: &[Category],
        verbose: bool,
    ) -> Result<BuildOutput, BuildError> {
        let mark = self.registry.mark();
        let mut warnings = Vec::new();
        match self.try_build(config, dataset, aux_split_cats, verbose, &mut warnings) {
            Ok(model) => Ok(BuildOutput { model, warnings }),
            Err(e) => {
                error!(operation = "build", "{e}");
                self.registry.truncate(mark);
                self.split_leaves.forget_from(mark.node_count());
                Err(e)
            }
        }
    }

    /// Drops every customizer, clone, split leaf and product category created
    /// by earlier builds. Models returned by those builds must not be used
    /// afterwards. Returns the number of nodes released.
    pub fn release(&mut self) -> usize {
        let released = self.registry.count() - self.origin.node_count();
        self.customizers.clear();
        self.split_leaves.clear();
        self.composites.clear();
        self.registry.truncate(self.origin);
        info!(released, "released builder-owned nodes");
        released
    }

    fn try_build(
        &mut self,
        config: &BuildConfig,
        dataset: &Dataset,
        aux_split_cats: &[Category],
        verbose: bool,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<SimultaneousModel, BuildError> {
        let context = dataset.get();
        let phys = parser::parse_phys_models(&config.phys_models)?;
        let (index, state_map, models) = self.select_models(&phys, dataset, warnings)?;
        let (split, restrictions) = select_split_categories(&config.split_cats, index.as_ref(), dataset)?;
        if split.is_empty() && index.is_none() {
            return Err(BuildError::NothingToSplit);
        }

        let split_set = split_category_set(&split, index.as_ref(), aux_split_cats, warnings);
        let master = Rc::new(build_master_category(&split, index.as_ref()));

        let mut customizers = Vec::with_capacity(models.len());
        for model in &models {
            customizers.push(self.configure_customizer(model, config, &context, &split_set, &master, warnings)?);
        }
        info!("configured customizers for all physics models");

        let fit = build_fit_category(index.as_ref(), &split);
        let mut sim = SimultaneousModel::new("simPdf", fit.clone(), state_map.clone());

        for assignment in fit.assignments() {
            let fit_label = fit.label(&assignment)?;

            if let Some((cat, label)) = assignment.iter().find(|(c, l)| !restrictions.allows(c, l)) {
                debug!("skipping {fit_label}: state {label} of {cat} is not selected");
                continue;
            }

            let customizer = match &index {
                Some(index) => {
                    let state = assignment.get(&index.name).unwrap_or_default();
                    let Some(model) = state_map.model_for(state) else {
                        debug!("skipping {fit_label}: no physics model mapped to {}={state}", index.name);
                        continue;
                    };
                    customizers.iter_mut().find(|c| c.name() == model)
                }
                None => customizers.first_mut(),
            };
            let Some(customizer) = customizer else {
                debug!("skipping {fit_label}: no customizer for its physics model");
                continue;
            };

            let master_label = master.label(&assignment)?;
            info!("customizing physics model {} for state {fit_label}", customizer.name());
            let component = customizer.build(&mut self.registry, &mut self.split_leaves, &master_label, verbose)?;
            sim.add_component(fit_label, component);
        }

        self.customizers.extend(customizers);
        Ok(sim)
    }

    /// Resolves the physics model list into the optional index category, the
    /// state map and the distinct models to customize.
    fn select_models(
        &self,
        phys: &PhysModelsLine,
        dataset: &Dataset,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<(Option<FundamentalCategory>, StateMap, Vec<String>), BuildError> {
        let is_model = |name: &str| self.prototypes.contains_key(name);
        let mut state_map = StateMap::new();

        let Some(index_name) = &phys.index_category else {
            let (first, ignored) = first_model_only(&phys.models);
            let first = first.ok_or_else(|| ParseError::Empty { field: PHYS_MODELS.to_string() })?;
            if let ModelRef::Mapped { .. } = first {
                report(warnings, BuildWarning::MappingWithoutIndex { entry: first.to_string() });
            }
            let (_, model) = resolve_model_ref(first, is_model)?;
            if !ignored.is_empty() {
                let ignored = ignored.iter().map(ToString::to_string).collect();
                report(warnings, BuildWarning::ExtraModelsIgnored { used: model.clone(), ignored });
            }
            info!("list of physics models: [{model}]");
            return Ok((None, state_map, vec![model]));
        };

        let index = dataset.find_category(index_name).cloned().ok_or_else(|| {
            BuildError::unresolved(NameKind::IndexCategory, index_name, "not found in dataset variables")
        })?;
        info!("category indexing physics model: {index_name}");

        for entry in &phys.models {
            let (state, model) = resolve_model_ref(entry, is_model)?;
            if index.lookup_state(&state).is_none() {
                report(warnings, BuildWarning::UnknownIndexState { state, index_category: index.name.clone() });
                continue;
            }
            if let MappingOutcome::DuplicateIgnored { kept } = state_map.insert_first_wins(&state, &model) {
                report(warnings, BuildWarning::DuplicateStateMapping { state, kept, dropped: model });
            }
        }

        let models: Vec<String> = state_map.models().into_iter().map(String::from).collect();
        info!("list of physics models: {models:?}");
        Ok((Some(index), state_map, models))
    }

    fn configure_customizer(
        &mut self,
        model: &str,
        config: &BuildConfig,
        context: &VariableContext,
        split_set: &SplitCategorySet,
        master: &Rc<ProductCategory>,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<Customizer, BuildError> {
        let prototype = self
            .prototype(model)
            .ok_or_else(|| BuildError::unresolved(NameKind::Model, model, "is not defined"))?;
        info!("processing physics model {model}");
        let mut customizer = Customizer::new(model, prototype, master.clone());

        let Some(line) = config.rules_for(model) else {
            report(warnings, BuildWarning::NoSplittingRules { model: model.to_string() });
            return Ok(customizer);
        };
        let rules = parser::parse_rules(model, line)?;
        let params = topology::parameters(&self.registry, prototype, context)?;

        for rule in rules {
            let category = self.resolve_rule_category(&rule.categories, split_set)?;
            let ids = rule
                .params
                .iter()
                .map(|name| {
                    params
                        .iter()
                        .copied()
                        .find(|&id| self.registry.name(id) == name.as_str())
                        .ok_or_else(|| {
                            BuildError::unresolved(
                                NameKind::Parameter,
                                name,
                                format!("is not a parameter of physics model {model}"),
                            )
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            customizer.split_args(&self.registry, &ids, category)?;
        }
        Ok(customizer)
    }

    /// A single name resolves directly; several names build (or reuse) their product.
    fn resolve_rule_category(&mut self, names: &[String], split_set: &SplitCategorySet) -> Result<Rc<Category>, BuildError> {
        if let [single] = names {
            return Ok(split_set.resolve(single)?);
        }
        let constituents = names
            .iter()
            .map(|n| split_set.resolve(n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.composites.build_composite(constituents))
    }
}

/// Resolves the `splitCats` line against the dataset. The index category is
/// implicitly a split category; listing it again only adds its restriction.
fn select_split_categories(
    line: &str,
    index: Option<&FundamentalCategory>,
    dataset: &Dataset,
) -> Result<(Vec<FundamentalCategory>, Restrictions), BuildError> {
    let mut split: Vec<FundamentalCategory> = Vec::new();
    let mut restrictions = Restrictions::new();

    for cat_ref in parser::parse_split_cats(line)? {
        let cat = dataset.find_category(&cat_ref.name).ok_or_else(|| {
            BuildError::unresolved(NameKind::SplitCategory, &cat_ref.name, "is not a category in the dataset")
        })?;
        let is_index = index.map_or(false, |i| i.name == cat.name);
        if !is_index {
            if split.iter().any(|c| c.name == cat.name) {
                return Err(BuildError::unresolved(NameKind::SplitCategory, &cat.name, "is listed more than once"));
            }
            split.push(cat.clone());
        }
        if let Some(states) = &cat_ref.states {
            info!("splitting of category {} restricted to states ({})", cat.name, states.join(","));
            restrictions.restrict(cat, states.as_slice())?;
        }
    }

    let names: Vec<&str> = split.iter().map(|c| c.name.as_str()).collect();
    info!("list of splitting categories: {names:?}");
    Ok((split, restrictions))
}

/// Declares the split and index categories and accepts the auxiliary
/// categories that are functions of them alone.
fn split_category_set(
    split: &[FundamentalCategory],
    index: Option<&FundamentalCategory>,
    aux_split_cats: &[Category],
    warnings: &mut Vec<BuildWarning>,
) -> SplitCategorySet {
    let mut set = SplitCategorySet::new();
    for cat in split.iter().chain(index) {
        set.declare(cat.clone());
    }
    for aux in aux_split_cats {
        if let Err(foreign) = set.add_auxiliary(aux.clone()) {
            report(warnings, BuildWarning::AuxiliaryCategoryIgnored { category: aux.name().to_string(), foreign });
        }
    }
    let accepted: Vec<&str> = set.auxiliary_names().collect();
    if !accepted.is_empty() {
        info!("list of auxiliary splitting categories: {accepted:?}");
    }
    set
}
