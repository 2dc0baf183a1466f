//! The index-state to model association of a multi-model build, and the
//! policies applied while filling it in.
use crate::config::ModelRef;
use crate::error::{BuildError, NameKind};
use indexmap::IndexMap;

/// Maps index category states to the prototype model built for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    entries: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOutcome {
    Inserted,
    /// The state was already mapped; `kept` is the model that stays.
    DuplicateIgnored { kept: String },
}

impl StateMap {
    pub fn new() -> Self { Self::default() }

    /// First-wins policy: a state keeps the first model mapped to it, later
    /// mappings are reported and dropped.
    pub fn insert_first_wins(&mut self, state: &str, model: &str) -> MappingOutcome {
        match self.entries.get(state) {
            Some(kept) => MappingOutcome::DuplicateIgnored { kept: kept.clone() },
            None => {
                self.entries.insert(state.to_string(), model.to_string());
                MappingOutcome::Inserted
            }
        }
    }

    pub fn model_for(&self, state: &str) -> Option<&str> {
        self.entries.get(state).map(String::as_str)
    }

    /// Distinct mapped models, in order of first appearance.
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = Vec::new();
        for model in self.entries.values() {
            if !models.contains(&model.as_str()) {
                models.push(model);
            }
        }
        models
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, m)| (s.as_str(), m.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Resolves a model list entry to `(state, model)`. `A=B` reads as
/// `state=model` when `B` is a model, otherwise as `model=state` when `A` is;
/// a bare name is both the model and the state.
pub fn resolve_model_ref(entry: &ModelRef, is_model: impl Fn(&str) -> bool) -> Result<(String, String), BuildError> {
    match entry {
        ModelRef::Plain(name) if is_model(name) => Ok((name.clone(), name.clone())),
        ModelRef::Plain(name) => Err(BuildError::unresolved(NameKind::Model, name, "is not defined")),
        ModelRef::Mapped { left, right } if is_model(right) => Ok((left.clone(), right.clone())),
        ModelRef::Mapped { left, right } if is_model(left) => Ok((right.clone(), left.clone())),
        ModelRef::Mapped { left, right } => Err(BuildError::unresolved(
            NameKind::Model,
            &format!("{left}={right}"),
            "names no defined model on either side",
        )),
    }
}

/// Single-model policy: without an index category only the first entry takes
/// part. Returns it together with the entries that are ignored.
pub fn first_model_only(entries: &[ModelRef]) -> (Option<&ModelRef>, &[ModelRef]) {
    match entries.split_first() {
        Some((first, rest)) => (Some(first), rest),
        None => (None, &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(left: &str, right: &str) -> ModelRef {
        ModelRef::Mapped { left: left.into(), right: right.into() }
    }

    #[test]
    fn test_first_mapping_wins() {
        let mut map = StateMap::new();
        assert_eq!(map.insert_first_wins("modeA", "pdfA"), MappingOutcome::Inserted);
        assert_eq!(
            map.insert_first_wins("modeA", "pdfB"),
            MappingOutcome::DuplicateIgnored { kept: "pdfA".into() }
        );
        assert_eq!(map.model_for("modeA"), Some("pdfA"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_models_are_distinct() {
        let mut map = StateMap::new();
        map.insert_first_wins("modeA", "pdfA");
        map.insert_first_wins("modeB", "pdfB");
        map.insert_first_wins("modeC", "pdfA");
        assert_eq!(map.models(), vec!["pdfA", "pdfB"]);
    }

    #[test]
    fn test_model_ref_orientation() {
        let is_model = |n: &str| n.starts_with("pdf");
        assert_eq!(resolve_model_ref(&mapped("modeA", "pdfA"), is_model).unwrap(), ("modeA".into(), "pdfA".into()));
        assert_eq!(resolve_model_ref(&mapped("pdfA", "modeA"), is_model).unwrap(), ("modeA".into(), "pdfA".into()));
        assert_eq!(
            resolve_model_ref(&ModelRef::Plain("pdfC".into()), is_model).unwrap(),
            ("pdfC".into(), "pdfC".into())
        );
        assert!(matches!(
            resolve_model_ref(&mapped("a", "b"), is_model),
            Err(BuildError::NameResolution { kind: NameKind::Model, .. })
        ));
        assert!(resolve_model_ref(&ModelRef::Plain("nope".into()), is_model).is_err());
    }

    #[test]
    fn test_first_model_only() {
        let entries = vec![ModelRef::Plain("pdfA".into()), ModelRef::Plain("pdfB".into())];
        let (first, ignored) = first_model_only(&entries);
        assert_eq!(first, Some(&entries[0]));
        assert_eq!(ignored.len(), 1);
        assert_eq!(first_model_only(&[]), (None, &[][..]));
    }
}
