use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub name: String,
    pub title: String,
}

impl NodeMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { title: name.clone(), name }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Real-valued variable. Whether it is an observable or a free parameter
    /// is decided by the dataset it is evaluated against.
    Variable { value: f64, min: f64, max: f64 },
    Constant(f64),
    /// Computed node; `class` names the function it evaluates (e.g. "Gaussian").
    Function { class: String },
}

impl NodeKind {
    pub fn is_variable(&self) -> bool {
        matches!(self, NodeKind::Variable { .. })
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, NodeKind::Function { .. })
    }
}
