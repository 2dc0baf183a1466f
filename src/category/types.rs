//! Category variables and the labels they take under a state assignment.
use super::error::CategoryError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::rc::Rc;

/// One labeled state of a fundamental category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryState {
    pub label: String,
    pub index: i32,
}

/// The current label of every fundamental category taking part in an
/// enumeration, keyed by category name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateAssignment(IndexMap<String, String>);

impl StateAssignment {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, category: &str, label: &str) {
        self.0.insert(category.to_string(), label.to_string());
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.0.get(category).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for StateAssignment {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut assignment = Self::new();
        for (category, label) in iter {
            assignment.set(category, label);
        }
        assignment
    }
}

/// A discrete variable with enumerated states, as found in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalCategory {
    pub name: String,
    pub states: Vec<CategoryState>,
}

impl FundamentalCategory {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), states: Vec::new() }
    }

    /// Builds a category whose states are numbered in declaration order.
    pub fn with_states<'a>(name: &str, labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cat = Self::new(name);
        for label in labels {
            cat.define_state(label);
        }
        cat
    }

    /// Adds a state with the next free index. Redefining a label is a no-op.
    pub fn define_state(&mut self, label: &str) -> i32 {
        if let Some(state) = self.lookup_state(label) {
            return state.index;
        }
        let index = self.states.iter().map(|s| s.index + 1).max().unwrap_or(0);
        self.states.push(CategoryState { label: label.to_string(), index });
        index
    }

    pub fn lookup_state(&self, label: &str) -> Option<&CategoryState> {
        self.states.iter().find(|s| s.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.label.as_str())
    }
}

/// Maps labels of an input category onto its own states. Patterns may use
/// `*` and `?` wildcards; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedCategory {
    pub name: String,
    pub input: Rc<Category>,
    pub rules: Vec<(String, String)>,
    pub default: Option<String>,
}

impl MappedCategory {
    pub fn new(name: &str, input: Rc<Category>) -> Self {
        Self { name: name.to_string(), input, rules: Vec::new(), default: None }
    }

    pub fn map(mut self, pattern: &str, output: &str) -> Self {
        self.rules.push((pattern.to_string(), output.to_string()));
        self
    }

    pub fn with_default(mut self, output: &str) -> Self {
        self.default = Some(output.to_string());
        self
    }

    fn output_for(&self, input: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(pattern, _)| glob_match(pattern, input))
            .map(|(_, output)| output.as_str())
            .or(self.default.as_deref())
    }
}

/// The Cartesian product of its constituents' states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCategory {
    pub name: String,
    pub constituents: SmallVec<[Rc<Category>; 4]>,
}

impl ProductCategory {
    pub fn new(name: &str, constituents: impl IntoIterator<Item = Rc<Category>>) -> Self {
        Self { name: name.to_string(), constituents: constituents.into_iter().collect() }
    }

    /// `{a;b}` for several constituents, the bare label for a single one.
    pub fn label(&self, assignment: &StateAssignment) -> Result<String, CategoryError> {
        let labels = self
            .constituents
            .iter()
            .map(|c| c.label(assignment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match labels.as_slice() {
            [single] => single.clone(),
            _ => format!("{{{}}}", labels.join(";")),
        })
    }

    /// The fundamental categories this product is ultimately built from, in
    /// first-appearance order.
    pub fn fundamental_servers(&self) -> Vec<&FundamentalCategory> {
        let mut servers: Vec<&FundamentalCategory> = Vec::new();
        for c in &self.constituents {
            for server in c.fundamental_servers() {
                if !servers.iter().any(|s| s.name == server.name) {
                    servers.push(server);
                }
            }
        }
        servers
    }

    /// Every combination of fundamental server states. The last server varies
    /// fastest, so iteration follows declaration order.
    pub fn assignments(&self) -> Assignments<'_> {
        let servers = self.fundamental_servers();
        let exhausted = servers.iter().any(|s| s.states.is_empty());
        Assignments { cursor: vec![0; servers.len()], servers, exhausted }
    }

    /// Enumerates the product once and indexes every assignment by the label it produces.
    pub fn label_index(&self) -> Result<LabelIndex, CategoryError> {
        let mut by_label = HashMap::new();
        for assignment in self.assignments() {
            by_label.entry(self.label(&assignment)?).or_insert(assignment);
        }
        Ok(LabelIndex { category: self.name.clone(), by_label })
    }
}

/// Reverse lookup from the labels of a product category to the fundamental
/// assignments that produce them.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    category: String,
    by_label: HashMap<String, StateAssignment>,
}

impl LabelIndex {
    pub fn assignment_for(&self, label: &str) -> Result<StateAssignment, CategoryError> {
        self.by_label.get(label).cloned().ok_or_else(|| CategoryError::UnknownCombination {
            category: self.category.clone(),
            label: label.to_string(),
        })
    }

    pub fn len(&self) -> usize { self.by_label.len() }
    pub fn is_empty(&self) -> bool { self.by_label.is_empty() }
}

pub struct Assignments<'a> {
    servers: Vec<&'a FundamentalCategory>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl Iterator for Assignments<'_> {
    type Item = StateAssignment;

    fn next(&mut self) -> Option<StateAssignment> {
        if self.exhausted {
            return None;
        }
        let current = self
            .servers
            .iter()
            .zip(&self.cursor)
            .map(|(cat, &i)| (cat.name.as_str(), cat.states[i].label.as_str()))
            .collect();

        // Advance the odometer
        self.exhausted = true;
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.servers[pos].states.len() {
                self.exhausted = false;
                break;
            }
            self.cursor[pos] = 0;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Fundamental(FundamentalCategory),
    Mapped(MappedCategory),
    Product(ProductCategory),
}

impl Category {
    pub fn name(&self) -> &str {
        match self {
            Category::Fundamental(c) => &c.name,
            Category::Mapped(c) => &c.name,
            Category::Product(c) => &c.name,
        }
    }

    pub fn as_fundamental(&self) -> Option<&FundamentalCategory> {
        match self {
            Category::Fundamental(c) => Some(c),
            _ => None,
        }
    }

    /// The label this category takes when its fundamental servers are in the
    /// states given by `assignment`.
    pub fn label(&self, assignment: &StateAssignment) -> Result<String, CategoryError> {
        match self {
            Category::Fundamental(c) => assignment
                .get(&c.name)
                .filter(|label| c.lookup_state(label).is_some())
                .map(str::to_string)
                .ok_or_else(|| CategoryError::Unassigned { category: c.name.clone() }),
            Category::Mapped(c) => {
                let input = c.input.label(assignment)?;
                c.output_for(&input)
                    .map(str::to_string)
                    .ok_or(CategoryError::NoMapping { category: c.name.clone(), input })
            }
            Category::Product(c) => c.label(assignment),
        }
    }

    pub fn fundamental_servers(&self) -> Vec<&FundamentalCategory> {
        match self {
            Category::Fundamental(c) => vec![c],
            Category::Mapped(c) => c.input.fundamental_servers(),
            Category::Product(c) => c.fundamental_servers(),
        }
    }
}

/// Shell-style matching with `*` (any run) and `?` (any single character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
