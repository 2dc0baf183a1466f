use crate::model::SimultaneousModel;
use crate::store::{NodeId, NodeKind, Registry};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the expression tree under `target`. A node reached a second time
/// prints a reference to the level it was first printed at.
pub fn format_tree(registry: &Registry, target: NodeId) -> String {
    let mut tracer = Tracer { registry, visited_at_level: HashMap::new(), output: String::new() };

    if registry.contains(target) {
        let _ = writeln!(tracer.output, "MODEL TREE for node '{}':", registry.name(target));
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid Node ID {:?}", target);
    }
    tracer.output
}

/// Renders every component of a simultaneous model, one tree per fit state.
/// Nodes shared between components are expanded once per component.
pub fn format_model(registry: &Registry, model: &SimultaneousModel) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", model.summary(registry));
    for (label, root) in model.components() {
        let _ = writeln!(output, "\n== {} ==", label);
        output.push_str(&format_tree(registry, root));
    }
    output
}

struct Tracer<'a> {
    registry: &'a Registry,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let line_header = format!("[L{}] {}", level, self.registry.name(node_id));

        match self.registry.kind(node_id) {
            NodeKind::Variable { value, min, max } => {
                let _ = writeln!(self.output, "{}{} -> Var([{:.3}] in [{}, {}])", prefix, line_header, value, min, max);
            }
            NodeKind::Constant(v) => {
                let _ = writeln!(self.output, "{}{} -> Const([{:.3}])", prefix, line_header, v);
            }
            NodeKind::Function { class } => {
                let parents = self.registry.get_parents(node_id);
                let args: Vec<&str> = parents.iter().map(|&p| self.registry.name(p)).collect();
                let _ = writeln!(self.output, "{}{} = {}({})", prefix, line_header, class, args.join(", "));
                self.recurse_children(prefix, parents, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[NodeId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}
