use crate::dataset::VariableContext;
use crate::store::{NodeId, Registry, StoreError};

/// Collects every node reachable upstream of `roots`, in dependency order:
/// each node appears after all of its parents.
///
/// Registries built through `Registry::add_node` are acyclic, but a
/// deserialized one need not be, so cycles are still reported.
pub fn dependency_order(registry: &Registry, roots: &[NodeId]) -> Result<Vec<NodeId>, StoreError> {
    let count = registry.count();
    let mut order = Vec::new();
    let mut state = vec![VisitState::None; count];

    for &root in roots {
        if !registry.contains(root) {
            return Err(StoreError::UnknownNode(root));
        }
        if state[root.index()] == VisitState::None {
            visit(root, registry, &mut state, &mut order)?;
        }
    }

    Ok(order)
}

#[derive(Clone, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn visit(
    node: NodeId,
    registry: &Registry,
    state: &mut Vec<VisitState>,
    order: &mut Vec<NodeId>,
) -> Result<(), StoreError> {
    let idx = node.index();

    match state[idx] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => return Err(StoreError::Cycle(registry.name(node).to_string())),
        VisitState::None => state[idx] = VisitState::Visiting,
    }

    for &parent in registry.get_parents(node) {
        if !registry.contains(parent) {
            return Err(StoreError::UnknownNode(parent));
        }
        visit(parent, registry, state, order)?;
    }

    state[idx] = VisitState::Visited;
    order.push(node);
    Ok(())
}

/// The free parameters of the model rooted at `root`: variable leaves that the
/// dataset does not provide as observables or categories.
pub fn parameters(registry: &Registry, root: NodeId, context: &VariableContext) -> Result<Vec<NodeId>, StoreError> {
    Ok(dependency_order(registry, &[root])?
        .into_iter()
        .filter(|&id| registry.kind(id).is_variable() && !context.contains(registry.name(id)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_diamond_dependency() {
        // Shape: A -> B, A -> C, B+C -> D
        let mut reg = Registry::new();
        let a = reg.add_variable("A", 1.0, 0.0, 2.0);
        let b = reg.add_function("B", "Sum", &[a, a]).unwrap();
        let c = reg.add_function("C", "Sum", &[a, a]).unwrap();
        let d = reg.add_function("D", "Sum", &[b, c]).unwrap();

        let res = dependency_order(&reg, &[d]).expect("Sort failed");
        assert_eq!(res.len(), 4);

        let pos = |id: NodeId| res.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_cycle_detection_explicit() {
        let mut reg = Registry::new();
        let a = reg.add_variable("A", 0.0, 0.0, 1.0); // ID 0
        let b = reg.add_function("B", "Sum", &[a]).unwrap(); // ID 1

        // HACK: Manually inject the cycle A depends on B, as a corrupted snapshot could.
        reg.parents_flat.push(b);
        let new_start = (reg.parents_flat.len() - 1) as u32;
        reg.parents_ranges[0] = (new_start, 1);

        let err = dependency_order(&reg, &[b]).unwrap_err();
        assert!(matches!(err, StoreError::Cycle(_)), "Err: {}", err);
    }

    #[test]
    fn test_parameters_exclude_observables() {
        let mut reg = Registry::new();
        let x = reg.add_variable("x", 0.0, -10.0, 10.0);
        let m = reg.add_variable("m", 0.0, -10.0, 10.0);
        let s = reg.add_variable("s", 1.0, 0.0, 5.0);
        let w = reg.add_constant("w", 0.5);
        let g = reg.add_function("g", "Gaussian", &[x, m, s]).unwrap();
        let pdf = reg.add_function("pdf", "Product", &[g, w]).unwrap();

        let context = VariableContext::from_names(["x"]);
        let params = parameters(&reg, pdf, &context).unwrap();
        assert_eq!(params, vec![m, s]);
    }
}
