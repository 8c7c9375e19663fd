//! Dependency graph helpers shared by the manifest and the module registry

use std::collections::{HashMap, HashSet};

/// A node and its declared dependencies, in registration order.
pub type Edges<'a> = Vec<(&'a str, &'a [String])>;

/// Returns the first dependency cycle found, as a path that starts and ends
/// on the same node. Dependencies on unknown nodes are ignored.
pub fn find_cycle(edges: &Edges<'_>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(node, Mark::Visiting);
        stack.push(node);

        if let Some(deps) = graph.get(node) {
            for dep in deps.iter() {
                if graph.contains_key(dep.as_str()) {
                    if let Some(cycle) = visit(dep.as_str(), graph, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let graph: HashMap<&str, &[String]> = edges.iter().copied().collect();
    let mut marks = HashMap::new();
    let mut stack = Vec::new();

    for (node, _) in edges {
        if let Some(cycle) = visit(node, &graph, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

/// Groups nodes into layers where every node only depends on nodes from
/// earlier layers. Nodes caught in a cycle end up together in a final layer.
pub fn evaluation_layers(edges: &Edges<'_>) -> Vec<Vec<String>> {
    let known: HashSet<&str> = edges.iter().map(|(node, _)| *node).collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<(&str, &[String])> = edges.clone();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|(_, deps)| {
            deps.iter()
                .all(|dep| !known.contains(dep.as_str()) || placed.contains(dep.as_str()))
        });

        if ready.is_empty() {
            layers.push(blocked.iter().map(|(node, _)| node.to_string()).collect());
            break;
        }

        placed.extend(ready.iter().map(|(node, _)| *node));
        layers.push(ready.iter().map(|(node, _)| node.to_string()).collect());
        remaining = blocked;
    }

    layers
}
