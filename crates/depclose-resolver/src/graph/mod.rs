//! Closure graph recording why each source was pulled in
//!
//! Nodes are requesting packages, resolved sources and the seed marker.
//! Edges run package -> source (labelled with the requirement that was
//! satisfied) and source -> package (the source builds that package).

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Node in the closure graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClosureNode {
    /// The externally mandated seed list
    Required,
    /// A package that declared requirements
    Package(String),
    /// A resolved source package
    Source(String),
}

impl std::fmt::Display for ClosureNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosureNode::Required => f.write_str(depclose_core::REQUIRED_MARKER),
            ClosureNode::Package(name) => f.write_str(name),
            ClosureNode::Source(name) => write!(f, "[{}]", name),
        }
    }
}

/// Directed graph of requester -> source -> package relations
#[derive(Debug, Default)]
pub struct ClosureGraph {
    graph: DiGraph<ClosureNode, Option<String>>,
    node_map: HashMap<ClosureNode, NodeIndex>,
    edges: HashSet<(NodeIndex, NodeIndex)>,
    roots: HashSet<NodeIndex>,
}

impl ClosureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, node: ClosureNode) -> NodeIndex {
        if let Some(idx) = self.node_map.get(&node) {
            return *idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.node_map.insert(node, idx);
        idx
    }

    fn requester_node(requester: &str) -> ClosureNode {
        if requester == depclose_core::REQUIRED_MARKER {
            ClosureNode::Required
        } else {
            ClosureNode::Package(requester.to_string())
        }
    }

    /// Mark a requester as a starting point of the closure
    pub fn add_root(&mut self, requester: &str) {
        let idx = self.node(Self::requester_node(requester));
        self.roots.insert(idx);
    }

    /// Record that `requester` needed `requirement`, satisfied by `source`
    pub fn record_requirement(&mut self, requester: &str, requirement: &str, source: &str) {
        let from = self.node(Self::requester_node(requester));
        let to = self.node(ClosureNode::Source(source.to_string()));
        if self.edges.insert((from, to)) {
            self.graph.add_edge(from, to, Some(requirement.to_string()));
        }
    }

    /// Record that `source` builds `package`
    pub fn record_build(&mut self, source: &str, package: &str) {
        let from = self.node(ClosureNode::Source(source.to_string()));
        let to = self.node(ClosureNode::Package(package.to_string()));
        if self.edges.insert((from, to)) {
            self.graph.add_edge(from, to, None);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Shortest chain from a root to the source, root first
    ///
    /// Each step is a node and the requirement on the edge leading into it
    /// (`None` for the root and for source -> package steps).
    pub fn explain(&self, source: &str) -> Option<Vec<(ClosureNode, Option<String>)>> {
        let target = *self.node_map.get(&ClosureNode::Source(source.to_string()))?;

        // Walk incoming edges so the first root reached is the closest one
        let mut next_hop: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen = HashSet::from([target]);
        let mut queue = VecDeque::from([target]);
        let mut found = None;

        while let Some(current) = queue.pop_front() {
            if self.roots.contains(&current) {
                found = Some(current);
                break;
            }
            let mut parents: Vec<_> = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .collect();
            // deterministic choice among equally short chains
            parents.sort_by(|a, b| self.graph[*a].to_string().cmp(&self.graph[*b].to_string()));
            for parent in parents {
                if seen.insert(parent) {
                    next_hop.insert(parent, current);
                    queue.push_back(parent);
                }
            }
        }

        let mut current = found?;
        let mut chain = vec![(self.graph[current].clone(), None)];
        while let Some(&next) = next_hop.get(&current) {
            let label = self
                .graph
                .find_edge(current, next)
                .and_then(|edge| self.graph[edge].clone());
            chain.push((self.graph[next].clone(), label));
            current = next;
        }
        Some(chain)
    }

    /// Render an explanation as "a --(req)--> [src] --> b ..."
    pub fn format_chain(chain: &[(ClosureNode, Option<String>)]) -> String {
        let mut out = String::new();
        for (idx, (node, label)) in chain.iter().enumerate() {
            if idx > 0 {
                match label {
                    Some(requirement) => out.push_str(&format!(" --({})--> ", requirement)),
                    None => out.push_str(" --> "),
                }
            }
            out.push_str(&node.to_string());
        }
        out
    }
}
