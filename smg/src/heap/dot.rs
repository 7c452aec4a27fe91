//! Graphviz export of a memory graph for debugging.

use crate::heap::{ObjectId, ObjectKind, SymbolicMemoryGraph, TargetSpecifier, ValueId};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotNode {
    Variable(String),
    Object {
        id: ObjectId,
        label: String,
        kind: ObjectKind,
        valid: bool,
    },
    Value {
        id: ValueId,
        explicit: Option<i64>,
    },
}

impl Display for DotNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DotNode::Variable(name) => write!(f, "{}", name),
            DotNode::Object {
                id,
                label,
                kind,
                valid,
            } => {
                write!(f, "{} {} [{}]", id, label, kind)?;
                if !valid {
                    write!(f, " (invalid)")?;
                }
                Ok(())
            }
            DotNode::Value { id, explicit } => match explicit {
                Some(e) => write!(f, "{} = {}", id, e),
                None => write!(f, "{}", id),
            },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DotEdge {
    Scope,
    HasValue { offset: u64, width: u64 },
    PointsTo { offset: i64, specifier: TargetSpecifier },
}

impl Display for DotEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DotEdge::Scope => Ok(()),
            DotEdge::HasValue { offset, width } => write!(f, "+{}:{}", offset, width),
            DotEdge::PointsTo { offset, specifier } => write!(f, "+{} {}", offset, specifier),
        }
    }
}

impl SymbolicMemoryGraph {
    /// Convert the graph into a `petgraph` graph with variable, object and value nodes.
    ///
    /// `explicit` supplies known numbers for values; pass an empty map if there are none.
    pub fn to_petgraph(&self, explicit: &BTreeMap<ValueId, i64>) -> DiGraph<DotNode, DotEdge> {
        let mut graph = DiGraph::new();
        let mut objects: BTreeMap<ObjectId, NodeIndex> = BTreeMap::new();
        let mut values: BTreeMap<ValueId, NodeIndex> = BTreeMap::new();

        for (id, object) in self.objects() {
            let idx = graph.add_node(DotNode::Object {
                id,
                label: object.label().to_string(),
                kind: *object.kind(),
                valid: object.is_valid(),
            });
            objects.insert(id, idx);
        }
        for value in self.values().filter(|v| !v.is_zero()) {
            let idx = graph.add_node(DotNode::Value {
                id: value,
                explicit: explicit.get(&value).copied(),
            });
            values.insert(value, idx);
        }

        let mut scope_edge = |graph: &mut DiGraph<DotNode, DotEdge>, name: String, object: ObjectId| {
            let var = graph.add_node(DotNode::Variable(name));
            if let Some(target) = objects.get(&object) {
                graph.add_edge(var, *target, DotEdge::Scope);
            }
        };
        for (name, object) in self.globals() {
            scope_edge(&mut graph, name.to_string(), *object);
        }
        for frame in self.stack() {
            for (name, object) in frame.variables() {
                scope_edge(&mut graph, format!("{}::{}", frame.function(), name), *object);
            }
        }

        for edge in self.has_value_edges() {
            // Null pointers and zero values are drawn as labels only.
            if let (Some(from), Some(to)) = (objects.get(&edge.object), values.get(&edge.value)) {
                graph.add_edge(
                    *from,
                    *to,
                    DotEdge::HasValue {
                        offset: edge.offset,
                        width: edge.width,
                    },
                );
            }
        }
        for edge in self.points_to_edges() {
            if let (Some(from), Some(to)) = (values.get(&edge.value), objects.get(&edge.target)) {
                graph.add_edge(
                    *from,
                    *to,
                    DotEdge::PointsTo {
                        offset: edge.offset,
                        specifier: edge.specifier,
                    },
                );
            }
        }
        graph
    }

    /// Render the graph in Graphviz format.
    pub fn to_dot(&self, explicit: &BTreeMap<ValueId, i64>) -> String {
        format!("{}", Dot::new(&self.to_petgraph(explicit)))
    }
}
