//! Generic node, edge and graph containers.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

/// Capability bound for every identifier used by the graphs.
pub trait GraphId: Copy + Ord + Hash + fmt::Debug + 'static {}

impl<T: Copy + Ord + Hash + fmt::Debug + 'static> GraphId for T {}

/// Content stored on a node or edge; its id is the container's identity.
pub trait Identifiable<T> {
    fn id(&self) -> T;
}

/// Role of a node in the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeType {
    Start,
    #[default]
    Normal,
    End,
    Isolated,
}

impl NodeType {
    /// Role implied by which edge sets are populated.
    pub fn from_degrees(has_incoming: bool, has_outgoing: bool) -> Self {
        match (has_incoming, has_outgoing) {
            (false, false) => Self::Isolated,
            (false, true) => Self::Start,
            (true, false) => Self::End,
            (true, true) => Self::Normal,
        }
    }

    pub fn has_incoming_edges(self) -> bool {
        matches!(self, Self::Normal | Self::End)
    }

    pub fn has_outgoing_edges(self) -> bool {
        matches!(self, Self::Start | Self::Normal)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeDirection {
    Incoming,
    Outgoing,
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Contract violations raised by the graph builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError<T: GraphId> {
    #[error("Activity {0:?} already exists")]
    DuplicateActivity(T),
    #[error("Activity {0:?} cannot depend on itself")]
    SelfDependency(T),
    #[error("Activity not found: {0:?}")]
    ActivityNotFound(T),
    #[error("Node not found: {0:?}")]
    NodeNotFound(T),
    #[error("Activity {0:?} cannot be removed")]
    NotRemovable(T),
    #[error("Activity {0:?} is not a dummy activity")]
    NotDummy(T),
    #[error("Node {node:?} of type {node_type:?} has no {direction} edges")]
    InvalidNodeAccess {
        node: T,
        node_type: NodeType,
        direction: EdgeDirection,
    },
    #[error("Generated id {0:?} is already in use")]
    IdCollision(T),
    #[error("Graph contains a cycle")]
    Cyclic,
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}

/// A graph vertex holding content plus the ids of its incident edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<T, C> {
    pub(crate) content: C,
    pub(crate) node_type: NodeType,
    pub(crate) incoming: BTreeSet<T>,
    pub(crate) outgoing: BTreeSet<T>,
}

impl<T: GraphId, C: Identifiable<T>> Node<T, C> {
    pub fn new(node_type: NodeType, content: C) -> Self {
        Self {
            content,
            node_type,
            incoming: BTreeSet::new(),
            outgoing: BTreeSet::new(),
        }
    }

    /// Build a node with explicit edge sets, as read from a persisted graph.
    pub fn with_edges(
        node_type: NodeType,
        content: C,
        incoming: impl IntoIterator<Item = T>,
        outgoing: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            content,
            node_type,
            incoming: incoming.into_iter().collect(),
            outgoing: outgoing.into_iter().collect(),
        }
    }

    pub fn id(&self) -> T {
        self.content.id()
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Incoming edge ids; undefined for `Start` and `Isolated` nodes.
    pub fn incoming_edges(&self) -> Result<&BTreeSet<T>, GraphError<T>> {
        if self.node_type.has_incoming_edges() {
            Ok(&self.incoming)
        } else {
            Err(self.invalid_access(EdgeDirection::Incoming))
        }
    }

    /// Outgoing edge ids; undefined for `End` and `Isolated` nodes.
    pub fn outgoing_edges(&self) -> Result<&BTreeSet<T>, GraphError<T>> {
        if self.node_type.has_outgoing_edges() {
            Ok(&self.outgoing)
        } else {
            Err(self.invalid_access(EdgeDirection::Outgoing))
        }
    }

    fn invalid_access(&self, direction: EdgeDirection) -> GraphError<T> {
        GraphError::InvalidNodeAccess {
            node: self.id(),
            node_type: self.node_type,
            direction,
        }
    }
}

/// A graph edge; its identity is its content's id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge<T, C> {
    pub(crate) content: C,
    _id: std::marker::PhantomData<T>,
}

impl<T: GraphId, C: Identifiable<T>> Edge<T, C> {
    pub fn new(content: C) -> Self {
        Self {
            content,
            _id: std::marker::PhantomData,
        }
    }

    pub fn id(&self) -> T {
        self.content.id()
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }
}

/// Persisted form of a network: an unordered collection of nodes and edges.
///
/// Equality compares the collections as sets keyed by id.
#[derive(Clone, Debug)]
pub struct Graph<T, E, N> {
    pub edges: Vec<Edge<T, E>>,
    pub nodes: Vec<Node<T, N>>,
}

impl<T, E, N> Default for Graph<T, E, N> {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

impl<T, E, N> Graph<T, E, N>
where
    T: GraphId,
    E: Identifiable<T>,
    N: Identifiable<T>,
{
    pub fn new(edges: Vec<Edge<T, E>>, nodes: Vec<Node<T, N>>) -> Self {
        Self { edges, nodes }
    }

    fn sorted_edges(&self) -> Vec<&Edge<T, E>> {
        let mut edges: Vec<&Edge<T, E>> = self.edges.iter().collect();
        edges.sort_by_key(|e| e.id());
        edges
    }

    fn sorted_nodes(&self) -> Vec<&Node<T, N>> {
        let mut nodes: Vec<&Node<T, N>> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }
}

impl<T, E, N> PartialEq for Graph<T, E, N>
where
    T: GraphId,
    E: Identifiable<T> + PartialEq,
    N: Identifiable<T> + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.sorted_edges() == other.sorted_edges() && self.sorted_nodes() == other.sorted_nodes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;

    #[test]
    fn test_node_role_access() {
        let roles = [
            (NodeType::Start, false, true),
            (NodeType::Normal, true, true),
            (NodeType::End, true, false),
            (NodeType::Isolated, false, false),
        ];
        for (node_type, incoming_ok, outgoing_ok) in roles {
            let node: Node<i32, Event<i32>> = Node::new(node_type, Event::new(1));
            assert_eq!(node.incoming_edges().is_ok(), incoming_ok, "{node_type:?}");
            assert_eq!(node.outgoing_edges().is_ok(), outgoing_ok, "{node_type:?}");
        }
    }

    #[test]
    fn test_invalid_access_error() {
        let node: Node<i32, Event<i32>> = Node::new(NodeType::End, Event::new(4));
        assert_eq!(
            node.outgoing_edges(),
            Err(GraphError::InvalidNodeAccess {
                node: 4,
                node_type: NodeType::End,
                direction: EdgeDirection::Outgoing,
            })
        );
    }

    #[test]
    fn test_node_type_from_degrees() {
        assert_eq!(NodeType::from_degrees(false, false), NodeType::Isolated);
        assert_eq!(NodeType::from_degrees(false, true), NodeType::Start);
        assert_eq!(NodeType::from_degrees(true, false), NodeType::End);
        assert_eq!(NodeType::from_degrees(true, true), NodeType::Normal);
    }

    #[test]
    fn test_graph_equality_ignores_order() {
        let a: Graph<i32, Event<i32>, Event<i32>> = Graph::new(
            vec![Edge::new(Event::new(10)), Edge::new(Event::new(11))],
            vec![
                Node::with_edges(NodeType::Start, Event::new(1), [], [10, 11]),
                Node::with_edges(NodeType::End, Event::new(2), [10, 11], []),
            ],
        );
        let mut b = a.clone();
        b.edges.reverse();
        b.nodes.reverse();
        assert_eq!(a, b);

        b.nodes[0].node_type = NodeType::Normal;
        assert_ne!(a, b);
    }
}
