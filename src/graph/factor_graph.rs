//! Bipartite factor graph with per-edge message storage.

use indexmap::IndexMap;
use log::debug;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction::Incoming;

use crate::function::discrete_function::DiscreteFunction;
use crate::types::{FactorId, ValIndex, VarId};

// Node payload: a factor carries its function, a variable only its id.
pub enum FactorGraphNode {
    Factor {
        id: FactorId,
        function: DiscreteFunction,
    },
    Variable(VarId),
}

/// The two message functions of an edge `(factor, variable)`, each over the
/// single edge variable, with previous-round copies for convergence checks.
pub struct EdgeMessages {
    pub from_factor: DiscreteFunction,
    pub from_factor_prev: DiscreteFunction,
    pub from_variable: DiscreteFunction,
    pub from_variable_prev: DiscreteFunction,
}

impl EdgeMessages {
    fn zero(var: VarId, size: ValIndex) -> Self {
        EdgeMessages {
            from_factor: DiscreteFunction::zero_singleton(var, size),
            from_factor_prev: DiscreteFunction::zero_singleton(var, size),
            from_variable: DiscreteFunction::zero_singleton(var, size),
            from_variable_prev: DiscreteFunction::zero_singleton(var, size),
        }
    }
}

type MsgGraph = StableDiGraph<FactorGraphNode, EdgeMessages>;

/// Bipartite graph of factor and variable nodes. Every edge runs from a
/// factor to a variable in its domain. Node indices stay valid across factor
/// removal, so edge message storage survives graph mutations elsewhere.
pub struct FactorGraph {
    graph: MsgGraph,
    factor_nodes: IndexMap<FactorId, NodeIndex>,
    variable_nodes: IndexMap<VarId, NodeIndex>,
}

impl FactorGraph {
    pub fn new() -> Self {
        FactorGraph {
            graph: MsgGraph::default(),
            factor_nodes: IndexMap::new(),
            variable_nodes: IndexMap::new(),
        }
    }

    /// Inserts or replaces a factor. On replacement, edges to variables
    /// shared between the old and new domain keep their message storage;
    /// edges to dropped variables are removed and edges to new variables are
    /// created with zero messages.
    pub fn set_factor(&mut self, id: FactorId, function: DiscreteFunction) {
        match self.factor_nodes.get(&id).copied() {
            Some(node) => {
                debug!("Replacing factor {} over {:?}", id, function.vars());

                let existing: Vec<(VarId, EdgeIndex)> = self
                    .graph
                    .edges(node)
                    .map(|edge| (self.edge_variable(edge.id()), edge.id()))
                    .collect();

                for (var, edge) in existing {
                    if !function.depends_on(var) {
                        self.graph.remove_edge(edge);
                        self.remove_variable_if_orphaned(var);
                    }
                }

                for (k, &var) in function.vars().iter().enumerate() {
                    if !self.has_edge(node, var) {
                        let var_node = self.ensure_variable(var);
                        self.graph
                            .add_edge(node, var_node, EdgeMessages::zero(var, function.sizes()[k]));
                    }
                }

                self.graph[node] = FactorGraphNode::Factor { id, function };
            }
            None => {
                debug!("Adding factor {} over {:?}", id, function.vars());

                let sizes = function.sizes().to_vec();
                let vars = function.vars().to_vec();
                let node = self.graph.add_node(FactorGraphNode::Factor { id, function });
                self.factor_nodes.insert(id, node);

                for (&var, &size) in vars.iter().zip(&sizes) {
                    let var_node = self.ensure_variable(var);
                    self.graph
                        .add_edge(node, var_node, EdgeMessages::zero(var, size));
                }
            }
        }
    }

    /// Removes a factor, its edges, and any variable left without a factor.
    /// Returns false if the factor was not present.
    pub fn remove_factor(&mut self, id: FactorId) -> bool {
        let Some(node) = self.factor_nodes.swap_remove(&id) else {
            return false;
        };
        debug!("Removing factor {}", id);

        let neighbors: Vec<VarId> = self
            .graph
            .edges(node)
            .map(|edge| self.edge_variable(edge.id()))
            .collect();

        self.graph.remove_node(node);
        for var in neighbors {
            self.remove_variable_if_orphaned(var);
        }
        true
    }

    /// Drops every factor, edge, and variable node.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.factor_nodes.clear();
        self.variable_nodes.clear();
    }

    pub fn num_factors(&self) -> usize {
        self.factor_nodes.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variable_nodes.len()
    }

    pub fn contains_factor(&self, id: FactorId) -> bool {
        self.factor_nodes.contains_key(&id)
    }

    /// The function stored for a factor, if present.
    pub fn factor_function(&self, id: FactorId) -> Option<&DiscreteFunction> {
        let node = self.factor_nodes.get(&id)?;
        Some(self.node_function(*node))
    }

    /// All variable ids currently in the graph, in ascending order.
    pub fn variable_ids_sorted(&self) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self.variable_nodes.keys().copied().collect();
        vars.sort_unstable();
        vars
    }

    fn ensure_variable(&mut self, var: VarId) -> NodeIndex {
        match self.variable_nodes.get(&var) {
            Some(&node) => node,
            None => {
                let node = self.graph.add_node(FactorGraphNode::Variable(var));
                self.variable_nodes.insert(var, node);
                node
            }
        }
    }

    fn has_edge(&self, factor_node: NodeIndex, var: VarId) -> bool {
        self.graph
            .edges(factor_node)
            .any(|edge| self.edge_variable(edge.id()) == var)
    }

    fn remove_variable_if_orphaned(&mut self, var: VarId) {
        let Some(&node) = self.variable_nodes.get(&var) else {
            return;
        };
        if self.graph.edges_directed(node, Incoming).next().is_none() {
            debug!("Variable {} no longer referenced by any factor", var);
            self.graph.remove_node(node);
            self.variable_nodes.swap_remove(&var);
        }
    }

    pub(crate) fn factor_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.factor_nodes.values().copied()
    }

    pub(crate) fn variable_node(&self, var: VarId) -> Option<NodeIndex> {
        self.variable_nodes.get(&var).copied()
    }

    pub(crate) fn variable_nodes(&self) -> impl Iterator<Item = (VarId, NodeIndex)> + '_ {
        self.variable_nodes.iter().map(|(&var, &node)| (var, node))
    }

    pub(crate) fn node_function(&self, node: NodeIndex) -> &DiscreteFunction {
        match &self.graph[node] {
            FactorGraphNode::Factor { function, .. } => function,
            FactorGraphNode::Variable(var) => {
                unreachable!("node of variable {} holds no function", var)
            }
        }
    }

    pub(crate) fn edge_indices(&self) -> Vec<EdgeIndex> {
        self.graph.edge_indices().collect()
    }

    /// Edges from a factor node to its domain variables.
    pub(crate) fn factor_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        self.graph.edges(node).map(|edge| edge.id()).collect()
    }

    /// Edges into a variable node from its incident factors.
    pub(crate) fn variable_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        self.graph
            .edges_directed(node, Incoming)
            .map(|edge| edge.id())
            .collect()
    }

    pub(crate) fn edge_variable(&self, edge: EdgeIndex) -> VarId {
        let (_, target) = self.graph.edge_endpoints(edge).unwrap();
        match self.graph[target] {
            FactorGraphNode::Variable(var) => var,
            FactorGraphNode::Factor { id, .. } => {
                unreachable!("edge target is factor {}, not a variable", id)
            }
        }
    }

    pub(crate) fn messages(&self, edge: EdgeIndex) -> &EdgeMessages {
        &self.graph[edge]
    }

    pub(crate) fn messages_mut(&mut self, edge: EdgeIndex) -> &mut EdgeMessages {
        &mut self.graph[edge]
    }
}

impl Default for FactorGraph {
    fn default() -> Self {
        FactorGraph::new()
    }
}
