//! The max-sum message-passing engine.

use std::mem;

use log::{debug, info};

use crate::function::discrete_function::DiscreteFunction;
use crate::function::marginal::max_marginal;
use crate::graph::factor_graph::FactorGraph;
use crate::types::{FactorId, ValIndex, ValType, VarId};

/// Default iteration cap for [`MaxSumController`].
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default convergence tolerance for [`MaxSumController`].
pub const DEFAULT_MAXNORM_TOLERANCE: ValType = 1e-7;

/// Runs the max-sum algorithm over a factor graph.
///
/// Factors are handed in as [`DiscreteFunction`]s keyed by [`FactorId`];
/// [`MaxSumController::optimise`] exchanges messages in synchronous rounds
/// until the largest message change falls below the tolerance or the
/// iteration cap is reached, and [`MaxSumController::values`] reads the
/// argmax assignment off the converged messages. Exact on trees, a heuristic
/// on loopy graphs.
pub struct MaxSumController {
    graph: FactorGraph,
    max_iterations: usize,
    tolerance: ValType,
    normalize_messages: bool,
}

impl MaxSumController {
    /// Creates a controller with the given iteration cap and convergence
    /// tolerance. Message normalization is on by default.
    pub fn new(max_iterations: usize, tolerance: ValType) -> Self {
        MaxSumController {
            graph: FactorGraph::new(),
            max_iterations,
            tolerance,
            normalize_messages: true,
        }
    }

    /// Controls whether each outgoing message is shifted so that its maximum
    /// entry is zero. Normalization keeps message magnitudes bounded without
    /// changing the argmax.
    pub fn set_normalize_messages(&mut self, on: bool) -> &mut Self {
        self.normalize_messages = on;
        self
    }

    /// Inserts or replaces a factor. Message storage on edges shared between
    /// the old and new domain is preserved.
    pub fn set_factor(&mut self, id: FactorId, function: DiscreteFunction) {
        self.graph.set_factor(id, function);
    }

    /// Removes a factor and all its edges. Variables referenced by no other
    /// factor disappear from the graph (they stay registered).
    pub fn remove_factor(&mut self, id: FactorId) -> bool {
        self.graph.remove_factor(id)
    }

    /// Drops all factors, edges, and messages.
    pub fn clear_all(&mut self) {
        self.graph.clear();
    }

    /// Number of factors in the graph.
    pub fn num_factors(&self) -> usize {
        self.graph.num_factors()
    }

    /// Number of variables appearing in any factor domain.
    pub fn num_vars(&self) -> usize {
        self.graph.num_variables()
    }

    /// The function stored for a factor, if present.
    pub fn factor(&self, id: FactorId) -> Option<&DiscreteFunction> {
        self.graph.factor_function(id)
    }

    /// Runs synchronous message-passing rounds until the largest per-edge
    /// message change is at most the tolerance, or the iteration cap is hit.
    /// Returns the number of iterations performed.
    pub fn optimise(&mut self) -> usize {
        let edges = self.graph.edge_indices();
        if edges.is_empty() {
            return 0;
        }

        let mut iteration = 0;
        while iteration < self.max_iterations {
            iteration += 1;

            // Roll the current messages into the previous slots; this round
            // reads only previous-round values, so updates cannot interfere.
            for &edge in &edges {
                let messages = self.graph.messages_mut(edge);
                mem::swap(&mut messages.from_factor, &mut messages.from_factor_prev);
                mem::swap(&mut messages.from_variable, &mut messages.from_variable_prev);
            }

            self.update_variable_messages();
            self.update_factor_messages();

            let mut delta: ValType = 0.0;
            for &edge in &edges {
                let messages = self.graph.messages(edge);
                let mut diff = messages.from_factor.clone();
                diff -= &messages.from_factor_prev;
                delta = delta.max(diff.maxnorm());

                let mut diff = messages.from_variable.clone();
                diff -= &messages.from_variable_prev;
                delta = delta.max(diff.maxnorm());
            }
            debug!("Iteration {}: max message change {}", iteration, delta);

            if delta <= self.tolerance {
                info!("Messages converged after {} iterations.", iteration);
                return iteration;
            }
        }

        info!(
            "Iteration cap of {} reached before convergence.",
            self.max_iterations
        );
        iteration
    }

    // m_{v->f}(v) = sum over factors f' incident to v, f' != f, of
    // the previous-round m_{f'->v}.
    fn update_variable_messages(&mut self) {
        let variables: Vec<_> = self.graph.variable_nodes().collect();
        for (var, node) in variables {
            let edges = self.graph.variable_edges(node);
            for &edge in &edges {
                let size = self.graph.messages(edge).from_variable.domain_size();
                let mut sum = DiscreteFunction::zero_singleton(var, size);
                for &other in &edges {
                    if other != edge {
                        sum += &self.graph.messages(other).from_factor_prev;
                    }
                }
                if self.normalize_messages {
                    let peak = sum.max();
                    sum -= peak;
                }
                self.graph.messages_mut(edge).from_variable = sum;
            }
        }
    }

    // m_{f->v}(v) = max over dom(f) \ {v} of
    // f + sum over variables v' in dom(f), v' != v, of m_{v'->f}.
    fn update_factor_messages(&mut self) {
        let factors: Vec<_> = self.graph.factor_nodes().collect();
        for node in factors {
            let edges = self.graph.factor_edges(node);
            if edges.is_empty() {
                // A constant factor sends nothing.
                continue;
            }

            // Sum the factor with every incoming message once, then exclude
            // each edge's own contribution by subtraction.
            let mut summary = self.graph.node_function(node).clone();
            for &edge in &edges {
                summary += &self.graph.messages(edge).from_variable_prev;
            }

            for &edge in &edges {
                let var = self.graph.edge_variable(edge);
                let size = self.graph.messages(edge).from_factor.domain_size();

                let mut excluded = summary.clone();
                excluded -= &self.graph.messages(edge).from_variable_prev;

                let mut out = DiscreteFunction::zero_singleton(var, size);
                max_marginal(&excluded, &mut out)
                    .expect("edge variable is in the factor domain");

                if self.normalize_messages {
                    let peak = out.max();
                    out -= peak;
                }
                self.graph.messages_mut(edge).from_factor = out;
            }
        }
    }

    /// The assignment read off the current messages: for each variable, the
    /// argmax of its belief (the sum of incoming factor messages), ties going
    /// to the lowest index. Sorted by variable id. Call after
    /// [`MaxSumController::optimise`].
    pub fn values(&self) -> Vec<(VarId, ValIndex)> {
        let mut assignment = Vec::with_capacity(self.graph.num_variables());
        for var in self.graph.variable_ids_sorted() {
            let node = match self.graph.variable_node(var) {
                Some(node) => node,
                None => continue,
            };
            let edges = self.graph.variable_edges(node);

            let size = self.graph.messages(edges[0]).from_factor.domain_size();
            let mut belief = DiscreteFunction::zero_singleton(var, size);
            for &edge in &edges {
                belief += &self.graph.messages(edge).from_factor;
            }
            assignment.push((var, belief.argmax()));
        }
        assignment
    }
}

impl Default for MaxSumController {
    fn default() -> Self {
        MaxSumController::new(DEFAULT_MAX_ITERATIONS, DEFAULT_MAXNORM_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::domain_iterator::DomainIterator;
    use crate::registry::register_variables;

    // Variable ids 9500-9599 are reserved for this module's tests.

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // Exhaustively maximizes the sum of the given factors over the union of
    // their domains.
    fn brute_force(factors: &[DiscreteFunction]) -> Vec<(VarId, ValIndex)> {
        let mut joint = DiscreteFunction::constant(0.0);
        for factor in factors {
            joint += factor;
        }

        let mut it = DomainIterator::new(&joint);
        let mut best = (ValType::NEG_INFINITY, Vec::new());
        while it.has_next() {
            let total = joint[it.ind()];
            if total > best.0 {
                best = (total, it.sub_ind().to_vec());
            }
            it.advance();
        }

        joint
            .vars()
            .iter()
            .copied()
            .zip(best.1)
            .collect()
    }

    #[test]
    fn empty_controller_is_a_no_op() {
        let mut controller = MaxSumController::default();
        assert_eq!(controller.optimise(), 0);
        assert!(controller.values().is_empty());
        assert_eq!(controller.num_factors(), 0);
        assert_eq!(controller.num_vars(), 0);
    }

    #[test]
    fn two_factor_chain_finds_the_optimum() {
        init_logging();
        register_variables([(9500, 2), (9501, 2)]).unwrap();

        let a = DiscreteFunction::with_values(&[9500], vec![0.0, 5.0]).unwrap();
        let b =
            DiscreteFunction::with_values(&[9500, 9501], vec![0.0, 1.0, 2.0, 0.0]).unwrap();

        let mut controller = MaxSumController::default();
        controller.set_factor(0, a);
        controller.set_factor(1, b);
        assert_eq!(controller.num_factors(), 2);
        assert_eq!(controller.num_vars(), 2);

        let iterations = controller.optimise();
        assert!(iterations < DEFAULT_MAX_ITERATIONS);

        // A(1) + B(1, 0) = 6 beats every other assignment.
        assert_eq!(controller.values(), vec![(9500, 1), (9501, 0)]);
    }

    #[test]
    fn tree_matches_brute_force() {
        init_logging();
        register_variables([(9510, 2), (9511, 3), (9512, 2)]).unwrap();

        let f0 = DiscreteFunction::with_values(&[9510], vec![0.0, 1.5]).unwrap();
        let f1 = DiscreteFunction::with_values(
            &[9510, 9511],
            vec![1.0, 0.2, 0.0, 2.0, 0.3, 0.1],
        )
        .unwrap();
        let f2 = DiscreteFunction::with_values(
            &[9511, 9512],
            vec![0.5, 0.0, 1.0, 0.7, 0.2, 1.1],
        )
        .unwrap();

        let expected = brute_force(&[f0.clone(), f1.clone(), f2.clone()]);

        let mut controller = MaxSumController::default();
        controller.set_factor(0, f0);
        controller.set_factor(1, f1);
        controller.set_factor(2, f2);

        let iterations = controller.optimise();
        assert!(iterations < DEFAULT_MAX_ITERATIONS);
        assert_eq!(controller.values(), expected);
    }

    #[test]
    fn normalization_does_not_change_the_assignment() {
        register_variables([(9520, 2), (9521, 3)]).unwrap();

        let build = |controller: &mut MaxSumController| {
            let unary = DiscreteFunction::with_values(&[9520], vec![0.3, 0.0]).unwrap();
            let pair = DiscreteFunction::with_values(
                &[9520, 9521],
                vec![0.0, 1.0, 2.5, 0.0, 0.0, 1.0],
            )
            .unwrap();
            controller.set_factor(0, unary);
            controller.set_factor(1, pair);
        };

        let mut normalized = MaxSumController::default();
        build(&mut normalized);
        normalized.optimise();

        let mut raw = MaxSumController::default();
        raw.set_normalize_messages(false);
        build(&mut raw);
        raw.optimise();

        assert_eq!(normalized.values(), raw.values());
    }

    #[test]
    fn factor_removal_changes_the_problem() {
        register_variables([(9530, 2), (9531, 2)]).unwrap();

        let push_up = DiscreteFunction::with_values(&[9530], vec![0.0, 2.0]).unwrap();
        let push_down =
            DiscreteFunction::with_values(&[9530, 9531], vec![5.0, 0.0, 0.0, 1.0]).unwrap();

        let mut controller = MaxSumController::default();
        controller.set_factor(0, push_up);
        controller.set_factor(1, push_down);
        controller.optimise();
        assert_eq!(controller.values(), vec![(9530, 0), (9531, 0)]);

        // Without the pairwise factor, the unary one wins and 9531 is gone.
        controller.remove_factor(1);
        assert_eq!(controller.num_vars(), 1);
        controller.optimise();
        assert_eq!(controller.values(), vec![(9530, 1)]);
    }

    #[test]
    fn constant_factor_is_ignored_in_the_output() {
        register_variables([(9540, 2)]).unwrap();

        let mut controller = MaxSumController::default();
        controller.set_factor(0, DiscreteFunction::constant(10.0));
        controller.set_factor(1, DiscreteFunction::with_values(&[9540], vec![1.0, 0.0]).unwrap());

        controller.optimise();
        assert_eq!(controller.values(), vec![(9540, 0)]);
    }

    #[test]
    fn clear_all_keeps_variables_registered() {
        register_variables([(9550, 2)]).unwrap();

        let mut controller = MaxSumController::default();
        controller.set_factor(0, DiscreteFunction::new(&[9550], 0.0).unwrap());
        controller.clear_all();

        assert_eq!(controller.num_factors(), 0);
        assert_eq!(controller.num_vars(), 0);
        assert!(crate::registry::is_registered(9550));
    }

    #[test]
    fn loopy_graph_still_terminates() {
        register_variables([(9560, 2), (9561, 2), (9562, 2)]).unwrap();

        // A frustrated triangle: each pairwise factor prefers disagreement.
        let disagree = |u: VarId, v: VarId| {
            DiscreteFunction::with_values(&[u, v], vec![0.0, 1.0, 1.0, 0.0]).unwrap()
        };

        let mut controller = MaxSumController::new(50, 1e-7);
        controller.set_factor(0, disagree(9560, 9561));
        controller.set_factor(1, disagree(9561, 9562));
        controller.set_factor(2, disagree(9560, 9562));

        let iterations = controller.optimise();
        assert!(iterations <= 50);
        assert_eq!(controller.values().len(), 3);
    }
}
