//! Dependency graph analysis: cycle detection, transitive chains, effort
//! rollups, and parallel wave computation.
//!
//! `ManifestGraph` indexes a manifest's nodes by id once and answers every
//! query against that index. Traversals use an explicit stack, so graph depth
//! is bounded by heap memory rather than the call stack.
//!
//! Nodes whose id repeats an earlier node are ignored here (first definition
//! wins), as are `depends_on` entries naming unknown ids. The validator reports
//! both; analysis on an unvalidated manifest simply skips them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use waymark_types::error::GraphError;
use waymark_types::manifest::{ExecutionManifest, ManifestNode};

/// DFS node state for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Read-only analysis view over one manifest.
///
/// Transitive chains are memoized per node. The manifest is borrowed
/// immutably for the graph's whole lifetime, so cached chains never go stale.
/// The cache is a `DashMap`, so one graph can be queried from several threads.
#[derive(Debug)]
pub struct ManifestGraph<'a> {
    manifest: &'a ExecutionManifest,
    index: HashMap<&'a str, usize>,
    chains: DashMap<usize, Arc<Vec<usize>>>,
}

impl<'a> ManifestGraph<'a> {
    /// Index `manifest` by node id.
    pub fn new(manifest: &'a ExecutionManifest) -> Self {
        let mut index = HashMap::with_capacity(manifest.nodes.len());
        for (i, node) in manifest.nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert(i);
        }
        tracing::trace!(nodes = manifest.nodes.len(), distinct = index.len(), "indexed manifest graph");
        Self {
            manifest,
            index,
            chains: DashMap::new(),
        }
    }

    pub fn manifest(&self) -> &'a ExecutionManifest {
        self.manifest
    }

    /// Look up a node by id (first definition wins).
    pub fn node(&self, id: &str) -> Option<&'a ManifestNode> {
        self.index.get(id).map(|&i| &self.manifest.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether position `i` holds the first definition of its id.
    fn is_canonical(&self, i: usize) -> bool {
        self.index.get(self.manifest.nodes[i].id.as_str()) == Some(&i)
    }

    /// Resolved dependency positions of node `i`, in `depends_on` order.
    fn dependency_indices(&self, i: usize) -> impl DoubleEndedIterator<Item = usize> + '_ {
        self.manifest.nodes[i]
            .depends_on
            .iter()
            .filter_map(|dep| self.index.get(dep.as_str()).copied())
    }

    // -----------------------------------------------------------------------
    // Cycle detection
    // -----------------------------------------------------------------------

    /// Whether the dependency graph contains at least one cycle.
    pub fn has_cycle(&self) -> bool {
        self.find_back_edge().is_some()
    }

    /// Id of a node on the first cycle found, if any.
    pub fn find_cycle_node(&self) -> Option<&'a str> {
        self.find_back_edge()
            .map(|i| self.manifest.nodes[i].id.as_str())
    }

    /// Three-color DFS. Returns the target of the first back edge, which is
    /// always a node on a cycle.
    fn find_back_edge(&self) -> Option<usize> {
        let nodes = &self.manifest.nodes;
        let mut color = vec![Color::Unvisited; nodes.len()];
        // Frames are (node position, next depends_on offset to explore).
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..nodes.len() {
            if color[start] != Color::Unvisited || !self.is_canonical(start) {
                continue;
            }
            color[start] = Color::InProgress;
            stack.push((start, 0));

            while let Some(frame) = stack.last_mut() {
                let (current, next) = *frame;
                let deps = &nodes[current].depends_on;
                if next == deps.len() {
                    color[current] = Color::Done;
                    stack.pop();
                    continue;
                }
                frame.1 += 1;

                let Some(&dep) = self.index.get(deps[next].as_str()) else {
                    continue;
                };
                match color[dep] {
                    Color::InProgress => return Some(dep),
                    Color::Unvisited => {
                        color[dep] = Color::InProgress;
                        stack.push((dep, 0));
                    }
                    Color::Done => {}
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Transitive dependency chain
    // -----------------------------------------------------------------------

    /// Every node transitively required by `id`, each listed once, in
    /// depth-first pre-order following `depends_on` order. `id` itself is not
    /// included. Unknown ids yield an empty chain.
    pub fn dependency_chain(&self, id: &str) -> Vec<String> {
        match self.index.get(id) {
            Some(&start) => self
                .chain_indices(start)
                .iter()
                .map(|&i| self.manifest.nodes[i].id.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    fn chain_indices(&self, start: usize) -> Arc<Vec<usize>> {
        if let Some(hit) = self.chains.get(&start) {
            return Arc::clone(hit.value());
        }

        let mut visited = vec![false; self.manifest.nodes.len()];
        visited[start] = true;
        let mut chain = Vec::new();
        let mut stack: Vec<usize> = self.dependency_indices(start).rev().collect();

        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            chain.push(current);
            stack.extend(self.dependency_indices(current).rev());
        }

        let chain = Arc::new(chain);
        self.chains.insert(start, Arc::clone(&chain));
        chain
    }

    // -----------------------------------------------------------------------
    // Effort aggregation
    // -----------------------------------------------------------------------

    /// Sum of effort points over every node in the manifest.
    ///
    /// Saturates at `u64::MAX` instead of overflowing.
    pub fn total_effort(&self) -> u64 {
        saturating_sum(self.manifest.nodes.iter().map(ManifestNode::effort_points))
    }

    /// Effort of `id` plus the effort of its whole dependency chain.
    /// Unknown ids count as 0. Saturates at `u64::MAX`.
    pub fn total_effort_for(&self, id: &str) -> u64 {
        let Some(&start) = self.index.get(id) else {
            return 0;
        };
        let nodes = &self.manifest.nodes;
        let chain = self.chain_indices(start);
        saturating_sum(
            std::iter::once(start)
                .chain(chain.iter().copied())
                .map(|i| nodes[i].effort_points()),
        )
    }

    // -----------------------------------------------------------------------
    // Scheduling helpers
    // -----------------------------------------------------------------------

    /// Nodes that directly depend on `id`, in manifest order.
    pub fn dependents_of(&self, id: &str) -> Vec<&'a str> {
        let manifest = self.manifest;
        manifest
            .nodes
            .iter()
            .enumerate()
            .filter(|&(i, node)| self.is_canonical(i) && node.dependencies().any(|d| d == id))
            .map(|(_, node)| node.id.as_str())
            .collect()
    }

    /// Nodes not yet in `completed` whose dependencies are all in `completed`.
    pub fn ready_nodes(&self, completed: &HashSet<String>) -> Vec<&'a ManifestNode> {
        let manifest = self.manifest;
        manifest
            .nodes
            .iter()
            .enumerate()
            .filter(|&(i, node)| {
                self.is_canonical(i)
                    && !completed.contains(&node.id)
                    && node.dependencies().all(|d| completed.contains(d))
            })
            .map(|(_, node)| node)
            .collect()
    }

    /// Group nodes into parallel waves.
    ///
    /// Each wave holds nodes whose dependencies are all satisfied by earlier
    /// waves, so a scheduler can dispatch a whole wave concurrently:
    ///
    /// 1. Build a `DiGraph` with an edge from each dependency to its dependent.
    /// 2. Run `petgraph::algo::toposort` to verify acyclicity.
    /// 3. Depth of a node = max depth of its dependencies + 1 (roots are 0).
    /// 4. Group nodes by depth, keeping manifest order within a wave.
    pub fn execution_waves(&self) -> Result<Vec<Vec<&'a ManifestNode>>, GraphError> {
        let manifest = self.manifest;
        let canonical: Vec<usize> = (0..manifest.nodes.len())
            .filter(|&i| self.is_canonical(i))
            .collect();
        if canonical.is_empty() {
            return Ok(vec![]);
        }

        let mut graph = DiGraph::<usize, ()>::new();
        let graph_idx: HashMap<usize, _> = canonical
            .iter()
            .map(|&i| (i, graph.add_node(i)))
            .collect();

        for &i in &canonical {
            let node = &manifest.nodes[i];
            for dep in node.dependencies() {
                let from = self.index.get(dep).ok_or_else(|| {
                    GraphError::UnknownDependency(format!(
                        "node '{}' depends on unknown node '{}'",
                        node.id, dep
                    ))
                })?;
                graph.add_edge(graph_idx[from], graph_idx[&i], ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let node_id = &manifest.nodes[graph[cycle.node_id()]].id;
            GraphError::CycleDetected(format!("cycle detected involving node '{node_id}'"))
        })?;

        let mut depths: HashMap<usize, usize> = HashMap::with_capacity(sorted.len());
        for graph_node in sorted {
            let i = graph[graph_node];
            let depth = self
                .dependency_indices(i)
                .map(|dep| depths.get(&dep).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            depths.insert(i, depth);
        }

        let max_depth = depths.values().copied().max().unwrap_or(0);
        let mut waves: Vec<Vec<&ManifestNode>> = vec![vec![]; max_depth + 1];
        for &i in &canonical {
            waves[depths[&i]].push(&manifest.nodes[i]);
        }
        Ok(waves)
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

fn saturating_sum(points: impl Iterator<Item = u64>) -> u64 {
    points.fold(0, u64::saturating_add)
}

/// Whether `manifest`'s dependency graph contains a cycle.
pub fn has_cycle(manifest: &ExecutionManifest) -> bool {
    ManifestGraph::new(manifest).has_cycle()
}

/// Transitive dependency chain of `node_id`. See [`ManifestGraph::dependency_chain`].
pub fn dependency_chain(manifest: &ExecutionManifest, node_id: &str) -> Vec<String> {
    ManifestGraph::new(manifest).dependency_chain(node_id)
}

/// Sum of effort points over all nodes.
pub fn total_effort(manifest: &ExecutionManifest) -> u64 {
    ManifestGraph::new(manifest).total_effort()
}

/// Effort of `node_id` including its transitive dependencies.
pub fn total_effort_for(manifest: &ExecutionManifest, node_id: &str) -> u64 {
    ManifestGraph::new(manifest).total_effort_for(node_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::manifest::NodeType;

    /// Helper: build an action node with the given ID and dependencies.
    fn node(id: &str, depends_on: Vec<&str>) -> ManifestNode {
        ManifestNode::new(id, NodeType::Action, "Backend:Rust").with_depends_on(depends_on)
    }

    fn manifest(nodes: Vec<ManifestNode>) -> ExecutionManifest {
        ExecutionManifest::builder("test-project")
            .iteration_id("it-1")
            .timestamp("2026-01-01T00:00:00Z")
            .nodes(nodes)
            .build()
    }

    fn chain_of(len: usize) -> ExecutionManifest {
        let nodes = (0..len)
            .map(|i| {
                let n = ManifestNode::new(format!("node_{i}"), NodeType::Action, "any");
                if i == 0 {
                    n
                } else {
                    n.with_depends_on([format!("node_{}", i - 1)])
                }
            })
            .collect();
        manifest(nodes)
    }

    // -----------------------------------------------------------------------
    // Cycle detection
    // -----------------------------------------------------------------------

    #[test]
    fn test_three_node_cycle_detected() {
        // A depends on C, C depends on B, B depends on A
        let m = manifest(vec![
            node("A", vec!["C"]),
            node("B", vec!["A"]),
            node("C", vec!["B"]),
        ]);
        let graph = ManifestGraph::new(&m);
        assert!(graph.has_cycle());
        let on_cycle = graph.find_cycle_node().unwrap();
        assert!(["A", "B", "C"].contains(&on_cycle));
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let m = manifest(vec![node("a", vec!["a"])]);
        assert!(has_cycle(&m));
    }

    #[test]
    fn test_diamond_has_no_cycle() {
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["a"]),
            node("d", vec!["b", "c"]),
        ]);
        assert!(!has_cycle(&m));
    }

    #[test]
    fn test_cycle_in_disconnected_component() {
        let m = manifest(vec![
            node("root", vec![]),
            node("x", vec!["y"]),
            node("y", vec!["z"]),
            node("z", vec!["x"]),
        ]);
        assert!(has_cycle(&m));
    }

    #[test]
    fn test_unknown_references_are_skipped() {
        let m = manifest(vec![node("a", vec!["ghost"])]);
        assert!(!has_cycle(&m));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let m = chain_of(50_000);
        let graph = ManifestGraph::new(&m);
        assert!(!graph.has_cycle());
        assert_eq!(graph.dependency_chain("node_49999").len(), 49_999);
    }

    // -----------------------------------------------------------------------
    // Transitive dependencies
    // -----------------------------------------------------------------------

    #[test]
    fn test_chain_of_hundred() {
        let m = chain_of(100);
        let chain = dependency_chain(&m, "node_99");
        assert_eq!(chain.len(), 99);
        let expected: Vec<String> = (0..99).rev().map(|i| format!("node_{i}")).collect();
        assert_eq!(chain, expected);
    }

    #[test]
    fn test_diamond_dependency_listed_once() {
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["a"]),
            node("d", vec!["b", "c", "b"]),
        ]);
        let chain = dependency_chain(&m, "d");
        assert_eq!(chain, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_chain_root_and_unknown() {
        let m = manifest(vec![node("a", vec![])]);
        assert!(dependency_chain(&m, "a").is_empty());
        assert!(dependency_chain(&m, "nonexistent").is_empty());
    }

    #[test]
    fn test_chain_is_memoized() {
        let m = chain_of(10);
        let graph = ManifestGraph::new(&m);
        let first = graph.dependency_chain("node_9");
        assert_eq!(graph.chains.len(), 1);
        let second = graph.dependency_chain("node_9");
        assert_eq!(first, second);
        assert_eq!(graph.chains.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_first_definition_wins() {
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("b", vec!["c"]),
            node("c", vec![]),
        ]);
        let graph = ManifestGraph::new(&m);
        assert_eq!(graph.dependency_chain("b"), vec!["a"]);
        assert!(graph.node("b").unwrap().depends_on == vec!["a"]);
    }

    // -----------------------------------------------------------------------
    // Effort
    // -----------------------------------------------------------------------

    #[test]
    fn test_effort_rollup() {
        let m = manifest(vec![
            node("first", vec![]).with_effort(60),
            node("second", vec!["first"]).with_effort(120),
        ]);
        assert_eq!(total_effort_for(&m, "second"), 180);
        assert_eq!(total_effort_for(&m, "first"), 60);
        assert_eq!(total_effort(&m), 180);
    }

    #[test]
    fn test_effort_absent_counts_as_zero() {
        let m = manifest(vec![
            node("a", vec![]).with_effort(5),
            node("b", vec!["a"]),
            node("c", vec!["b"]).with_effort(7),
        ]);
        let graph = ManifestGraph::new(&m);
        assert_eq!(graph.total_effort(), 12);
        assert_eq!(graph.total_effort_for("c"), 12);
        assert_eq!(graph.total_effort_for("b"), 5);
        assert_eq!(graph.total_effort_for("missing"), 0);
    }

    #[test]
    fn test_effort_monotonic_over_diamond() {
        let m = manifest(vec![
            node("a", vec![]).with_effort(10),
            node("b", vec!["a"]).with_effort(20),
            node("c", vec!["a"]).with_effort(30),
            node("d", vec!["b", "c"]).with_effort(40),
        ]);
        let graph = ManifestGraph::new(&m);
        for n in &m.nodes {
            assert!(graph.total_effort_for(&n.id) >= n.effort_points());
        }
        // Shared dependency `a` is counted once.
        assert_eq!(graph.total_effort_for("d"), 100);
    }

    #[test]
    fn test_effort_saturates_instead_of_overflowing() {
        let m = manifest(vec![
            node("a", vec![]).with_effort(i64::MAX),
            node("b", vec!["a"]).with_effort(i64::MAX),
            node("c", vec!["b"]).with_effort(i64::MAX),
        ]);
        assert!(crate::manifest::validator::validate(&m).is_ok());

        assert_eq!(total_effort(&m), u64::MAX);
        assert_eq!(total_effort_for(&m, "c"), u64::MAX);
        assert_eq!(total_effort_for(&m, "a"), i64::MAX as u64);
    }

    // -----------------------------------------------------------------------
    // Scheduling helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_ready_nodes_progression() {
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["a"]),
            node("d", vec!["b", "c"]),
        ]);
        let graph = ManifestGraph::new(&m);
        let mut done = HashSet::new();

        let ready: Vec<&str> = graph.ready_nodes(&done).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ready, vec!["a"]);

        done.insert("a".to_string());
        let ready: Vec<&str> = graph.ready_nodes(&done).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ready, vec!["b", "c"]);

        done.insert("b".to_string());
        done.insert("c".to_string());
        let ready: Vec<&str> = graph.ready_nodes(&done).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ready, vec!["d"]);
    }

    #[test]
    fn test_dependents_of() {
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["a", "a"]),
        ]);
        let graph = ManifestGraph::new(&m);
        assert_eq!(graph.dependents_of("a"), vec!["b", "c"]);
        assert!(graph.dependents_of("c").is_empty());
    }

    #[test]
    fn test_waves_fork_join() {
        //     A
        //    / \
        //   B   C
        //   |   |
        //   D   E
        //    \ /
        //     F
        let m = manifest(vec![
            node("a", vec![]),
            node("b", vec!["a"]),
            node("c", vec!["a"]),
            node("d", vec!["b"]),
            node("e", vec!["c"]),
            node("f", vec!["d", "e"]),
        ]);
        let waves = ManifestGraph::new(&m).execution_waves().unwrap();
        let ids: Vec<Vec<&str>> = waves
            .iter()
            .map(|w| w.iter().map(|n| n.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["a"], vec!["b", "c"], vec!["d", "e"], vec!["f"]]);
    }

    #[test]
    fn test_waves_independent_nodes_single_wave() {
        let m = manifest(vec![node("a", vec![]), node("b", vec![]), node("c", vec![])]);
        let waves = ManifestGraph::new(&m).execution_waves().unwrap();
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 3);
    }

    #[test]
    fn test_waves_reject_cycle_and_unknown() {
        let m = manifest(vec![node("a", vec!["b"]), node("b", vec!["a"])]);
        let err = ManifestGraph::new(&m).execution_waves().unwrap_err();
        assert!(err.to_string().contains("cycle detected"), "got: {err}");

        let m = manifest(vec![node("a", vec!["missing"])]);
        let err = ManifestGraph::new(&m).execution_waves().unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency(_)));
    }

    #[test]
    fn test_waves_empty_manifest() {
        let m = manifest(vec![]);
        assert!(ManifestGraph::new(&m).execution_waves().unwrap().is_empty());
    }
}
