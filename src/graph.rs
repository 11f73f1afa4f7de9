//! Dependency graph between translation units and their included headers.
//!
//! The graph owns every node in a single id-keyed table; nodes refer to their
//! peers by [`FileId`], never by pointer, which keeps removal O(degree) and
//! serialization a flat edge list. Include semantics make the graph acyclic
//! in practice, but traversals still carry a visited set so a malformed
//! result cannot loop them.

use crate::types::FileId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Direction of a transitive dependency query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyMode {
    /// All files that transitively include the argument.
    DependsOnArg,
    /// All files the argument transitively includes.
    ArgDependsOn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub includes: BTreeSet<FileId>,
    pub dependents: BTreeSet<FileId>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<FileId, DependencyNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_or_get(&mut self, file_id: FileId) -> &mut DependencyNode {
        self.nodes.entry(file_id).or_default()
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.nodes.contains_key(&file_id)
    }

    pub fn node(&self, file_id: FileId) -> Option<&DependencyNode> {
        self.nodes.get(&file_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.nodes.keys().copied()
    }

    /// Record that `includer` includes `includee`. Idempotent; both nodes are
    /// created on demand and both directions stay in step.
    pub fn link(&mut self, includer: FileId, includee: FileId) {
        self.insert_or_get(includer).includes.insert(includee);
        self.insert_or_get(includee).dependents.insert(includer);
    }

    /// Replace `includer`'s include set with exactly `includes`, updating the
    /// reverse links of every peer that was added or dropped.
    pub fn set_includes(&mut self, includer: FileId, includes: BTreeSet<FileId>) {
        let old = std::mem::take(&mut self.insert_or_get(includer).includes);

        for dropped in old.difference(&includes) {
            if let Some(peer) = self.nodes.get_mut(dropped) {
                peer.dependents.remove(&includer);
            }
        }
        for added in includes.difference(&old) {
            self.insert_or_get(*added).dependents.insert(includer);
        }

        self.insert_or_get(includer).includes = includes;
    }

    /// Delete a node, unlinking it from every peer. O(degree).
    pub fn remove(&mut self, file_id: FileId) {
        let Some(node) = self.nodes.remove(&file_id) else {
            return;
        };
        for includee in &node.includes {
            if let Some(peer) = self.nodes.get_mut(includee) {
                peer.dependents.remove(&file_id);
            }
        }
        for includer in &node.dependents {
            if let Some(peer) = self.nodes.get_mut(includer) {
                peer.includes.remove(&file_id);
            }
        }
    }

    /// Transitive closure in the requested direction, breadth-first.
    ///
    /// The argument itself is excluded unless it is reachable through a
    /// cycle, in which case it appears exactly once. An unknown id yields an
    /// empty set.
    pub fn dependencies(&self, file_id: FileId, mode: DependencyMode) -> BTreeSet<FileId> {
        let mut result = BTreeSet::new();
        let Some(start) = self.nodes.get(&file_id) else {
            return result;
        };

        let mut queue: VecDeque<FileId> = match mode {
            DependencyMode::DependsOnArg => start.dependents.iter().copied().collect(),
            DependencyMode::ArgDependsOn => start.includes.iter().copied().collect(),
        };
        let mut visited: BTreeSet<FileId> = queue.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            result.insert(current);
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            let next = match mode {
                DependencyMode::DependsOnArg => &node.dependents,
                DependencyMode::ArgDependsOn => &node.includes,
            };
            for &peer in next {
                if visited.insert(peer) {
                    queue.push_back(peer);
                }
            }
        }

        result
    }

    pub fn depends_on(&self, source: FileId, header: FileId) -> bool {
        self.dependencies(source, DependencyMode::ArgDependsOn)
            .contains(&header)
    }

    /// Flat edge list `(file, includes)`, sorted by file id. The inverse
    /// links are implied and recomputed by [`Self::from_edges`].
    pub fn edges(&self) -> Vec<(FileId, Vec<FileId>)> {
        let mut edges: Vec<_> = self
            .nodes
            .iter()
            .map(|(&id, node)| (id, node.includes.iter().copied().collect()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (FileId, Vec<FileId>)>) -> Self {
        let mut graph = Self::new();
        for (includer, includes) in edges {
            graph.insert_or_get(includer);
            for includee in includes {
                graph.link(includer, includee);
            }
        }
        graph
    }

    /// True when every include edge has its mirror dependent edge and vice
    /// versa. Cheap enough to assert in tests after every mutation.
    pub fn validate(&self) -> bool {
        self.nodes.iter().all(|(&id, node)| {
            node.includes.iter().all(|peer| {
                self.nodes
                    .get(peer)
                    .is_some_and(|p| p.dependents.contains(&id))
            }) && node.dependents.iter().all(|peer| {
                self.nodes
                    .get(peer)
                    .is_some_and(|p| p.includes.contains(&id))
            })
        })
    }

    /// Rough live size in bytes, for memory reporting.
    pub fn estimated_bytes(&self) -> usize {
        use std::mem::size_of;
        self.nodes
            .iter()
            .map(|(_, node)| {
                size_of::<(FileId, DependencyNode)>()
                    + (node.includes.len() + node.dependents.len()) * size_of::<FileId>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> FileId {
        FileId::new(value).unwrap()
    }

    #[test]
    fn test_link_is_symmetric_and_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(1), id(2));

        assert!(graph.node(id(1)).unwrap().includes.contains(&id(2)));
        assert!(graph.node(id(2)).unwrap().dependents.contains(&id(1)));
        assert_eq!(graph.node(id(1)).unwrap().includes.len(), 1);
        assert!(graph.validate());
    }

    #[test]
    fn test_transitive_closure_both_modes() {
        // a.c -> h1.h -> h2.h
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(2), id(3));

        let deps = graph.dependencies(id(1), DependencyMode::ArgDependsOn);
        assert_eq!(deps, BTreeSet::from([id(2), id(3)]));

        let dependents = graph.dependencies(id(3), DependencyMode::DependsOnArg);
        assert_eq!(dependents, BTreeSet::from([id(1), id(2)]));

        // The argument never shows up absent a cycle.
        assert!(!deps.contains(&id(1)));
        assert!(!dependents.contains(&id(3)));
    }

    #[test]
    fn test_depends_on_matches_closure() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(2), id(3));
        graph.link(id(4), id(3));

        for src in [1u32, 2, 3, 4] {
            for hdr in [1u32, 2, 3, 4] {
                let via_closure = graph
                    .dependencies(id(src), DependencyMode::ArgDependsOn)
                    .contains(&id(hdr));
                assert_eq!(
                    graph.depends_on(id(src), id(hdr)),
                    via_closure,
                    "depends_on({src}, {hdr}) disagrees with closure"
                );
            }
        }
    }

    #[test]
    fn test_cycle_included_exactly_once() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(2), id(1));

        let deps = graph.dependencies(id(1), DependencyMode::ArgDependsOn);
        assert_eq!(deps, BTreeSet::from([id(1), id(2)]));
    }

    #[test]
    fn test_set_includes_replaces_and_relinks() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(1), id(3));

        graph.set_includes(id(1), BTreeSet::from([id(3), id(4)]));

        assert!(!graph.node(id(2)).unwrap().dependents.contains(&id(1)));
        assert!(graph.node(id(3)).unwrap().dependents.contains(&id(1)));
        assert!(graph.node(id(4)).unwrap().dependents.contains(&id(1)));
        assert_eq!(
            graph.node(id(1)).unwrap().includes,
            BTreeSet::from([id(3), id(4)])
        );
        assert!(graph.validate());
    }

    #[test]
    fn test_remove_unlinks_all_peers() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(2), id(3));

        graph.remove(id(2));

        assert!(!graph.contains(id(2)));
        assert!(graph.node(id(1)).unwrap().includes.is_empty());
        assert!(graph.node(id(3)).unwrap().dependents.is_empty());
        assert!(graph.validate());
    }

    #[test]
    fn test_unknown_id_yields_empty_set() {
        let graph = DependencyGraph::new();
        assert!(graph.dependencies(id(9), DependencyMode::ArgDependsOn).is_empty());
        assert!(graph.dependencies(id(9), DependencyMode::DependsOnArg).is_empty());
        assert!(!graph.depends_on(id(9), id(10)));
    }

    #[test]
    fn test_edges_round_trip() {
        let mut graph = DependencyGraph::new();
        graph.link(id(1), id(2));
        graph.link(id(2), id(3));
        graph.link(id(4), id(2));
        graph.insert_or_get(id(5)); // isolated node survives too

        let restored = DependencyGraph::from_edges(graph.edges());

        assert!(restored.validate());
        for f in [1u32, 2, 3, 4, 5] {
            for mode in [DependencyMode::ArgDependsOn, DependencyMode::DependsOnArg] {
                assert_eq!(
                    graph.dependencies(id(f), mode),
                    restored.dependencies(id(f), mode),
                    "closure differs for file {f}"
                );
            }
        }
    }
}
