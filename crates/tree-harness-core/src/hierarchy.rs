//! Parent/child graph over document IDs.
//!
//! The graph records what is known; it never fetches anything. Child lists
//! built up edge by edge may be partial. A list recorded in full through
//! [`HierarchyGraph::record_children`] is marked as listed, which tells lazy
//! discovery layered on top that no remote fetch is needed.
//!
//! Parent lookups follow the same pattern: an ID marked with
//! [`HierarchyGraph::mark_parent_known`] has an authoritative answer, which
//! may be "no parent", so it is never looked up again.
//!
//! Parent data coming from a remote source is not guaranteed to be acyclic,
//! so every upward walk carries a visited set.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct HierarchyGraph {
    parents: HashMap<String, String>,
    /// Known children in discovery order.
    children: HashMap<String, Vec<String>>,
    /// Parents whose full child list has been recorded.
    listed: HashSet<String>,
    /// IDs whose parent (or lack of one) came from their own metadata.
    parent_known: HashSet<String>,
}

impl HierarchyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `child → parent`. Idempotent; a later call with a different
    /// parent moves the child. Self-loops are ignored.
    pub fn add_edge(&mut self, child: &str, parent: &str) {
        if child == parent {
            return;
        }
        match self.parents.get(child).cloned() {
            Some(old) if old == parent => {}
            Some(old) => {
                if let Some(siblings) = self.children.get_mut(&old) {
                    siblings.retain(|c| c != child);
                }
                self.parents.insert(child.to_string(), parent.to_string());
            }
            None => {
                self.parents.insert(child.to_string(), parent.to_string());
            }
        }
        self.attach(child, parent);
    }

    fn attach(&mut self, child: &str, parent: &str) {
        let list = self.children.entry(parent.to_string()).or_default();
        if !list.iter().any(|c| c == child) {
            list.push(child.to_string());
        }
    }

    /// Memoize the complete child list of `parent`, adding an edge for
    /// each child. An empty list is remembered too.
    pub fn record_children(&mut self, parent: &str, children: &[String]) {
        self.listed.insert(parent.to_string());
        for child in children {
            self.add_edge(child, parent);
        }
    }

    /// Remember that `id`'s metadata has been seen, whether or not it
    /// names a parent.
    pub fn mark_parent_known(&mut self, id: &str) {
        self.parent_known.insert(id.to_string());
    }

    /// Whether `id` has a recorded parent or is known to have none.
    pub fn is_parent_known(&self, id: &str) -> bool {
        self.parents.contains_key(id) || self.parent_known.contains(id)
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Known children of `id`; empty when none are known.
    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether the full child list of `id` has been recorded.
    pub fn is_listed(&self, id: &str) -> bool {
        self.listed.contains(id)
    }

    /// IDs from the outermost known ancestor down to `id` itself.
    ///
    /// The walk stops at the first ID without a recorded parent, or when it
    /// would revisit an ID, in which case the partial path is returned.
    pub fn path_to_root(&self, id: &str) -> Vec<String> {
        let mut path = vec![id.to_string()];
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut current = id;
        while let Some(parent) = self.parents.get(current) {
            if !visited.insert(parent.as_str()) {
                break;
            }
            path.push(parent.clone());
            current = parent;
        }

        path.reverse();
        path
    }

    /// Siblings of `id` followed by its cousins, at most `limit` in total.
    ///
    /// Siblings are the other children of `id`'s parent. Cousins are the
    /// children of the parent's own siblings. Only recorded child lists are
    /// consulted.
    pub fn related(&self, id: &str, limit: usize) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let Some(parent) = self.parent(id) else {
            return out;
        };

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);
        seen.insert(parent);

        for sibling in self.children(parent) {
            if seen.insert(sibling.as_str()) {
                out.push(sibling.clone());
            }
        }

        if let Some(grandparent) = self.parent(parent) {
            seen.insert(grandparent);
            for aunt in self.children(grandparent).iter().filter(|a| a.as_str() != parent) {
                for cousin in self.children(aunt) {
                    if seen.insert(cousin.as_str()) {
                        out.push(cousin.clone());
                    }
                }
            }
        }

        out.truncate(limit);
        out
    }

    /// IDs that have children but no recorded parent, sorted.
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .children
            .iter()
            .filter(|(id, kids)| !kids.is_empty() && !self.parents.contains_key(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();
        roots.sort();
        roots
    }

    pub fn edge_count(&self) -> usize {
        self.parents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HierarchyGraph {
        let mut g = HierarchyGraph::new();
        g.add_edge("A", "root");
        g.add_edge("B", "A");
        g.add_edge("C", "A");
        g
    }

    #[test]
    fn test_related_siblings() {
        let g = sample();
        assert_eq!(g.related("B", 3), vec!["C"]);
    }

    #[test]
    fn test_path_to_root() {
        let g = sample();
        assert_eq!(g.path_to_root("B"), vec!["root", "A", "B"]);
        assert_eq!(g.path_to_root("root"), vec!["root"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut g = HierarchyGraph::new();
        g.add_edge("A", "B");
        g.add_edge("B", "A");
        let path = g.path_to_root("A");
        assert!(!path.is_empty());
        assert_eq!(path, vec!["B", "A"]);
    }

    #[test]
    fn test_longer_cycle_terminates() {
        let mut g = HierarchyGraph::new();
        g.add_edge("A", "B");
        g.add_edge("B", "C");
        g.add_edge("C", "A");
        assert_eq!(g.path_to_root("A"), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_self_loop_ignored() {
        let mut g = HierarchyGraph::new();
        g.add_edge("A", "A");
        assert_eq!(g.parent("A"), None);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_add_edge_is_idempotent_and_last_write_wins() {
        let mut g = sample();
        g.add_edge("B", "A");
        assert_eq!(g.children("A"), ["B", "C"]);

        g.add_edge("B", "root");
        assert_eq!(g.parent("B"), Some("root"));
        assert_eq!(g.children("A"), ["C"]);
        assert_eq!(g.children("root"), ["A", "B"]);
    }

    #[test]
    fn test_cousins_after_siblings() {
        let mut g = sample();
        g.add_edge("D", "root");
        g.add_edge("E", "D");
        g.add_edge("F", "D");
        assert_eq!(g.related("B", 10), vec!["C", "E", "F"]);
        assert_eq!(g.related("B", 2), vec!["C", "E"]);
    }

    #[test]
    fn test_related_without_parent_is_empty() {
        let g = sample();
        assert!(g.related("root", 5).is_empty());
    }

    #[test]
    fn test_record_children_remembers_empty_lists() {
        let mut g = sample();
        assert!(!g.is_listed("leaf"));
        assert!(!g.is_listed("A"));
        g.record_children("leaf", &[]);
        assert!(g.is_listed("leaf"));
        assert!(g.children("leaf").is_empty());
    }

    #[test]
    fn test_known_root_has_no_parent() {
        let mut g = sample();
        assert!(g.is_parent_known("B"));
        assert!(!g.is_parent_known("root"));
        g.mark_parent_known("root");
        assert!(g.is_parent_known("root"));
        assert_eq!(g.parent("root"), None);
    }

    #[test]
    fn test_roots() {
        let mut g = sample();
        g.add_edge("X", "other-root");
        assert_eq!(g.roots(), vec!["other-root", "root"]);
    }
}
