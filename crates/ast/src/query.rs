//! Tree query functionality (element lookup by name)

use crate::node::{Node, NodeId};
use crate::tree::TemplateTree;

/// Trait for querying the template tree
pub trait Queryable {
    /// Find all elements with the given tag name, in document order
    fn elements_by_name(&self, name: &str) -> Vec<NodeId>;

    /// Find the first node matching a predicate, in document order
    fn find_node(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeId>;
}

impl Queryable for TemplateTree {
    fn elements_by_name(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.fragment_id())
            .into_iter()
            .filter(|&id| {
                self.get(id)
                    .and_then(|n| n.name())
                    .map(|n| n == name)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn find_node(&self, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.descendants(self.fragment_id())
            .into_iter()
            .find(|&id| self.get(id).map(&predicate).unwrap_or(false))
    }
}
