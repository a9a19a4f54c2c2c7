//! Template tree structure

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

use crate::attr::Attribute;
use crate::error::{AstError, AstResult};
use crate::node::{ElementData, Expression, Node, NodeId, NodeType};

/// Arena that owns all nodes of one parsed template.
///
/// Nodes are addressed by `NodeId`; the parser's open-node stack holds ids
/// into this arena rather than references into the tree.
pub struct TemplateTree {
    /// All nodes in the tree
    nodes: FxHashMap<NodeId, Node>,
    /// Next available node ID
    next_id: u32,
    /// Synthetic root fragment
    fragment_id: NodeId,
}

impl TemplateTree {
    /// Create a new tree holding only the root fragment
    pub fn new() -> Self {
        let fragment_id = NodeId::new(0);
        let fragment = Node::new(fragment_id, NodeType::Fragment, 0);

        let mut nodes = FxHashMap::default();
        nodes.insert(fragment_id, fragment);

        Self {
            nodes,
            next_id: 1,
            fragment_id,
        }
    }

    /// Get the root fragment's ID
    pub fn fragment_id(&self) -> NodeId {
        self.fragment_id
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn alloc(&mut self, node_type: NodeType, start: usize) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, node_type, start));
        id
    }

    fn alloc_closed(&mut self, node_type: NodeType, start: usize, end: usize) -> NodeId {
        let id = self.alloc(node_type, start);
        self.close(id, end);
        id
    }

    /// Create a new open element node
    pub fn create_element(
        &mut self,
        name: impl Into<String>,
        attributes: SmallVec<[Attribute; 4]>,
        start: usize,
    ) -> NodeId {
        self.alloc(NodeType::Element(ElementData::new(name, attributes)), start)
    }

    /// Create a new text node
    pub fn create_text(&mut self, data: impl Into<String>, start: usize, end: usize) -> NodeId {
        self.alloc_closed(NodeType::Text(data.into()), start, end)
    }

    /// Create a new comment node
    pub fn create_comment(&mut self, data: impl Into<String>, start: usize, end: usize) -> NodeId {
        self.alloc_closed(NodeType::Comment(data.into()), start, end)
    }

    /// Create a `{{ expression }}` tag node
    pub fn create_mustache_tag(
        &mut self,
        expression: Expression,
        start: usize,
        end: usize,
    ) -> NodeId {
        self.alloc_closed(NodeType::MustacheTag(expression), start, end)
    }

    /// Create a `{{{ expression }}}` tag node
    pub fn create_raw_mustache_tag(
        &mut self,
        expression: Expression,
        start: usize,
        end: usize,
    ) -> NodeId {
        self.alloc_closed(NodeType::RawMustacheTag(expression), start, end)
    }

    /// Create a new open if-block
    pub fn create_if_block(&mut self, expression: Expression, elseif: bool, start: usize) -> NodeId {
        self.alloc(NodeType::IfBlock { expression, elseif }, start)
    }

    /// Create a new open else-block
    pub fn create_else_block(&mut self, start: usize) -> NodeId {
        self.alloc(NodeType::ElseBlock, start)
    }

    /// Create a new open each-block
    pub fn create_each_block(
        &mut self,
        expression: Expression,
        context: impl Into<String>,
        index: Option<String>,
        start: usize,
    ) -> NodeId {
        self.alloc(
            NodeType::EachBlock {
                expression,
                context: context.into(),
                index,
            },
            start,
        )
    }

    /// Set a node's end offset
    pub fn close(&mut self, id: NodeId, end: usize) {
        if let Some(node) = self.get_mut(id) {
            node.end = Some(end);
        }
    }

    /// Append a child node to a parent
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> AstResult<()> {
        if !self.nodes.contains_key(&child_id) {
            return Err(AstError::NodeNotFound(child_id.0));
        }

        {
            let parent = self
                .get(parent_id)
                .ok_or(AstError::NodeNotFound(parent_id.0))?;
            if !parent.accepts_children() {
                return Err(AstError::NotAContainer);
            }
        }

        if let Some(child) = self.get_mut(child_id) {
            child.parent = Some(parent_id);
        }
        if let Some(parent) = self.get_mut(parent_id) {
            parent.children.push(child_id);
        }

        Ok(())
    }

    /// Remove a node from its parent and drop it from the arena
    fn remove(&mut self, id: NodeId) {
        let parent = self.get(id).and_then(|n| n.parent);
        if let Some(parent_id) = parent {
            if let Some(parent) = self.get_mut(parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }
        self.nodes.remove(&id);
    }

    /// Strip boundary whitespace from a node being closed.
    ///
    /// If the first child is text, leading whitespace is removed from it (the
    /// child is dropped entirely if nothing remains); symmetrically for the
    /// last child and trailing whitespace. Interior whitespace-only text
    /// nodes are left untouched.
    pub fn strip_whitespace(&mut self, id: NodeId) {
        if let Some(&first) = self.get(id).and_then(|n| n.children.first()) {
            if self.trim_text(first, true) {
                self.remove(first);
            }
        }
        if let Some(&last) = self.get(id).and_then(|n| n.children.last()) {
            if self.trim_text(last, false) {
                self.remove(last);
            }
        }
    }

    /// Trim one side of a text node, adjusting its span. Returns true if the
    /// node emptied out and should be removed.
    fn trim_text(&mut self, id: NodeId, leading: bool) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        let NodeType::Text(ref mut data) = node.node_type else {
            return false;
        };

        if leading {
            let trimmed = data.trim_start();
            let removed = data.len() - trimmed.len();
            if removed > 0 {
                node.start += removed;
                *data = trimmed.to_string();
            }
        } else {
            let trimmed = data.trim_end();
            let removed = data.len() - trimmed.len();
            if removed > 0 {
                if let Some(end) = node.end {
                    node.end = Some(end - removed);
                }
                *data = trimmed.to_string();
            }
        }

        data.is_empty()
    }

    /// Get all children of a node
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id)
            .map(|n| n.children.to_vec())
            .unwrap_or_default()
    }

    /// Iterate over all descendants of a node (depth-first)
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        self.collect_descendants(id, &mut result);
        result
    }

    fn collect_descendants(&self, id: NodeId, result: &mut Vec<NodeId>) {
        if let Some(node) = self.get(id) {
            for &child_id in &node.children {
                result.push(child_id);
                self.collect_descendants(child_id, result);
            }
        }
    }

    /// Get the text content of a node and all its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, result: &mut String) {
        if let Some(node) = self.get(id) {
            match &node.node_type {
                NodeType::Text(text) => result.push_str(text),
                _ => {
                    for &child_id in &node.children {
                        self.collect_text(child_id, result);
                    }
                }
            }
        }
    }

    /// Get the number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty (only has the root fragment)
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Pretty print the tree for debugging
    pub fn pretty_print(&self) -> String {
        let mut output = String::new();
        self.print_node(self.fragment_id, 0, &mut output);
        output
    }

    fn print_node(&self, id: NodeId, depth: usize, output: &mut String) {
        let indent = "  ".repeat(depth);

        if let Some(node) = self.get(id) {
            match &node.node_type {
                NodeType::Fragment => {
                    output.push_str("#fragment\n");
                }
                NodeType::Element(elem) => {
                    let attrs: Vec<String> = elem
                        .attributes
                        .iter()
                        .map(|a| a.unique_name())
                        .collect();
                    let attrs_str = if attrs.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", attrs.join(" "))
                    };
                    output.push_str(&format!("{}<{}{}>\n", indent, elem.name, attrs_str));
                }
                NodeType::Text(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        output.push_str(&format!("{}#text: {:?}\n", indent, trimmed));
                    }
                }
                NodeType::Comment(text) => {
                    output.push_str(&format!("{}<!-- {} -->\n", indent, text));
                }
                NodeType::MustacheTag(expr) => {
                    output.push_str(&format!("{}{{{{ {} }}}}\n", indent, expr.raw));
                }
                NodeType::RawMustacheTag(expr) => {
                    output.push_str(&format!("{}{{{{{{ {} }}}}}}\n", indent, expr.raw));
                }
                NodeType::IfBlock { expression, elseif } => {
                    let keyword = if *elseif { "elseif" } else { "#if" };
                    output.push_str(&format!("{}{{{{{} {}}}}}\n", indent, keyword, expression.raw));
                }
                NodeType::ElseBlock => {
                    output.push_str(&format!("{}{{{{else}}}}\n", indent));
                }
                NodeType::EachBlock {
                    expression,
                    context,
                    index,
                } => {
                    let index_str = index
                        .as_deref()
                        .map(|i| format!(", {i}"))
                        .unwrap_or_default();
                    output.push_str(&format!(
                        "{}{{{{#each {} as {}{}}}}}\n",
                        indent, expression.raw, context, index_str
                    ));
                }
            }

            for &child_id in &node.children {
                self.print_node(child_id, depth + 1, output);
            }
        }
    }
}

impl Default for TemplateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_print())
    }
}
