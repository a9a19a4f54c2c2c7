//! Template tree node representation

use smallvec::SmallVec;
use std::fmt;

use crate::attr::Attribute;

/// Unique identifier for a node in the template tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new node ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The raw source text of an embedded expression, with its span.
///
/// The parser does not interpret expressions; downstream passes receive the
/// trimmed source text and the byte range it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Expression source text, surrounding whitespace removed
    pub raw: String,
    /// Byte offset of the first character of `raw` in the source
    pub start: usize,
    /// Byte offset one past the last character of `raw`
    pub end: usize,
}

impl Expression {
    /// Build an expression from a raw source slice starting at `start`,
    /// trimming surrounding whitespace and adjusting the span to match.
    pub fn new(raw: &str, start: usize) -> Self {
        let leading = raw.len() - raw.trim_start().len();
        let trimmed = raw.trim();
        Self {
            raw: trimmed.to_string(),
            start: start + leading,
            end: start + leading + trimmed.len(),
        }
    }

    /// Build a synthesized identifier expression (shorthand attributes,
    /// value-less bindings).
    pub fn identifier(name: &str, start: usize) -> Self {
        Self {
            raw: name.to_string(),
            start,
            end: start + name.len(),
        }
    }

    /// Whether the raw text is a single identifier token
    pub fn is_identifier(&self) -> bool {
        let mut chars = self.raw.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    }
}

/// Element-specific data
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Tag name, exactly as written in the source
    pub name: String,
    /// Attributes in source order
    pub attributes: SmallVec<[Attribute; 4]>,
}

impl ElementData {
    /// Create a new element with the given tag name
    pub fn new(name: impl Into<String>, attributes: SmallVec<[Attribute; 4]>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Look up an attribute by its raw name (`class`, `on:click`, ...)
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.unique_name() == name)
    }
}

/// Type of template node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// Synthetic root of the template
    Fragment,
    /// Element node
    Element(ElementData),
    /// Text content
    Text(String),
    /// Comment
    Comment(String),
    /// `{{ expression }}` tag
    MustacheTag(Expression),
    /// `{{{ expression }}}` tag, rendered without escaping
    RawMustacheTag(Expression),
    /// `{{#if expression}}` block; an `ElseBlock` child, when present, is
    /// the last child
    IfBlock {
        expression: Expression,
        /// True when this block was written as `{{elseif ...}}` and nests
        /// inside the previous if-block's else branch
        elseif: bool,
    },
    /// The alternate branch of an if- or each-block
    ElseBlock,
    /// `{{#each expression as context[, index]}}` block
    EachBlock {
        expression: Expression,
        context: String,
        index: Option<String>,
    },
}

/// A node in the template tree
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,
    /// Node type and associated data
    pub node_type: NodeType,
    /// Parent node ID (None for the root fragment)
    pub parent: Option<NodeId>,
    /// Child node IDs
    pub children: SmallVec<[NodeId; 8]>,
    /// Byte offset where this node starts in the source
    pub start: usize,
    /// Byte offset one past the node's end; None while the node is open
    pub end: Option<usize>,
}

impl Node {
    /// Create a new node
    pub fn new(id: NodeId, node_type: NodeType, start: usize) -> Self {
        Self {
            id,
            node_type,
            parent: None,
            children: SmallVec::new(),
            start,
            end: None,
        }
    }

    /// Check if this is the root fragment
    pub fn is_fragment(&self) -> bool {
        matches!(self.node_type, NodeType::Fragment)
    }

    /// Check if this is an element node
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element(_))
    }

    /// Check if this is a text node
    pub fn is_text(&self) -> bool {
        matches!(self.node_type, NodeType::Text(_))
    }

    /// Check if this is a control-flow block
    pub fn is_block(&self) -> bool {
        matches!(
            self.node_type,
            NodeType::IfBlock { .. } | NodeType::ElseBlock | NodeType::EachBlock { .. }
        )
    }

    /// Whether this node kind can hold children
    pub fn accepts_children(&self) -> bool {
        matches!(self.node_type, NodeType::Fragment | NodeType::Element(_))
            || self.is_block()
    }

    /// Get element data if this is an element
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Get mutable element data if this is an element
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Get text content if this is a text node
    pub fn as_text(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the tag name if this is an element
    pub fn name(&self) -> Option<&str> {
        self.as_element().map(|e| e.name.as_str())
    }
}
