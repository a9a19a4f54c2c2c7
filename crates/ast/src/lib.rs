//! Nisaba AST - Template Tree
//!
//! Arena-based node tree for parsed templates.

mod attr;
mod error;
mod node;
mod query;
mod tree;

pub use attr::{Attribute, AttributeValue, ValueChunk};
pub use error::{AstError, AstResult};
pub use node::{ElementData, Expression, Node, NodeId, NodeType};
pub use query::Queryable;
pub use tree::TemplateTree;
