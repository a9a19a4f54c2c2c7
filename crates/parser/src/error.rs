//! Parse error types

use thiserror::Error;

/// Parse result type
pub type ParseResult<T> = Result<T, ParseError>;

/// A fatal parse error, carrying the byte offset it was raised at.
///
/// There is no recovery: the first error aborts the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (at offset {offset})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// Everything that can go wrong inside a tag or block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("Invalid tag name")]
    InvalidTagName,

    #[error("A component can only have one <{0}> tag")]
    DuplicateMetaTag(String),

    #[error("<{0}> tags cannot be inside elements or blocks")]
    MetaTagNested(String),

    #[error("<{0}> cannot have children")]
    MetaTagWithChildren(String),

    #[error("<{0}> is a void element and cannot have a closing tag")]
    VoidElementClosingTag(String),

    #[error("Expected {0}")]
    ExpectedToken(String),

    #[error("</{0}> attempted to close an element that was not open")]
    UnexpectedClosingTag(String),

    #[error("Duplicate attribute '{0}'")]
    DuplicateAttribute(String),

    #[error("Ref directives cannot have a value")]
    RefWithValue,

    #[error("A component can only have one top-level <{kind}> tag (first declared at offset {first})")]
    DuplicateBlock { kind: String, first: usize },

    #[error("Self-reference tags can only exist inside if-blocks or each-blocks")]
    IllegalSelfReference,

    #[error("Unexpected block closing tag")]
    UnexpectedBlockClose,

    #[error("An else block must follow an if-block or each-block")]
    MisplacedElse,

    #[error("An elseif block must follow an if-block")]
    MisplacedElseIf,

    #[error("Empty expression")]
    EmptyExpression,

    #[error("Unexpected end of input")]
    UnexpectedEof,
}
