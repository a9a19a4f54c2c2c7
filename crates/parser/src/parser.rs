//! Parse state and document driver
//!
//! `Parser` owns the cursor into the source, the tree being built, the
//! open-node stack and the per-parse registries. The driver dispatches on
//! `<` (tags), `{{` (mustaches) and everything else (text).

use rustc_hash::FxHashSet;

use nisaba_ast::{NodeId, TemplateTree};

use crate::entities::decode_character_references;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::raw::{ScriptBlock, StyleBlock};
use crate::{mustache, tag};

/// Result of a successful parse
#[derive(Debug)]
pub struct Template {
    /// The node tree
    pub tree: TemplateTree,
    /// Root fragment holding the markup nodes
    pub fragment: NodeId,
    /// The single top-level script block, if any
    pub script: Option<ScriptBlock>,
    /// The single top-level style block, if any
    pub style: Option<StyleBlock>,
}

/// Template parser
pub struct Parser<'a> {
    pub(crate) source: &'a str,
    pub(crate) index: usize,
    pub(crate) tree: TemplateTree,
    pub(crate) stack: Vec<NodeId>,
    pub(crate) meta_tags: FxHashSet<&'static str>,
    pub(crate) script: Option<ScriptBlock>,
    pub(crate) style: Option<StyleBlock>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given source
    pub fn new(source: &'a str) -> Self {
        let tree = TemplateTree::new();
        let fragment = tree.fragment_id();
        Self {
            source,
            index: 0,
            tree,
            stack: vec![fragment],
            meta_tags: FxHashSet::default(),
            script: None,
            style: None,
        }
    }

    /// Parse the source into a template
    pub fn parse(mut self) -> ParseResult<Template> {
        log::trace!("parsing template ({} bytes)", self.source.len());

        while !self.eof() {
            if self.matches("<") {
                tag::tag(&mut self)?;
            } else if self.matches("{{") {
                mustache::mustache(&mut self)?;
            } else {
                self.text();
            }
        }

        if self.stack.len() > 1 {
            let unclosed = self.current();
            let start = self.tree.get(unclosed).map(|n| n.start).unwrap_or(0);
            return Err(ParseError::new(ParseErrorKind::UnexpectedEof, start));
        }

        let fragment = self.tree.fragment_id();
        self.tree.strip_whitespace(fragment);
        self.tree.close(fragment, self.source.len());

        log::trace!("parsed {} nodes", self.tree.len());

        Ok(Template {
            tree: self.tree,
            fragment,
            script: self.script,
            style: self.style,
        })
    }

    // === Cursor primitives ===

    /// The unconsumed remainder of the source
    pub(crate) fn rest(&self) -> &'a str {
        &self.source[self.index..]
    }

    /// Peek at the current character without consuming
    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Whether the cursor is at the end of input
    pub(crate) fn eof(&self) -> bool {
        self.index >= self.source.len()
    }

    /// Check if the source at the cursor starts with `literal`
    pub(crate) fn matches(&self, literal: &str) -> bool {
        self.rest().starts_with(literal)
    }

    /// Consume `literal` if present; returns true if consumed
    pub(crate) fn eat(&mut self, literal: &str) -> bool {
        if self.matches(literal) {
            self.index += literal.len();
            true
        } else {
            false
        }
    }

    /// Consume `literal` or fail with the expected token
    pub(crate) fn require(&mut self, literal: &str) -> ParseResult<()> {
        if self.eat(literal) {
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::ExpectedToken(literal.to_string())))
        }
    }

    /// Consume and return the current character
    pub(crate) fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += c.len_utf8();
        Some(c)
    }

    /// Consume everything up to (not including) `literal`, or to the end of
    /// input if it never occurs. Returns the consumed slice.
    pub(crate) fn read_until(&mut self, literal: &str) -> &'a str {
        let rest = self.rest();
        let len = rest.find(literal).unwrap_or(rest.len());
        self.index += len;
        &rest[..len]
    }

    /// Skip any run of whitespace
    pub(crate) fn allow_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    /// Build an error at the current offset
    pub(crate) fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.index)
    }

    // === Tree helpers ===

    /// The current insertion parent (top of the open-node stack)
    pub(crate) fn current(&self) -> NodeId {
        self.stack
            .last()
            .copied()
            .unwrap_or_else(|| self.tree.fragment_id())
    }

    /// Append a node to the current insertion parent
    pub(crate) fn append(&mut self, id: NodeId) {
        let parent = self.current();
        self.tree.append_child(parent, id).ok();
    }

    // === Text handler ===

    /// Accumulate literal text up to the next tag or mustache
    fn text(&mut self) {
        let start = self.index;
        while !self.eof() && !self.matches("<") && !self.matches("{{") {
            self.advance();
        }

        let data = decode_character_references(&self.source[start..self.index]);
        let node = self.tree.create_text(data, start, self.index);
        self.append(node);
    }
}
