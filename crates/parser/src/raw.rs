//! Raw-content readers for top-level script and style blocks
//!
//! Block bodies are consumed verbatim up to the matching closing tag and
//! stored as opaque records; nothing inside them is parsed as markup.

use smallvec::SmallVec;

use nisaba_ast::Attribute;

use crate::error::{ParseErrorKind, ParseResult};
use crate::parser::Parser;

/// A top-level `<script>` block's raw content
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptBlock {
    /// Byte offset of the opening tag's `<`
    pub start: usize,
    /// Byte offset one past the closing tag's `>`
    pub end: usize,
    /// Attributes of the opening tag
    pub attributes: SmallVec<[Attribute; 4]>,
    /// Verbatim body text
    pub content: String,
}

/// A top-level `<style>` block's raw content
#[derive(Debug, Clone, PartialEq)]
pub struct StyleBlock {
    /// Byte offset of the opening tag's `<`
    pub start: usize,
    /// Byte offset one past the closing tag's `>`
    pub end: usize,
    /// Attributes of the opening tag
    pub attributes: SmallVec<[Attribute; 4]>,
    /// Verbatim body text
    pub content: String,
}

/// Consume a script body up to `</script>`
pub(crate) fn read_script(
    parser: &mut Parser,
    start: usize,
    attributes: SmallVec<[Attribute; 4]>,
) -> ParseResult<ScriptBlock> {
    let content = read_raw_content(parser, "</script>")?;
    Ok(ScriptBlock {
        start,
        end: parser.index,
        attributes,
        content,
    })
}

/// Consume a style body up to `</style>`
pub(crate) fn read_style(
    parser: &mut Parser,
    start: usize,
    attributes: SmallVec<[Attribute; 4]>,
) -> ParseResult<StyleBlock> {
    let content = read_raw_content(parser, "</style>")?;
    Ok(StyleBlock {
        start,
        end: parser.index,
        attributes,
        content,
    })
}

fn read_raw_content(parser: &mut Parser, closing_tag: &str) -> ParseResult<String> {
    let content_start = parser.index;
    let content = parser.read_until(closing_tag).to_string();
    if parser.eof() {
        return Err(crate::error::ParseError::new(
            ParseErrorKind::ExpectedToken(closing_tag.to_string()),
            content_start,
        ));
    }
    parser.require(closing_tag)?;
    Ok(content)
}
