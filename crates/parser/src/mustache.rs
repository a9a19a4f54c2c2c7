//! Mustache handler
//!
//! Entered when the cursor sits at `{{` outside a tag. Handles control-flow
//! blocks (`{{#if}}`, `{{#each}}`, their `{{else}}`/`{{elseif}}` branches and
//! `{{/...}}` closers), raw tags `{{{expr}}}` and plain `{{expr}}` tags.
//!
//! An `{{elseif}}` nests as an if-block inside the previous block's else
//! branch, so one `{{/if}}` unwinds the whole chain.

use nisaba_ast::NodeType;

use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::expression;
use crate::parser::Parser;

/// Parse one mustache, starting at `{{`
pub(crate) fn mustache(parser: &mut Parser) -> ParseResult<()> {
    let start = parser.index;
    parser.eat("{{");

    // `{{{` opens a raw tag
    if parser.matches("{") {
        parser.eat("{");
        let expression = expression::read_expression(parser)?;
        parser.require("}}}")?;

        let node = parser.tree.create_raw_mustache_tag(expression, start, parser.index);
        parser.append(node);
        return Ok(());
    }

    parser.allow_whitespace();

    if parser.eat("/") {
        return close_block(parser, start);
    }

    if parser.eat("elseif") {
        return elseif_branch(parser, start);
    }

    if parser.eat("else") {
        return else_branch(parser, start);
    }

    if parser.eat("#") {
        return open_block(parser, start);
    }

    let expression = expression::read_expression(parser)?;
    parser.require("}}")?;

    let node = parser.tree.create_mustache_tag(expression, start, parser.index);
    parser.append(node);
    Ok(())
}

/// `{{#if ...}}` / `{{#each ... as ...}}`
fn open_block(parser: &mut Parser, start: usize) -> ParseResult<()> {
    if parser.eat("if") {
        parser.allow_whitespace();
        let expression = expression::read_expression(parser)?;
        parser.require("}}")?;

        let block = parser.tree.create_if_block(expression, false, start);
        parser.append(block);
        parser.stack.push(block);
        return Ok(());
    }

    if parser.eat("each") {
        parser.allow_whitespace();
        let (region_start, region_end) = expression::scan(parser, |rest| rest.starts_with("}}"))?;
        let (expression, context, index) = each_details(parser, region_start, region_end)?;
        parser.require("}}")?;

        let block = parser.tree.create_each_block(expression, context, index, start);
        parser.append(block);
        parser.stack.push(block);
        return Ok(());
    }

    Err(parser.error(ParseErrorKind::ExpectedToken("'if' or 'each'".to_string())))
}

/// Split an each-block header into its expression, context and index
fn each_details(
    parser: &Parser,
    region_start: usize,
    region_end: usize,
) -> ParseResult<(nisaba_ast::Expression, String, Option<String>)> {
    let raw = &parser.source[region_start..region_end];

    let Some(as_offset) = find_as_keyword(raw) else {
        return Err(ParseError::new(
            ParseErrorKind::ExpectedToken("as".to_string()),
            region_end,
        ));
    };

    if raw[..as_offset].trim().is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyExpression, region_start));
    }
    let expression = nisaba_ast::Expression::new(&raw[..as_offset], region_start);

    let mut names = Scanner {
        text: raw,
        offset: as_offset + 2,
        base: region_start,
    };

    names.skip_whitespace();
    let context = names.read_identifier()?;

    names.skip_whitespace();
    let index = if names.eat(',') {
        names.skip_whitespace();
        Some(names.read_identifier()?)
    } else {
        None
    };

    names.skip_whitespace();
    if !names.done() {
        return Err(ParseError::new(
            ParseErrorKind::ExpectedToken("}}".to_string()),
            names.position(),
        ));
    }

    Ok((expression, context, index))
}

/// Find a freestanding `as` keyword outside brackets and strings
fn find_as_keyword(raw: &str) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut string: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = string {
            if b == b'\\' {
                i += 1;
            } else if b == quote {
                string = None;
            }
        } else {
            match b {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'\'' | b'"' | b'`' => string = Some(b),
                b'a' if depth == 0
                    && raw[i..].starts_with("as")
                    && boundary(bytes, i.wrapping_sub(1))
                    && boundary(bytes, i + 2) =>
                {
                    return Some(i);
                }
                _ => {}
            }
        }
        i += 1;
    }

    None
}

fn boundary(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        None => true,
        Some(b) => !(b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$'),
    }
}

/// Tiny cursor over an each-block header's tail
struct Scanner<'a> {
    text: &'a str,
    offset: usize,
    base: usize,
}

impl Scanner<'_> {
    fn position(&self) -> usize {
        self.base + self.offset
    }

    fn done(&self) -> bool {
        self.offset >= self.text.len()
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.offset..];
        self.offset += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.text[self.offset..].starts_with(c) {
            self.offset += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn read_identifier(&mut self) -> ParseResult<String> {
        let rest = &self.text[self.offset..];
        let len = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
            .map(|c| c.len_utf8())
            .sum::<usize>();

        let starts_with_digit = rest.starts_with(|c: char| c.is_ascii_digit());
        if len == 0 || starts_with_digit {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedToken("a name".to_string()),
                self.position(),
            ));
        }

        self.offset += len;
        Ok(rest[..len].to_string())
    }
}

/// `{{elseif expr}}`: open an else branch holding a nested if-block
fn elseif_branch(parser: &mut Parser, start: usize) -> ParseResult<()> {
    let current = parser.current();
    let is_if = matches!(
        parser.tree.get(current).map(|n| &n.node_type),
        Some(NodeType::IfBlock { .. })
    );
    if !is_if {
        return Err(ParseError::new(ParseErrorKind::MisplacedElseIf, start));
    }

    parser.allow_whitespace();
    let expression = expression::read_expression(parser)?;
    parser.require("}}")?;

    let else_block = parser.tree.create_else_block(parser.index);
    parser.append(else_block);
    parser.stack.push(else_block);

    let if_block = parser.tree.create_if_block(expression, true, parser.index);
    parser.append(if_block);
    parser.stack.push(if_block);

    Ok(())
}

/// `{{else}}`: open the alternate branch of the current block
fn else_branch(parser: &mut Parser, start: usize) -> ParseResult<()> {
    let current = parser.current();
    let legal = matches!(
        parser.tree.get(current).map(|n| &n.node_type),
        Some(NodeType::IfBlock { .. } | NodeType::EachBlock { .. })
    );
    if !legal {
        return Err(ParseError::new(ParseErrorKind::MisplacedElse, start));
    }

    parser.allow_whitespace();
    parser.require("}}")?;

    let else_block = parser.tree.create_else_block(parser.index);
    parser.append(else_block);
    parser.stack.push(else_block);

    Ok(())
}

/// `{{/if}}` / `{{/each}}`: close the innermost block, unwinding any
/// elseif chain it terminates
fn close_block(parser: &mut Parser, start: usize) -> ParseResult<()> {
    // an open else branch ends where the closing tag begins
    if matches!(
        parser.tree.get(parser.current()).map(|n| &n.node_type),
        Some(NodeType::ElseBlock)
    ) {
        let else_block = parser.current();
        parser.tree.close(else_block, start);
        parser.stack.pop();
    }

    let expected = match parser.tree.get(parser.current()).map(|n| &n.node_type) {
        Some(NodeType::IfBlock { .. }) => "if",
        Some(NodeType::EachBlock { .. }) => "each",
        _ => return Err(ParseError::new(ParseErrorKind::UnexpectedBlockClose, start)),
    };

    parser.require(expected)?;
    parser.allow_whitespace();
    parser.require("}}")?;

    loop {
        let block = parser.current();
        let elseif = matches!(
            parser.tree.get(block).map(|n| &n.node_type),
            Some(NodeType::IfBlock { elseif: true, .. })
        );

        parser.tree.close(block, parser.index);
        parser.stack.pop();

        if !elseif {
            break;
        }

        // pop the else branch wrapping this elseif; the enclosing if-block
        // closes on the next iteration
        let wrapper = parser.current();
        parser.tree.close(wrapper, start);
        parser.stack.pop();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Template;
    use nisaba_ast::{NodeId, Queryable};

    fn parse(source: &str) -> Template {
        Parser::new(source).parse().unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        Parser::new(source).parse().unwrap_err()
    }

    fn roots(template: &Template) -> Vec<NodeId> {
        template.tree.children(template.fragment)
    }

    #[test]
    fn test_plain_mustache_tag() {
        let template = parse("{{ greeting }}");

        let children = roots(&template);
        assert_eq!(children.len(), 1);
        match &template.tree.get(children[0]).unwrap().node_type {
            NodeType::MustacheTag(expr) => {
                assert_eq!(expr.raw, "greeting");
                assert_eq!((expr.start, expr.end), (3, 11));
            }
            other => panic!("expected mustache tag, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_mustache_tag() {
        let template = parse("{{{ html }}}");

        let children = roots(&template);
        match &template.tree.get(children[0]).unwrap().node_type {
            NodeType::RawMustacheTag(expr) => assert_eq!(expr.raw, "html"),
            other => panic!("expected raw mustache tag, got {other:?}"),
        }
    }

    #[test]
    fn test_if_block() {
        let template = parse("{{#if visible}}<p>hi</p>{{/if}}");

        let children = roots(&template);
        assert_eq!(children.len(), 1);
        let block = template.tree.get(children[0]).unwrap();
        match &block.node_type {
            NodeType::IfBlock { expression, elseif } => {
                assert_eq!(expression.raw, "visible");
                assert!(!elseif);
            }
            other => panic!("expected if block, got {other:?}"),
        }
        assert_eq!(block.end, Some(31));
        assert_eq!(template.tree.elements_by_name("p").len(), 1);
    }

    #[test]
    fn test_if_else_block() {
        let template = parse("{{#if ok}}yes{{else}}no{{/if}}");

        let block = roots(&template)[0];
        let children = template.tree.children(block);
        assert_eq!(children.len(), 2);

        let last = template.tree.get(children[1]).unwrap();
        assert!(matches!(last.node_type, NodeType::ElseBlock));
        assert_eq!(template.tree.text_content(children[1]), "no");
    }

    #[test]
    fn test_elseif_chain() {
        let template = parse("{{#if a}}x{{elseif b}}y{{else}}z{{/if}}");

        let outer = roots(&template)[0];
        assert!(matches!(
            template.tree.get(outer).unwrap().node_type,
            NodeType::IfBlock { elseif: false, .. }
        ));

        // the elseif nests as else -> if
        let outer_children = template.tree.children(outer);
        let else_block = *outer_children.last().unwrap();
        assert!(matches!(
            template.tree.get(else_block).unwrap().node_type,
            NodeType::ElseBlock
        ));

        let inner = template.tree.children(else_block)[0];
        let inner_node = template.tree.get(inner).unwrap();
        match &inner_node.node_type {
            NodeType::IfBlock { expression, elseif } => {
                assert_eq!(expression.raw, "b");
                assert!(elseif);
            }
            other => panic!("expected nested if block, got {other:?}"),
        }

        // one {{/if}} closed the whole chain
        assert!(template.tree.get(outer).unwrap().end.is_some());
        assert!(inner_node.end.is_some());

        let inner_else = *template.tree.children(inner).last().unwrap();
        assert!(matches!(
            template.tree.get(inner_else).unwrap().node_type,
            NodeType::ElseBlock
        ));
        assert_eq!(template.tree.text_content(inner_else), "z");
    }

    #[test]
    fn test_each_block() {
        let template = parse("{{#each people as person}}<span>{{person}}</span>{{/each}}");

        let block = roots(&template)[0];
        match &template.tree.get(block).unwrap().node_type {
            NodeType::EachBlock {
                expression,
                context,
                index,
            } => {
                assert_eq!(expression.raw, "people");
                assert_eq!(context, "person");
                assert!(index.is_none());
            }
            other => panic!("expected each block, got {other:?}"),
        }
    }

    #[test]
    fn test_each_block_with_index() {
        let template = parse("{{#each items as item, i}}{{i}}{{/each}}");

        let block = roots(&template)[0];
        match &template.tree.get(block).unwrap().node_type {
            NodeType::EachBlock { context, index, .. } => {
                assert_eq!(context, "item");
                assert_eq!(index.as_deref(), Some("i"));
            }
            other => panic!("expected each block, got {other:?}"),
        }
    }

    #[test]
    fn test_each_block_else() {
        let template = parse("{{#each list as item}}{{item}}{{else}}empty{{/each}}");

        let block = roots(&template)[0];
        let children = template.tree.children(block);
        let last = *children.last().unwrap();
        assert!(matches!(
            template.tree.get(last).unwrap().node_type,
            NodeType::ElseBlock
        ));
    }

    #[test]
    fn test_each_requires_as() {
        let error = parse_err("{{#each people}}{{/each}}");
        assert_eq!(error.kind, ParseErrorKind::ExpectedToken("as".to_string()));
    }

    #[test]
    fn test_find_as_keyword_skips_lookalikes() {
        assert_eq!(find_as_keyword("people as person"), Some(7));
        assert_eq!(find_as_keyword("aliases as alias"), Some(8));
        assert_eq!(find_as_keyword("basket"), None);
        assert_eq!(find_as_keyword("f(x as y)"), None);
        assert_eq!(find_as_keyword("'as' as x"), Some(5));
    }

    #[test]
    fn test_unknown_block_type_errors() {
        let error = parse_err("{{#while true}}{{/while}}");
        assert_eq!(
            error.kind,
            ParseErrorKind::ExpectedToken("'if' or 'each'".to_string())
        );
    }

    #[test]
    fn test_mismatched_block_close_errors() {
        let error = parse_err("{{#if a}}{{/each}}");
        assert_eq!(error.kind, ParseErrorKind::ExpectedToken("if".to_string()));
    }

    #[test]
    fn test_stray_block_close_errors() {
        let error = parse_err("{{/if}}");
        assert_eq!(error.kind, ParseErrorKind::UnexpectedBlockClose);
        assert_eq!(error.offset, 0);
    }

    #[test]
    fn test_else_outside_block_errors() {
        let error = parse_err("{{else}}");
        assert_eq!(error.kind, ParseErrorKind::MisplacedElse);
    }

    #[test]
    fn test_double_else_errors() {
        let error = parse_err("{{#if a}}x{{else}}y{{else}}z{{/if}}");
        assert_eq!(error.kind, ParseErrorKind::MisplacedElse);
    }

    #[test]
    fn test_elseif_after_else_errors() {
        let error = parse_err("{{#if a}}x{{else}}y{{elseif b}}z{{/if}}");
        assert_eq!(error.kind, ParseErrorKind::MisplacedElseIf);
    }

    #[test]
    fn test_elseif_outside_if_errors() {
        let error = parse_err("{{#each xs as x}}{{elseif y}}{{/each}}");
        assert_eq!(error.kind, ParseErrorKind::MisplacedElseIf);
    }

    #[test]
    fn test_closing_element_through_block_errors() {
        // the if-block sits between <p> and the closing tag
        let error = parse_err("<p>{{#if a}}</p>{{/if}}");
        assert_eq!(
            error.kind,
            ParseErrorKind::UnexpectedClosingTag("p".to_string())
        );
    }

    #[test]
    fn test_tag_omission_inside_block() {
        let template = parse("{{#each xs as x}}<li>one<li>two</li>{{/each}}");

        let lis = template.tree.elements_by_name("li");
        assert_eq!(lis.len(), 2);

        let block = roots(&template)[0];
        assert_eq!(template.tree.children(block), lis);
    }
}
