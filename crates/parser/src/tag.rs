//! Tag state machine
//!
//! Entered when the cursor sits at `<`; consumes the whole tag, dispatching
//! between comments, closing tags, top-level raw blocks and elements, and
//! mutating the open-node stack.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::LazyLock;

use nisaba_ast::{Attribute, NodeType};

use crate::attributes;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::parser::Parser;
use crate::raw;

/// Placeholder tag meaning "recursively render the enclosing component"
const SELF_REFERENCE: &str = ":Self";

/// Document-singleton pseudo-elements carrying compiler directives
const META_TAGS: &[&str] = &[":Window", ":Head"];

/// Tag names whose open tag implicitly closes the current parent.
///
/// `parent name -> names that may not be nested inside it`; seeing one of
/// them starts a sibling instead (the HTML tag-omission rules).
static DISALLOWED_CONTENTS: LazyLock<FxHashMap<&'static str, FxHashSet<&'static str>>> =
    LazyLock::new(|| {
        let mut m = FxHashMap::default();
        m.insert("li", set(&["li"]));
        m.insert("dt", set(&["dt", "dd"]));
        m.insert("dd", set(&["dt", "dd"]));
        m.insert(
            "p",
            set(&[
                "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer",
                "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "main",
                "menu", "nav", "ol", "p", "pre", "section", "table", "ul",
            ]),
        );
        m.insert("rt", set(&["rt", "rp"]));
        m.insert("rp", set(&["rt", "rp"]));
        m.insert("optgroup", set(&["optgroup"]));
        m.insert("option", set(&["option", "optgroup"]));
        m.insert("thead", set(&["tbody", "tfoot"]));
        m.insert("tbody", set(&["tbody", "tfoot"]));
        m.insert("tfoot", set(&["tbody"]));
        m.insert("tr", set(&["tr", "tbody"]));
        m.insert("td", set(&["td", "th", "tr"]));
        m.insert("th", set(&["td", "th", "tr"]));
        m
    });

fn set(names: &[&'static str]) -> FxHashSet<&'static str> {
    names.iter().copied().collect()
}

/// Check if an element can never have children or a closing tag
fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input"
        | "link" | "meta" | "param" | "source" | "track" | "wbr"
    )
}

/// Parse one tag, starting at `<`
pub(crate) fn tag(parser: &mut Parser) -> ParseResult<()> {
    let start = parser.index;
    parser.eat("<");

    if parser.eat("!--") {
        let data = parser.read_until("-->").to_string();
        parser.require("-->")?;

        let node = parser.tree.create_comment(data, start, parser.index);
        parser.append(node);
        return Ok(());
    }

    let is_closing_tag = parser.eat("/");
    let name = read_tag_name(parser)?;

    if let Some(&meta) = META_TAGS.iter().find(|m| **m == name) {
        if is_closing_tag {
            // the open meta element must still be empty
            if let Some(&child) = parser.tree.get(parser.current()).and_then(|n| n.children.first())
            {
                let offset = parser.tree.get(child).map(|n| n.start).unwrap_or(start);
                return Err(ParseError::new(
                    ParseErrorKind::MetaTagWithChildren(name),
                    offset,
                ));
            }
        } else {
            if parser.meta_tags.contains(meta) {
                return Err(ParseError::new(ParseErrorKind::DuplicateMetaTag(name), start));
            }
            if parser.stack.len() > 1 {
                return Err(ParseError::new(ParseErrorKind::MetaTagNested(name), start));
            }
            parser.meta_tags.insert(meta);
        }
    }

    if is_closing_tag {
        return close_tag(parser, &name, start);
    }

    // tag omission: `<li>` after an open `<li>` starts a sibling
    let parent = parser.current();
    if let Some(disallowed) = parser
        .tree
        .get(parent)
        .and_then(|n| n.name())
        .and_then(|parent_name| DISALLOWED_CONTENTS.get(parent_name))
    {
        if disallowed.contains(name.as_str()) {
            parser.tree.strip_whitespace(parent);
            parser.tree.close(parent, start);
            parser.stack.pop();
        }
    }

    let mut attributes: SmallVec<[Attribute; 4]> = SmallVec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    parser.allow_whitespace();
    while let Some(attribute) = attributes::read_attribute(parser)? {
        let key = attribute.unique_name();
        if !seen.insert(key.clone()) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateAttribute(key),
                attribute.start(),
            ));
        }
        attributes.push(attribute);
        parser.allow_whitespace();
    }

    // top-level script/style bodies are handed to the raw readers verbatim
    if parser.stack.len() == 1 && (name == "script" || name == "style") {
        return raw_block(parser, &name, start, attributes);
    }

    let self_closing = parser.eat("/") || is_void_element(&name);
    parser.require(">")?;

    let element = parser.tree.create_element(name, attributes, start);
    parser.append(element);

    if self_closing {
        parser.tree.close(element, parser.index);
    } else {
        parser.stack.push(element);
    }

    Ok(())
}

/// Handle a closing tag: walk the stack from the top, auto-closing open
/// elements that never got their own closing tag (`<div><p></div>`)
fn close_tag(parser: &mut Parser, name: &str, start: usize) -> ParseResult<()> {
    if is_void_element(name) {
        return Err(ParseError::new(
            ParseErrorKind::VoidElementClosingTag(name.to_string()),
            start,
        ));
    }

    parser.allow_whitespace();
    parser.require(">")?;

    loop {
        let current = parser.current();
        match parser.tree.get(current).map(|n| &n.node_type) {
            Some(NodeType::Element(data)) if data.name == name => break,
            Some(NodeType::Element(_)) => {
                parser.tree.strip_whitespace(current);
                parser.tree.close(current, start);
                parser.stack.pop();
            }
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::UnexpectedClosingTag(name.to_string()),
                    start,
                ));
            }
        }
    }

    let current = parser.current();
    parser.tree.strip_whitespace(current);
    parser.tree.close(current, parser.index);
    parser.stack.pop();

    Ok(())
}

/// Dispatch a top-level `<script>` / `<style>` to its raw-content reader
fn raw_block(
    parser: &mut Parser,
    name: &str,
    start: usize,
    attributes: SmallVec<[Attribute; 4]>,
) -> ParseResult<()> {
    let first = match name {
        "script" => parser.script.as_ref().map(|block| block.start),
        _ => parser.style.as_ref().map(|block| block.start),
    };
    if let Some(first) = first {
        return Err(ParseError::new(
            ParseErrorKind::DuplicateBlock {
                kind: name.to_string(),
                first,
            },
            start,
        ));
    }

    parser.require(">")?;

    if name == "script" {
        parser.script = Some(raw::read_script(parser, start, attributes)?);
    } else {
        parser.style = Some(raw::read_style(parser, start, attributes)?);
    }

    Ok(())
}

/// Read and validate a tag name.
///
/// The self-reference sentinel is only legal inside an if- or each-block
/// (anywhere else it would recurse forever once expanded); meta-tag names
/// pass verbatim; everything else must match the tag-name grammar.
fn read_tag_name(parser: &mut Parser) -> ParseResult<String> {
    let start = parser.index;

    let name = {
        let rest = parser.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        parser.index += len;
        &rest[..len]
    };

    if name == SELF_REFERENCE {
        let legal = parser.stack.iter().rev().any(|&id| {
            matches!(
                parser.tree.get(id).map(|n| &n.node_type),
                Some(NodeType::IfBlock { .. } | NodeType::EachBlock { .. })
            )
        });
        if !legal {
            return Err(ParseError::new(ParseErrorKind::IllegalSelfReference, start));
        }
        return Ok(name.to_string());
    }

    if META_TAGS.contains(&name) {
        return Ok(name.to_string());
    }

    if !valid_tag_name(name) {
        return Err(ParseError::new(ParseErrorKind::InvalidTagName, start));
    }

    Ok(name.to_string())
}

/// Tag name grammar: optional `!`, letters, optionally one namespace colon,
/// then alphanumerics and hyphens
fn valid_tag_name(name: &str) -> bool {
    let name = name.strip_prefix('!').unwrap_or(name);

    let letters: usize = name
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.len_utf8())
        .sum();
    if letters == 0 {
        return false;
    }

    let rest = &name[letters..];
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Template;
    use nisaba_ast::Queryable;

    fn parse(source: &str) -> Template {
        Parser::new(source).parse().unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        Parser::new(source).parse().unwrap_err()
    }

    #[test]
    fn test_valid_tag_names() {
        assert!(valid_tag_name("div"));
        assert!(valid_tag_name("h1"));
        assert!(valid_tag_name("my-element"));
        assert!(valid_tag_name("svg:path"));
        assert!(valid_tag_name("!doctype"));
        assert!(!valid_tag_name(""));
        assert!(!valid_tag_name("1abc"));
        assert!(!valid_tag_name("@foo"));
        assert!(!valid_tag_name(":lowercase"));
    }

    #[test]
    fn test_invalid_tag_name_errors() {
        let error = parse_err("<@foo>bar</@foo>");
        assert_eq!(error.kind, ParseErrorKind::InvalidTagName);
        assert_eq!(error.offset, 1);
    }

    #[test]
    fn test_comment() {
        let template = parse("<div><!-- note --></div>");
        let div = template.tree.elements_by_name("div")[0];
        let children = template.tree.children(div);
        assert_eq!(children.len(), 1);

        match &template.tree.get(children[0]).unwrap().node_type {
            NodeType::Comment(data) => assert_eq!(data, " note "),
            other => panic!("expected comment, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_comment_errors() {
        let error = parse_err("<!-- never closed");
        assert_eq!(error.kind, ParseErrorKind::ExpectedToken("-->".to_string()));
    }

    #[test]
    fn test_void_elements_not_pushed() {
        let template = parse("<div><br><hr><img src=x></div>");

        let div = template.tree.elements_by_name("div")[0];
        assert_eq!(template.tree.children(div).len(), 3);

        for name in ["br", "hr", "img"] {
            let id = template.tree.elements_by_name(name)[0];
            let node = template.tree.get(id).unwrap();
            assert!(node.children.is_empty());
            assert!(node.end.is_some());
        }
    }

    #[test]
    fn test_void_element_closing_tag_errors() {
        let error = parse_err("<div><br></br></div>");
        assert_eq!(
            error.kind,
            ParseErrorKind::VoidElementClosingTag("br".to_string())
        );
    }

    #[test]
    fn test_self_closing_element() {
        let template = parse("<div/>");
        let div = template.tree.elements_by_name("div")[0];
        let node = template.tree.get(div).unwrap();
        assert!(node.children.is_empty());
        assert_eq!(node.end, Some(6));
    }

    #[test]
    fn test_implicit_close_on_closing_tag() {
        // </div> closes the dangling <p> first
        let template = parse("<div><p>hi</div>");

        let div = template.tree.elements_by_name("div")[0];
        let p = template.tree.elements_by_name("p")[0];

        assert_eq!(template.tree.children(div), vec![p]);
        assert_eq!(template.tree.text_content(p), "hi");
        // <p> ends where </div> begins
        assert_eq!(template.tree.get(p).unwrap().end, Some(10));
    }

    #[test]
    fn test_tag_omission_li() {
        let template = parse("<ul><li>one<li>two</ul>");

        let ul = template.tree.elements_by_name("ul")[0];
        let lis = template.tree.elements_by_name("li");
        assert_eq!(lis.len(), 2);
        assert_eq!(template.tree.children(ul), lis);
        assert_eq!(template.tree.text_content(lis[0]), "one");
        assert_eq!(template.tree.text_content(lis[1]), "two");
    }

    #[test]
    fn test_tag_omission_table_sections() {
        let template = parse("<table><thead><tr><th>h</th></tr><tbody><tr><td>c</td></tr></tbody></table>");

        assert_eq!(template.tree.elements_by_name("thead").len(), 1);
        assert_eq!(template.tree.elements_by_name("tbody").len(), 1);

        let table = template.tree.elements_by_name("table")[0];
        assert_eq!(template.tree.children(table).len(), 2);
    }

    #[test]
    fn test_closing_unopened_element_errors() {
        let error = parse_err("<div></span></div>");
        assert_eq!(
            error.kind,
            ParseErrorKind::UnexpectedClosingTag("span".to_string())
        );
    }

    #[test]
    fn test_closing_at_top_level_errors() {
        let error = parse_err("</div>");
        assert_eq!(
            error.kind,
            ParseErrorKind::UnexpectedClosingTag("div".to_string())
        );
    }

    #[test]
    fn test_duplicate_attribute_errors() {
        let error = parse_err(r#"<div class="a" class="b"></div>"#);
        assert_eq!(
            error.kind,
            ParseErrorKind::DuplicateAttribute("class".to_string())
        );
        assert_eq!(error.offset, 15);
    }

    #[test]
    fn test_directive_and_plain_names_do_not_collide() {
        let template = parse(r#"<input value="a" bind:value="b">"#);
        let input = template.tree.elements_by_name("input")[0];
        let element = template.tree.get(input).unwrap().as_element().unwrap();
        assert_eq!(element.attributes.len(), 2);
    }

    #[test]
    fn test_meta_tag_top_level() {
        let template = parse("<:Window on:keydown=\"handle(event)\"/>");
        let windows = template.tree.elements_by_name(":Window");
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn test_duplicate_meta_tag_errors() {
        let error = parse_err("<:Window/><:Window/>");
        assert_eq!(
            error.kind,
            ParseErrorKind::DuplicateMetaTag(":Window".to_string())
        );
        assert_eq!(error.offset, 10);
    }

    #[test]
    fn test_nested_meta_tag_errors() {
        let error = parse_err("<div><:Window/></div>");
        assert_eq!(
            error.kind,
            ParseErrorKind::MetaTagNested(":Window".to_string())
        );
    }

    #[test]
    fn test_meta_tag_with_children_errors() {
        let error = parse_err("<:Head><title>x</title></:Head>");
        assert_eq!(
            error.kind,
            ParseErrorKind::MetaTagWithChildren(":Head".to_string())
        );
        assert_eq!(error.offset, 7); // first child's start
    }

    #[test]
    fn test_empty_meta_tag_pair() {
        let template = parse("<:Head></:Head>");
        assert_eq!(template.tree.elements_by_name(":Head").len(), 1);
    }

    #[test]
    fn test_self_reference_requires_block() {
        let error = parse_err("<div><:Self/></div>");
        assert_eq!(error.kind, ParseErrorKind::IllegalSelfReference);

        let template = parse("{{#if nested}}<:Self/>{{/if}}");
        assert_eq!(template.tree.elements_by_name(":Self").len(), 1);
    }

    #[test]
    fn test_component_tags() {
        let template = parse("<Widget answer=\"42\"/>");
        assert_eq!(template.tree.elements_by_name("Widget").len(), 1);
    }

    #[test]
    fn test_missing_gt_errors() {
        let error = parse_err("<div class=\"a\"");
        assert_eq!(error.kind, ParseErrorKind::ExpectedToken(">".to_string()));
    }
}
