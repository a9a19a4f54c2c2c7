//! Attribute dispatcher and value reader
//!
//! One attribute token is read and classified by an ordered sequence of
//! prefix rules; plain attribute values interleave literal text with
//! embedded expressions.

use nisaba_ast::{Attribute, AttributeValue, Expression, ValueChunk};

use crate::entities::decode_character_references;
use crate::error::{ParseErrorKind, ParseResult};
use crate::expression;
use crate::parser::Parser;

/// Read one attribute, or return None at the end of the attribute list.
///
/// Classification, first match wins: `on:` event handler, `bind:` binding,
/// `ref:` ref, `:word` shorthand, plain.
pub(crate) fn read_attribute(parser: &mut Parser) -> ParseResult<Option<Attribute>> {
    let start = parser.index;
    let name = read_name(parser);
    if name.is_empty() {
        return Ok(None);
    }
    let name_end = parser.index;

    if let Some(event) = name.strip_prefix("on:") {
        parser.require("=")?;
        let expression = read_directive_value(parser)?;
        return Ok(Some(Attribute::EventHandler {
            event: event.to_string(),
            expression,
            start,
            end: parser.index,
        }));
    }

    if let Some(property) = name.strip_prefix("bind:") {
        let expression = if parser.eat("=") {
            read_directive_value(parser)?
        } else {
            // `bind:value` binds to a variable of the same name
            Expression::identifier(property, start + "bind:".len())
        };
        return Ok(Some(Attribute::Binding {
            property: property.to_string(),
            expression,
            start,
            end: parser.index,
        }));
    }

    if let Some(ref_name) = name.strip_prefix("ref:") {
        if parser.matches("=") {
            return Err(parser.error(ParseErrorKind::RefWithValue));
        }
        return Ok(Some(Attribute::Ref {
            name: ref_name.to_string(),
            start,
            end: parser.index,
        }));
    }

    if let Some(word) = shorthand(name) {
        // `:foo` is sugar for `foo="{{foo}}"`
        let expression = Expression::identifier(word, start + 1);
        let chunk = ValueChunk::MustacheTag {
            expression,
            start: start + 1,
            end: name_end,
        };
        return Ok(Some(Attribute::Plain {
            name: word.to_string(),
            value: AttributeValue::Chunks(vec![chunk]),
            start,
            end: name_end,
        }));
    }

    let value = if parser.eat("=") {
        AttributeValue::Chunks(read_attribute_value(parser)?)
    } else {
        AttributeValue::Present
    };

    Ok(Some(Attribute::Plain {
        name: name.to_string(),
        value,
        start,
        end: parser.index,
    }))
}

/// Read a name token up to whitespace, `=`, `/` or `>`
fn read_name<'a>(parser: &mut Parser<'a>) -> &'a str {
    let start = parser.index;
    while let Some(c) = parser.peek() {
        if c.is_whitespace() || c == '=' || c == '/' || c == '>' {
            break;
        }
        parser.advance();
    }
    &parser.source[start..parser.index]
}

/// Match the `:word` shorthand grammar
fn shorthand(name: &str) -> Option<&str> {
    let word = name.strip_prefix(':')?;
    let valid = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(word)
}

/// Read a directive value: optional quote, expression, matching quote
fn read_directive_value(parser: &mut Parser) -> ParseResult<Expression> {
    let quote = match parser.peek() {
        Some(q @ ('"' | '\'')) => {
            parser.advance();
            Some(q)
        }
        _ => None,
    };
    let expression = expression::read_directive_expression(parser, quote)?;
    if quote.is_some() {
        parser.advance();
    }
    Ok(expression)
}

/// Read a plain attribute value into literal/expression chunks.
///
/// Quoted values terminate at the matching quote; unquoted values at
/// whitespace or any of `"`, `'`, `=`, `<`, `>`, `/`, backtick. Literal
/// chunks get character references decoded.
pub(crate) fn read_attribute_value(parser: &mut Parser) -> ParseResult<Vec<ValueChunk>> {
    let quote = match parser.peek() {
        Some(q @ ('"' | '\'')) => {
            parser.advance();
            Some(q)
        }
        _ => None,
    };

    let mut chunks = Vec::new();
    let mut literal = String::new();
    let mut literal_start = parser.index;

    loop {
        if parser.eof() {
            return Err(parser.error(ParseErrorKind::UnexpectedEof));
        }

        let terminated = match quote {
            Some(q) => parser.peek() == Some(q),
            None => parser.peek().is_some_and(|c| {
                c.is_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '/' | '`')
            }),
        };
        if terminated {
            break;
        }

        if parser.matches("{{") {
            if !literal.is_empty() {
                chunks.push(ValueChunk::Text {
                    data: decode_character_references(&literal),
                    start: literal_start,
                    end: parser.index,
                });
            }
            let tag_start = parser.index;
            parser.eat("{{");
            let expression = expression::read_expression(parser)?;
            parser.require("}}")?;
            chunks.push(ValueChunk::MustacheTag {
                expression,
                start: tag_start,
                end: parser.index,
            });
            literal.clear();
            literal_start = parser.index;
        } else if let Some(c) = parser.advance() {
            literal.push(c);
        }
    }

    if !literal.is_empty() {
        chunks.push(ValueChunk::Text {
            data: decode_character_references(&literal),
            start: literal_start,
            end: parser.index,
        });
    }

    if quote.is_some() {
        parser.advance();
    }

    Ok(chunks)
}
