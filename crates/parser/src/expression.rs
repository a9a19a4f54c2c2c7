//! Embedded expression reader
//!
//! The parser does not understand the expression language; it scans the raw
//! text of one expression, tracking bracket depth and string literals, and
//! leaves the close marker (`}}`, a quote, ...) for the caller to consume.

use nisaba_ast::Expression;

use crate::error::{ParseErrorKind, ParseResult};
use crate::parser::Parser;

/// Read an expression terminated by `}}` at depth zero
pub(crate) fn read_expression(parser: &mut Parser) -> ParseResult<Expression> {
    let (start, end) = scan(parser, |rest| rest.starts_with("}}"))?;
    build(parser, start, end)
}

/// Read a directive value expression. Quoted values terminate at the opening
/// quote character; unquoted values at whitespace, `/` or `>`.
pub(crate) fn read_directive_expression(
    parser: &mut Parser,
    quote: Option<char>,
) -> ParseResult<Expression> {
    let (start, end) = match quote {
        Some(q) => scan(parser, |rest| rest.starts_with(q))?,
        None => scan(parser, |rest| {
            rest.starts_with(|c: char| c.is_whitespace() || c == '/' || c == '>')
        })?,
    };
    build(parser, start, end)
}

/// Scan the raw span of an expression, stopping when `done` matches outside
/// brackets and strings. The cursor ends up at the terminator.
pub(crate) fn scan(
    parser: &mut Parser,
    done: impl Fn(&str) -> bool,
) -> ParseResult<(usize, usize)> {
    let start = parser.index;
    let mut depth = 0usize;

    loop {
        if parser.eof() {
            return Err(parser.error(ParseErrorKind::UnexpectedEof));
        }

        let rest = parser.rest();
        if depth == 0 && done(rest) {
            break;
        }

        match rest.chars().next() {
            Some('(' | '[' | '{') => {
                depth += 1;
                parser.advance();
            }
            Some(')' | ']' | '}') => {
                depth = depth.saturating_sub(1);
                parser.advance();
            }
            Some(q @ ('\'' | '"' | '`')) => skip_string(parser, q)?,
            _ => {
                parser.advance();
            }
        }
    }

    Ok((start, parser.index))
}

/// Consume a string literal, honoring backslash escapes
fn skip_string(parser: &mut Parser, quote: char) -> ParseResult<()> {
    parser.advance();
    loop {
        match parser.advance() {
            Some('\\') => {
                parser.advance();
            }
            Some(c) if c == quote => return Ok(()),
            Some(_) => {}
            None => return Err(parser.error(ParseErrorKind::UnexpectedEof)),
        }
    }
}

fn build(parser: &Parser, start: usize, end: usize) -> ParseResult<Expression> {
    let raw = &parser.source[start..end];
    if raw.trim().is_empty() {
        return Err(crate::error::ParseError::new(
            ParseErrorKind::EmptyExpression,
            start,
        ));
    }
    Ok(Expression::new(raw, start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(source: &str) -> Expression {
        let mut parser = Parser::new(source);
        read_expression(&mut parser).unwrap()
    }

    #[test]
    fn test_simple_identifier() {
        let expr = read("visible}}");
        assert_eq!(expr.raw, "visible");
        assert_eq!((expr.start, expr.end), (0, 7));
        assert!(expr.is_identifier());
    }

    #[test]
    fn test_nested_braces() {
        let expr = read("a ? {x:1} : b}}");
        assert_eq!(expr.raw, "a ? {x:1} : b");
    }

    #[test]
    fn test_close_marker_inside_string() {
        let expr = read(r#"fmt("}}")}}"#);
        assert_eq!(expr.raw, r#"fmt("}}")"#);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let expr = read(r#"say('don\'t')}}"#);
        assert_eq!(expr.raw, r#"say('don\'t')"#);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let expr = read("  a + b  }}");
        assert_eq!(expr.raw, "a + b");
        assert_eq!((expr.start, expr.end), (2, 7));
    }

    #[test]
    fn test_unterminated_expression() {
        let mut parser = Parser::new("a + b");
        let error = read_expression(&mut parser).unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_empty_expression() {
        let mut parser = Parser::new("  }}");
        let error = read_expression(&mut parser).unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::EmptyExpression);
    }
}
