//! Formula lexer/grouping splitter and expression parser.
//!
//! A formula body is first split into top-level comma-separated sections
//! ([`split_sections`]), honoring `{}` / `()` / quote grouping. Each section
//! is then lexed into literal runs, grouped subexpressions, and operator
//! tokens, and reduced in two passes: unary operators bind their right-hand
//! neighbor (right-associatively), then binary and comparison operators fold
//! strictly left to right. There is no precedence climbing: `2 + 3 * 1`
//! parses as `(2 + 3) * 1`.
//!
//! Grouping characters are matched by exact type only: a `{` is closed by
//! the next balanced `}` regardless of any unmatched parentheses between
//! them. Mismatches inside the group surface from the inner parse.

use crate::ast::{BinaryOp, CompareOp, Expr, ParseError, Span, UnaryOp};

/// One top-level comma-separated section of a formula body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub text: &'a str,
    /// Byte offset of `text` within the complete formula body, for error
    /// spans.
    pub offset: usize,
}

impl Section<'_> {
    fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.text.len())
    }
}

/// Parse a complete formula body (the text after the `=` sigil) into a
/// single expression.
pub fn parse_formula_body(input: &str) -> Result<Expr, ParseError> {
    let sections = split_sections(input, 0)?;
    match sections.as_slice() {
        [] => Err(ParseError::new("blank input", Span::new(0, input.len()))),
        [section] => parse_section(*section),
        more => Err(ParseError::new(
            format!("expected a single expression, found {} sections", more.len()),
            Span::new(0, input.len()),
        )),
    }
}

/// Split `input` on commas that are not nested inside `{...}`, `(...)`,
/// `"..."`, or `'...'`.
///
/// Sections that are empty or all whitespace (trailing comma, comma directly
/// after a closing group) produce nothing rather than an error. `base` is the
/// byte offset of `input` within the full formula body.
pub fn split_sections(input: &str, base: usize) -> Result<Vec<Section<'_>>, ParseError> {
    let b = input.as_bytes();
    let mut sections = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < b.len() {
        match b[i] {
            b'{' => {
                let end = matching_close(b, i, b'{', b'}').ok_or_else(|| {
                    ParseError::new("group never closes", Span::new(base + i, base + b.len()))
                })?;
                i = end + 1;
            }
            b'(' => {
                let end = matching_close(b, i, b'(', b')').ok_or_else(|| {
                    ParseError::new(
                        "argument list never closes",
                        Span::new(base + i, base + b.len()),
                    )
                })?;
                i = end + 1;
            }
            b'"' | b'\'' => {
                let end = quote_close(b, i).ok_or_else(|| {
                    ParseError::new(
                        "string literal never closes",
                        Span::new(base + i, base + b.len()),
                    )
                })?;
                i = end + 1;
            }
            b',' => {
                push_section(&mut sections, input, start, i, base);
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    push_section(&mut sections, input, start, b.len(), base);
    Ok(sections)
}

fn push_section<'a>(
    sections: &mut Vec<Section<'a>>,
    input: &'a str,
    start: usize,
    end: usize,
    base: usize,
) {
    let text = &input[start..end];
    if !text.trim().is_empty() {
        sections.push(Section {
            text,
            offset: base + start,
        });
    }
}

/// Find the closing delimiter matching `b[open_at]`, counting only the exact
/// open/close byte pair.
fn matching_close(b: &[u8], open_at: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = open_at + 1;
    while i < b.len() {
        if b[i] == open {
            depth += 1;
        } else if b[i] == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Find the quote closing `b[open_at]`, skipping backslash-escaped
/// characters (including escaped backslashes, so `"...\\"` closes).
fn quote_close(b: &[u8], open_at: usize) -> Option<usize> {
    let quote = b[open_at];
    let mut escaped = false;
    let mut i = open_at + 1;
    while i < b.len() {
        if escaped {
            escaped = false;
        } else if b[i] == b'\\' {
            escaped = true;
        } else if b[i] == quote {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Resolve string-literal escapes: `\n` becomes a newline, any other escaped
/// character is copied literally.
fn process_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {
                // Unreachable from the parser: the closing-quote scan treats
                // a trailing backslash as escaping the quote.
                debug_assert!(false, "trailing backslash in string literal");
                out.push('\\');
            }
        }
    }
    out
}

#[derive(Debug)]
enum Item {
    Node(Expr),
    Unary(UnaryOp, Span),
    Binary(BinaryToken, Span),
}

#[derive(Debug, Clone, Copy)]
enum BinaryToken {
    Arith(BinaryOp),
    Compare(CompareOp),
}

#[derive(Debug, Clone, Copy)]
enum OpToken {
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Match an operator token at `b[i]`, longest spelling first.
fn match_operator(b: &[u8], i: usize) -> Option<(usize, OpToken)> {
    let next = b.get(i + 1).copied();
    match b[i] {
        b'=' if next == Some(b'=') => Some((2, OpToken::Eq)),
        b'!' if next == Some(b'=') => Some((2, OpToken::Ne)),
        b'<' if next == Some(b'=') => Some((2, OpToken::Le)),
        b'>' if next == Some(b'=') => Some((2, OpToken::Ge)),
        b'<' => Some((1, OpToken::Lt)),
        b'>' => Some((1, OpToken::Gt)),
        b'+' => Some((1, OpToken::Plus)),
        b'-' => Some((1, OpToken::Minus)),
        b'*' => Some((1, OpToken::Star)),
        b'/' => Some((1, OpToken::Slash)),
        b'!' => Some((1, OpToken::Bang)),
        _ => None,
    }
}

/// `-` is unary negation exactly when no expression node precedes it (start
/// of section, or directly after another operator); otherwise it is binary
/// subtraction. `!` is always logical not.
fn classify_operator(op: OpToken, has_left_operand: bool, span: Span) -> Item {
    match op {
        OpToken::Minus if !has_left_operand => Item::Unary(UnaryOp::Negate, span),
        OpToken::Minus => Item::Binary(BinaryToken::Arith(BinaryOp::Sub), span),
        OpToken::Bang => Item::Unary(UnaryOp::Not, span),
        OpToken::Plus => Item::Binary(BinaryToken::Arith(BinaryOp::Add), span),
        OpToken::Star => Item::Binary(BinaryToken::Arith(BinaryOp::Mul), span),
        OpToken::Slash => Item::Binary(BinaryToken::Arith(BinaryOp::Div), span),
        OpToken::Eq => Item::Binary(BinaryToken::Compare(CompareOp::Eq), span),
        OpToken::Ne => Item::Binary(BinaryToken::Compare(CompareOp::Ne), span),
        OpToken::Lt => Item::Binary(BinaryToken::Compare(CompareOp::Lt), span),
        OpToken::Le => Item::Binary(BinaryToken::Compare(CompareOp::Le), span),
        OpToken::Gt => Item::Binary(BinaryToken::Compare(CompareOp::Gt), span),
        OpToken::Ge => Item::Binary(BinaryToken::Compare(CompareOp::Ge), span),
    }
}

/// Parse one comma-free section into a single expression.
pub fn parse_section(section: Section<'_>) -> Result<Expr, ParseError> {
    let items = lex_section(section)?;
    reduce(items, section)
}

fn lex_section(section: Section<'_>) -> Result<Vec<Item>, ParseError> {
    let src = section.text;
    let base = section.offset;
    let b = src.as_bytes();
    let mut items: Vec<Item> = Vec::new();
    let mut run_start: Option<usize> = None;

    let mut i = 0usize;
    while i < b.len() {
        let c = b[i];
        if c.is_ascii_whitespace() {
            flush_run(&mut items, src, &mut run_start, i, base)?;
            i += 1;
        } else if let Some((len, op)) = match_operator(b, i) {
            flush_run(&mut items, src, &mut run_start, i, base)?;
            let span = Span::new(base + i, base + i + len);
            let has_left_operand = matches!(items.last(), Some(Item::Node(_)));
            items.push(classify_operator(op, has_left_operand, span));
            i += len;
        } else if c == b'{' {
            flush_run(&mut items, src, &mut run_start, i, base)?;
            let end = matching_close(b, i, b'{', b'}').ok_or_else(|| {
                ParseError::new("group never closes", Span::new(base + i, base + b.len()))
            })?;
            let inner = parse_group(&src[i + 1..end], base + i + 1, Span::new(base + i, base + end + 1))?;
            items.push(Item::Node(inner));
            i = end + 1;
        } else if c == b'(' {
            // The pending run, if any, is the function name.
            let name = match run_start.take() {
                Some(start) => src[start..i].to_string(),
                None => String::new(),
            };
            let end = matching_close(b, i, b'(', b')').ok_or_else(|| {
                ParseError::new(
                    "argument list never closes",
                    Span::new(base + i, base + b.len()),
                )
            })?;
            let args = split_sections(&src[i + 1..end], base + i + 1)?
                .into_iter()
                .map(parse_section)
                .collect::<Result<Vec<_>, _>>()?;
            items.push(Item::Node(Expr::Call { name, args }));
            i = end + 1;
        } else if c == b'"' || c == b'\'' {
            flush_run(&mut items, src, &mut run_start, i, base)?;
            let end = quote_close(b, i).ok_or_else(|| {
                ParseError::new(
                    "string literal never closes",
                    Span::new(base + i, base + b.len()),
                )
            })?;
            items.push(Item::Node(Expr::Text(process_escapes(&src[i + 1..end]))));
            i = end + 1;
        } else {
            if run_start.is_none() {
                run_start = Some(i);
            }
            i += 1;
        }
    }
    flush_run(&mut items, src, &mut run_start, b.len(), base)?;
    Ok(items)
}

/// Finish an accumulated literal run: numeric if it parses, otherwise a
/// parse error naming the offending text.
fn flush_run(
    items: &mut Vec<Item>,
    src: &str,
    run_start: &mut Option<usize>,
    end: usize,
    base: usize,
) -> Result<(), ParseError> {
    let Some(start) = run_start.take() else {
        return Ok(());
    };
    let text = &src[start..end];
    match text.parse::<f64>() {
        Ok(n) => {
            items.push(Item::Node(Expr::Number(n)));
            Ok(())
        }
        Err(_) => Err(ParseError::new(
            format!("could not parse literal \"{text}\""),
            Span::new(base + start, base + end),
        )),
    }
}

/// Parse the interior of a `{...}` group, which must hold exactly one
/// expression.
fn parse_group(interior: &str, base: usize, group_span: Span) -> Result<Expr, ParseError> {
    let sections = split_sections(interior, base)?;
    match sections.as_slice() {
        [] => Err(ParseError::new("empty group", group_span)),
        [section] => parse_section(*section),
        more => Err(ParseError::new(
            format!("expected a single expression in group, found {} sections", more.len()),
            group_span,
        )),
    }
}

/// Collapse a lexed item list: unary operators first (right-associative),
/// then one binary/comparison fold, strictly left to right.
fn reduce(mut items: Vec<Item>, section: Section<'_>) -> Result<Expr, ParseError> {
    let mut idx = items.len();
    while idx > 0 {
        idx -= 1;
        let (op, span) = match &items[idx] {
            Item::Unary(op, span) => (*op, *span),
            _ => continue,
        };
        if idx + 1 >= items.len() {
            return Err(ParseError::new("hanging unary operator", span));
        }
        match items.remove(idx + 1) {
            Item::Node(operand) => {
                items[idx] = Item::Node(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                });
            }
            _ => return Err(ParseError::new("hanging unary operator", span)),
        }
    }

    let mut idx = 0usize;
    while idx < items.len() {
        let (tok, span) = match &items[idx] {
            Item::Binary(tok, span) => (*tok, *span),
            _ => {
                idx += 1;
                continue;
            }
        };
        if idx == 0 || idx + 1 >= items.len() {
            return Err(ParseError::new("hanging binary operator", span));
        }
        let right = items.remove(idx + 1);
        let left = items.remove(idx - 1);
        let (Item::Node(left), Item::Node(right)) = (left, right) else {
            return Err(ParseError::new("hanging binary operator", span));
        };
        let node = match tok {
            BinaryToken::Arith(op) => Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            BinaryToken::Compare(op) => Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        };
        // The fold left the operator slot at `idx - 1`; drop the result in
        // and rescan from the same position.
        items[idx - 1] = Item::Node(node);
    }

    match items.len() {
        0 => Err(ParseError::new("blank input", section.span())),
        1 => match items.pop() {
            Some(Item::Node(expr)) => Ok(expr),
            _ => Err(ParseError::new(
                "did not collapse to a single expression",
                section.span(),
            )),
        },
        n => Err(ParseError::new(
            format!("did not collapse to a single expression ({n} nodes left)"),
            section.span(),
        )),
    }
}
