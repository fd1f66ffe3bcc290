//! Literal text blocks: one value per line, `[...]` lines evaluated as list
//! literals and `(...)` lines as tuples coerced to lists.

use winnow::ascii::{digit0, digit1, multispace0};
use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{any, literal, one_of};
use winnow::{ModalResult, Parser};

use aidesign_types::{LiteralValue, Result, SettingsError};

use crate::parser::error_message;

/// The outcome of parsing a text block.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralBlock {
    values: Vec<LiteralValue>,
    raw_lines: Vec<String>,
}

impl LiteralBlock {
    pub fn values(&self) -> &[LiteralValue] {
        &self.values
    }

    pub fn raw_lines(&self) -> &[String] {
        &self.raw_lines
    }

    /// The compacted, pre-evaluation text: every raw line preceded by a newline.
    /// Writing this back to the element makes re-serialization stable.
    pub fn raw_text(&self) -> String {
        self.raw_lines.iter().map(|l| format!("\n{l}")).collect()
    }

    pub fn into_values(self) -> Vec<LiteralValue> {
        self.values
    }

    /// A single value is returned bare; anything else becomes a list.
    pub fn collapse(mut self) -> LiteralValue {
        if self.values.len() == 1 {
            self.values.remove(0)
        } else {
            LiteralValue::List(self.values)
        }
    }
}

/// Parse a raw text block into ordered values.
///
/// The block is trimmed, spaces, tabs and carriage returns are removed, and
/// the result is split on newlines. Lines without brackets or parentheses
/// stay plain strings.
pub fn parse_block(text: &str) -> Result<LiteralBlock> {
    let compact: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r'))
        .collect();
    let raw_lines: Vec<String> = compact.split('\n').map(str::to_string).collect();
    let values = raw_lines
        .iter()
        .map(|line| parse_line(line))
        .collect::<Result<Vec<_>>>()?;
    Ok(LiteralBlock { values, raw_lines })
}

/// Whether a line is evaluated as a literal rather than kept as a string.
pub fn is_evaluated(line: &str) -> bool {
    (line.contains('[') && line.contains(']')) || (line.contains('(') && line.contains(')'))
}

/// Evaluate one compacted line.
pub fn parse_line(line: &str) -> Result<LiteralValue> {
    if line.contains('[') && line.contains(']') {
        parse_literal(line)
    } else if line.contains('(') && line.contains(')') {
        match parse_literal(line)? {
            LiteralValue::List(items) => Ok(LiteralValue::List(items)),
            other => Err(SettingsError::MalformedLiteral {
                literal: line.to_string(),
                message: format!("expected a tuple, found {other}"),
            }),
        }
    } else {
        Ok(LiteralValue::Str(line.to_string()))
    }
}

/// Render `value` as one text line and check that [`parse_block`] reads the
/// line back to the same value. Unevaluated lines reload as strings, so for
/// them the expected value is the line itself.
///
/// Fails with `InvalidValue` for values that have no line form: strings with
/// line breaks or whitespace, or strings that contain both `(` and `)`.
pub fn encode_line(value: &LiteralValue) -> Result<String> {
    let line = value.to_text_line();
    let invalid = |message: String| SettingsError::InvalidValue {
        value: line.clone(),
        message,
    };
    if line.contains('\n') {
        return Err(invalid("a line break splits it into several values".to_string()));
    }
    let block = parse_block(&line).map_err(|e| invalid(e.to_string()))?;
    let expected = if is_evaluated(&line) {
        value.clone()
    } else {
        LiteralValue::Str(line.clone())
    };
    match block.values() {
        [only] if *only == expected => {}
        _ => return Err(invalid("it does not load back as the same value".to_string())),
    }
    Ok(line)
}

/// Evaluate a complete literal expression. Trailing input is an error.
pub fn parse_literal(text: &str) -> Result<LiteralValue> {
    let mut input = text;
    let value = (ws, literal_value, ws)
        .map(|(_, v, _)| v)
        .parse_next(&mut input)
        .map_err(|e| SettingsError::MalformedLiteral {
            literal: text.to_string(),
            message: error_message(e, "expected literal value"),
        })?;
    if !input.is_empty() {
        return Err(SettingsError::MalformedLiteral {
            literal: text.to_string(),
            message: format!("unexpected trailing input '{input}'"),
        });
    }
    Ok(value)
}

fn make_cut_error(desc: &'static str) -> ErrMode<ContextError<StrContext>> {
    let mut e = ContextError::new();
    e.push(StrContext::Expected(StrContextValue::Description(desc)));
    ErrMode::Cut(e)
}

fn expected(desc: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(desc))
}

fn ws<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    multispace0.parse_next(input)
}

fn literal_value(input: &mut &str) -> ModalResult<LiteralValue> {
    alt((
        list,
        tuple_or_group,
        quoted_string.map(LiteralValue::Str),
        number,
        keyword,
    ))
    .parse_next(input)
}

/// Items up to `close`, with optional trailing comma. Reports whether any
/// comma was seen so `(x)` can be told apart from `(x,)`.
fn sequence_items(input: &mut &str, close: char) -> ModalResult<(Vec<LiteralValue>, bool)> {
    let mut items = Vec::new();
    let mut saw_comma = false;
    loop {
        let _ = ws.parse_next(input)?;
        if opt(close).parse_next(input)?.is_some() {
            return Ok((items, saw_comma));
        }
        let item = cut_err(literal_value)
            .context(expected("literal value"))
            .parse_next(input)?;
        items.push(item);
        let _ = ws.parse_next(input)?;
        if opt(',').parse_next(input)?.is_some() {
            saw_comma = true;
            continue;
        }
        let _ = cut_err(close)
            .context(expected("',' or closing bracket"))
            .parse_next(input)?;
        return Ok((items, saw_comma));
    }
}

fn list(input: &mut &str) -> ModalResult<LiteralValue> {
    let _ = '['.parse_next(input)?;
    let (items, _) = sequence_items(input, ']')?;
    Ok(LiteralValue::List(items))
}

fn tuple_or_group(input: &mut &str) -> ModalResult<LiteralValue> {
    let _ = '('.parse_next(input)?;
    let (mut items, saw_comma) = sequence_items(input, ')')?;
    if !saw_comma && items.len() == 1 {
        return Ok(items.remove(0));
    }
    Ok(LiteralValue::List(items))
}

/// Parse a single- or double-quoted string with escape support.
fn quoted_string(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('\'', '"')).parse_next(input)?;
    let mut s = String::new();
    loop {
        let c = cut_err(any)
            .context(expected("closing quote"))
            .parse_next(input)?;
        match c {
            c if c == quote => break,
            '\\' => {
                let esc = cut_err(any)
                    .context(expected("escaped character"))
                    .parse_next(input)?;
                match esc {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    '\\' => s.push('\\'),
                    '\'' => s.push('\''),
                    '"' => s.push('"'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            other => s.push(other),
        }
    }
    Ok(s)
}

/// Integers and floats; a fraction or exponent makes it a float.
fn number(input: &mut &str) -> ModalResult<LiteralValue> {
    let text: &str = (
        opt(alt(('-', '+'))),
        alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void())),
        opt((one_of(['e', 'E']), opt(alt(('-', '+'))), digit1)),
    )
        .take()
        .parse_next(input)?;
    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(LiteralValue::Float)
    } else {
        text.parse::<i64>().ok().map(LiteralValue::Int)
    };
    parsed.ok_or_else(|| make_cut_error("number in range"))
}

fn keyword(input: &mut &str) -> ModalResult<LiteralValue> {
    alt((
        literal("True").value(LiteralValue::Bool(true)),
        literal("False").value(LiteralValue::Bool(false)),
        literal("None").value(LiteralValue::None),
        literal("true").value(LiteralValue::Bool(true)),
        literal("false").value(LiteralValue::Bool(false)),
        literal("null").value(LiteralValue::None),
    ))
    .parse_next(input)
}
