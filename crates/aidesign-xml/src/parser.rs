use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, opt};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{take_till, take_until, take_while};
use winnow::{ModalResult, Parser};

use aidesign_types::SettingsError;

use crate::node::{Document, DocumentNode};

fn make_cut_error(desc: &'static str) -> ErrMode<ContextError<StrContext>> {
    let mut e = ContextError::new();
    e.push(StrContext::Expected(StrContextValue::Description(desc)));
    ErrMode::Cut(e)
}

fn expected(desc: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(desc))
}

/// Whitespace consumer (including newlines).
fn ws<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    multispace0.parse_next(input)
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// Whether `s` can be used as an element or attribute name.
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if is_name_start(c)) && chars.all(is_name_char)
}

/// Parse an element or attribute name.
fn name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (take_while(1, is_name_start), take_while(0.., is_name_char))
        .take()
        .parse_next(input)
}

/// Replace the predefined entities and numeric character references.
pub(crate) fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        let end = rest
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &rest[..end];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => {
                if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok().and_then(char::from_u32)
                } else {
                    None
                }
            }
        };
        let c = decoded.ok_or_else(|| format!("unknown entity '&{entity};'"))?;
        out.push(c);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Parse a single- or double-quoted attribute value.
fn attr_value(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let raw = take_till(0.., quote).parse_next(input)?;
    let _ = cut_err(quote)
        .context(expected("closing quote"))
        .parse_next(input)?;
    decode_entities(raw).map_err(|_| make_cut_error("valid entity reference"))
}

/// Skip `<!-- ... -->`.
fn comment(input: &mut &str) -> ModalResult<()> {
    let _ = "<!--".parse_next(input)?;
    cut_err((take_until(0.., "-->"), "-->"))
        .context(expected("end of comment '-->'"))
        .void()
        .parse_next(input)
}

/// Skip `<? ... ?>`, including the XML declaration.
fn processing_instruction(input: &mut &str) -> ModalResult<()> {
    let _ = "<?".parse_next(input)?;
    cut_err((take_until(0.., "?>"), "?>"))
        .context(expected("end of processing instruction '?>'"))
        .void()
        .parse_next(input)
}

/// Skip `<!DOCTYPE ...>`. Internal subsets are not supported.
fn doctype(input: &mut &str) -> ModalResult<()> {
    let _ = "<!DOCTYPE".parse_next(input)?;
    cut_err((take_till(0.., '>'), '>'))
        .context(expected("end of DOCTYPE '>'"))
        .void()
        .parse_next(input)
}

fn cdata<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    let _ = "<![CDATA[".parse_next(input)?;
    let body = cut_err(take_until(0.., "]]>"))
        .context(expected("end of CDATA section ']]>'"))
        .parse_next(input)?;
    let _ = "]]>".parse_next(input)?;
    Ok(body)
}

/// Whitespace, comments, processing instructions and DOCTYPE around the root.
fn misc(input: &mut &str) -> ModalResult<()> {
    loop {
        let _ = ws.parse_next(input)?;
        if input.starts_with("<!--") {
            comment.parse_next(input)?;
        } else if input.starts_with("<?") {
            processing_instruction.parse_next(input)?;
        } else if input.starts_with("<!DOCTYPE") {
            doctype.parse_next(input)?;
        } else {
            return Ok(());
        }
    }
}

/// Character data before the first child is the element text; blank runs
/// between children are layout and are dropped.
fn push_text(node: &mut DocumentNode, text: &str) {
    if node.children.is_empty() || !text.trim().is_empty() {
        node.text.get_or_insert_with(String::new).push_str(text);
    }
}

/// Parse '<' name attr* ( '/>' | '>' content* '</' name '>' ).
fn element(input: &mut &str) -> ModalResult<DocumentNode> {
    let _ = '<'.parse_next(input)?;
    let tag = name.context(expected("element name")).parse_next(input)?;
    let mut node = DocumentNode::new(tag);

    loop {
        let _ = ws.parse_next(input)?;
        if opt("/>").parse_next(input)?.is_some() {
            return Ok(node);
        }
        if opt('>').parse_next(input)?.is_some() {
            break;
        }
        let key = cut_err(name)
            .context(expected("attribute name, '>' or '/>'"))
            .parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let _ = cut_err('=')
            .context(expected("'=' after attribute name"))
            .parse_next(input)?;
        let _ = ws.parse_next(input)?;
        let value = cut_err(attr_value)
            .context(expected("quoted attribute value"))
            .parse_next(input)?;
        if node.attributes.insert(key.to_string(), value).is_some() {
            return Err(make_cut_error("unique attribute names"));
        }
    }

    loop {
        let raw = take_till(0.., '<').parse_next(input)?;
        if !raw.is_empty() {
            let text = decode_entities(raw).map_err(|_| make_cut_error("valid entity reference"))?;
            push_text(&mut node, &text);
        }

        if input.is_empty() {
            return Err(make_cut_error("closing tag"));
        } else if input.starts_with("</") {
            let _ = "</".parse_next(input)?;
            let close = cut_err(name)
                .context(expected("closing tag name"))
                .parse_next(input)?;
            if close != node.tag {
                return Err(make_cut_error("closing tag matching the open element"));
            }
            let _ = ws.parse_next(input)?;
            let _ = cut_err('>')
                .context(expected("'>' after closing tag name"))
                .parse_next(input)?;
            return Ok(node);
        } else if input.starts_with("<!--") {
            comment.parse_next(input)?;
        } else if input.starts_with("<![CDATA[") {
            let body = cdata.parse_next(input)?;
            push_text(&mut node, body);
        } else if input.starts_with("<?") {
            processing_instruction.parse_next(input)?;
        } else {
            let child = element.parse_next(input)?;
            if node.children.is_empty()
                && node.text.as_deref().is_some_and(|t| t.trim().is_empty())
            {
                node.text = None;
            }
            node.children.push(child);
        }
    }
}

/// Top-level parser: misc* element misc*.
fn document(input: &mut &str) -> ModalResult<Document> {
    misc.parse_next(input)?;
    let root = element
        .context(expected("root element"))
        .parse_next(input)?;
    misc.parse_next(input)?;
    if !input.is_empty() {
        return Err(make_cut_error("end of document after the root element"));
    }
    Ok(Document::new(root))
}

/// Compute (line, col) from a byte offset into the parsed text.
fn offset_to_line_col(source: &str, consumed: usize) -> (usize, usize) {
    let prefix = &source[..consumed.min(source.len())];
    let line = prefix.matches('\n').count() + 1;
    let col = match prefix.rfind('\n') {
        Some(pos) => consumed - pos,
        None => consumed + 1,
    };
    (line, col)
}

/// Human-readable text for a parser failure; `fallback` when the error
/// carries no context.
pub(crate) fn error_message(error: ErrMode<ContextError>, fallback: &str) -> String {
    let message = match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e.to_string(),
        ErrMode::Incomplete(_) => String::new(),
    };
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Public entry point.
pub fn parse(input: &str) -> std::result::Result<Document, SettingsError> {
    let source = input.strip_prefix('\u{feff}').unwrap_or(input).replace("\r\n", "\n");
    let mut remaining = source.as_str();

    document.parse_next(&mut remaining).map_err(|e| {
        let (line, col) = offset_to_line_col(&source, source.len() - remaining.len());
        let message = error_message(e, "unexpected input");

        // Extract a source snippet around the error location
        let snippet = remaining.chars().take(40).collect::<String>();
        let source_snippet = if snippet.is_empty() {
            None
        } else {
            Some(snippet)
        };

        SettingsError::ParseError {
            line,
            col,
            message,
            source_snippet,
        }
    })
}
