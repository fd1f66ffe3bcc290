//! Human-readable XML output with a fixed four-space indent.

use crate::node::{Document, DocumentNode};

const INDENT: &str = "    ";

/// Render the whole document, one element per line.
pub fn to_string_pretty(document: &Document) -> String {
    let mut out = String::new();
    write_node(&mut out, &document.root, 0);
    out.push('\n');
    out
}

/// Render a single subtree at the given depth. The opening tag is not
/// preceded by indentation; callers place it.
pub fn write_node(out: &mut String, node: &DocumentNode, level: usize) {
    let pad = INDENT.repeat(level);
    let inner = INDENT.repeat(level + 1);

    out.push('<');
    out.push_str(&node.tag);
    for (key, value) in &node.attributes {
        out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
    }

    let lines = text_lines(node);
    if node.children.is_empty() && node.text.is_none() {
        out.push_str(" />");
        return;
    }
    out.push('>');

    // Text is reflowed one trimmed line per row, one level deeper than the tag.
    // Interior blank lines are kept as indentation-only rows.
    for line in lines {
        out.push('\n');
        out.push_str(&inner);
        out.push_str(&escape_text(line));
    }
    for child in &node.children {
        out.push('\n');
        out.push_str(&inner);
        write_node(out, child, level + 1);
    }

    out.push('\n');
    out.push_str(&pad);
    out.push_str(&format!("</{}>", node.tag));
}

/// Trimmed text lines without the blank lines that lead or trail the body.
fn text_lines(node: &DocumentNode) -> Vec<&str> {
    let Some(text) = node.text.as_deref() else {
        return Vec::new();
    };
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let Some(first) = lines.iter().position(|l| !l.is_empty()) else {
        return Vec::new();
    };
    let last = lines.iter().rposition(|l| !l.is_empty()).unwrap_or(first);
    lines[first..=last].to_vec()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;").replace('\n', "&#10;")
}
