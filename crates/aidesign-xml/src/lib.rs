//! XML document tree for aidesign settings files.
//!
//! Parses the XML subset used by settings files into an ordered, attributed tree
//! ([`Document`], [`DocumentNode`]), evaluates literal text blocks ([`literal`]),
//! and writes the tree back with stable four-space indentation ([`to_string_pretty`]).
//!
//! # Example
//! ```
//! let xml = r#"<Settings><pipeline><Initialiser name="Init"/></pipeline></Settings>"#;
//! let doc = aidesign_xml::parse(xml).unwrap();
//! assert_eq!(doc.root.tag, "Settings");
//! assert_eq!(doc.root.children[0].children[0].attr("name"), Some("Init"));
//! ```

pub mod literal;
pub mod node;
mod parser;
mod writer;

pub use literal::{parse_block, parse_literal, LiteralBlock};
pub use node::{Document, DocumentNode, NodePath};
pub use parser::{is_valid_name, parse};
pub use writer::{to_string_pretty, write_node};
