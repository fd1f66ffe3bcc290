use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A parsed settings document. The root element owns the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub root: DocumentNode,
}

/// One element of the document tree.
///
/// `text` holds the element's character data. Whitespace between child
/// elements is not kept; it is regenerated by the writer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentNode {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub text: Option<String>,
    pub children: Vec<DocumentNode>,
}

/// Position of a node as child indices from the root. The empty path is the root.
pub type NodePath = Vec<usize>;

impl Document {
    pub fn new(root: DocumentNode) -> Self {
        Self { root }
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&DocumentNode> {
        path.iter()
            .try_fold(&self.root, |node, &idx| node.children.get(idx))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut DocumentNode> {
        path.iter()
            .try_fold(&mut self.root, |node, &idx| node.children.get_mut(idx))
    }

    /// Paths of every descendant of the root (root excluded) matching `pred`,
    /// in document order.
    pub fn find_paths<F>(&self, pred: F) -> Vec<NodePath>
    where
        F: Fn(&DocumentNode) -> bool,
    {
        let mut found = Vec::new();
        let mut path = Vec::new();
        collect_paths(&self.root, &mut path, &pred, &mut found);
        found
    }

    /// Remove and return the node at `path`. The root cannot be removed.
    pub fn remove_at(&mut self, path: &[usize]) -> Option<DocumentNode> {
        let (&last, parent_path) = path.split_last()?;
        let parent = self.node_at_mut(parent_path)?;
        if last < parent.children.len() {
            Some(parent.children.remove(last))
        } else {
            None
        }
    }
}

fn collect_paths<F>(node: &DocumentNode, path: &mut NodePath, pred: &F, found: &mut Vec<NodePath>)
where
    F: Fn(&DocumentNode) -> bool,
{
    for (idx, child) in node.children.iter().enumerate() {
        path.push(idx);
        if pred(child) {
            found.push(path.clone());
        }
        collect_paths(child, path, pred, found);
        path.pop();
    }
}

impl DocumentNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Text with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// First direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&DocumentNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut DocumentNode> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn child_index(&self, tag: &str) -> Option<usize> {
        self.children.iter().position(|c| c.tag == tag)
    }

    /// Direct children with the given tag.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DocumentNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn push_child(&mut self, child: DocumentNode) -> &mut DocumentNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Return the first direct child with `tag`, appending an empty one if absent.
    pub fn child_or_insert(&mut self, tag: &str) -> &mut DocumentNode {
        let idx = match self.child_index(tag) {
            Some(idx) => idx,
            None => {
                self.children.push(DocumentNode::new(tag));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Remove the first direct child with `tag`.
    pub fn remove_child(&mut self, tag: &str) -> Option<DocumentNode> {
        let idx = self.child_index(tag)?;
        Some(self.children.remove(idx))
    }

    /// Pre-order iterator over this node's descendants (self excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a DocumentNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a DocumentNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
