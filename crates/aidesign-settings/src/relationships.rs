//! Writing relationship edges onto document elements.
//!
//! Edges live in a single `relationships` child of the owning element as
//! `<parent name=".."/>` and `<child name=".."/>` entries. Names are never
//! checked against the document here; see [`PipelineGraph::resolve`](crate::PipelineGraph::resolve).

use tracing::debug;

use aidesign_xml::DocumentNode;

use crate::registry::{CHILD_TAG, LOOP_TAG, PARENT_TAG, RELATIONSHIPS_TAG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Parent,
    Child,
}

impl Role {
    pub fn tag(self) -> &'static str {
        match self {
            Role::Parent => PARENT_TAG,
            Role::Child => CHILD_TAG,
        }
    }
}

/// Whether `element` already declares an edge with this role and name.
pub fn has_edge(element: &DocumentNode, role: Role, name: &str) -> bool {
    element
        .children_named(RELATIONSHIPS_TAG)
        .flat_map(|block| block.children_named(role.tag()))
        .any(|edge| edge.attr("name") == Some(name))
}

/// Add one edge unless it is already declared. Returns whether it was added.
pub fn add_edge(element: &mut DocumentNode, role: Role, name: &str) -> bool {
    if has_edge(element, role, name) {
        debug!(element = ?element.attr("name"), role = role.tag(), name, "Edge already declared");
        return false;
    }
    element
        .child_or_insert(RELATIONSHIPS_TAG)
        .push_child(DocumentNode::new(role.tag()).with_attr("name", name));
    true
}

/// Append parent edges then child edges, skipping duplicates.
/// Returns the number of edges added.
pub fn add_relationships<P, C>(element: &mut DocumentNode, parents: &[P], children: &[C]) -> usize
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    let mut added = 0;
    for parent in parents {
        if add_edge(element, Role::Parent, parent.as_ref()) {
            added += 1;
        }
    }
    for child in children {
        if add_edge(element, Role::Child, child.as_ref()) {
            added += 1;
        }
    }
    added
}

/// Link a new member to the loop that directly contains it: the loop becomes
/// a parent of the member and the member a child of the loop. Does nothing
/// when `container` is not a loop or either side lacks a name.
pub fn scope_into_loop(container: &mut DocumentNode, member: &mut DocumentNode) -> bool {
    if container.tag != LOOP_TAG {
        return false;
    }
    let (Some(loop_name), Some(member_name)) = (
        container.attr("name").map(str::to_string),
        member.attr("name").map(str::to_string),
    ) else {
        return false;
    };
    add_edge(member, Role::Parent, &loop_name);
    add_edge(container, Role::Child, &member_name);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_names(element: &DocumentNode, role: Role) -> Vec<String> {
        element
            .children_named(RELATIONSHIPS_TAG)
            .flat_map(|b| b.children_named(role.tag()))
            .filter_map(|e| e.attr("name").map(str::to_string))
            .collect()
    }

    #[test]
    fn adds_edges_in_one_block() {
        let mut module = DocumentNode::new("DataProcessing").with_attr("name", "norm1");
        let added = add_relationships(&mut module, &["Init"], &["model", "Output"]);
        assert_eq!(added, 3);
        assert_eq!(module.children_named(RELATIONSHIPS_TAG).count(), 1);
        assert_eq!(edge_names(&module, Role::Parent), vec!["Init"]);
        assert_eq!(edge_names(&module, Role::Child), vec!["model", "Output"]);
    }

    #[test]
    fn duplicate_edges_are_skipped() {
        let mut module = DocumentNode::new("DataProcessing").with_attr("name", "norm1");
        add_relationships(&mut module, &["Init"], &["model"]);
        let added = add_relationships(&mut module, &["Init", "other"], &["model"]);
        assert_eq!(added, 1);
        assert_eq!(edge_names(&module, Role::Parent), vec!["Init", "other"]);
        assert_eq!(edge_names(&module, Role::Child), vec!["model"]);
    }

    #[test]
    fn same_name_in_both_roles_is_allowed() {
        let mut module = DocumentNode::new("DataProcessing").with_attr("name", "x");
        assert_eq!(add_relationships(&mut module, &["y"], &["y"]), 2);
    }

    #[test]
    fn no_block_without_edges() {
        let mut module = DocumentNode::new("DataProcessing");
        let none: [&str; 0] = [];
        assert_eq!(add_relationships(&mut module, &none, &none), 0);
        assert!(module.children.is_empty());
    }

    #[test]
    fn existing_block_from_parsed_document_is_reused() {
        let mut doc = aidesign_xml::parse(
            r#"<Initialiser name="Init"><relationships><child name="a"/></relationships></Initialiser>"#,
        )
        .unwrap();
        add_edge(&mut doc.root, Role::Child, "a");
        add_edge(&mut doc.root, Role::Child, "b");
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(edge_names(&doc.root, Role::Child), vec!["a", "b"]);
    }

    #[test]
    fn loop_scoping_links_both_sides_once() {
        let mut lp = DocumentNode::new("loop")
            .with_attr("type", "For")
            .with_attr("condition", "10")
            .with_attr("name", "loop0");
        let mut member = DocumentNode::new("Modelling").with_attr("name", "model");

        assert!(scope_into_loop(&mut lp, &mut member));
        assert!(scope_into_loop(&mut lp, &mut member));
        assert_eq!(edge_names(&member, Role::Parent), vec!["loop0"]);
        assert_eq!(edge_names(&lp, Role::Child), vec!["model"]);
    }

    #[test]
    fn non_loop_container_is_not_scoped() {
        let mut init = DocumentNode::new("Initialiser").with_attr("name", "Init");
        let mut member = DocumentNode::new("Modelling").with_attr("name", "model");
        assert!(!scope_into_loop(&mut init, &mut member));
        assert!(member.children.is_empty());
    }
}
