//! Programmatic editing of a settings document.
//!
//! [`PipelineBuilder`] borrows a [`Document`] mutably and appends modules,
//! loops, plugin bindings and data schema fields to it. Every operation
//! resolves its target, checks tag names and checks that every value has a
//! text form that loads back unchanged before touching the tree, so a failed
//! call leaves the document as it was.

use indexmap::IndexMap;
use tracing::{debug, warn};

use aidesign_types::{LiteralValue, OptionValue, Result, SettingsError};
use aidesign_xml::literal::encode_line;
use aidesign_xml::{is_valid_name, Document, DocumentNode, NodePath};

use crate::registry::{
    TagCategory, CHILD_TAG, COORDINATES_TAG, DATASTRUCTURE_TAG, LOOP_TAG, PARENT_TAG, PIPELINE_TAG, PLUGIN_TAG,
    ROOT_TAG,
};
use crate::relationships::{add_relationships, scope_into_loop};

/// A fresh document: `Settings` root with empty `pipeline` and `datastructure`.
pub fn new_document() -> Document {
    let mut root = DocumentNode::new(ROOT_TAG);
    root.push_child(DocumentNode::new(PIPELINE_TAG));
    root.push_child(DocumentNode::new(DATASTRUCTURE_TAG));
    Document::new(root)
}

/// Arguments for [`PipelineBuilder::append_module`].
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    /// Element tag; spaces are removed (`"Data Processing"` -> `DataProcessing`).
    pub module_type: String,
    pub name: String,
    pub plugin_type: String,
    pub plugin_options: IndexMap<String, OptionValue>,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    /// Name of the element to append under; empty means the pipeline root.
    pub parent_target: String,
    pub coordinates: Option<LiteralValue>,
}

impl ModuleSpec {
    pub fn new(module_type: impl Into<String>, name: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        Self {
            module_type: module_type.into(),
            name: name.into(),
            plugin_type: plugin_type.into(),
            ..Self::default()
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.plugin_options.insert(key.into(), value.into());
        self
    }

    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parents.push(name.into());
        self
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.children.push(name.into());
        self
    }

    pub fn under(mut self, target: impl Into<String>) -> Self {
        self.parent_target = target.into();
        self
    }

    pub fn at(mut self, coordinates: impl Into<LiteralValue>) -> Self {
        self.coordinates = Some(coordinates.into());
        self
    }
}

/// Arguments for [`PipelineBuilder::append_loop`].
#[derive(Debug, Clone, Default)]
pub struct LoopSpec {
    pub loop_type: String,
    pub condition: String,
    pub name: String,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub parent_target: String,
    pub coordinates: Option<LiteralValue>,
}

impl LoopSpec {
    pub fn new(loop_type: impl Into<String>, condition: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            loop_type: loop_type.into(),
            condition: condition.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parents.push(name.into());
        self
    }

    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.children.push(name.into());
        self
    }

    pub fn under(mut self, target: impl Into<String>) -> Self {
        self.parent_target = target.into();
        self
    }

    pub fn at(mut self, coordinates: impl Into<LiteralValue>) -> Self {
        self.coordinates = Some(coordinates.into());
        self
    }
}

pub struct PipelineBuilder<'d> {
    document: &'d mut Document,
}

impl<'d> PipelineBuilder<'d> {
    pub fn new(document: &'d mut Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &*self.document
    }

    fn pipeline_path(&self) -> Result<NodePath> {
        self.document
            .root
            .child_index(PIPELINE_TAG)
            .map(|idx| vec![idx])
            .ok_or_else(|| SettingsError::NotFound {
                name: PIPELINE_TAG.to_string(),
            })
    }

    /// Path of the single element whose `name` attribute equals `name`.
    /// Relationship edge elements are not candidates. An empty name is the
    /// pipeline root.
    pub fn locate(&self, name: &str) -> Result<NodePath> {
        if name.is_empty() {
            return self.pipeline_path();
        }
        let mut matches = self.document.find_paths(|node| {
            node.attr("name") == Some(name) && node.tag != PARENT_TAG && node.tag != CHILD_TAG
        });
        match matches.len() {
            0 => Err(SettingsError::NotFound {
                name: name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(SettingsError::AmbiguousName {
                name: name.to_string(),
                count,
            }),
        }
    }

    pub fn find_by_name(&self, name: &str) -> Result<&DocumentNode> {
        let path = self.locate(name)?;
        self.document
            .node_at(&path)
            .ok_or_else(|| SettingsError::NotFound {
                name: name.to_string(),
            })
    }

    fn node_mut(&mut self, path: &[usize], name: &str) -> Result<&mut DocumentNode> {
        self.document
            .node_at_mut(path)
            .ok_or_else(|| SettingsError::NotFound {
                name: name.to_string(),
            })
    }

    /// Every element with the given tag, in document order.
    pub fn elements_with_tag(&self, tag: &str) -> Vec<&DocumentNode> {
        self.document
            .root
            .descendants()
            .filter(|node| node.tag == tag)
            .collect()
    }

    /// Attach plugin options to the element named `target`. See [`attach_plugin`].
    pub fn append_plugin_to_module(
        &mut self,
        plugin_type: &str,
        options: &IndexMap<String, OptionValue>,
        target: &str,
        overwrite_existing: bool,
    ) -> Result<()> {
        validate_options(options)?;
        let path = self.locate(target)?;
        let node = self.node_mut(&path, target)?;
        attach_plugin(node, plugin_type, options, overwrite_existing)?;
        debug!(element = target, plugin = plugin_type, options = options.len(), "Attached plugin");
        Ok(())
    }

    pub fn append_module(&mut self, spec: &ModuleSpec) -> Result<()> {
        let tag: String = spec.module_type.chars().filter(|c| *c != ' ').collect();
        check_tag(&tag)?;
        validate_options(&spec.plugin_options)?;
        let target = self.locate(&spec.parent_target)?;
        if TagCategory::of(&tag).is_none() {
            warn!(tag = %tag, name = %spec.name, "Module tag is not registered; loading will skip it");
        }

        let coordinates = spec.coordinates.as_ref().map(coordinates_node).transpose()?;

        let mut module = DocumentNode::new(tag).with_attr("name", spec.name.as_str());
        attach_plugin(&mut module, &spec.plugin_type, &spec.plugin_options, false)?;
        self.insert(
            &target,
            &spec.parent_target,
            module,
            &spec.parents,
            &spec.children,
            coordinates,
        )?;
        debug!(name = %spec.name, module_type = %spec.module_type, parent = %spec.parent_target, "Appended module");
        Ok(())
    }

    pub fn append_loop(&mut self, spec: &LoopSpec) -> Result<()> {
        let target = self.locate(&spec.parent_target)?;
        let coordinates = spec.coordinates.as_ref().map(coordinates_node).transpose()?;
        let lp = DocumentNode::new(LOOP_TAG)
            .with_attr("type", spec.loop_type.as_str())
            .with_attr("condition", spec.condition.as_str())
            .with_attr("name", spec.name.as_str());
        self.insert(
            &target,
            &spec.parent_target,
            lp,
            &spec.parents,
            &spec.children,
            coordinates,
        )?;
        debug!(name = %spec.name, loop_type = %spec.loop_type, parent = %spec.parent_target, "Appended loop");
        Ok(())
    }

    /// Link `element` into its container and append it as the last child.
    /// A loop container comes first among the element's parents.
    fn insert(
        &mut self,
        target: &[usize],
        target_name: &str,
        mut element: DocumentNode,
        parents: &[String],
        children: &[String],
        coordinates: Option<DocumentNode>,
    ) -> Result<()> {
        let container = self.node_mut(target, target_name)?;
        scope_into_loop(container, &mut element);
        add_relationships(&mut element, parents, children);
        if let Some(coordinates) = coordinates {
            element.push_child(coordinates);
        }
        container.children.push(element);
        Ok(())
    }

    /// Add a field to `datastructure`, creating it when absent. The field is
    /// keyed by `field_name` when given, by its tag otherwise.
    pub fn append_data_schema_field(
        &mut self,
        field_type: &str,
        value: &LiteralValue,
        field_name: Option<&str>,
    ) -> Result<()> {
        check_tag(field_type)?;
        let line = encode_line(value)?;
        let mut field = DocumentNode::new(field_type).with_text(format!("\n{line}"));
        if let Some(name) = field_name {
            field.set_attr("name", name);
        }
        self.document
            .root
            .child_or_insert(DATASTRUCTURE_TAG)
            .push_child(field);
        debug!(field_type, name = ?field_name, "Appended data schema field");
        Ok(())
    }

    /// Detach the element named `name` with its subtree.
    pub fn remove_by_name(&mut self, name: &str) -> Result<DocumentNode> {
        if name.is_empty() {
            return Err(SettingsError::NotFound {
                name: name.to_string(),
            });
        }
        let path = self.locate(name)?;
        let removed = self
            .document
            .remove_at(&path)
            .ok_or_else(|| SettingsError::NotFound {
                name: name.to_string(),
            })?;
        debug!(name, tag = %removed.tag, "Removed element");
        Ok(removed)
    }

    /// Set or replace the `coordinates` of the element named `name`. An
    /// existing block keeps its position among the element's children.
    pub fn set_coordinates(&mut self, name: &str, coordinates: &LiteralValue) -> Result<()> {
        let replacement = coordinates_node(coordinates)?;
        let path = self.locate(name)?;
        let node = self.node_mut(&path, name)?;
        match node.child_index(COORDINATES_TAG) {
            Some(idx) => node.children[idx] = replacement,
            None => node.children.push(replacement),
        }
        Ok(())
    }
}

fn check_tag(tag: &str) -> Result<()> {
    if is_valid_name(tag) {
        Ok(())
    } else {
        Err(SettingsError::InvalidTag {
            tag: tag.to_string(),
        })
    }
}

/// Option keys must be element names and option values must load back
/// unchanged. Empty lists, empty list items and empty nested options have no
/// text form that survives a load.
fn validate_options(options: &IndexMap<String, OptionValue>) -> Result<()> {
    for (key, value) in options {
        check_tag(key)?;
        match value {
            OptionValue::Scalar(v) => {
                encode_line(v)?;
            }
            OptionValue::List(items) => {
                if items.is_empty() {
                    return Err(empty_option(key));
                }
                for item in items {
                    check_list_item(key, item)?;
                }
            }
            OptionValue::Nested(nested) => {
                if nested.is_empty() {
                    return Err(empty_option(key));
                }
                validate_options(nested)?;
            }
        }
    }
    Ok(())
}

fn check_list_item(key: &str, value: &LiteralValue) -> Result<()> {
    if encode_line(value)?.is_empty() {
        return Err(empty_option(key));
    }
    Ok(())
}

fn empty_option(key: &str) -> SettingsError {
    SettingsError::InvalidValue {
        value: key.to_string(),
        message: "empty values are lost when the document is loaded".to_string(),
    }
}

fn coordinates_node(value: &LiteralValue) -> Result<DocumentNode> {
    let line = encode_line(value)?;
    Ok(DocumentNode::new(COORDINATES_TAG).with_text(format!("\n{line}")))
}

/// Locate or create the `plugin` child of `target` and write `options` into it.
///
/// With an existing plugin and `overwrite_existing == false` the options are
/// merged: a key that is already present is replaced in place, new keys are
/// appended, and the existing plugin `type` is kept. With
/// `overwrite_existing == true` the old plugin is dropped first.
pub fn attach_plugin(
    target: &mut DocumentNode,
    plugin_type: &str,
    options: &IndexMap<String, OptionValue>,
    overwrite_existing: bool,
) -> Result<()> {
    validate_options(options)?;
    if overwrite_existing && target.remove_child(PLUGIN_TAG).is_some() {
        debug!(element = ?target.attr("name"), "Dropped existing plugin");
    }
    let plugin = match target.child_index(PLUGIN_TAG) {
        Some(idx) => &mut target.children[idx],
        None => target.push_child(DocumentNode::new(PLUGIN_TAG).with_attr("type", plugin_type)),
    };
    write_options(plugin, options);
    Ok(())
}

fn write_options(element: &mut DocumentNode, options: &IndexMap<String, OptionValue>) {
    for (key, value) in options {
        let option = option_node(key, value);
        match element.child_index(key) {
            Some(idx) => element.children[idx] = option,
            None => element.children.push(option),
        }
    }
}

fn option_node(key: &str, value: &OptionValue) -> DocumentNode {
    match value {
        OptionValue::Scalar(v) => DocumentNode::new(key).with_text(format!("\n{}", v.to_text_line())),
        OptionValue::List(items) => DocumentNode::new(key).with_text(
            items
                .iter()
                .map(|item| format!("\n{}", item.to_text_line()))
                .collect::<String>(),
        ),
        OptionValue::Nested(nested) => {
            let mut node = DocumentNode::new(key);
            write_options(&mut node, nested);
            node
        }
    }
}
