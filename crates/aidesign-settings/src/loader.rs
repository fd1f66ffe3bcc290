//! Materializes a settings document into a [`PipelineGraph`] and [`DataSchema`].
//!
//! Children of `pipeline` are dispatched by [`TagCategory`]. Each entry
//! category appends a [`PipelineEntry`] into the current container and then
//! visits its own children with that entry as the container. Literal text is
//! evaluated and written back in normalized form, so loading mutates the
//! document.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use aidesign_types::{LiteralValue, OptionValue, Result, SettingsError};
use aidesign_xml::literal;
use aidesign_xml::{Document, DocumentNode};

use crate::graph::{EntryKind, PipelineEntry, PipelineGraph, PluginBinding, Relationships};
use crate::registry::{
    valid_tags, TagCategory, CHILD_TAG, DATASTRUCTURE_TAG, EXIT_POINT_KEY, PARENT_TAG,
    PIPELINE_TAG,
};

/// Flat field name -> value mapping loaded from `datastructure`.
pub type DataSchema = IndexMap<String, LiteralValue>;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fail on the first unregistered tag instead of skipping it.
    pub strict_tags: bool,
}

/// An unregistered tag skipped during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownTag {
    pub tag: String,
    pub parent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadedSettings {
    pub pipeline: PipelineGraph,
    pub data: DataSchema,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_tags: Vec<UnknownTag>,
}

impl LoadedSettings {
    pub fn pipeline_json(&self) -> Result<String> {
        to_json(&self.pipeline)
    }

    pub fn data_json(&self) -> Result<String> {
        to_json(&self.data)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Load with default options: unknown tags are logged and skipped.
pub fn load(document: &mut Document) -> Result<LoadedSettings> {
    load_with_options(document, &LoadOptions::default())
}

pub fn load_with_options(document: &mut Document, options: &LoadOptions) -> Result<LoadedSettings> {
    let mut loader = Loader {
        options,
        unknown_tags: Vec::new(),
    };

    let mut pipeline = PipelineGraph::new();
    match document.root.child_mut(PIPELINE_TAG) {
        Some(tree) => loader.load_children(tree, &mut pipeline)?,
        None => warn!(root = %document.root.tag, "Settings document has no <pipeline> element"),
    }

    let data = match document.root.child_mut(DATASTRUCTURE_TAG) {
        Some(tree) => load_data_structure(tree)?,
        None => {
            warn!(root = %document.root.tag, "Settings document has no <datastructure> element");
            DataSchema::new()
        }
    };

    debug!(
        entries = pipeline.walk().len(),
        fields = data.len(),
        unknown = loader.unknown_tags.len(),
        "Loaded settings"
    );
    Ok(LoadedSettings {
        pipeline,
        data,
        unknown_tags: loader.unknown_tags,
    })
}

/// Anything that can receive loaded entries and their attached data.
pub(crate) trait EntryContainer {
    fn label(&self) -> &str;
    fn entries_mut(&mut self) -> &mut IndexMap<String, PipelineEntry>;
    fn set_plugin(&mut self, plugin: PluginBinding);
    fn set_relationships(&mut self, relationships: Relationships);
    fn insert_list(&mut self, key: String, value: LiteralValue);
}

impl EntryContainer for PipelineGraph {
    fn label(&self) -> &str {
        PIPELINE_TAG
    }

    fn entries_mut(&mut self) -> &mut IndexMap<String, PipelineEntry> {
        PipelineGraph::entries_mut(self)
    }

    fn set_plugin(&mut self, plugin: PluginBinding) {
        warn!(plugin = %plugin.plugin_name, "Plugin directly under <pipeline> has no owner; skipping");
    }

    fn set_relationships(&mut self, _relationships: Relationships) {
        warn!("Relationships directly under <pipeline> have no owner; skipping");
    }

    fn insert_list(&mut self, key: String, _value: LiteralValue) {
        warn!(tag = %key, "List directly under <pipeline> has no owner; skipping");
    }
}

impl EntryContainer for PipelineEntry {
    fn label(&self) -> &str {
        &self.name
    }

    fn entries_mut(&mut self) -> &mut IndexMap<String, PipelineEntry> {
        &mut self.entries
    }

    fn set_plugin(&mut self, plugin: PluginBinding) {
        if let Some(previous) = self.plugin.replace(plugin) {
            warn!(entry = %self.name, replaced = %previous.plugin_name, "Entry declares more than one plugin; keeping the last");
        }
    }

    fn set_relationships(&mut self, relationships: Relationships) {
        self.relationships = Some(relationships);
    }

    fn insert_list(&mut self, key: String, value: LiteralValue) {
        self.lists.insert(key, value);
    }
}

struct Loader<'o> {
    options: &'o LoadOptions,
    unknown_tags: Vec<UnknownTag>,
}

impl Loader<'_> {
    fn load_children(
        &mut self,
        element: &mut DocumentNode,
        container: &mut dyn EntryContainer,
    ) -> Result<()> {
        for child in &mut element.children {
            let Some(category) = TagCategory::of(&child.tag) else {
                self.report_unknown(&child.tag, &element.tag)?;
                continue;
            };
            match category {
                TagCategory::Module => self.load_module(child, container)?,
                TagCategory::EntryPoint => self.load_entry_point(child, container)?,
                TagCategory::ExitPoint => self.load_exit_point(child, container)?,
                TagCategory::Loop => self.load_loop(child, container)?,
                TagCategory::Plugin => load_plugin(child, container)?,
                TagCategory::Relationships => load_relationships(child, container)?,
                TagCategory::List => load_list(child, container)?,
                TagCategory::Declaration => warn!(
                    tag = %child.tag,
                    parent = %element.tag,
                    "Declaration tag is only valid directly under the root; skipping"
                ),
            }
        }
        Ok(())
    }

    fn load_module(&mut self, element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
        let name = required_attr(element, "name")?;
        let kind = EntryKind::Module {
            module_type: element.tag.clone(),
        };
        self.load_entry(element, container, name.clone(), name, kind)
    }

    fn load_entry_point(&mut self, element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
        let name = required_attr(element, "name")?;
        self.load_entry(element, container, name.clone(), name, EntryKind::EntryPoint)
    }

    fn load_exit_point(&mut self, element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
        let name = element.attr("name").unwrap_or(EXIT_POINT_KEY).to_string();
        self.load_entry(
            element,
            container,
            EXIT_POINT_KEY.to_string(),
            name,
            EntryKind::ExitPoint,
        )
    }

    fn load_loop(&mut self, element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
        let name = required_attr(element, "name")?;
        let kind = EntryKind::Loop {
            loop_kind: required_attr(element, "type")?.to_lowercase(),
            condition: required_attr(element, "condition")?,
        };
        self.load_entry(element, container, name.clone(), name, kind)
    }

    fn load_entry(
        &mut self,
        element: &mut DocumentNode,
        container: &mut dyn EntryContainer,
        key: String,
        name: String,
        kind: EntryKind,
    ) -> Result<()> {
        let mut entry = PipelineEntry::new(name, kind);
        self.load_children(element, &mut entry)?;

        let owner = container.label().to_string();
        if let Some(previous) = container.entries_mut().insert(key.clone(), entry) {
            warn!(
                key = %key,
                container = %owner,
                replaced = %previous.name,
                "Duplicate entry key; the later element replaces the earlier one"
            );
        }
        Ok(())
    }

    fn report_unknown(&mut self, tag: &str, parent: &str) -> Result<()> {
        let valid = valid_tags();
        warn!(
            tag,
            parent,
            valid_tags = %valid.join(", "),
            "Invalid XML tag; skipping"
        );
        if self.options.strict_tags {
            return Err(SettingsError::UnknownTag {
                tag: tag.to_string(),
                parent: parent.to_string(),
                valid_tags: valid.into_iter().map(String::from).collect(),
            });
        }
        self.unknown_tags.push(UnknownTag {
            tag: tag.to_string(),
            parent: parent.to_string(),
        });
        Ok(())
    }
}

fn required_attr(element: &DocumentNode, attribute: &str) -> Result<String> {
    element
        .attr(attribute)
        .map(str::to_string)
        .ok_or_else(|| SettingsError::MissingAttribute {
            tag: element.tag.clone(),
            attribute: attribute.to_string(),
        })
}

/// Evaluate an element's literal text and write the normalized form back.
/// `None` when the element has no text at all.
fn parse_text(element: &mut DocumentNode) -> Result<Option<LiteralValue>> {
    let Some(text) = element.text.as_deref() else {
        return Ok(None);
    };
    let block = literal::parse_block(text)?;
    element.text = Some(block.raw_text());
    Ok(Some(block.collapse()))
}

fn load_plugin(element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
    let plugin_name = required_attr(element, "type")?;
    let mut options = IndexMap::new();
    for child in &mut element.children {
        if let Some(value) = option_value(child)? {
            options.insert(child.tag.clone(), value);
        }
    }
    container.set_plugin(PluginBinding {
        plugin_name,
        options,
    });
    Ok(())
}

fn option_value(element: &mut DocumentNode) -> Result<Option<OptionValue>> {
    if element.attributes.is_empty() && !element.has_children() {
        return Ok(parse_text(element)?.map(OptionValue::from_literal));
    }

    if let Some(text) = element.trimmed_text() {
        warn!(
            option = %element.tag,
            text,
            "Option has attributes or child elements; its text is ignored"
        );
    }
    let mut nested: IndexMap<String, OptionValue> = element
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), OptionValue::Scalar(LiteralValue::Str(v.clone()))))
        .collect();
    for child in &mut element.children {
        if let Some(value) = option_value(child)? {
            nested.insert(child.tag.clone(), value);
        }
    }
    Ok(Some(OptionValue::Nested(nested)))
}

fn load_relationships(element: &DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
    let mut relationships = Relationships::default();
    for edge in &element.children {
        match edge.tag.as_str() {
            PARENT_TAG => relationships.parents.push(required_attr(edge, "name")?),
            CHILD_TAG => relationships.children.push(required_attr(edge, "name")?),
            other => warn!(
                tag = other,
                owner = %container.label(),
                "Unexpected element inside <relationships>; skipping"
            ),
        }
    }
    container.set_relationships(relationships);
    Ok(())
}

fn load_list(element: &mut DocumentNode, container: &mut dyn EntryContainer) -> Result<()> {
    if let Some(value) = parse_text(element)? {
        container.insert_list(element.tag.clone(), value);
    }
    Ok(())
}

fn load_data_structure(element: &mut DocumentNode) -> Result<DataSchema> {
    let mut data = DataSchema::new();
    for field in &mut element.children {
        let key = field.attr("name").unwrap_or(&field.tag).to_string();
        match parse_text(field)? {
            Some(value) => {
                data.insert(key, value);
            }
            None => debug!(field = %key, "Data structure field has no value; skipping"),
        }
    }
    Ok(data)
}
