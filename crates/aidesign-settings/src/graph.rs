use indexmap::IndexMap;
use serde::Serialize;

use aidesign_types::{LiteralValue, OptionValue, Result, SettingsError};

use crate::registry::{COORDINATES_TAG, EXIT_POINT_KEY};

/// Loaded pipeline: top-level entries keyed by name, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PipelineGraph {
    entries: IndexMap<String, PipelineEntry>,
}

/// One module, loop, entry point or exit point.
///
/// Serializes as a flat object: `name`, `class` and the kind's fields, then
/// `plugin`, `parents`/`children`, list values and nested entries by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEntry {
    pub name: String,
    #[serde(flatten)]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<PluginBinding>,
    #[serde(flatten)]
    pub relationships: Option<Relationships>,
    #[serde(flatten)]
    pub lists: IndexMap<String, LiteralValue>,
    #[serde(flatten)]
    pub entries: IndexMap<String, PipelineEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum EntryKind {
    Module { module_type: String },
    EntryPoint,
    ExitPoint,
    /// `loop_kind` is the lower-cased `type` attribute; `condition` is kept raw.
    Loop { loop_kind: String, condition: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginBinding {
    pub plugin_name: String,
    pub options: IndexMap<String, OptionValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relationships {
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

/// A declared parent -> child edge between two entry names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl EntryKind {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Module { .. } => "module",
            Self::EntryPoint => "entry_point",
            Self::ExitPoint => "exit_point",
            Self::Loop { .. } => "loop",
        }
    }
}

impl PipelineEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            plugin: None,
            relationships: None,
            lists: IndexMap::new(),
            entries: IndexMap::new(),
        }
    }

    pub fn class(&self) -> &'static str {
        self.kind.class()
    }

    pub fn module_type(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Module { module_type } => Some(module_type),
            _ => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self.kind, EntryKind::Loop { .. })
    }

    pub fn parents(&self) -> &[String] {
        self.relationships
            .as_ref()
            .map(|r| r.parents.as_slice())
            .unwrap_or_default()
    }

    pub fn children(&self) -> &[String] {
        self.relationships
            .as_ref()
            .map(|r| r.children.as_slice())
            .unwrap_or_default()
    }

    pub fn coordinates(&self) -> Option<&LiteralValue> {
        self.lists.get(COORDINATES_TAG)
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin.as_ref().map(|p| p.plugin_name.as_str())
    }
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut IndexMap<String, PipelineEntry> {
        &mut self.entries
    }

    /// Top-level entries.
    pub fn entries(&self) -> &IndexMap<String, PipelineEntry> {
        &self.entries
    }

    /// Top-level entry by key.
    pub fn get(&self, key: &str) -> Option<&PipelineEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry with its key, depth-first in document order.
    pub fn walk_keyed(&self) -> Vec<(&str, &PipelineEntry)> {
        let mut out = Vec::new();
        collect_entries(&self.entries, &mut out);
        out
    }

    /// Every entry, depth-first in document order.
    pub fn walk(&self) -> Vec<&PipelineEntry> {
        self.walk_keyed().into_iter().map(|(_, e)| e).collect()
    }

    /// First entry, depth-first, whose key or name equals `name`.
    pub fn find(&self, name: &str) -> Option<&PipelineEntry> {
        self.walk_keyed()
            .into_iter()
            .find(|(key, entry)| *key == name || entry.name == name)
            .map(|(_, entry)| entry)
    }

    pub fn resolve(&self, name: &str) -> Result<&PipelineEntry> {
        self.find(name)
            .ok_or_else(|| SettingsError::UnresolvedReference {
                name: name.to_string(),
                referenced_by: None,
            })
    }

    /// Entries named as parents of `name`.
    pub fn parents_of(&self, name: &str) -> Result<Vec<&PipelineEntry>> {
        let entry = self.resolve(name)?;
        self.resolve_all(entry, entry.parents())
    }

    /// Entries named as children of `name`.
    pub fn children_of(&self, name: &str) -> Result<Vec<&PipelineEntry>> {
        let entry = self.resolve(name)?;
        self.resolve_all(entry, entry.children())
    }

    fn resolve_all<'a>(
        &'a self,
        owner: &PipelineEntry,
        names: &[String],
    ) -> Result<Vec<&'a PipelineEntry>> {
        names
            .iter()
            .map(|n| {
                self.find(n).ok_or_else(|| SettingsError::UnresolvedReference {
                    name: n.clone(),
                    referenced_by: Some(owner.name.clone()),
                })
            })
            .collect()
    }

    /// All declared edges, parent to child, without duplicates. An edge may
    /// be declared by either end.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = Vec::new();
        let mut push = |from: &str, to: &str| {
            let edge = Edge {
                from: from.to_string(),
                to: to.to_string(),
            };
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        };
        for entry in self.walk() {
            for parent in entry.parents() {
                push(parent, &entry.name);
            }
            for child in entry.children() {
                push(&entry.name, child);
            }
        }
        edges
    }

    pub fn entry_point(&self) -> Option<&PipelineEntry> {
        self.walk()
            .into_iter()
            .find(|e| e.kind == EntryKind::EntryPoint)
    }

    pub fn exit_point(&self) -> Option<&PipelineEntry> {
        self.walk_keyed()
            .into_iter()
            .find(|(key, e)| *key == EXIT_POINT_KEY && e.kind == EntryKind::ExitPoint)
            .map(|(_, e)| e)
    }
}

fn collect_entries<'a>(
    entries: &'a IndexMap<String, PipelineEntry>,
    out: &mut Vec<(&'a str, &'a PipelineEntry)>,
) {
    for (key, entry) in entries {
        out.push((key.as_str(), entry));
        collect_entries(&entry.entries, out);
    }
}
