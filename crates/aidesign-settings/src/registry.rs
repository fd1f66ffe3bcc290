//! Static mapping from element tags to the category that handles them.

use serde::Serialize;

pub const ROOT_TAG: &str = "Settings";
pub const PIPELINE_TAG: &str = "pipeline";
pub const DATASTRUCTURE_TAG: &str = "datastructure";
pub const RELATIONSHIPS_TAG: &str = "relationships";
pub const PARENT_TAG: &str = "parent";
pub const CHILD_TAG: &str = "child";
pub const PLUGIN_TAG: &str = "plugin";
pub const COORDINATES_TAG: &str = "coordinates";
pub const LOOP_TAG: &str = "loop";

/// Key under which the exit point is stored, whatever its `name` attribute.
pub const EXIT_POINT_KEY: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Declaration,
    Relationships,
    Plugin,
    List,
    EntryPoint,
    ExitPoint,
    Module,
    Loop,
}

const REGISTRY: &[(&str, TagCategory)] = &[
    (PIPELINE_TAG, TagCategory::Declaration),
    (DATASTRUCTURE_TAG, TagCategory::Declaration),
    (RELATIONSHIPS_TAG, TagCategory::Relationships),
    (PLUGIN_TAG, TagCategory::Plugin),
    (COORDINATES_TAG, TagCategory::List),
    ("Initialiser", TagCategory::EntryPoint),
    ("Output", TagCategory::ExitPoint),
    ("UserFeedback", TagCategory::Module),
    ("DataProcessing", TagCategory::Module),
    ("Modelling", TagCategory::Module),
    ("InputData", TagCategory::Module),
    ("DecisionMaking", TagCategory::Module),
    (LOOP_TAG, TagCategory::Loop),
];

impl TagCategory {
    /// Category of a registered tag. Tags are case-sensitive.
    pub fn of(tag: &str) -> Option<Self> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == tag)
            .map(|(_, category)| *category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declaration => "declaration",
            Self::Relationships => "relationships",
            Self::Plugin => "plugin",
            Self::List => "list",
            Self::EntryPoint => "entry_point",
            Self::ExitPoint => "exit_point",
            Self::Module => "module",
            Self::Loop => "loop",
        }
    }
}

/// All registered tags, in registry order.
pub fn valid_tags() -> Vec<&'static str> {
    REGISTRY.iter().map(|(tag, _)| *tag).collect()
}
