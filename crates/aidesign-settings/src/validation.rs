//! Pipeline validation: lint rules and diagnostics.
//!
//! Provides six built-in rules that check the structural consistency of a
//! loaded [`PipelineGraph`]. Call [`validate`] for advisory diagnostics or
//! [`validate_or_raise`] to fail when any `Error`-severity issue is found.

use serde::Serialize;

use crate::graph::{EntryKind, PipelineEntry, PipelineGraph};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub entry: Option<String>,
    pub edge: Option<(String, String)>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic>;
}

fn names(entries: &[&PipelineEntry]) -> String {
    entries
        .iter()
        .map(|e| e.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct EntryPointRule;
impl LintRule for EntryPointRule {
    fn name(&self) -> &str { "entry_point" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let entry_points: Vec<_> = graph
            .walk()
            .into_iter()
            .filter(|e| e.kind == EntryKind::EntryPoint)
            .collect();
        if entry_points.is_empty() {
            vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: "Pipeline has no entry point (Initialiser)".into(),
                entry: None,
                edge: None,
                fix: Some("Add an <Initialiser name=\"...\"> element to the pipeline".into()),
            }]
        } else if entry_points.len() > 1 {
            vec![Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!(
                    "Pipeline has {} entry points: {}; expected exactly one",
                    entry_points.len(),
                    names(&entry_points)
                ),
                entry: None,
                edge: None,
                fix: Some("Remove extra Initialiser elements so only one remains".into()),
            }]
        } else {
            vec![]
        }
    }
}

struct ExitPointRule;
impl LintRule for ExitPointRule {
    fn name(&self) -> &str { "exit_point" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        if graph.exit_point().is_some() {
            return vec![];
        }
        vec![Diagnostic {
            rule: self.name().into(),
            severity: Severity::Warning,
            message: "Pipeline has no exit point (Output)".into(),
            entry: None,
            edge: None,
            fix: Some("Add an <Output> element to the pipeline".into()),
        }]
    }
}

struct DanglingReferenceRule;
impl LintRule for DanglingReferenceRule {
    fn name(&self) -> &str { "dangling_reference" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for entry in graph.walk() {
            let declared = entry
                .parents()
                .iter()
                .map(|p| ("parent", p, (p.clone(), entry.name.clone())))
                .chain(
                    entry
                        .children()
                        .iter()
                        .map(|c| ("child", c, (entry.name.clone(), c.clone()))),
                );
            for (role, name, edge) in declared {
                if graph.find(name).is_none() {
                    diags.push(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Error,
                        message: format!(
                            "'{}' declares {role} '{name}' which does not exist",
                            entry.name
                        ),
                        entry: Some(entry.name.clone()),
                        edge: Some(edge),
                        fix: Some(format!("Add an element named '{name}' or remove the edge")),
                    });
                }
            }
        }
        diags
    }
}

struct PluginBindingRule;
impl LintRule for PluginBindingRule {
    fn name(&self) -> &str { "plugin_binding" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        graph
            .walk()
            .into_iter()
            .filter(|e| matches!(e.kind, EntryKind::Module { .. }) && e.plugin.is_none())
            .map(|e| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!(
                    "Module '{}' ({}) has no plugin",
                    e.name,
                    e.module_type().unwrap_or_default()
                ),
                entry: Some(e.name.clone()),
                edge: None,
                fix: Some("Attach a <plugin type=\"...\"> element".into()),
            })
            .collect()
    }
}

struct LoopConditionRule;
impl LintRule for LoopConditionRule {
    fn name(&self) -> &str { "loop_condition" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        graph
            .walk()
            .into_iter()
            .filter(|e| matches!(&e.kind, EntryKind::Loop { condition, .. } if condition.trim().is_empty()))
            .map(|e| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("Loop '{}' has an empty condition", e.name),
                entry: Some(e.name.clone()),
                edge: None,
                fix: None,
            })
            .collect()
    }
}

struct EdgeSymmetryRule;
impl LintRule for EdgeSymmetryRule {
    fn name(&self) -> &str { "edge_symmetry" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for entry in graph.walk() {
            for child_name in entry.children() {
                let Some(child) = graph.find(child_name) else {
                    continue;
                };
                if child.relationships.is_some() && !child.parents().contains(&entry.name) {
                    diags.push(Diagnostic {
                        rule: self.name().into(),
                        severity: Severity::Info,
                        message: format!(
                            "'{}' lists '{}' as a child, but '{}' does not list it as a parent",
                            entry.name, child.name, child.name
                        ),
                        entry: Some(child.name.clone()),
                        edge: Some((entry.name.clone(), child.name.clone())),
                        fix: Some(format!(
                            "Add <parent name=\"{}\"/> to the relationships of '{}'",
                            entry.name, child.name
                        )),
                    });
                }
            }
        }
        diags
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn default_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(EntryPointRule),
        Box::new(ExitPointRule),
        Box::new(DanglingReferenceRule),
        Box::new(PluginBindingRule),
        Box::new(LoopConditionRule),
        Box::new(EdgeSymmetryRule),
    ]
}

pub fn validate(graph: &PipelineGraph) -> Vec<Diagnostic> {
    validate_with(graph, &default_rules())
}

pub fn validate_with(graph: &PipelineGraph, rules: &[Box<dyn LintRule>]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for rule in rules {
        diagnostics.extend(rule.apply(graph));
    }
    diagnostics
}

pub fn validate_or_raise(graph: &PipelineGraph) -> aidesign_types::Result<Vec<Diagnostic>> {
    let diagnostics = validate(graph);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    if !errors.is_empty() {
        let messages: Vec<_> = errors.iter().map(|d| d.message.clone()).collect();
        return Err(aidesign_types::SettingsError::Validation(
            messages.join("; "),
        ));
    }
    Ok(diagnostics)
}
