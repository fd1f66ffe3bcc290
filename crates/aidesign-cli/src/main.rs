//! CLI binary for creating, inspecting, validating and editing aidesign settings files.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use tracing::info;

use aidesign_settings::{
    validate, LoadOptions, LoopSpec, ModuleSpec, PipelineEntry, Settings, Severity,
};
use aidesign_types::{LiteralValue, OptionValue};
use aidesign_xml::literal::{parse_block, parse_literal};

#[derive(Parser)]
#[command(name = "aid", version, about = "Pipeline settings editor and linter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty settings file
    New {
        /// Path of the settings file to create
        path: PathBuf,

        /// Replace the file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Print the loaded pipeline or data structure
    Show {
        /// Path to the settings file
        path: PathBuf,

        /// Show the data structure instead of the pipeline
        #[arg(long)]
        data: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Lint a settings file
    Validate {
        /// Path to the settings file
        path: PathBuf,

        /// Treat unregistered tags as errors
        #[arg(long)]
        strict: bool,
    },

    /// Normalize literal text and re-indent a settings file
    Fmt {
        /// Path to the settings file
        path: PathBuf,

        /// Exit with status 1 if the file is not formatted, without writing
        #[arg(long)]
        check: bool,
    },

    /// Append a module with its plugin
    AddModule {
        /// Path to the settings file
        path: PathBuf,

        /// Module kind, e.g. DataProcessing
        module_type: String,

        /// Unique module name
        name: String,

        /// Plugin type bound to the module
        #[arg(long)]
        plugin: String,

        /// Plugin option as key=value; dotted keys nest (optimizer.lr=[0.01])
        #[arg(short, long = "option")]
        options: Vec<String>,

        /// Parent element name (repeatable)
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Child element name (repeatable)
        #[arg(long = "child")]
        children: Vec<String>,

        /// Name of the element to append under (default: the pipeline root)
        #[arg(long, default_value = "")]
        under: String,

        /// Canvas coordinates literal, e.g. [350,50,0]
        #[arg(long)]
        at: Option<String>,
    },

    /// Append a loop
    AddLoop {
        /// Path to the settings file
        path: PathBuf,

        /// Loop kind, e.g. For or While
        loop_type: String,

        /// Loop condition, stored as written
        condition: String,

        /// Unique loop name
        name: String,

        /// Parent element name (repeatable)
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Child element name (repeatable)
        #[arg(long = "child")]
        children: Vec<String>,

        /// Name of the element to append under (default: the pipeline root)
        #[arg(long, default_value = "")]
        under: String,

        /// Canvas coordinates literal, e.g. [350,50,0]
        #[arg(long)]
        at: Option<String>,
    },

    /// Attach or merge plugin options on an element
    SetPlugin {
        /// Path to the settings file
        path: PathBuf,

        /// Name of the target element
        target: String,

        /// Plugin type
        plugin_type: String,

        /// Plugin option as key=value; dotted keys nest
        #[arg(short, long = "option")]
        options: Vec<String>,

        /// Replace the existing plugin instead of merging options
        #[arg(long)]
        overwrite: bool,
    },

    /// Append a data structure field
    AddField {
        /// Path to the settings file
        path: PathBuf,

        /// Field tag
        field_type: String,

        /// Literal value text, e.g. [1,2,3]
        value: String,

        /// Key to store the field under instead of its tag
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove an element and everything under it
    Remove {
        /// Path to the settings file
        path: PathBuf,

        /// Name of the element to remove
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::New { path, force } => cmd_new(&path, force)?,
        Commands::Show { path, data, json } => cmd_show(&path, data, json)?,
        Commands::Validate { path, strict } => {
            if !cmd_validate(&path, strict)? {
                std::process::exit(1);
            }
        }
        Commands::Fmt { path, check } => {
            if !cmd_fmt(&path, check)? {
                std::process::exit(1);
            }
        }
        Commands::AddModule {
            path,
            module_type,
            name,
            plugin,
            options,
            parents,
            children,
            under,
            at,
        } => {
            let spec = ModuleSpec {
                module_type,
                name,
                plugin_type: plugin,
                plugin_options: parse_options(&options)?,
                parents,
                children,
                parent_target: under,
                coordinates: at.as_deref().map(parse_literal).transpose()?,
            };
            edit(&path, |settings| Ok(settings.builder().append_module(&spec)?))?;
        }
        Commands::AddLoop {
            path,
            loop_type,
            condition,
            name,
            parents,
            children,
            under,
            at,
        } => {
            let spec = LoopSpec {
                loop_type,
                condition,
                name,
                parents,
                children,
                parent_target: under,
                coordinates: at.as_deref().map(parse_literal).transpose()?,
            };
            edit(&path, |settings| Ok(settings.builder().append_loop(&spec)?))?;
        }
        Commands::SetPlugin {
            path,
            target,
            plugin_type,
            options,
            overwrite,
        } => {
            let options = parse_options(&options)?;
            edit(&path, |settings| {
                Ok(settings
                    .builder()
                    .append_plugin_to_module(&plugin_type, &options, &target, overwrite)?)
            })?;
        }
        Commands::AddField {
            path,
            field_type,
            value,
            name,
        } => {
            let value = parse_value(&value)?;
            edit(&path, |settings| {
                Ok(settings
                    .builder()
                    .append_data_schema_field(&field_type, &value, name.as_deref())?)
            })?;
        }
        Commands::Remove { path, name } => {
            edit(&path, |settings| {
                let removed = settings.builder().remove_by_name(&name)?;
                println!("Removed <{}> '{}'", removed.tag, name);
                Ok(())
            })?;
        }
    }

    Ok(())
}

fn open(path: &Path) -> anyhow::Result<Settings> {
    Settings::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Open, apply one edit, and save back to the same file.
fn edit<F>(path: &Path, apply: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Settings) -> anyhow::Result<()>,
{
    let mut settings = open(path)?;
    apply(&mut settings)?;
    settings.save()?;
    info!(path = %path.display(), "Saved");
    Ok(())
}

fn cmd_new(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    Settings::new().save_as(path)?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_show(path: &Path, data: bool, json: bool) -> anyhow::Result<()> {
    let loaded = open(path)?.load()?;

    if json {
        let out = if data {
            loaded.data_json()?
        } else {
            loaded.pipeline_json()?
        };
        println!("{out}");
        return Ok(());
    }

    if data {
        println!("Data structure: {} fields", loaded.data.len());
        for (key, value) in &loaded.data {
            println!("  {key} = {value}");
        }
        return Ok(());
    }

    let graph = &loaded.pipeline;
    println!("Entries: {}", graph.walk().len());
    println!("Edges: {}", graph.edges().len());
    if let Some(entry) = graph.entry_point() {
        println!("Entry point: {}", entry.name);
    }
    if let Some(exit) = graph.exit_point() {
        println!("Exit point: {}", exit.name);
    }

    println!("\nPipeline:");
    for entry in graph.entries().values() {
        print_entry(entry, 1);
    }

    if !loaded.unknown_tags.is_empty() {
        println!("\nSkipped tags:");
        for unknown in &loaded.unknown_tags {
            println!("  <{}> in <{}>", unknown.tag, unknown.parent);
        }
    }
    Ok(())
}

fn print_entry(entry: &PipelineEntry, depth: usize) {
    let pad = "  ".repeat(depth);
    let kind = match entry.module_type() {
        Some(module_type) => format!("{} {}", entry.class(), module_type),
        None => entry.class().to_string(),
    };
    let plugin = entry
        .plugin_name()
        .map(|p| format!(" plugin={p}"))
        .unwrap_or_default();
    println!("{pad}{} [{kind}]{plugin}", entry.name);
    if !entry.parents().is_empty() {
        println!("{pad}  parents: {}", entry.parents().join(", "));
    }
    if !entry.children().is_empty() {
        println!("{pad}  children: {}", entry.children().join(", "));
    }
    for child in entry.entries.values() {
        print_entry(child, depth + 1);
    }
}

/// Returns false when any error-severity diagnostic was reported.
fn cmd_validate(path: &Path, strict: bool) -> anyhow::Result<bool> {
    let mut settings = open(path)?;
    let loaded = settings.load_with_options(&LoadOptions { strict_tags: strict })?;
    let diagnostics = validate(&loaded.pipeline);

    if diagnostics.is_empty() {
        println!("Settings are valid");
        return Ok(true);
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
        if let Some(fix) = &diag.fix {
            println!("        fix: {fix}");
        }
    }
    Ok(!has_error)
}

/// Returns false when `check` is set and the file would change.
fn cmd_fmt(path: &Path, check: bool) -> anyhow::Result<bool> {
    let original = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut settings = Settings::from_xml(&original)?.with_path(path);
    settings.load()?;
    let formatted = settings.to_xml_string();

    if formatted == original {
        return Ok(true);
    }
    if check {
        println!("{} is not formatted", path.display());
        return Ok(false);
    }
    settings.save()?;
    println!("Formatted {}", path.display());
    Ok(true)
}

/// Parse literal text the way element text is read: one value per line,
/// bracketed lines evaluated.
fn parse_value(text: &str) -> anyhow::Result<LiteralValue> {
    Ok(parse_block(text)?.collapse())
}

/// Parse `key=value` arguments into plugin options. Dotted keys build
/// nested options.
fn parse_options(args: &[String]) -> anyhow::Result<IndexMap<String, OptionValue>> {
    let mut options = IndexMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("option '{arg}' is not key=value"))?;
        let path: Vec<&str> = key.split('.').collect();
        if path.iter().any(|segment| segment.is_empty()) {
            anyhow::bail!("option '{arg}' has an empty key segment");
        }
        let value = OptionValue::from_literal(parse_value(value)?);
        insert_option(&mut options, &path, value)
            .with_context(|| format!("option '{arg}' conflicts with an earlier option"))?;
    }
    Ok(options)
}

fn insert_option(
    options: &mut IndexMap<String, OptionValue>,
    path: &[&str],
    value: OptionValue,
) -> Option<()> {
    match path {
        [] => None,
        [key] => {
            options.insert((*key).to_string(), value);
            Some(())
        }
        [key, rest @ ..] => {
            let nested = options
                .entry((*key).to_string())
                .or_insert_with(|| OptionValue::Nested(IndexMap::new()));
            match nested {
                OptionValue::Nested(map) => insert_option(map, rest, value),
                _ => None,
            }
        }
    }
}
