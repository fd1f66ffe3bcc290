//! End-to-end tests for the settings engine.
//!
//! Each test goes through the public surface: parse or build a document ->
//! load the pipeline graph -> serialize -> reparse -> compare.

use aidesign_settings::{
    load, validate_or_raise, EntryKind, LoopSpec, ModuleSpec, PipelineBuilder, Settings,
};
use aidesign_types::{LiteralValue, OptionValue, SettingsError};
use aidesign_xml::{parse, to_string_pretty, Document};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Settings>
    <pipeline>
        <Initialiser name="Init">
            <relationships>
                <child name="load"/>
            </relationships>
            <coordinates>[350, 50, 0]</coordinates>
            <InputData name="load">
                <plugin type="CsvLoader">
                    <path>data/train.csv</path>
                </plugin>
                <relationships>
                    <parent name="Init"/>
                    <child name="loop0"/>
                </relationships>
            </InputData>
        </Initialiser>
        <loop type="For" condition="10" name="loop0">
            <relationships>
                <parent name="load"/>
                <child name="norm1"/>
            </relationships>
            <DataProcessing name="norm1">
                <plugin type="Normalizer">
                    <norm>l2</norm>
                    <class_list>
                        test_1
                        test_2
                    </class_list>
                </plugin>
                <relationships>
                    <parent name="loop0"/>
                    <child name="output"/>
                </relationships>
            </DataProcessing>
        </loop>
        <Output name="output">
            <relationships>
                <parent name="norm1"/>
            </relationships>
        </Output>
    </pipeline>
    <datastructure>
        <replay_buffer>[1,2,3]</replay_buffer>
        <int name="batch_size">
            32
        </int>
    </datastructure>
</Settings>
"#;

/// Parse XML, panicking on failure.
fn document(xml: &str) -> Document {
    parse(xml).expect("settings XML should parse")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn sample_document_loads_into_graph() {
    let mut doc = document(SAMPLE);
    let loaded = load(&mut doc).expect("load should succeed");
    let graph = &loaded.pipeline;

    let keys: Vec<_> = graph.entries().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Init", "loop0", "output"]);

    let init = graph.entry_point().expect("entry point");
    assert_eq!(init.name, "Init");
    assert_eq!(init.coordinates(), Some(&LiteralValue::from(vec![350, 50, 0])));
    assert!(init.entries.contains_key("load"));

    let norm1 = graph.find("norm1").expect("norm1");
    let plugin = norm1.plugin.as_ref().expect("plugin");
    assert_eq!(plugin.plugin_name, "Normalizer");
    assert_eq!(plugin.options["norm"], OptionValue::from("l2"));
    assert_eq!(plugin.options["class_list"], OptionValue::from(vec!["test_1", "test_2"]));

    let parents = graph.parents_of("norm1").expect("parents resolve");
    assert_eq!(parents[0].kind, EntryKind::Loop {
        loop_kind: "for".into(),
        condition: "10".into(),
    });
    assert_eq!(graph.children_of("norm1").unwrap()[0].kind, EntryKind::ExitPoint);

    assert_eq!(loaded.data["replay_buffer"], LiteralValue::from(vec![1, 2, 3]));
    assert_eq!(loaded.data["batch_size"], LiteralValue::from("32"));
    assert!(loaded.unknown_tags.is_empty());

    let diags = validate_or_raise(graph).expect("sample should validate");
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
}

#[test]
fn two_exit_points_keep_the_last() {
    let mut doc = document(
        r#"<Settings><pipeline>
            <Initialiser name="Init"/>
            <Output name="first"/>
            <Output name="second"/>
        </pipeline><datastructure/></Settings>"#,
    );
    let loaded = load(&mut doc).unwrap();
    let exits: Vec<_> = loaded
        .pipeline
        .walk()
        .into_iter()
        .filter(|e| e.kind == EntryKind::ExitPoint)
        .collect();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].name, "second");
    assert_eq!(loaded.pipeline.get("output").unwrap().name, "second");
}

#[test]
fn dangling_relationship_fails_resolution() {
    let mut doc = document(
        r#"<Settings><pipeline>
            <Initialiser name="Init"><relationships><child name="ghost"/></relationships></Initialiser>
        </pipeline></Settings>"#,
    );
    let loaded = load(&mut doc).unwrap();
    let err = loaded.pipeline.children_of("Init").unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(
        err.to_string(),
        "Unresolved reference to 'ghost' (declared by 'Init')"
    );
    assert!(matches!(
        validate_or_raise(&loaded.pipeline),
        Err(SettingsError::Validation(_))
    ));
}

#[test]
fn pipeline_json_mirrors_document_nesting() {
    let mut doc = document(SAMPLE);
    let loaded = load(&mut doc).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&loaded.pipeline_json().unwrap()).unwrap();
    assert_eq!(json["Init"]["class"], "entry_point");
    assert_eq!(json["Init"]["load"]["module_type"], "InputData");
    assert_eq!(json["loop0"]["norm1"]["plugin"]["options"]["class_list"][1], "test_2");
    assert_eq!(json["output"]["parents"][0], "norm1");

    let data: serde_json::Value = serde_json::from_str(&loaded.data_json().unwrap()).unwrap();
    assert_eq!(data["replay_buffer"], serde_json::json!([1, 2, 3]));
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn serialize_reparse_keeps_graph_and_data() {
    let mut first = document(SAMPLE);
    let loaded_first = load(&mut first).unwrap();

    let text = to_string_pretty(&first);
    let mut second = document(&text);
    let loaded_second = load(&mut second).unwrap();

    assert_eq!(loaded_first.pipeline, loaded_second.pipeline);
    assert_eq!(loaded_first.data, loaded_second.data);
}

#[test]
fn serialization_is_idempotent_after_load() {
    let mut doc = document(SAMPLE);
    load(&mut doc).unwrap();
    let once = to_string_pretty(&doc);

    let mut again = document(&once);
    load(&mut again).unwrap();
    assert_eq!(once, to_string_pretty(&again));
}

#[test]
fn blank_lines_and_blank_fields_survive_a_round_trip() {
    let xml = "<Settings><pipeline><Initialiser name=\"Init\"><plugin type=\"P\"><steps>\na\n\nb\n</steps></plugin></Initialiser></pipeline><datastructure><x>   </x></datastructure></Settings>";
    let mut first = document(xml);
    let loaded_first = load(&mut first).unwrap();
    let steps = &loaded_first.pipeline.find("Init").unwrap().plugin.as_ref().unwrap().options["steps"];
    assert_eq!(steps, &OptionValue::from(vec!["a", "", "b"]));
    assert_eq!(loaded_first.data["x"], LiteralValue::from(""));

    let text = to_string_pretty(&first);
    let mut second = document(&text);
    let loaded_second = load(&mut second).unwrap();
    assert_eq!(loaded_first.pipeline, loaded_second.pipeline);
    assert_eq!(loaded_first.data, loaded_second.data);
    assert_eq!(text, to_string_pretty(&second));
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[test]
fn append_module_under_initialiser_serializes_nested_plugin() {
    let mut doc = document(
        r#"<Settings><pipeline><Initialiser name="Initialiser"/></pipeline><datastructure/></Settings>"#,
    );
    let mut builder = PipelineBuilder::new(&mut doc);
    builder
        .append_module(
            &ModuleSpec::new("DataProcessing", "norm1", "Normalizer")
                .option("norm", "l2")
                .under("Initialiser"),
        )
        .unwrap();

    let expected = "\
<Settings>
    <pipeline>
        <Initialiser name=\"Initialiser\">
            <DataProcessing name=\"norm1\">
                <plugin type=\"Normalizer\">
                    <norm>
                        l2
                    </norm>
                </plugin>
            </DataProcessing>
        </Initialiser>
    </pipeline>
    <datastructure />
</Settings>
";
    assert_eq!(to_string_pretty(&doc), expected);
}

#[test]
fn repeated_plugin_appends_merge_into_one_element() {
    let mut settings = Settings::new();
    let mut builder = settings.builder();
    builder
        .append_module(&ModuleSpec::new("Modelling", "model", "Ridge").option("alpha", "0.5"))
        .unwrap();
    let extra = [("fit_intercept".to_string(), OptionValue::from("True"))]
        .into_iter()
        .collect();
    builder
        .append_plugin_to_module("Ridge", &extra, "model", false)
        .unwrap();

    let model = builder.find_by_name("model").unwrap();
    assert_eq!(model.children_named("plugin").count(), 1);

    let loaded = settings.load().unwrap();
    let options = &loaded.pipeline.find("model").unwrap().plugin.as_ref().unwrap().options;
    let keys: Vec<_> = options.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["alpha", "fit_intercept"]);
}

#[test]
fn duplicate_names_make_lookup_ambiguous() {
    let mut settings = Settings::new();
    let mut builder = settings.builder();
    builder.append_module(&ModuleSpec::new("DataProcessing", "dup", "P")).unwrap();
    builder.append_loop(&LoopSpec::new("For", "3", "dup")).unwrap();

    let err = builder.find_by_name("dup").unwrap_err();
    assert!(matches!(err, SettingsError::AmbiguousName { count: 2, .. }));
    assert!(builder
        .append_module(&ModuleSpec::new("DataProcessing", "x", "P").under("dup"))
        .is_err());
}

#[test]
fn loop_members_are_linked_without_duplicates() {
    let mut settings = Settings::new();
    let mut builder = settings.builder();
    builder.append_loop(&LoopSpec::new("For", "10", "loop0")).unwrap();
    builder
        .append_module(
            &ModuleSpec::new("Modelling", "model", "Net")
                .parent("loop0")
                .under("loop0"),
        )
        .unwrap();

    let loaded = settings.load().unwrap();
    let model = loaded.pipeline.find("model").unwrap();
    assert_eq!(model.parents(), ["loop0"]);
    let lp = loaded.pipeline.get("loop0").unwrap();
    assert_eq!(lp.children(), ["model"]);
    assert!(lp.entries.contains_key("model"));
}

#[test]
fn data_schema_fields_load_back() {
    let mut settings = Settings::new();
    let mut builder = settings.builder();
    builder
        .append_data_schema_field("replay_buffer", &LiteralValue::from(vec![1, 2, 3]), None)
        .unwrap();
    builder
        .append_data_schema_field("labels", &LiteralValue::from(vec!["a", "b"]), Some("classes"))
        .unwrap();

    let mut reparsed = Settings::from_xml(&settings.to_xml_string()).unwrap();
    let loaded = reparsed.load().unwrap();
    assert_eq!(loaded.data["replay_buffer"], LiteralValue::from(vec![1, 2, 3]));
    assert_eq!(loaded.data["classes"], LiteralValue::from(vec!["a", "b"]));
}

#[test]
fn failed_edit_leaves_document_unchanged() {
    let mut settings = Settings::from_xml(SAMPLE).unwrap();
    let before = settings.to_xml_string();
    let mut builder = settings.builder();
    assert!(builder
        .append_module(&ModuleSpec::new("DataProcessing", "n", "P").under("missing"))
        .is_err());
    assert!(builder
        .append_data_schema_field("1bad", &LiteralValue::None, None)
        .is_err());
    assert_eq!(settings.to_xml_string(), before);
}

#[test]
fn values_that_would_not_reload_are_refused() {
    let mut settings = Settings::from_xml(SAMPLE).unwrap();
    let before = settings.to_xml_string();
    let mut builder = settings.builder();
    for value in ["relu(x)", "a\nb"] {
        let err = builder
            .append_module(&ModuleSpec::new("DataProcessing", "act", "Activation").option("act", value))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }), "{value:?}: {err}");
    }
    assert_eq!(settings.to_xml_string(), before);

    let mut reloaded = Settings::from_xml(&before).unwrap();
    assert!(reloaded.load().is_ok());
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn edit_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.xml");
    std::fs::write(&path, SAMPLE).unwrap();

    let mut settings = Settings::open(&path).unwrap();
    settings
        .builder()
        .append_module(
            &ModuleSpec::new("DecisionMaking", "decide", "Threshold")
                .option("levels", vec![0.5, 0.9])
                .parent("norm1")
                .under("loop0")
                .at(vec![100, 200, 0]),
        )
        .unwrap();
    settings.save().unwrap();

    let mut reopened = Settings::open(&path).unwrap();
    let loaded = reopened.load().unwrap();
    let decide = loaded.pipeline.find("decide").unwrap();
    assert_eq!(decide.module_type(), Some("DecisionMaking"));
    assert_eq!(decide.parents(), ["loop0", "norm1"]);
    assert_eq!(decide.coordinates(), Some(&LiteralValue::from(vec![100, 200, 0])));
    // Plain lines load back as strings; only bracketed lines are evaluated.
    assert_eq!(
        decide.plugin.as_ref().unwrap().options["levels"],
        OptionValue::from(vec!["0.5", "0.9"])
    );
}
