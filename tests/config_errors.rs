// tests/config_errors.rs

use std::io::Write;

use stylepipe::config::{TaskAction, load_and_validate, load_or_builtin};
use stylepipe::errors::StylepipeError;
use stylepipe::types::TriggerWhileRunningBehaviour;
use stylepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn cycle_returns_structured_error() {
    let file = config_file(
        r#"
[task.a]
kind = "notice"
message = "a"
after = ["b"]

[task.b]
kind = "notice"
message = "b"
after = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(StylepipeError::DagCycle(msg)) => {
            assert!(msg == "a" || msg == "b", "unexpected cycle node {msg}");
        }
        other => panic!("expected DagCycle error, got: {other:?}"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let file = config_file(
        r#"
[task.build]
kind = "notice"
message = "Build complete"
after = ["move-html"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(StylepipeError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency 'move-html'"), "{msg}");
        }
        other => panic!("expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn unknown_kind_is_a_toml_error() {
    let file = config_file(
        r#"
[task.less]
kind = "compile_sass"
src = "a.scss"
dest = "css"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(StylepipeError::TomlError(_))
    ));
}

#[test]
fn watch_rule_must_name_existing_task() {
    let err = ConfigFileBuilder::new()
        .with_task("less", TaskConfigBuilder::compile_less("a.less", "css").build())
        .with_task("watch", TaskConfigBuilder::watch("*.less", "lesss").build())
        .try_build()
        .unwrap_err();

    match err {
        StylepipeError::ConfigError(msg) => assert!(msg.contains("unknown task 'lesss'"), "{msg}"),
        other => panic!("expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn invalid_glob_is_rejected() {
    let err = ConfigFileBuilder::new()
        .with_task("copy", TaskConfigBuilder::copy("app/[*.html", "dist").build())
        .try_build()
        .unwrap_err();
    assert!(matches!(err, StylepipeError::ConfigError(msg) if msg.contains("invalid glob")));
}

#[test]
fn full_pipeline_file_parses_with_defaults() {
    let file = config_file(
        r#"
[config]
triggered_while_running_behaviour = "cancel"

[task.less]
kind = "compile_less"
src = "app/less/style.less"
dest = "app/css"

[task.browser-sync]
kind = "serve"
base_dir = "app"

[task.watch]
kind = "watch"
after = ["browser-sync", "less"]
rules = [{ glob = "app/less/*.less", run = ["less"] }]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(
        cfg.config_section().triggered_while_running_behaviour,
        TriggerWhileRunningBehaviour::Cancel
    );
    match &cfg.task("browser-sync").unwrap().action {
        TaskAction::Serve {
            port,
            host,
            browsers,
            ..
        } => {
            assert_eq!(*port, 3000);
            assert_eq!(host, "127.0.0.1");
            assert!(browsers.is_empty());
        }
        other => panic!("unexpected action {other:?}"),
    }
    assert_eq!(cfg.task("watch").unwrap().after, vec!["browser-sync", "less"]);
}

#[test]
fn missing_default_config_falls_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();

    let (cfg, path) = load_or_builtin(None, dir.path()).unwrap();
    assert!(path.is_none());
    assert_eq!(cfg.tasks().len(), 7);
    assert_eq!(cfg.task("build").unwrap().after, vec!["move-html", "minify-css"]);

    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_or_builtin(Some(&missing), dir.path()),
        Err(StylepipeError::ConfigError(_))
    ));
}

#[test]
fn default_config_in_search_dir_is_used() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Stylepipe.toml"),
        "[task.hello]\nkind = \"notice\"\nmessage = \"hi\"\n",
    )
    .unwrap();

    let (cfg, path) = load_or_builtin(None, dir.path()).unwrap();
    assert_eq!(path, Some(dir.path().join("Stylepipe.toml")));
    assert_eq!(cfg.tasks().keys().collect::<Vec<_>>(), vec!["hello"]);
}
