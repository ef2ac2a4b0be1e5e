// tests/watch_session.rs

use std::path::Path;
use std::time::Duration;

use stylepipe::cli::CliArgs;
use stylepipe_test_utils::{init_tracing, project_dir, write_file};

const CONFIG: &str = r#"
[task.less]
kind = "compile_less"
src = "app/less/style.less"
dest = "app/css"

[task.browser-sync]
kind = "serve"
base_dir = "app"
port = 0

[task.browser-sync-reload]
kind = "reload"

[task.watch]
kind = "watch"
after = ["browser-sync", "less"]
rules = [
    { glob = "app/less/**/*.less", run = ["less"] },
    { glob = "app/css/*.css", run = ["browser-sync-reload"] },
]
"#;

fn watch_args(root: &Path) -> CliArgs {
    CliArgs {
        tasks: vec!["watch".to_string()],
        config: None,
        root: Some(root.to_path_buf()),
        log_level: None,
        list: false,
    }
}

fn compiled(root: &Path) -> String {
    std::fs::read_to_string(root.join("app/css/style.css")).unwrap_or_default()
}

/// Poll until the compiled stylesheet contains `needle`, rewriting the source
/// with `source` on every round so an edit made before the watcher was
/// registered is not lost.
async fn recompiles_to(root: &Path, source: &str, needle: &str) {
    let wait = async {
        loop {
            write_file(root, "app/less/style.less", source);
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if compiled(root).contains(needle) {
                    return;
                }
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(15), wait)
        .await
        .unwrap_or_else(|_| panic!("stylesheet never contained {needle:?}: {}", compiled(root)));
}

/// Saves made to the stylesheet during the session, with the output each
/// one must produce.
async fn edit_session(root: &Path) {
    recompiles_to(root, "@c: red;\n.a { .b { color: @c; } }\n", "color: red;").await;
    recompiles_to(root, "@c: blue;\n.a { .b { color: @c; } }\n", "color: blue;").await;

    // A broken save fails the compile and leaves the last good output.
    write_file(root, "app/less/style.less", ".a { color red; }\n");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(compiled(root).contains("color: blue;"), "{}", compiled(root));

    recompiles_to(root, ".a { margin: 0 -4px; }\n", "margin: 0 -4px;").await;
}

#[tokio::test]
async fn edited_stylesheet_is_recompiled_while_watching() {
    init_tracing();
    let dir = project_dir(&[
        ("Stylepipe.toml", CONFIG),
        ("app/index.html", "<html><body></body></html>"),
        ("app/less/style.less", "@c: red;\n.a { .b { color: @c; } }\n"),
    ]);
    let root = dir.path().to_path_buf();

    let session = stylepipe::run(watch_args(&root));
    tokio::pin!(session);

    tokio::select! {
        result = &mut session => panic!("watch session ended on its own: {result:?}"),
        _ = edit_session(&root) => {}
    }
}
