//! Shared helpers for stylepipe's integration tests.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a test-captured subscriber once per test binary.
///
/// Output shows up only for failing tests (or with `--nocapture`). The filter
/// comes from `STYLEPIPE_LOG`, e.g. `STYLEPIPE_LOG=stylepipe=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(stylepipe::logging::LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than five seconds.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("test timed out after 5 seconds")
}

/// Temporary project directory populated with `(relative path, contents)`
/// pairs. Parent directories are created as needed.
pub fn project_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    for (rel, contents) in files {
        write_file(dir.path(), rel, contents);
    }
    dir
}

/// Write one file below `root`, creating its parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, contents).expect("write project file");
}
