// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

use stylepipe::config::ConfigFile;
use stylepipe::dag::Scheduler;
use stylepipe::engine::{
    CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use stylepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use stylepipe_test_utils::fake_executor::FakeExecutor;
use stylepipe_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn requested(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason: TriggerReason::Requested,
    }
}

fn runtime(
    cfg: &ConfigFile,
    executor: FakeExecutor,
    rt_rx: mpsc::Receiver<RuntimeEvent>,
) -> Runtime<FakeExecutor> {
    let core = CoreRuntime::new(
        Scheduler::from_config(cfg),
        TriggerWhileRunningBehaviour::Queue,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );
    Runtime::new(core, rt_rx, executor)
}

async fn run_to_completion(
    cfg: &ConfigFile,
    configure: impl FnOnce(FakeExecutor) -> FakeExecutor,
    task: &str,
) -> Result<(RunSummary, Vec<String>), Box<dyn Error>> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = configure(FakeExecutor::new(rt_tx.clone(), executed.clone()));

    rt_tx.send(requested(task)).await?;

    let summary = match timeout(Duration::from_secs(3), runtime(cfg, executor, rt_rx).run()).await {
        Ok(result) => result?,
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    };

    let tasks_run = executed.lock().unwrap().clone();
    Ok((summary, tasks_run))
}

#[tokio::test]
async fn build_runs_prerequisites_first_and_exits() -> TestResult {
    init_tracing();

    let (summary, tasks_run) =
        run_to_completion(&ConfigFile::builtin(), |e| e, "build").await?;

    assert!(summary.is_success());
    assert!(!summary.interrupted);
    assert_eq!(tasks_run, vec!["minify-css", "move-html", "build"]);
    Ok(())
}

#[tokio::test]
async fn notice_waits_for_both_regardless_of_completion_order() -> TestResult {
    init_tracing();

    let (summary, tasks_run) =
        run_to_completion(&ConfigFile::builtin(), FakeExecutor::reversed, "build").await?;

    assert!(summary.is_success());
    assert_eq!(tasks_run.last().map(String::as_str), Some("build"));
    assert_eq!(tasks_run.len(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_prerequisite_aborts_dependents() -> TestResult {
    init_tracing();

    let (summary, tasks_run) = run_to_completion(
        &ConfigFile::builtin(),
        |e| e.failing("minify-css"),
        "build",
    )
    .await?;

    // The sibling still ran; the notice never did.
    assert_eq!(tasks_run, vec!["minify-css", "move-html"]);
    assert_eq!(summary.failed, vec!["minify-css", "build"]);
    Ok(())
}

#[tokio::test]
async fn unrelated_tasks_are_not_pulled_in() -> TestResult {
    init_tracing();

    let cfg = ConfigFileBuilder::new()
        .with_task("a", TaskConfigBuilder::notice("a").build())
        .with_task("b", TaskConfigBuilder::notice("b").after("a").build())
        .with_task("c", TaskConfigBuilder::notice("c").build())
        .build();

    let (summary, tasks_run) = run_to_completion(&cfg, |e| e, "b").await?;

    assert!(summary.is_success());
    assert_eq!(tasks_run, vec!["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn watch_session_stays_alive_until_shutdown() -> TestResult {
    init_tracing();

    let cfg = ConfigFile::builtin();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone());

    rt_tx.send(requested("watch")).await?;
    let handle = tokio::spawn(runtime(&cfg, executor, rt_rx).run());

    // Services are alive, so the runtime must not exit on its own.
    sleep(Duration::from_millis(200)).await;
    assert!(!handle.is_finished());
    assert_eq!(
        executed.lock().unwrap().clone(),
        vec!["browser-sync", "less", "watch"]
    );

    // A file-watch trigger re-runs `less` without restarting services.
    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: "less".to_string(),
            reason: TriggerReason::FileWatch,
        })
        .await?;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(
        executed.lock().unwrap().clone(),
        vec!["browser-sync", "less", "watch", "less"]
    );

    rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = with_timeout(handle).await??;
    assert!(summary.interrupted);
    assert!(summary.is_success());
    Ok(())
}
