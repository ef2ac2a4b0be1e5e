// tests/scheduler_properties.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use stylepipe::config::ConfigFile;
use stylepipe::dag::{Scheduler, TaskRunState};
use stylepipe::engine::TaskOutcome;
use stylepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("task_{i}");
                let mut task = TaskConfigBuilder::notice(&name);

                let deps: BTreeSet<usize> = if i == 0 {
                    BTreeSet::new()
                } else {
                    potential_deps.into_iter().map(|d| d % i).collect()
                };
                for dep in deps {
                    task = task.after(&format!("task_{dep}"));
                }
                builder = builder.with_task(&name, task.build());
            }
            builder.build()
        })
    })
}

fn assert_deps_done(scheduler: &Scheduler, task: &str) -> Result<(), TestCaseError> {
    for dep in scheduler.graph().dependencies_of(task) {
        prop_assert_eq!(
            scheduler.run_state_of(dep),
            Some(TaskRunState::DoneSuccess),
            "{} dispatched before prerequisite {} succeeded",
            task,
            dep
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn runs_terminate_and_respect_prerequisites(
        cfg in dag_config_strategy(10),
        trigger_indices in proptest::collection::vec(0..10usize, 1..5),
        failing_indices in proptest::collection::vec(0..10usize, 0..3),
    ) {
        let mut scheduler = Scheduler::from_config(&cfg);
        let task_names: Vec<String> = scheduler.task_names().map(str::to_string).collect();

        let triggers: Vec<String> = trigger_indices
            .iter()
            .map(|&i| task_names[i % task_names.len()].clone())
            .collect();
        let failing: HashSet<String> = failing_indices
            .iter()
            .filter(|&&i| i < task_names.len())
            .map(|&i| task_names[i].clone())
            .collect();

        let mut executing: Vec<String> = Vec::new();
        let mut dispatched: BTreeSet<String> = BTreeSet::new();

        scheduler.start_new_run();
        for t in &triggers {
            for st in scheduler.handle_trigger(t) {
                assert_deps_done(&scheduler, &st.name)?;
                prop_assert!(dispatched.insert(st.name.clone()), "{} dispatched twice", st.name);
                executing.push(st.name);
            }
        }

        let mut steps = 0;
        while !executing.is_empty() {
            let task = executing.remove(0);
            steps += 1;
            prop_assert!(steps <= 100, "simulation did not converge");

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed(format!("{task} failed"))
            } else {
                TaskOutcome::Success
            };

            for st in scheduler.handle_completion(&task, outcome) {
                assert_deps_done(&scheduler, &st.name)?;
                prop_assert!(dispatched.insert(st.name.clone()), "{} dispatched twice", st.name);
                executing.push(st.name);
            }
        }

        // Every task either ran or was aborted; the run is over.
        prop_assert!(scheduler.is_idle(), "run still active with nothing executing");

        if failing.is_empty() {
            let plan: BTreeSet<String> = scheduler
                .graph()
                .execution_plan(&triggers)
                .into_iter()
                .collect();
            prop_assert_eq!(dispatched, plan);
        }
    }
}
