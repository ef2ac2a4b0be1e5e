use std::str::FromStr;

use serde::Deserialize;

/// Behaviour when a watch trigger arrives for a task that is already part of
/// the active run.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued run and only keep the latest
///   trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// Default port of the development server.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default bind host of the development server.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Path of the WebSocket endpoint browsers connect to for live reload.
pub const LIVERELOAD_PATH: &str = "/__stylepipe/livereload";
