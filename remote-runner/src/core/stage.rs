//! Pipeline stages and their transitions.

use std::fmt;

use crate::exit_codes;

/// Progress marker for one pipeline run.
///
/// The happy path is strictly linear. `Error` is absorbing and reachable from
/// every non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    ConfigChecked,
    Synced,
    ScriptRan,
    Done,
    Error,
}

impl Stage {
    /// Next stage on success. Terminal stages map to themselves.
    pub fn advance(self) -> Stage {
        match self {
            Stage::Start => Stage::ConfigChecked,
            Stage::ConfigChecked => Stage::Synced,
            Stage::Synced => Stage::ScriptRan,
            Stage::ScriptRan | Stage::Done => Stage::Done,
            Stage::Error => Stage::Error,
        }
    }

    /// Stage after a failure. `Done` stays `Done`; everything else lands in `Error`.
    pub fn fail(self) -> Stage {
        match self {
            Stage::Done => Stage::Done,
            _ => Stage::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    /// Process exit code for a terminal stage.
    pub fn exit_code(self) -> i32 {
        match self {
            Stage::Done => exit_codes::OK,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ConfigChecked => "config_checked",
            Stage::Synced => "synced",
            Stage::ScriptRan => "script_ran",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}
