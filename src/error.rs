use thiserror::Error;

/// Domain errors that callers inspect or recover from.
///
/// Plumbing failures (I/O, SQLite, config) travel as `anyhow::Error`; these
/// are the cases the planner itself distinguishes.
#[derive(Debug, Error)]
pub(crate) enum PlanError {
    /// The backup insert policy walked the whole host history without
    /// finding a file that is still resident somewhere.
    #[error("no live sibling file found for host {host}")]
    SiblingNotFound { host: u32 },

    #[error("file with input id {input_id} is not in the catalog")]
    UnknownFile { input_id: String },

    #[error("malformed change line: {line:?}")]
    MalformedChange { line: String },

    #[error("invalid change file {path}: {reason}")]
    InvalidChangeFile { path: String, reason: String },

    /// The clustering attempt loop ran out of attempts before a merge
    /// sequence satisfied the relaxed margin.
    #[error("could not reach the requested balance after {attempts} attempts (last margin {margin}%)")]
    MarginNotReached { attempts: usize, margin: f64 },

    #[error("unknown volume: {name}")]
    UnknownVolume { name: String },
}
