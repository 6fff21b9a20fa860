use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions that stop a header run.
///
/// Probe outcomes (already headered, legacy header) are not errors; see
/// [`crate::header::HeaderState`].
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`git` not found in PATH")]
    GitNotFound,

    #[error("`{command}` failed: {message}")]
    GitCommand { command: String, message: String },

    #[error("unexpected output from `{command}`: {detail}")]
    MalformedOutput { command: String, detail: String },

    #[error("commit {sha} has an unparseable author date {value:?}: {source}")]
    MalformedDate {
        sha: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no contributor of {} is above the attribution cutoff", path.display())]
    NoContributors { path: PathBuf },
}

impl HeaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HeaderError::Io {
            path: path.into(),
            source,
        }
    }
}
