use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Datelike};
use tracing::{debug, trace};

use crate::attribution::{CommitAuthor, CommitResolver};
use crate::error::HeaderError;

/// Format passed to `git show` for commit metadata: strict ISO 8601 author
/// date, author name and author email, NUL separated.
const METADATA_FORMAT: &str = "--format=%aI%x00%an%x00%ae";

/// Runs a command and returns its standard output on success,
/// or a [`HeaderError::GitCommand`] carrying its standard error on failure.
///
/// This function executes the provided [`std::process::Command`] and:
/// - If the command exits with a zero status, its `stdout` is captured,
///   converted to UTF-8 (lossy) and returned with trailing whitespace removed.
/// - If the command exits non-zero, its trimmed `stderr` (or the exit status
///   when stderr is empty) becomes the error message.
/// - If the process fails to spawn, the I/O error message is used.
///
/// # Parameters
///
/// * `cmd` — A fully configured [`std::process::Command`] ready to execute.
/// * `label` — Human readable form of the command, used in error messages.
///
/// # Examples
///
/// ```ignore
/// // Crate-private; depends on being inside a Git repository.
/// let mut cmd = Command::new("git");
/// cmd.arg("rev-parse").arg("--show-toplevel");
/// let root = run_output(cmd, "git rev-parse --show-toplevel")?;
/// ```
fn run_output(mut cmd: Command, label: &str) -> Result<String, HeaderError> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    trace!(command = label, "running");

    let out = cmd.output().map_err(|e| HeaderError::GitCommand {
        command: label.to_string(),
        message: e.to_string(),
    })?;

    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).trim_end().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("exited with {}", out.status)
        } else {
            stderr
        };
        Err(HeaderError::GitCommand {
            command: label.to_string(),
            message,
        })
    }
}

/// Runs `git blame --incremental` for `file_name` inside `workdir`.
///
/// The incremental format emits one hunk header per run of lines owned by
/// the same commit:
///
/// ```text
/// <40-char sha> <orig_line> <final_line> <num_lines>
/// author <name>
/// ...
/// filename <path>
/// ```
///
/// The raw output is returned untouched; hunk extraction happens in
/// [`crate::attribution::parse_hunk`].
///
/// # Errors
///
/// [`HeaderError::GitCommand`] if git cannot be spawned or rejects the file
/// (for example, the file is not tracked).
pub fn blame_incremental(workdir: &Path, file_name: &str) -> Result<String, HeaderError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir)
        .arg("blame")
        .arg("--incremental")
        .arg("--")
        .arg(file_name);
    run_output(cmd, &format!("git blame --incremental -- {}", file_name))
}

/// Runs `git show -s` for a single commit, returning its raw metadata record.
pub fn show_commit(workdir: &Path, sha: &str) -> Result<String, HeaderError> {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir)
        .arg("show")
        .arg("-s")
        .arg(METADATA_FORMAT)
        .arg(sha);
    run_output(cmd, &format!("git show -s {}", sha))
}

/// Parses the `date NUL name NUL email` record produced by [`show_commit`].
///
/// The year is read from the parsed author date in the author's own UTC
/// offset, so a commit made on New Year's Eve in the author's timezone keeps
/// the year the author saw.
///
/// # Errors
///
/// * [`HeaderError::MalformedOutput`] when the record does not have three fields.
/// * [`HeaderError::MalformedDate`] when the date is not RFC 3339.
pub fn parse_commit_metadata(sha: &str, raw: &str) -> Result<CommitAuthor, HeaderError> {
    let mut fields = raw.trim_end_matches(['\r', '\n']).splitn(3, '\0');

    let (Some(date), Some(name), Some(email)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(HeaderError::MalformedOutput {
            command: format!("git show -s {}", sha),
            detail: format!("expected date, name and email, got {:?}", raw),
        });
    };

    let parsed = DateTime::parse_from_rfc3339(date.trim()).map_err(|source| {
        HeaderError::MalformedDate {
            sha: sha.to_string(),
            value: date.to_string(),
            source,
        }
    })?;

    Ok(CommitAuthor {
        name: name.to_string(),
        email: email.trim().to_string(),
        year: parsed.year(),
    })
}

/// Resolves commits by asking the repository that contains the target file.
pub struct GitCommitResolver {
    workdir: PathBuf,
}

impl GitCommitResolver {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        GitCommitResolver {
            workdir: workdir.into(),
        }
    }
}

impl CommitResolver for GitCommitResolver {
    fn resolve(&mut self, sha: &str) -> Result<CommitAuthor, HeaderError> {
        let raw = show_commit(&self.workdir, sha)?;
        let author = parse_commit_metadata(sha, &raw)?;
        debug!(sha, name = %author.name, year = author.year, "resolved commit");
        Ok(author)
    }
}
