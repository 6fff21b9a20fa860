use crate::attribution::{self, Contributors};
use crate::error::HeaderError;
use crate::git::{self, GitCommitResolver};
use crate::header::{self, HeaderState};
use crate::summary::print_summary;

use console::style;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// Exit status when the file still carries the legacy license reference.
pub const EXIT_LEGACY_HEADER: i32 = 255;

/// What a parsed command line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Help,
    Version,
    Run(PathBuf),
}

/// How a run on a single file ended.
#[derive(Debug)]
pub enum Outcome {
    /// The new header is already present; the file was not touched.
    AlreadyHeadered,
    /// The legacy header is present; the file was not touched.
    LegacyHeadered,
    /// The header was written, crediting the kept contributors.
    Written(Contributors),
}

/// Parses arguments (without the program name).
///
/// `--help` and `--version` win wherever they appear before `--`. Otherwise
/// exactly one positional file name is required and no other options are
/// accepted. Everything after `--` is positional, so `-- -odd.cs` works.
fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let (options, trailing) = match args.iter().position(|a| a == "--") {
        Some(i) => (&args[..i], &args[i + 1..]),
        None => (args, &args[args.len()..]),
    };

    if options.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Invocation::Help);
    }
    if options.iter().any(|a| a == "--version" || a == "-V") {
        return Ok(Invocation::Version);
    }

    if let Some(flag) = options.iter().find(|a| a.starts_with('-') && a.len() > 1) {
        return Err(format!("unknown option `{}`", flag));
    }

    let positional: Vec<&String> = options.iter().chain(trailing).collect();
    match positional.as_slice() {
        [file] => Ok(Invocation::Run(PathBuf::from(file.as_str()))),
        [] => Err(String::from("missing <filename> argument")),
        _ => Err(String::from("expected exactly one <filename> argument")),
    }
}

/// Prints usage information to stdout.
fn print_help() {
    println!(
        "\
license-header {}

Insert a copyright/license header into a source file, crediting the authors
found by `git blame`.

USAGE:
    license-header [--] <filename>

OPTIONS:
    -h, --help       Print help information
    -V, --version    Print version information

DESCRIPTION:
    Authors owning more than 10% of the file's committed lines are listed,
    with the years they touched it. Files that already carry the new header
    are left alone. Files with the old \"See COPYING\" reference abort with
    exit status 255 so the old text can be removed by hand.

    Set RUST_LOG=debug to see every git call and commit resolution.",
        env!("CARGO_PKG_VERSION")
    );
}

/// Verifies that `git` can be found on `PATH`.
fn verify_environment() -> Result<(), HeaderError> {
    which::which("git").map(|_| ()).map_err(|_| HeaderError::GitNotFound)
}

/// Reads the target file as raw bytes, rejecting anything but a regular file.
fn read_target(path: &Path) -> Result<Vec<u8>, HeaderError> {
    let meta = fs::metadata(path).map_err(|e| HeaderError::io(path, e))?;
    if !meta.is_file() {
        return Err(HeaderError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    fs::read(path).map_err(|e| HeaderError::io(path, e))
}

/// Runs the whole pipeline on one file: probe, blame, filter, render, write.
///
/// Git runs from the file's directory, so `path` may be relative to any
/// working directory.
///
/// # Errors
///
/// Any [`HeaderError`]; the file is only modified once every step before the
/// write has succeeded.
pub fn run(path: &Path) -> Result<Outcome, HeaderError> {
    let original = read_target(path)?;

    match header::probe(&String::from_utf8_lossy(&original)) {
        HeaderState::AlreadyHeadered => return Ok(Outcome::AlreadyHeadered),
        HeaderState::LegacyHeadered => return Ok(Outcome::LegacyHeadered),
        HeaderState::Missing => {}
    }

    verify_environment()?;

    let workdir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            HeaderError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            )
        })?;

    let blame = git::blame_incremental(workdir, &file_name)?;
    let mut resolver = GitCommitResolver::new(workdir);
    let contributors = attribution::collect(&blame, &mut resolver)?.into_contributors();

    let rendered = header::render(&file_name, &contributors.kept).ok_or_else(|| {
        HeaderError::NoContributors {
            path: path.to_path_buf(),
        }
    })?;

    header::write_header(path, &rendered, &original)?;
    info!(
        file = %file_name,
        credited = contributors.kept.len(),
        dropped = contributors.dropped.len(),
        "header written"
    );

    Ok(Outcome::Written(contributors))
}

/// Main CLI entry point for `license-header`.
///
/// This function:
/// 1. Handles `--help` and `--version`.
/// 2. Requires exactly one file name.
/// 3. Runs the header pipeline on that file.
/// 4. Reports the outcome and maps it to an exit status.
///
/// # Exit Codes
///
/// * `0` – Header written, or the file already has one.
/// * `255` – The file carries the legacy license reference; nothing written.
///
/// # Errors
///
/// Returns `Err(())` after printing the reason when the arguments are invalid
/// or the pipeline fails; the binary exits with status `1`.
pub fn entry() -> Result<i32, ()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let path = match parse_args(&args) {
        Ok(Invocation::Help) => {
            print_help();
            return Ok(0);
        }
        Ok(Invocation::Version) => {
            println!("license-header {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Ok(Invocation::Run(path)) => path,
        Err(e) => {
            eprintln!("{}", style(format!("Error: {}", e)).red().bold());
            eprintln!("Usage: license-header [--] <filename>");
            return Err(());
        }
    };

    match run(&path) {
        Ok(Outcome::AlreadyHeadered) => {
            eprintln!(
                "{}",
                style(format!(
                    "{} already has a license header; nothing to do.",
                    path.display()
                ))
                .yellow()
                .bold()
            );
            Ok(0)
        }
        Ok(Outcome::LegacyHeadered) => {
            eprintln!(
                "{}",
                style(format!(
                    "{} still has the old COPYING reference; remove it and run again.",
                    path.display()
                ))
                .red()
                .bold()
            );
            Ok(EXIT_LEGACY_HEADER)
        }
        Ok(Outcome::Written(contributors)) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            print_summary(&name, &contributors);
            println!("{}", style("✅ License header written.").green().bold());
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}", style(format!("❌ {}", e)).red().bold());
            Err(())
        }
    }
}
