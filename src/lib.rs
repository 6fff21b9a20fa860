//! # license-header
//!
//! A CLI tool that inserts a copyright/license header into a single source
//! file, crediting the authors found in the file's git history.
//!
//! This crate provides functionality to:
//! - Detect whether a file already has the new header, or still has the old one
//! - Attribute every committed line to an author via `git blame --incremental`
//! - Drop authors owning 10% of the lines or less
//! - Render the header and write it in front of the original content
//!
//! ## Usage
//!
//! ```bash
//! license-header src/Main.cs
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface and main entry point
//! - [`git`] - Git command wrappers
//! - [`attribution`] - Blame aggregation and the contributor filter
//! - [`header`] - Header detection, rendering and writing
//! - [`summary`] - Boxed attribution summary
//! - [`error`] - Error type

pub mod attribution;
pub mod cli;
pub mod error;
pub mod git;
pub mod header;
pub mod summary;
