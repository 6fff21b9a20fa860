use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::attribution::AuthorRecord;
use crate::error::HeaderError;

/// Holder of the leading copyright line.
pub const ORGANIZATION: &str = "Novell, Inc.";

/// Phrase that marks a file as already carrying the new header.
pub const LICENSE_PHRASE: &str = "Permission is hereby granted, free of charge";

/// Signature shared by every wording of the old license reference
/// ("This is free software. See COPYING for details", "see COPYING for
/// license information", ...). Such files must be cleaned up by hand first.
pub const LEGACY_PATTERN: &str = r"\b(?i:see)\s+COPYING\b";

const TEMPLATE: &str = "\
//
// @@FILENAME@@
//
// Author:
@@AUTHORS@@
//
@@COPYRIGHTS@@
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// \"Software\"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
//

";

static LEGACY_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LEGACY_PATTERN).expect("legacy reference pattern is valid"));

static CHAINED_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-\d{4}-").expect("chained range pattern is valid"));

/// What the prober found in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    /// The new license text is present; nothing to do.
    AlreadyHeadered,
    /// The old license reference is present; the run must abort.
    LegacyHeadered,
    /// No header of either kind.
    Missing,
}

/// Classifies `content` by looking for the header phrases.
///
/// The legacy reference is checked first so that a half-migrated file is
/// never treated as done.
pub fn probe(content: &str) -> HeaderState {
    if LEGACY_REFERENCE.is_match(content) {
        HeaderState::LegacyHeadered
    } else if content.contains(LICENSE_PHRASE) {
        HeaderState::AlreadyHeadered
    } else {
        HeaderState::Missing
    }
}

/// Joins sorted years, linking consecutive ones with `-` and separating
/// gaps with `, `. `{2008, 2009, 2010, 2012}` becomes `2008-2009-2010, 2012`.
fn chain_years(years: &BTreeSet<i32>) -> String {
    let mut out = String::new();
    let mut prev: Option<i32> = None;

    for &year in years {
        match prev {
            Some(p) if p + 1 == year => out.push('-'),
            Some(_) => out.push_str(", "),
            None => {}
        }
        out.push_str(&year.to_string());
        prev = Some(year);
    }

    out
}

/// Collapses chained ranges: every `YYYY-YYYY-` becomes `YYYY-`, repeated
/// until the text no longer changes, so `2001-2002-2003` becomes `2001-2003`.
pub fn collapse_chained_ranges(years: &str) -> String {
    let mut out = years.to_string();
    while let Cow::Owned(next) = CHAINED_RANGE.replace_all(&out, "${1}-") {
        out = next;
    }
    out
}

/// Renders a set of years as comma separated ranges.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use license_header::header::format_years;
///
/// let years: BTreeSet<i32> = [2008, 2009, 2010, 2012].into_iter().collect();
/// assert_eq!(format_years(&years), "2008-2010, 2012");
/// ```
pub fn format_years(years: &BTreeSet<i32>) -> String {
    collapse_chained_ranges(&chain_years(years))
}

/// `Copyright (C) <years> <holder>`.
pub fn copyright_notice(years: &str, holder: &str) -> String {
    format!("Copyright (C) {} {}", years, holder)
}

/// Copyright notice for [`ORGANIZATION`], spanning the earliest to the
/// latest year of any listed author. `None` when no author has a year.
pub fn organization_notice(authors: &[AuthorRecord]) -> Option<String> {
    let min = authors.iter().filter_map(|a| a.years.first()).min()?;
    let max = authors.iter().filter_map(|a| a.years.last()).max()?;

    let span = if min == max {
        min.to_string()
    } else {
        format!("{}-{}", min, max)
    };
    Some(copyright_notice(&span, ORGANIZATION))
}

fn author_line(author: &AuthorRecord) -> String {
    format!("//   {} <{}>", author.name, author.email)
}

/// Builds the full header for `file_name`, listing `authors` in the given order.
///
/// Returns `None` when `authors` is empty: there is no holder and no year to
/// put in the organization line.
pub fn render(file_name: &str, authors: &[AuthorRecord]) -> Option<String> {
    let organization = organization_notice(authors)?;

    let author_block = authors
        .iter()
        .map(author_line)
        .collect::<Vec<String>>()
        .join("\n");

    let copyright_block = std::iter::once(organization)
        .chain(
            authors
                .iter()
                .map(|a| copyright_notice(&format_years(&a.years), &a.name)),
        )
        .map(|notice| format!("// {}", notice))
        .collect::<Vec<String>>()
        .join("\n");

    Some(
        TEMPLATE
            .replace("@@FILENAME@@", file_name)
            .replace("@@AUTHORS@@", &author_block)
            .replace("@@COPYRIGHTS@@", &copyright_block),
    )
}

/// Replaces the file at `path` with `header` followed by `original`.
///
/// The new content is written to a temporary file next to `path`, given the
/// original permissions, and renamed over it, so an interrupted run leaves
/// the original untouched. A symlinked `path` is resolved first and the link
/// is kept.
///
/// # Errors
///
/// [`HeaderError::Io`] if the metadata cannot be read or the temporary file
/// cannot be written or persisted.
pub fn write_header(path: &Path, header: &str, original: &[u8]) -> Result<(), HeaderError> {
    // Replace the file a symlink points at, not the link itself.
    let resolved = fs::canonicalize(path).map_err(|e| HeaderError::io(path, e))?;
    let path = resolved.as_path();
    let dir = path.parent().unwrap_or(Path::new("."));

    let permissions = fs::metadata(path).map_err(|e| HeaderError::io(path, e))?.permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| HeaderError::io(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    let io = |e: std::io::Error| HeaderError::io(&tmp_path, e);

    tmp.write_all(header.as_bytes()).map_err(io)?;
    tmp.write_all(original).map_err(io)?;
    tmp.as_file().sync_all().map_err(io)?;
    fs::set_permissions(&tmp_path, permissions).map_err(io)?;

    tmp.persist(path).map_err(|e| HeaderError::io(path, e.error))?;

    debug!(
        path = %path.display(),
        header_bytes = header.len(),
        body_bytes = original.len(),
        "wrote header"
    );
    Ok(())
}
