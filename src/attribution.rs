use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::error::HeaderError;

/// Commit id git reports for lines that are not committed yet.
pub const UNCOMMITTED_SHA: &str = "0000000000000000000000000000000000000000";

/// An author must own more than `total / CONTRIBUTOR_DIVISOR` lines to be
/// listed in the header.
pub const CONTRIBUTOR_DIVISOR: u64 = 10;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{40}) (\d+) (\d+) (\d+)$").expect("hunk header pattern is valid")
});

/// Author of a single commit, as resolved from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    /// Calendar year of the author date.
    pub year: i32,
}

/// Abstraction over looking up who authored a commit.
///
/// Implementors are asked once per distinct commit; [`collect`] memoizes the
/// answers for the rest of the run.
pub trait CommitResolver {
    fn resolve(&mut self, sha: &str) -> Result<CommitAuthor, HeaderError>;
}

/// One hunk header from `git blame --incremental`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameHunk {
    pub sha: String,
    pub orig_line: u64,
    pub final_line: u64,
    pub num_lines: u64,
}

/// Parses a hunk header line of the form `<sha> <orig> <final> <count>`.
///
/// Returns `Ok(None)` for every other line git emits (`author ...`,
/// `filename ...`, `summary ...` and so on).
///
/// # Errors
///
/// [`HeaderError::MalformedOutput`] if a line has the hunk shape but a
/// number does not fit in `u64`.
pub fn parse_hunk(line: &str) -> Result<Option<BlameHunk>, HeaderError> {
    let Some(caps) = HUNK_HEADER.captures(line) else {
        return Ok(None);
    };

    let number = |idx: usize| -> Result<u64, HeaderError> {
        caps[idx]
            .parse()
            .map_err(|e| HeaderError::MalformedOutput {
                command: String::from("git blame --incremental"),
                detail: format!("{:?}: {}", line, e),
            })
    };

    Ok(Some(BlameHunk {
        sha: caps[1].to_string(),
        orig_line: number(2)?,
        final_line: number(3)?,
        num_lines: number(4)?,
    }))
}

/// Lines and years attributed to one author name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub name: String,
    /// Email from the first commit seen for this name.
    pub email: String,
    pub lines: u64,
    pub years: BTreeSet<i32>,
}

/// Per-author aggregation of a file's blame, in first-encounter order.
#[derive(Debug, Default)]
pub struct Attribution {
    authors: Vec<AuthorRecord>,
    index: HashMap<String, usize>,
    total_lines: u64,
}

impl Attribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `lines` lines to `author` in the author's commit year.
    ///
    /// Authors are keyed by name; the email of a later commit never
    /// replaces the one recorded first.
    pub fn record(&mut self, author: &CommitAuthor, lines: u64) {
        self.total_lines += lines;

        let slot = match self.index.get(&author.name) {
            Some(&i) => i,
            None => {
                self.authors.push(AuthorRecord {
                    name: author.name.clone(),
                    email: author.email.clone(),
                    lines: 0,
                    years: BTreeSet::new(),
                });
                self.index.insert(author.name.clone(), self.authors.len() - 1);
                self.authors.len() - 1
            }
        };

        let record = &mut self.authors[slot];
        record.lines += lines;
        record.years.insert(author.year);
    }

    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub fn authors(&self) -> &[AuthorRecord] {
        &self.authors
    }

    /// Line count at or below which an author is dropped (floor of 10%).
    pub fn cutoff(&self) -> u64 {
        self.total_lines / CONTRIBUTOR_DIVISOR
    }

    /// Splits authors into those listed in the header and those dropped.
    ///
    /// An author is kept only when their line count is strictly greater than
    /// [`cutoff`](Self::cutoff). With zero total lines every author is dropped.
    pub fn into_contributors(self) -> Contributors {
        let cutoff = self.cutoff();
        let total_lines = self.total_lines;
        let (kept, dropped): (Vec<_>, Vec<_>) =
            self.authors.into_iter().partition(|a| a.lines > cutoff);

        for author in &dropped {
            debug!(name = %author.name, lines = author.lines, cutoff, "dropping minor contributor");
        }

        Contributors {
            kept,
            dropped,
            cutoff,
            total_lines,
        }
    }
}

/// Result of the contributor filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributors {
    pub kept: Vec<AuthorRecord>,
    pub dropped: Vec<AuthorRecord>,
    pub cutoff: u64,
    pub total_lines: u64,
}

/// Aggregates `git blame --incremental` output into an [`Attribution`].
///
/// Authors are ordered by the first line of the file they own. Hunks owned
/// by [`UNCOMMITTED_SHA`] are skipped entirely. Each other commit is resolved
/// through `resolver` the first time it appears and served from a per-run
/// cache afterwards.
///
/// # Errors
///
/// Propagates the first resolver or parse failure; nothing is retried.
pub fn collect<R: CommitResolver>(
    blame_output: &str,
    resolver: &mut R,
) -> Result<Attribution, HeaderError> {
    let mut hunks = Vec::new();
    for line in blame_output.lines() {
        if let Some(hunk) = parse_hunk(line)? {
            hunks.push(hunk);
        }
    }
    // Incremental blame emits hunks in discovery order; walk them top to bottom.
    hunks.sort_by_key(|h| h.final_line);

    let mut cache: HashMap<String, CommitAuthor> = HashMap::new();
    let mut attribution = Attribution::new();

    for hunk in hunks {
        if hunk.sha == UNCOMMITTED_SHA {
            trace!(lines = hunk.num_lines, "skipping uncommitted lines");
            continue;
        }

        let author = match cache.entry(hunk.sha) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let resolved = resolver.resolve(e.key())?;
                e.insert(resolved)
            }
        };

        attribution.record(author, hunk.num_lines);
    }

    debug!(
        total_lines = attribution.total_lines(),
        authors = attribution.authors().len(),
        commits = cache.len(),
        "collected attribution"
    );
    Ok(attribution)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const SHA_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const SHA_C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    struct MockResolver {
        commits: HashMap<String, CommitAuthor>,
        calls: Vec<String>,
    }

    impl MockResolver {
        fn new(entries: &[(&str, &str, &str, i32)]) -> Self {
            let commits = entries
                .iter()
                .map(|(sha, name, email, year)| {
                    (
                        sha.to_string(),
                        CommitAuthor {
                            name: name.to_string(),
                            email: email.to_string(),
                            year: *year,
                        },
                    )
                })
                .collect();
            MockResolver {
                commits,
                calls: Vec::new(),
            }
        }
    }

    impl CommitResolver for MockResolver {
        fn resolve(&mut self, sha: &str) -> Result<CommitAuthor, HeaderError> {
            self.calls.push(sha.to_string());
            self.commits
                .get(sha)
                .cloned()
                .ok_or_else(|| HeaderError::GitCommand {
                    command: format!("git show -s {}", sha),
                    message: String::from("unknown revision"),
                })
        }
    }

    fn author(name: &str, year: i32) -> CommitAuthor {
        CommitAuthor {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            year,
        }
    }

    #[test]
    fn hunk_header_is_parsed() {
        let hunk = parse_hunk(&format!("{} 3 7 12", SHA_A))
            .expect("parse should not fail")
            .expect("line is a hunk header");
        assert_eq!(hunk.sha, SHA_A);
        assert_eq!(hunk.orig_line, 3);
        assert_eq!(hunk.final_line, 7);
        assert_eq!(hunk.num_lines, 12);
    }

    #[test]
    fn non_hunk_lines_are_ignored() {
        let lines = vec![
            String::from("author John Doe"),
            String::from("filename src/main.cs"),
            String::from("summary Fix 1 2 3"),
            String::from("boundary"),
            format!("previous {} src/old.cs", SHA_A),
            format!("{} 1 1", SHA_A),
            format!("{} 1 1 1 extra", SHA_A),
            String::from("ABCDEF0123456789ABCDEF0123456789ABCDEF01 1 1 1"),
            String::from("abcdef 1 1 1"),
        ];
        for line in &lines {
            assert_eq!(parse_hunk(line).expect("no parse error"), None, "{}", line);
        }
    }

    #[test]
    fn oversized_count_is_malformed_output() {
        let line = format!("{} 1 1 99999999999999999999999", SHA_A);
        assert!(matches!(
            parse_hunk(&line),
            Err(HeaderError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn collect_resolves_each_commit_once() {
        let blame = format!(
            "{a} 1 1 4\nauthor Alice\nfilename f.cs\n\
             {b} 5 5 2\nauthor Bob\nfilename f.cs\n\
             {a} 7 7 3\nfilename f.cs\n\
             {a} 11 11 1\nfilename f.cs\n",
            a = SHA_A,
            b = SHA_B
        );
        let mut resolver = MockResolver::new(&[
            (SHA_A, "Alice", "alice@example.com", 2008),
            (SHA_B, "Bob", "bob@example.com", 2009),
        ]);

        let attribution = collect(&blame, &mut resolver).expect("collect should succeed");

        assert_eq!(resolver.calls, vec![SHA_A.to_string(), SHA_B.to_string()]);
        assert_eq!(attribution.total_lines(), 10);
        let authors = attribution.authors();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].name, "Alice");
        assert_eq!(authors[0].lines, 8);
        assert_eq!(authors[1].name, "Bob");
        assert_eq!(authors[1].lines, 2);
    }

    #[test]
    fn authors_follow_file_order_not_emission_order() {
        let blame = format!("{b} 9 9 4\n{a} 1 1 8\n", a = SHA_A, b = SHA_B);
        let mut resolver = MockResolver::new(&[
            (SHA_A, "Alice", "a@example.com", 2008),
            (SHA_B, "Bob", "b@example.com", 2009),
        ]);

        let attribution = collect(&blame, &mut resolver).expect("collect should succeed");

        let names: Vec<_> = attribution.authors().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn uncommitted_lines_are_never_resolved_or_counted() {
        let blame = format!("{} 1 1 5\n{} 6 6 40\n", SHA_A, UNCOMMITTED_SHA);
        let mut resolver = MockResolver::new(&[(SHA_A, "Alice", "a@example.com", 2010)]);

        let attribution = collect(&blame, &mut resolver).expect("collect should succeed");

        assert_eq!(resolver.calls, vec![SHA_A.to_string()]);
        assert_eq!(attribution.total_lines(), 5);
    }

    #[test]
    fn same_name_merges_commits_and_keeps_first_email() {
        let blame = format!("{} 1 1 2\n{} 3 3 2\n{} 5 5 2\n", SHA_A, SHA_B, SHA_C);
        let mut resolver = MockResolver::new(&[
            (SHA_A, "Alice", "alice@old.org", 2005),
            (SHA_B, "Alice", "alice@new.org", 2007),
            (SHA_C, "Alice", "alice@new.org", 2005),
        ]);

        let attribution = collect(&blame, &mut resolver).expect("collect should succeed");

        let authors = attribution.authors();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].email, "alice@old.org");
        assert_eq!(authors[0].lines, 6);
        assert_eq!(authors[0].years.iter().copied().collect::<Vec<_>>(), vec![2005, 2007]);
    }

    #[test]
    fn author_line_counts_sum_to_total() {
        let blame = format!("{} 1 1 17\n{} 18 18 3\n{} 21 21 9\n", SHA_A, SHA_B, SHA_A);
        let mut resolver = MockResolver::new(&[
            (SHA_A, "Alice", "a@example.com", 2006),
            (SHA_B, "Bob", "b@example.com", 2006),
        ]);

        let attribution = collect(&blame, &mut resolver).expect("collect should succeed");

        let sum: u64 = attribution.authors().iter().map(|a| a.lines).sum();
        assert_eq!(sum, attribution.total_lines());
    }

    #[test]
    fn resolver_failure_stops_collection() {
        let blame = format!("{} 1 1 2\n{} 3 3 2\n", SHA_A, SHA_B);
        let mut resolver = MockResolver::new(&[(SHA_A, "Alice", "a@example.com", 2006)]);

        let result = collect(&blame, &mut resolver);
        assert!(matches!(result, Err(HeaderError::GitCommand { .. })));
    }

    #[test]
    fn minor_author_is_dropped() {
        let mut attribution = Attribution::new();
        attribution.record(&author("A", 2008), 95);
        attribution.record(&author("B", 2008), 5);

        let contributors = attribution.into_contributors();

        assert_eq!(contributors.cutoff, 10);
        assert_eq!(contributors.kept.len(), 1);
        assert_eq!(contributors.kept[0].name, "A");
        assert_eq!(contributors.dropped[0].name, "B");
    }

    #[test]
    fn author_exactly_at_cutoff_is_dropped() {
        let mut attribution = Attribution::new();
        attribution.record(&author("A", 2008), 10);
        attribution.record(&author("B", 2008), 90);

        let contributors = attribution.into_contributors();

        assert_eq!(contributors.cutoff, 10);
        let kept: Vec<_> = contributors.kept.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(kept, vec!["B"]);
    }

    #[test]
    fn author_one_above_cutoff_is_kept() {
        let mut attribution = Attribution::new();
        attribution.record(&author("A", 2008), 11);
        attribution.record(&author("B", 2008), 89);

        let contributors = attribution.into_contributors();
        assert_eq!(contributors.kept.len(), 2);
    }

    #[test]
    fn cutoff_uses_floor_division() {
        let mut attribution = Attribution::new();
        attribution.record(&author("A", 2008), 1);
        attribution.record(&author("B", 2008), 18);

        // 19 / 10 == 1, so a single line is not enough.
        let contributors = attribution.into_contributors();
        assert_eq!(contributors.cutoff, 1);
        assert_eq!(contributors.kept.len(), 1);
        assert_eq!(contributors.kept[0].name, "B");
    }

    #[test]
    fn empty_attribution_keeps_nobody() {
        let contributors = Attribution::new().into_contributors();
        assert_eq!(contributors.cutoff, 0);
        assert!(contributors.kept.is_empty());
        assert!(contributors.dropped.is_empty());
    }

    #[test]
    fn small_file_keeps_every_author() {
        let mut attribution = Attribution::new();
        attribution.record(&author("A", 2008), 3);
        attribution.record(&author("B", 2009), 2);

        // 5 / 10 == 0, every author with a line survives.
        let contributors = attribution.into_contributors();
        assert_eq!(contributors.kept.len(), 2);
    }
}
