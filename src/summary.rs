use console::{measure_text_width, style};

use crate::attribution::{AuthorRecord, Contributors};
use crate::header::format_years;

/// Prints a boxed, colorized summary of who the header credits.
///
/// The box is sized to the widest **visible** line, using
/// [`console::measure_text_width`] so that ANSI color codes in the content
/// do not throw off the padding. Borders are styled separately from the
/// content.
///
/// # Parameters
///
/// * `file_name` – Name of the file that received the header.
/// * `contributors` – Result of the contributor filter.
///
/// # Examples
///
/// ```no_run
/// use license_header::attribution::Attribution;
/// use license_header::summary::print_summary;
///
/// let contributors = Attribution::new().into_contributors();
/// print_summary("Main.cs", &contributors);
/// ```
pub fn print_summary(file_name: &str, contributors: &Contributors) {
    let lines = summary_lines(file_name, contributors);

    let max_width = lines
        .iter()
        .map(|l| measure_text_width(l))
        .max()
        .unwrap_or(0)
        + 2;

    let border = "═".repeat(max_width);
    let top = style(format!("╔{}╗", border)).blue().bold();
    let bottom = style(format!("╚{}╝", border)).blue().bold();
    let left = style("║ ").blue().bold().to_string();
    let right = style("║").blue().bold().to_string();

    println!();
    println!("{top}");
    for line in lines {
        let pad = max_width - measure_text_width(&line);
        println!("{}{}{}{}", left, line, " ".repeat(pad - 1), right);
    }
    println!("{bottom}");
    println!();
}

fn author_row(author: &AuthorRecord) -> String {
    format!(
        "  {} <{}>: {} lines, {}",
        author.name,
        author.email,
        author.lines,
        format_years(&author.years)
    )
}

/// Builds the summary lines in display order: title, totals, credited
/// authors, then authors at or below the cutoff.
///
/// Dropped authors are dimmed, so callers measuring width must use visible
/// width rather than `str::len()`.
fn summary_lines(file_name: &str, contributors: &Contributors) -> Vec<String> {
    let mut lines = vec![
        format!("License header added to {}", file_name),
        String::new(),
        format!(
            "Attributed lines: {} (cutoff: more than {})",
            contributors.total_lines, contributors.cutoff
        ),
        String::new(),
        style("Credited:").green().bold().to_string(),
    ];
    lines.extend(contributors.kept.iter().map(author_row));

    if !contributors.dropped.is_empty() {
        lines.push(String::new());
        lines.push(style("Below cutoff:").yellow().bold().to_string());
        lines.extend(
            contributors
                .dropped
                .iter()
                .map(|a| style(author_row(a)).dim().to_string()),
        );
    }

    lines
}
