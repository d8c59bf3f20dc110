use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::messages::SearchResult;

/// Render collected results as the CSV report.
///
/// Fixed 5-column prefix, then `Match k Source`/`Match k URL` pairs sized to
/// the result with the most matches. Every data field is quoted with
/// embedded quotes doubled; short rows are padded with empty quoted pairs.
pub fn render_csv(results: &[SearchResult]) -> String {
    let max_matches = results
        .iter()
        .map(|r| r.all_matches().len())
        .max()
        .unwrap_or(0);

    let mut header = vec![
        "Original Post Link".to_string(),
        "Original Image URL".to_string(),
        "Original Username".to_string(),
        "Exact Match?".to_string(),
        "Total Matches".to_string(),
    ];
    for k in 1..=max_matches {
        header.push(format!("Match {k} Source"));
        header.push(format!("Match {k} URL"));
    }

    let mut out = String::new();
    out.push_str(&header.join(","));
    out.push('\n');

    for result in results {
        let matches = result.all_matches();
        let exact_flag = if result.has_exact_matches() { "Yes" } else { "" };

        let mut row = vec![
            quote(&result.original_post_link),
            quote(&result.original_image_url),
            quote(&result.original_username),
            quote(exact_flag),
            quote(&matches.len().to_string()),
        ];
        for i in 0..max_matches {
            match matches.get(i) {
                Some(m) => {
                    row.push(quote(m.source.as_deref().unwrap_or("Unknown")));
                    row.push(quote(m.link.as_deref().unwrap_or("")));
                }
                None => {
                    row.push(quote(""));
                    row.push(quote(""));
                }
            }
        }
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Write the CSV report to disk.
pub fn write_csv(results: &[SearchResult], path: &Path) -> Result<()> {
    fs::write(path, render_csv(results))
        .with_context(|| format!("failed to write report to {}", path.display()))
}

/// Default report filename derived from the detected username, sanitized to
/// lowercase alphanumerics and underscores.
pub fn report_filename(username: &str) -> String {
    let safe: String = username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}_originality_report.csv")
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
