//! Splits a decoded novel into title, author and chapters.
//!
//! Headings look like `第十二章 风起` or `第3卷：归来`: the marker `第`, a run
//! of CJK or ASCII numerals, one of `章节卷集`, an optional colon and the
//! rest of the line.

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::models::{Chapter, ChapterDoc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

const AUTHOR_PREFIX: &str = "作者：";
const CANCEL_CHECK_INTERVAL: usize = 256;

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^第[一二三四五六七八九十百千万零0-9]+[章节卷集][:：]?\s*(.*)$")
        .expect("heading pattern is valid")
});

/// A line recognised as a chapter heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading<'a> {
    pub line: &'a str,
    /// Whatever follows the numbering, possibly empty.
    pub name: &'a str,
}

pub fn match_heading(line: &str) -> Option<Heading<'_>> {
    let caps = HEADING_RE.captures(line)?;
    let name = caps.get(1).map_or("", |m| m.as_str());
    Some(Heading { line, name })
}

/// Title and author found in the header block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub title: Option<String>,
    pub author: String,
}

pub fn scan_header(text: &str) -> Header {
    let mut header = Header::default();
    for line in text.lines().map(str::trim) {
        if header.title.is_none() {
            if let Some(inner) = bracketed_title(line) {
                header.title = Some(inner.to_string());
                continue;
            }
        }
        if let Some(author) = line.strip_prefix(AUTHOR_PREFIX) {
            header.author = author.trim().to_string();
            break;
        }
    }
    header
}

fn bracketed_title(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('《')?.strip_suffix('》')?.trim();
    (!inner.is_empty()).then_some(inner)
}

/// Segment `text`; `fallback_title` is used when no `《title》` line exists.
pub fn segment(text: &str, fallback_title: &str) -> ChapterDoc {
    // A fresh token is never cancelled, so the error arm is not taken.
    segment_with_progress(text, fallback_title, &CancellationToken::new(), |_, _| {})
        .unwrap_or_else(|_| ChapterDoc::new(fallback_title, "", Vec::new()))
}

/// Like [`segment`], reporting `(lines_done, lines_total)` as it goes and
/// stopping early once `token` is cancelled.
pub fn segment_with_progress<F>(
    text: &str,
    fallback_title: &str,
    token: &CancellationToken,
    mut on_progress: F,
) -> Result<ChapterDoc>
where
    F: FnMut(usize, usize),
{
    let header = scan_header(text);
    let title = header
        .title
        .unwrap_or_else(|| fallback_title.to_string());

    let lines: Vec<&str> = text.lines().collect();
    let total = lines.len();
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut open: Option<(usize, String)> = None;
    let mut body: Vec<&str> = Vec::new();

    for (done, raw) in lines.iter().enumerate() {
        if done % CANCEL_CHECK_INTERVAL == 0 {
            token.check_cancelled("segment")?;
            on_progress(done, total);
        }

        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(heading) = match_heading(line) {
            if let Some((index, heading_line)) = open.take() {
                chapters.push(Chapter {
                    index,
                    title: heading_line,
                    content: body.join("\n"),
                });
                body.clear();
            }
            let next_index = chapters.len() + 1;
            open = Some((next_index, heading.line.to_string()));
        } else if open.is_some() {
            body.push(line);
        }
    }

    match open {
        Some((index, heading_line)) if !body.is_empty() => chapters.push(Chapter {
            index,
            title: heading_line,
            content: body.join("\n"),
        }),
        Some((_, heading_line)) => {
            debug!(heading = %heading_line, "Dropping trailing heading without body");
        }
        None => {}
    }
    on_progress(total, total);

    if chapters.is_empty() {
        warn!(title = %title, "No chapter headings matched");
    }
    debug!(title = %title, chapters = chapters.len(), "Segmented text");
    Ok(ChapterDoc::new(title, header.author, chapters))
}
