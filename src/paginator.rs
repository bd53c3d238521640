//! Page boundaries for a single chapter.
//!
//! A page nominally holds `page_size` characters, but its end is pushed
//! forward to the next newline so a line is never split. Each page starts
//! where the previous one ended, so the windows partition the chapter
//! exactly. Everything that needs a page start reads it from a
//! [`PageTable`] instead of recomputing it.

/// Character and byte range of one page. `start..end` is in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub start: usize,
    pub end: usize,
    byte_start: usize,
    byte_end: usize,
}

impl PageBounds {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageTable {
    pages: Vec<PageBounds>,
    char_len: usize,
}

impl PageTable {
    pub fn build(content: &str, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let chars: Vec<(usize, char)> = content.char_indices().collect();
        let char_len = chars.len();
        let byte_at = |i: usize| chars.get(i).map_or(content.len(), |&(b, _)| b);

        let mut pages = Vec::with_capacity(char_len.div_ceil(page_size));
        let mut start = 0;
        while start < char_len {
            let mut end = (start + page_size).min(char_len);
            while end < char_len && chars[end].1 != '\n' {
                end += 1;
            }
            pages.push(PageBounds {
                start,
                end,
                byte_start: byte_at(start),
                byte_end: byte_at(end),
            });
            start = end;
        }

        Self { pages, char_len }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn pages(&self) -> &[PageBounds] {
        &self.pages
    }

    /// 1-based page lookup.
    pub fn page(&self, page: usize) -> Option<PageBounds> {
        page.checked_sub(1).and_then(|i| self.pages.get(i)).copied()
    }

    /// 1-based page holding `intra_offset`; offsets past the end land on the
    /// last page, and an empty chapter reports page 1.
    pub fn page_containing(&self, intra_offset: usize) -> usize {
        if self.pages.is_empty() {
            return 1;
        }
        let idx = self.pages.partition_point(|p| p.end <= intra_offset);
        idx.min(self.pages.len() - 1) + 1
    }

    /// Start offset of the page at `page`, or of the last page when `page`
    /// is past the end.
    pub fn page_start(&self, page: usize) -> usize {
        self.page(page)
            .or_else(|| self.pages.last().copied())
            .map_or(0, |p| p.start)
    }

    pub fn last_page_start(&self) -> usize {
        self.pages.last().map_or(0, |p| p.start)
    }

    /// The unsplit text of a page, exactly as it sits in `content`.
    pub fn raw_window<'a>(&self, content: &'a str, page: usize) -> Option<&'a str> {
        let bounds = self.page(page)?;
        content.get(bounds.byte_start..bounds.byte_end)
    }

    pub fn paragraphs(&self, content: &str, page: usize) -> Vec<String> {
        self.raw_window(content, page)
            .map(split_paragraphs)
            .unwrap_or_default()
    }
}

/// Nominal page count: `ceil(chars / page_size)`, `0` for empty content.
pub fn page_count(content: &str, page_size: usize) -> usize {
    content.chars().count().div_ceil(page_size.max(1))
}

/// Paragraphs of 1-based `page`, trimmed, empty ones dropped.
pub fn page_slice(content: &str, page_size: usize, page: usize) -> Vec<String> {
    PageTable::build(content, page_size).paragraphs(content, page)
}

pub fn split_paragraphs(window: &str) -> Vec<String> {
    window
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
