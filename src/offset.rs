//! Mapping between a book-wide character offset and a position inside one
//! chapter.
//!
//! Chapter positions here are 0-based array positions, not `Chapter::index`.

use crate::models::Chapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub chapter: usize,
    pub intra_offset: usize,
}

/// Cumulative chapter lengths, built once per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    /// `ends[i]` is the global offset just past chapter `i`.
    ends: Vec<usize>,
}

impl OffsetIndex {
    pub fn new(chapters: &[Chapter]) -> Self {
        let mut running = 0;
        let ends = chapters
            .iter()
            .map(|chapter| {
                running += chapter.char_len();
                running
            })
            .collect();
        Self { ends }
    }

    pub fn chapter_count(&self) -> usize {
        self.ends.len()
    }

    pub fn total_chars(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    /// Global offset of the first character of `chapter`. Past-the-end
    /// positions return the total length.
    pub fn chapter_start(&self, chapter: usize) -> usize {
        match chapter.checked_sub(1) {
            None => 0,
            Some(prev) => self
                .ends
                .get(prev)
                .copied()
                .unwrap_or_else(|| self.total_chars()),
        }
    }

    pub fn chapter_len(&self, chapter: usize) -> usize {
        self.ends
            .get(chapter)
            .map_or(0, |end| end - self.chapter_start(chapter))
    }

    /// `None` only when there are no chapters. An offset at or beyond the
    /// total length (stale progress) resolves to the start of the book.
    pub fn locate(&self, global_offset: usize) -> Option<Location> {
        if self.ends.is_empty() {
            return None;
        }
        let chapter = self.ends.partition_point(|&end| end <= global_offset);
        if chapter == self.ends.len() {
            return Some(Location::default());
        }
        Some(Location {
            chapter,
            intra_offset: global_offset - self.chapter_start(chapter),
        })
    }

    pub fn to_global(&self, chapter: usize, intra_offset: usize) -> usize {
        self.chapter_start(chapter) + intra_offset
    }
}

pub fn locate(chapters: &[Chapter], global_offset: usize) -> Option<Location> {
    OffsetIndex::new(chapters).locate(global_offset)
}

pub fn to_global(chapters: &[Chapter], chapter: usize, intra_offset: usize) -> usize {
    OffsetIndex::new(chapters).to_global(chapter, intra_offset)
}
