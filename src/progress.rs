//! Reading position persistence and navigation.
//!
//! Only a single global character offset is stored per book. Chapter and
//! page are always derived from it through the [`OffsetIndex`] and the
//! chapter's [`PageTable`], and every navigation action resolves back to one
//! offset before it is saved.

use crate::error::Result;
use crate::models::{Book, Chapter, ChapterDoc};
use crate::offset::{Location, OffsetIndex};
use crate::paginator::PageTable;
use crate::state::BookStore;
use tracing::{debug, warn};

pub struct ProgressTracker<'s, S: BookStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: BookStore + ?Sized> ProgressTracker<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn save(&self, book_id: i64, global_offset: usize) -> Result<()> {
        debug!(book_id, global_offset, "Saving reading progress");
        self.store.upsert_progress(book_id, global_offset)
    }

    pub fn load(&self, book_id: i64) -> Result<Option<usize>> {
        Ok(self
            .store
            .find_progress(book_id)?
            .map(|progress| progress.global_offset))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingPosition {
    /// 0-based chapter position.
    pub chapter: usize,
    /// 1-based page within the chapter.
    pub page: usize,
    pub page_count: usize,
    pub global_offset: usize,
    pub percent: u8,
}

/// Percentage of the book before `global_offset`, rounded.
pub fn percent_read(global_offset: usize, total_chars: usize) -> u8 {
    if total_chars == 0 {
        return 0;
    }
    let ratio = global_offset.min(total_chars) as f64 / total_chars as f64;
    (ratio * 100.0).round() as u8
}

/// An open book together with its derived page tables and current position.
pub struct ReadingSession<'s, S: BookStore + ?Sized> {
    tracker: ProgressTracker<'s, S>,
    book_id: i64,
    doc: ChapterDoc,
    index: OffsetIndex,
    tables: Vec<PageTable>,
    chapter: usize,
    page: usize,
    global_offset: usize,
}

impl<'s, S: BookStore + ?Sized> ReadingSession<'s, S> {
    /// Open `book` at its saved position. Progress that no longer fits the
    /// current content falls back to the start of the book.
    pub fn open(store: &'s S, book: Book, page_size: usize) -> Result<Self> {
        let tracker = ProgressTracker::new(store);
        let saved = tracker.load(book.id)?.unwrap_or(0);

        let index = OffsetIndex::new(&book.content.chapters);
        let tables = book
            .content
            .chapters
            .iter()
            .map(|chapter| PageTable::build(&chapter.content, page_size))
            .collect();

        if saved > 0 && saved >= index.total_chars() {
            warn!(
                book_id = book.id,
                saved,
                total = index.total_chars(),
                "Saved progress is past the end of the book, starting over"
            );
        }

        let mut session = Self {
            tracker,
            book_id: book.id,
            doc: book.content,
            index,
            tables,
            chapter: 0,
            page: 1,
            global_offset: 0,
        };
        let location = session.index.locate(saved).unwrap_or_default();
        session.place(location);
        Ok(session)
    }

    fn place(&mut self, location: Location) {
        // An offset never resolves into an empty chapter, except the default
        // location used for stale progress.
        let location = match self.readable_from(location.chapter) {
            Some(chapter) if chapter != location.chapter => Location {
                chapter,
                intra_offset: 0,
            },
            _ => location,
        };
        self.chapter = location.chapter;
        self.page = self
            .tables
            .get(location.chapter)
            .map_or(1, |table| table.page_containing(location.intra_offset));
        self.global_offset = self.index.to_global(location.chapter, location.intra_offset);
    }

    fn commit(&mut self, chapter: usize, page: usize, intra_offset: usize) -> Result<bool> {
        self.chapter = chapter;
        self.page = page;
        self.global_offset = self.index.to_global(chapter, intra_offset);
        self.tracker.save(self.book_id, self.global_offset)?;
        Ok(true)
    }

    fn table(&self, chapter: usize) -> Option<&PageTable> {
        self.tables.get(chapter)
    }

    /// First chapter at or after `chapter` with any text.
    ///
    /// Empty chapters (a volume heading directly followed by a chapter
    /// heading) share their start offset with the next chapter, so a
    /// position inside one could not be saved. Navigation skips them.
    fn readable_from(&self, chapter: usize) -> Option<usize> {
        (chapter..self.tables.len()).find(|&c| !self.tables[c].is_empty())
    }

    /// Last chapter at or before `chapter` with any text.
    fn readable_until(&self, chapter: usize) -> Option<usize> {
        (0..=chapter)
            .rev()
            .find(|&c| self.tables.get(c).is_some_and(|t| !t.is_empty()))
    }

    pub fn book_id(&self) -> i64 {
        self.book_id
    }

    pub fn doc(&self) -> &ChapterDoc {
        &self.doc
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.doc.chapters.get(self.chapter)
    }

    pub fn position(&self) -> ReadingPosition {
        ReadingPosition {
            chapter: self.chapter,
            page: self.page,
            page_count: self.chapter_page_count(self.chapter),
            global_offset: self.global_offset,
            percent: percent_read(self.global_offset, self.index.total_chars()),
        }
    }

    /// Pages in `chapter` (0-based); `0` for an empty or unknown chapter.
    pub fn chapter_page_count(&self, chapter: usize) -> usize {
        self.table(chapter).map_or(0, PageTable::len)
    }

    /// Paragraphs of the current page.
    pub fn current_page(&self) -> Vec<String> {
        match (self.current_chapter(), self.table(self.chapter)) {
            (Some(chapter), Some(table)) => table.paragraphs(&chapter.content, self.page),
            _ => Vec::new(),
        }
    }

    /// Jump to the first page of `chapter` (0-based). An empty chapter
    /// resolves to the next chapter with text, or the previous one when
    /// nothing follows.
    pub fn goto_chapter(&mut self, chapter: usize) -> Result<bool> {
        if chapter >= self.doc.chapters.len() {
            return Ok(false);
        }
        let target = self
            .readable_from(chapter)
            .or_else(|| self.readable_until(chapter));
        match target {
            Some(target) => self.commit(target, 1, 0),
            None => Ok(false),
        }
    }

    pub fn next_chapter(&mut self) -> Result<bool> {
        match self.readable_from(self.chapter + 1) {
            Some(next) => self.commit(next, 1, 0),
            None => Ok(false),
        }
    }

    pub fn prev_chapter(&mut self) -> Result<bool> {
        match self.chapter.checked_sub(1).and_then(|c| self.readable_until(c)) {
            Some(prev) => self.commit(prev, 1, 0),
            None => Ok(false),
        }
    }

    /// Turn to 1-based `page` of the current chapter. Page 0 moves to the
    /// previous chapter's last page and a page past the end moves to the
    /// next chapter's first page. Returns whether the position changed.
    pub fn turn_to(&mut self, page: usize) -> Result<bool> {
        let pages = self.chapter_page_count(self.chapter);
        if pages == 0 {
            return Ok(false);
        }

        if page == 0 {
            let Some(prev) = self.chapter.checked_sub(1).and_then(|c| self.readable_until(c)) else {
                return Ok(false);
            };
            let (last_page, start) = self
                .table(prev)
                .map_or((1, 0), |t| (t.len(), t.last_page_start()));
            return self.commit(prev, last_page, start);
        }

        if page > pages {
            return match self.readable_from(self.chapter + 1) {
                Some(next) => self.commit(next, 1, 0),
                None => Ok(false),
            };
        }

        let start = self.table(self.chapter).map_or(0, |t| t.page_start(page));
        self.commit(self.chapter, page, start)
    }

    pub fn next_page(&mut self) -> Result<bool> {
        self.turn_to(self.page + 1)
    }

    pub fn prev_page(&mut self) -> Result<bool> {
        self.turn_to(self.page - 1)
    }
}
