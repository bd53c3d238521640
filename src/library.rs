use crate::error::Result;
use crate::models::{Book, SortKey};
use crate::offset::OffsetIndex;
use crate::progress::percent_read;
use crate::state::BookStore;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub file_path: String,
    pub updated_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    /// Heading of the chapter the saved offset falls in.
    pub current_chapter: Option<String>,
    pub percent: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryQuery {
    /// Case-insensitive substring matched against title or author.
    pub filter: Option<String>,
    pub sort: SortKey,
}

impl LibraryQuery {
    fn matches(&self, book: &Book) -> bool {
        let Some(filter) = self.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) else {
            return true;
        };
        let needle = filter.to_lowercase();
        book.title.to_lowercase().contains(&needle) || book.author.to_lowercase().contains(&needle)
    }
}

pub fn summarize(book: &Book, global_offset: Option<usize>) -> BookSummary {
    let index = OffsetIndex::new(&book.content.chapters);
    let offset = global_offset.unwrap_or(0);
    let location = index.locate(offset).unwrap_or_default();
    let offset = index.to_global(location.chapter, location.intra_offset);

    BookSummary {
        id: book.id,
        title: book.title.clone(),
        author: book.author.clone(),
        file_path: book.file_path.clone(),
        updated_at: book.updated_at,
        last_read_at: None,
        current_chapter: book
            .content
            .chapters
            .get(location.chapter)
            .map(|chapter| chapter.title.clone()),
        percent: percent_read(offset, index.total_chars()),
    }
}

/// Books matching `query`, most recently updated first unless another sort
/// key is requested.
pub fn list_books<S: BookStore + ?Sized>(store: &S, query: &LibraryQuery) -> Result<Vec<BookSummary>> {
    let mut summaries = Vec::new();
    for book in store.list_all()?.iter().filter(|book| query.matches(book)) {
        let progress = store.find_progress(book.id)?;
        let mut summary = summarize(book, progress.as_ref().map(|p| p.global_offset));
        summary.last_read_at = progress.map(|p| p.last_read_at);
        summaries.push(summary);
    }

    match query.sort {
        SortKey::Recent => {}
        SortKey::Title => summaries.sort_by_cached_key(|s| s.title.to_lowercase()),
        SortKey::Author => summaries.sort_by_cached_key(|s| s.author.to_lowercase()),
    }
    Ok(summaries)
}

/// One line of a book's table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// 0-based chapter position.
    pub position: usize,
    pub title: String,
    pub char_len: usize,
    /// The saved offset falls in this chapter.
    pub current: bool,
}

/// Chapter titles of `book`, marking the one `global_offset` resolves to.
pub fn table_of_contents(book: &Book, global_offset: Option<usize>) -> Vec<TocEntry> {
    let index = OffsetIndex::new(&book.content.chapters);
    // Stale progress resolves to chapter 0, which may be an empty volume
    // heading; the reader opens at the first chapter with text.
    let current = index.locate(global_offset.unwrap_or(0)).map(|location| {
        (location.chapter..index.chapter_count())
            .find(|&c| index.chapter_len(c) > 0)
            .unwrap_or(location.chapter)
    });

    book.content
        .chapters
        .iter()
        .enumerate()
        .map(|(position, chapter)| TocEntry {
            position,
            title: chapter.title.clone(),
            char_len: chapter.char_len(),
            current: current == Some(position),
        })
        .collect()
}
