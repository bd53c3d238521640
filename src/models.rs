use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version written into every serialized [`ChapterDoc`].
pub const CHAPTER_DOC_VERSION: u32 = 1;

fn legacy_doc_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based position in the document.
    pub index: usize,
    /// The full heading line as it appeared in the source.
    pub title: String,
    pub content: String,
}

impl Chapter {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDoc {
    #[serde(default = "legacy_doc_version")]
    pub version: u32,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl ChapterDoc {
    pub fn new(title: impl Into<String>, author: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        Self {
            version: CHAPTER_DOC_VERSION,
            title: title.into(),
            author: author.into(),
            chapters,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ChapterDoc = serde_json::from_str(json)?;
        if doc.version > CHAPTER_DOC_VERSION {
            return Err(Error::UnsupportedSchema {
                found: doc.version,
                supported: CHAPTER_DOC_VERSION,
            });
        }
        Ok(doc)
    }

    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(Chapter::char_len).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub file_path: String,
    pub cover_path: Option<String>,
    pub content: ChapterDoc,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a book is first inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub file_path: &'a str,
    pub cover_path: Option<&'a str>,
    pub content: &'a ChapterDoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Local,
    Synced,
}

impl SyncStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            SyncStatus::Local => 0,
            SyncStatus::Synced => 1,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            SyncStatus::Synced
        } else {
            SyncStatus::Local
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingProgress {
    pub book_id: i64,
    /// Character position within the concatenation of all chapter contents.
    pub global_offset: usize,
    pub last_read_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Recent,
    Title,
    Author,
}
