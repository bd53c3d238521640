use crate::error::{Error, Result};
use crate::models::{Book, ChapterDoc, NewBook, ReadingProgress, SyncStatus};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::debug;

/// Durable storage for books and their reading progress.
///
/// Rows are always read and replaced whole; there are no partial updates.
pub trait BookStore {
    fn insert(&self, book: &NewBook<'_>) -> Result<i64>;
    fn find_by_path(&self, path: &str) -> Result<Option<Book>>;
    fn find_by_id(&self, id: i64) -> Result<Option<Book>>;
    /// Most recently updated first.
    fn list_all(&self) -> Result<Vec<Book>>;
    fn update(&self, id: i64, title: &str, author: &str, content: &ChapterDoc) -> Result<()>;
    /// Replace a book's content and reset its progress to 0 in one step.
    fn replace(&self, id: i64, title: &str, author: &str, content: &ChapterDoc) -> Result<()>;
    fn delete(&self, id: i64) -> Result<()>;
    fn upsert_progress(&self, book_id: i64, global_offset: usize) -> Result<()>;
    fn find_progress(&self, book_id: i64) -> Result<Option<ReadingProgress>>;
    fn set_sync_status(&self, book_id: i64, status: SyncStatus) -> Result<()>;
}

/// SQLite-backed [`BookStore`].
pub struct State {
    conn: Connection,
}

const BOOK_COLUMNS: &str =
    "id, title, author, file_path, cover_path, content, created_at, updated_at";

impl State {
    pub fn open(filepath: &Path) -> Result<Self> {
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(filepath)?;
        Self::init_db(&conn)?;
        debug!(path = %filepath.display(), "Opened book store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_db(&conn)?;
        Ok(Self { conn })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS novels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                file_path TEXT NOT NULL UNIQUE,
                cover_path TEXT,
                content TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reading_progress (
                novel_id INTEGER PRIMARY KEY,
                global_offset INTEGER NOT NULL DEFAULT 0,
                last_read_at DATETIME NOT NULL,
                sync_status INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (novel_id) REFERENCES novels(id)
                ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    fn book_from_row(row: &Row<'_>) -> rusqlite::Result<(Book, String)> {
        let content: String = row.get(5)?;
        let book = Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            file_path: row.get(3)?,
            cover_path: row.get(4)?,
            content: ChapterDoc::new("", "", Vec::new()),
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        };
        Ok((book, content))
    }

    fn hydrate((mut book, content): (Book, String)) -> Result<Book> {
        book.content = ChapterDoc::from_json(&content)?;
        Ok(book)
    }

    fn query_one(&self, sql: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Book>> {
        let row = self
            .conn
            .query_row(sql, [param], Self::book_from_row)
            .optional()?;
        row.map(Self::hydrate).transpose()
    }
}

fn update_book(conn: &Connection, id: i64, title: &str, author: &str, content: &ChapterDoc) -> Result<()> {
    let changed = conn.execute(
        "UPDATE novels SET title = ?, author = ?, content = ?, updated_at = ? WHERE id = ?",
        params![title, author, content.to_json()?, Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(id));
    }
    Ok(())
}

fn upsert_progress_row(conn: &Connection, book_id: i64, global_offset: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO reading_progress (novel_id, global_offset, last_read_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(novel_id) DO UPDATE SET
            global_offset = excluded.global_offset,
            last_read_at = excluded.last_read_at",
        params![book_id, global_offset as i64, Utc::now()],
    )?;
    Ok(())
}

impl BookStore for State {
    fn insert(&self, book: &NewBook<'_>) -> Result<i64> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO novels (title, author, file_path, cover_path, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                book.title,
                book.author,
                book.file_path,
                book.cover_path,
                book.content.to_json()?,
                now,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_by_path(&self, path: &str) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM novels WHERE file_path = ?");
        self.query_one(&sql, &path)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM novels WHERE id = ?");
        self.query_one(&sql, &id)
    }

    fn list_all(&self) -> Result<Vec<Book>> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM novels ORDER BY updated_at DESC, id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::book_from_row)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(Self::hydrate(row?)?);
        }
        Ok(books)
    }

    fn update(&self, id: i64, title: &str, author: &str, content: &ChapterDoc) -> Result<()> {
        update_book(&self.conn, id, title, author, content)
    }

    fn replace(&self, id: i64, title: &str, author: &str, content: &ChapterDoc) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        update_book(&tx, id, title, author, content)?;
        upsert_progress_row(&tx, id, 0)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM novels WHERE id = ?", params![id])?;
        Ok(())
    }

    fn upsert_progress(&self, book_id: i64, global_offset: usize) -> Result<()> {
        upsert_progress_row(&self.conn, book_id, global_offset)
    }

    fn find_progress(&self, book_id: i64) -> Result<Option<ReadingProgress>> {
        let progress = self
            .conn
            .query_row(
                "SELECT novel_id, global_offset, last_read_at, sync_status
                 FROM reading_progress WHERE novel_id = ?",
                params![book_id],
                |row| {
                    let offset: i64 = row.get(1)?;
                    let status: i64 = row.get(3)?;
                    Ok(ReadingProgress {
                        book_id: row.get(0)?,
                        global_offset: usize::try_from(offset).unwrap_or(0),
                        last_read_at: row.get(2)?,
                        sync_status: SyncStatus::from_i64(status),
                    })
                },
            )
            .optional()?;
        Ok(progress)
    }

    fn set_sync_status(&self, book_id: i64, status: SyncStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE reading_progress SET sync_status = ? WHERE novel_id = ?",
            params![status.as_i64(), book_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chapter;
    use tempfile::TempDir;

    fn doc(title: &str, body: &str) -> ChapterDoc {
        ChapterDoc::new(
            title,
            "作者甲",
            vec![Chapter {
                index: 1,
                title: "第一章 开始".to_string(),
                content: body.to_string(),
            }],
        )
    }

    fn insert(state: &State, path: &str, title: &str) -> i64 {
        let content = doc(title, "正文");
        state
            .insert(&NewBook {
                title,
                author: "作者甲",
                file_path: path,
                cover_path: None,
                content: &content,
            })
            .unwrap()
    }

    fn setup_test_state() -> (State, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = State::open(&temp_dir.path().join("test_novels.db")).unwrap();
        (state, temp_dir)
    }

    #[test]
    fn test_state_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("init.db");
        assert!(!db_path.exists());
        let state = State::open(&db_path).unwrap();
        assert!(db_path.exists());

        let mut stmt = state.conn.prepare("PRAGMA table_info(reading_progress)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert!(columns.contains(&"global_offset".to_string()));
        assert!(columns.contains(&"sync_status".to_string()));
    }

    #[test]
    fn test_insert_and_find() {
        let (state, _temp_dir) = setup_test_state();
        let id = insert(&state, "/books/a.txt", "甲书");

        let by_id = state.find_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.title, "甲书");
        assert_eq!(by_id.author, "作者甲");
        assert_eq!(by_id.file_path, "/books/a.txt");
        assert_eq!(by_id.cover_path, None);
        assert_eq!(by_id.content, doc("甲书", "正文"));

        let by_path = state.find_by_path("/books/a.txt").unwrap().unwrap();
        assert_eq!(by_path.id, id);

        assert!(state.find_by_path("/books/missing.txt").unwrap().is_none());
        assert!(state.find_by_id(id + 100).unwrap().is_none());
    }

    #[test]
    fn test_list_all_most_recent_first() {
        let (state, _temp_dir) = setup_test_state();
        let first = insert(&state, "/books/1.txt", "一");
        let second = insert(&state, "/books/2.txt", "二");

        let ids: Vec<i64> = state.list_all().unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second, first]);

        std::thread::sleep(std::time::Duration::from_millis(10));
        state.update(first, "一改", "", &doc("一改", "新")).unwrap();

        let books = state.list_all().unwrap();
        assert_eq!(books[0].id, first);
        assert_eq!(books[0].title, "一改");
        assert_eq!(books[0].content.chapters[0].content, "新");
        assert!(books[0].updated_at >= books[0].created_at);
    }

    #[test]
    fn test_update_missing_book() {
        let (state, _temp_dir) = setup_test_state();
        match state.update(99, "t", "a", &doc("t", "x")) {
            Err(Error::NotFound(id)) => assert_eq!(id, 99),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_file_path_is_unique() {
        let (state, _temp_dir) = setup_test_state();
        insert(&state, "/books/dup.txt", "一");
        let content = doc("二", "x");
        let result = state.insert(&NewBook {
            title: "二",
            author: "",
            file_path: "/books/dup.txt",
            cover_path: Some("/covers/dup.png"),
            content: &content,
        });
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[test]
    fn test_progress_upsert() {
        let (state, _temp_dir) = setup_test_state();
        let id = insert(&state, "/books/p.txt", "进度");

        assert!(state.find_progress(id).unwrap().is_none());

        state.upsert_progress(id, 120).unwrap();
        let progress = state.find_progress(id).unwrap().unwrap();
        assert_eq!(progress.book_id, id);
        assert_eq!(progress.global_offset, 120);
        assert_eq!(progress.sync_status, SyncStatus::Local);

        state.upsert_progress(id, 7).unwrap();
        assert_eq!(state.find_progress(id).unwrap().unwrap().global_offset, 7);

        state.set_sync_status(id, SyncStatus::Synced).unwrap();
        state.upsert_progress(id, 9).unwrap();
        let progress = state.find_progress(id).unwrap().unwrap();
        assert_eq!(progress.global_offset, 9);
        assert_eq!(progress.sync_status, SyncStatus::Synced);
    }

    #[test]
    fn test_delete_cascades_progress() {
        let (state, _temp_dir) = setup_test_state();
        let keep = insert(&state, "/books/keep.txt", "留");
        let gone = insert(&state, "/books/gone.txt", "删");
        state.upsert_progress(keep, 1).unwrap();
        state.upsert_progress(gone, 2).unwrap();

        state.delete(gone).unwrap();

        assert!(state.find_by_id(gone).unwrap().is_none());
        assert!(state.find_progress(gone).unwrap().is_none());
        assert_eq!(state.find_progress(keep).unwrap().unwrap().global_offset, 1);
        assert_eq!(state.list_all().unwrap().len(), 1);

        assert!(state.delete(gone).is_ok());
    }

    #[test]
    fn test_corrupt_content_surfaces_error() {
        let state = State::open_in_memory().unwrap();
        let now = Utc::now();
        state
            .conn
            .execute(
                "INSERT INTO novels (title, author, file_path, content, created_at, updated_at)
                 VALUES ('坏', '', '/bad.txt', 'not json', ?, ?)",
                params![now, now],
            )
            .unwrap();
        assert!(matches!(
            state.find_by_path("/bad.txt"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_replace_resets_progress() {
        let (state, _temp_dir) = setup_test_state();
        let id = insert(&state, "/books/a.txt", "旧书");
        state.upsert_progress(id, 7).unwrap();

        state.replace(id, "新书", "作者乙", &doc("新书", "新的正文")).unwrap();
        let book = state.find_by_id(id).unwrap().unwrap();
        assert_eq!(book.title, "新书");
        assert_eq!(book.content.chapters[0].content, "新的正文");
        assert_eq!(state.find_progress(id).unwrap().unwrap().global_offset, 0);

        assert!(matches!(
            state.replace(id + 1, "无", "", &doc("无", "")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_progress_reset_keeps_old_content() {
        let (state, _temp_dir) = setup_test_state();
        let id = insert(&state, "/books/a.txt", "旧书");
        state.upsert_progress(id, 7).unwrap();
        state
            .conn
            .execute_batch(
                "CREATE TRIGGER lock_progress_insert BEFORE INSERT ON reading_progress
                 BEGIN SELECT RAISE(ABORT, 'progress locked'); END;
                 CREATE TRIGGER lock_progress_update BEFORE UPDATE ON reading_progress
                 BEGIN SELECT RAISE(ABORT, 'progress locked'); END;",
            )
            .unwrap();

        let result = state.replace(id, "新书", "作者乙", &doc("新书", "新的正文"));
        assert!(matches!(result, Err(Error::Store(_))));

        let book = state.find_by_id(id).unwrap().unwrap();
        assert_eq!(book.title, "旧书");
        assert_eq!(book.content.chapters[0].content, "正文");
        assert_eq!(state.find_progress(id).unwrap().unwrap().global_offset, 7);
    }
}
