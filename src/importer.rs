//! Importing a plain-text novel into the store.
//!
//! Reading, decoding and segmenting run on a worker thread that reports
//! percentages over a channel. Persisting happens in [`ImportTask::finish`] on
//! the caller's thread, so a failed or cancelled import never leaves a
//! partial book behind.

use crate::cancellation::CancellationToken;
use crate::decoder;
use crate::error::{Error, Result};
use crate::models::{ChapterDoc, NewBook};
use crate::segmenter;
use crate::state::BookStore;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

const DECODED_PCT: u8 = 10;
const SEGMENTED_PCT: u8 = 90;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Encoding label that overrides detection, e.g. `"gbk"`.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBook {
    pub id: i64,
    pub title: String,
    /// The serialized chapter document, as persisted.
    pub content: String,
    pub chapter_count: usize,
    /// `true` when an existing book at the same path was replaced.
    pub replaced: bool,
}

/// Forwards monotonic percentages, dropping repeats and regressions.
struct ProgressSink {
    sender: Sender<u8>,
    last: Option<u8>,
}

impl ProgressSink {
    fn new(sender: Sender<u8>) -> Self {
        Self { sender, last: None }
    }

    fn emit(&mut self, pct: u8) {
        if self.last.is_some_and(|last| pct <= last) {
            return;
        }
        self.last = Some(pct);
        // The receiver may have gone away; the import carries on regardless.
        let _ = self.sender.send(pct);
    }
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parse_file(
    path: &Path,
    options: &ImportOptions,
    token: &CancellationToken,
    sink: &mut ProgressSink,
) -> Result<ChapterDoc> {
    sink.emit(0);
    let bytes = std::fs::read(path)?;
    token.check_cancelled("read")?;

    let decoded = decoder::decode_with_label(&bytes, options.encoding.as_deref())?;
    debug!(path = %path.display(), encoding = decoded.encoding, "Decoded text");
    sink.emit(DECODED_PCT);

    let span = u64::from(SEGMENTED_PCT - DECODED_PCT);
    let doc = segmenter::segment_with_progress(
        &decoded.text,
        &fallback_title(path),
        token,
        |done, total| {
            if total > 0 {
                let scaled = (done as u64 * span / total as u64) as u8;
                sink.emit(DECODED_PCT + scaled);
            }
        },
    )?;
    sink.emit(SEGMENTED_PCT);

    if doc.chapters.is_empty() {
        return Err(Error::NoContent {
            path: path.to_path_buf(),
        });
    }
    Ok(doc)
}

/// Insert `doc` for `path`, or replace the book already stored there and
/// reset its progress.
pub fn persist<S: BookStore + ?Sized>(store: &S, path: &Path, doc: &ChapterDoc) -> Result<ImportedBook> {
    let file_path = path.to_string_lossy();
    let content = doc.to_json()?;

    let (id, replaced) = match store.find_by_path(&file_path)? {
        Some(existing) => {
            store.replace(existing.id, &doc.title, &doc.author, doc)?;
            (existing.id, true)
        }
        None => {
            let id = store.insert(&NewBook {
                title: &doc.title,
                author: &doc.author,
                file_path: &file_path,
                cover_path: None,
                content: doc,
            })?;
            (id, false)
        }
    };

    info!(
        id,
        title = %doc.title,
        chapters = doc.chapters.len(),
        replaced,
        "Imported novel"
    );
    Ok(ImportedBook {
        id,
        title: doc.title.clone(),
        content,
        chapter_count: doc.chapters.len(),
        replaced,
    })
}

fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// A running import. Subscribe with [`ImportTask::take_progress`] and
/// call [`ImportTask::finish`] to store the result.
pub struct ImportTask {
    path: PathBuf,
    token: CancellationToken,
    progress: Option<Receiver<u8>>,
    sender: Sender<u8>,
    handle: JoinHandle<Result<ChapterDoc>>,
}

pub fn spawn_import(path: &Path, options: ImportOptions) -> ImportTask {
    let path = normalize_path(path);
    let token = CancellationToken::new();
    let (sender, progress) = mpsc::channel();

    let worker_path = path.clone();
    let worker_token = token.clone();
    let mut sink = ProgressSink::new(sender.clone());
    let handle = thread::spawn(move || parse_file(&worker_path, &options, &worker_token, &mut sink));

    info!(path = %path.display(), "Started import");
    ImportTask {
        path,
        token,
        progress: Some(progress),
        sender,
        handle,
    }
}

impl ImportTask {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The percentage stream, ending with `100` once the book is stored.
    /// It can be taken only once.
    pub fn take_progress(&mut self) -> Option<Receiver<u8>> {
        self.progress.take()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the worker, then store the book and report `100`.
    pub fn finish<S: BookStore + ?Sized>(self, store: &S) -> Result<ImportedBook> {
        let doc = match self.handle.join() {
            Ok(result) => result?,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        self.token.check_cancelled("persist")?;
        let imported = persist(store, &self.path, &doc)?;
        let _ = self.sender.send(100);
        Ok(imported)
    }
}

/// Import `path` synchronously.
pub fn import_file<S: BookStore + ?Sized>(
    store: &S,
    path: &Path,
    options: ImportOptions,
) -> Result<ImportedBook> {
    spawn_import(path, options).finish(store)
}

/// Entry point for a file picker: `None` means nothing was chosen.
pub fn import_selection<S: BookStore + ?Sized>(
    store: &S,
    selection: Option<&Path>,
    options: ImportOptions,
) -> Result<Option<ImportedBook>> {
    selection
        .map(|path| import_file(store, path, options))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use std::fs;
    use tempfile::TempDir;

    const NOVEL: &str = "《风起》\n作者：某人\n\n第一章 开始\n第一行\n第二行\n第二章 继续\n第三行\n";

    fn write_novel(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_import_new_book() {
        let dir = TempDir::new().unwrap();
        let path = write_novel(&dir, "风起.txt", NOVEL);
        let store = State::open_in_memory().unwrap();

        let imported = import_file(&store, &path, ImportOptions::default()).unwrap();
        assert_eq!(imported.title, "风起");
        assert_eq!(imported.chapter_count, 2);
        assert!(!imported.replaced);

        let book = store.find_by_id(imported.id).unwrap().unwrap();
        assert_eq!(book.author, "某人");
        assert_eq!(book.content.chapters[0].content, "第一行\n第二行");
        assert_eq!(ChapterDoc::from_json(&imported.content).unwrap(), book.content);
    }

    #[test]
    fn test_progress_events_are_monotonic_and_end_at_100() {
        let dir = TempDir::new().unwrap();
        let path = write_novel(&dir, "a.txt", NOVEL);
        let store = State::open_in_memory().unwrap();

        let mut task = spawn_import(&path, ImportOptions::default());
        let events = task.take_progress().unwrap();
        assert!(task.take_progress().is_none());
        task.finish(&store).unwrap();

        let seen: Vec<u8> = events.iter().collect();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
    }

    #[test]
    fn test_cancelled_import_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let path = write_novel(&dir, "b.txt", &NOVEL.repeat(50));
        let store = State::open_in_memory().unwrap();

        let task = spawn_import(&path, ImportOptions::default());
        task.cancel();
        let result = task.finish(&store);

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_reimport_updates_and_resets_progress() {
        let dir = TempDir::new().unwrap();
        let path = write_novel(&dir, "c.txt", NOVEL);
        let store = State::open_in_memory().unwrap();

        let first = import_file(&store, &path, ImportOptions::default()).unwrap();
        store.upsert_progress(first.id, 5).unwrap();

        fs::write(&path, "《新风》\n第一章 重写\n全新的内容\n").unwrap();
        let second = import_file(&store, &path, ImportOptions::default()).unwrap();

        assert_eq!(second.id, first.id);
        assert!(second.replaced);
        assert_eq!(store.list_all().unwrap().len(), 1);
        let book = store.find_by_id(first.id).unwrap().unwrap();
        assert_eq!(book.title, "新风");
        assert_eq!(book.content.chapters.len(), 1);
        assert_eq!(store.find_progress(first.id).unwrap().unwrap().global_offset, 0);
    }

    #[test]
    fn test_no_headings_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_novel(&dir, "d.txt", "《无章》\n只有正文\n");
        let store = State::open_in_memory().unwrap();

        let result = import_file(&store, &path, ImportOptions::default());
        assert!(matches!(result, Err(Error::NoContent { .. })));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_declared_gbk_encoding() {
        let dir = TempDir::new().unwrap();
        let (bytes, _, _) = encoding_rs::GBK.encode(NOVEL);
        let path = dir.path().join("gbk.txt");
        fs::write(&path, &bytes).unwrap();
        let store = State::open_in_memory().unwrap();

        let options = ImportOptions {
            encoding: Some("gbk".to_string()),
        };
        let imported = import_file(&store, &path, options).unwrap();
        assert_eq!(imported.title, "风起");
        assert_eq!(imported.chapter_count, 2);
    }

    #[test]
    fn test_decode_failure_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, [0x61, 0xFF, 0xFE, 0x62]).unwrap();
        let store = State::open_in_memory().unwrap();

        let options = ImportOptions {
            encoding: Some("utf-8".to_string()),
        };
        let result = import_file(&store, &path, options);
        assert!(matches!(result, Err(Error::Decode { .. })));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let store = State::open_in_memory().unwrap();
        let result = import_file(&store, Path::new("/nonexistent/novel.txt"), ImportOptions::default());
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_no_selection() {
        let store = State::open_in_memory().unwrap();
        let result = import_selection(&store, None, ImportOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_fallback_title_uses_file_stem() {
        assert_eq!(fallback_title(Path::new("/books/我的小说.txt")), "我的小说");
        assert_eq!(fallback_title(Path::new("plain")), "plain");
    }

    #[test]
    fn test_progress_sink_drops_regressions() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ProgressSink::new(tx);
        for pct in [0, 0, 10, 5, 50, 50, 90] {
            sink.emit(pct);
        }
        drop(sink);
        let seen: Vec<u8> = rx.iter().collect();
        assert_eq!(seen, vec![0, 10, 50, 90]);
    }
}
