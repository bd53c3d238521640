use novelshelf::{
    cli::{Cli, Command},
    config::Config,
    importer::{self, ImportOptions},
    library::{self, LibraryQuery},
    logging::{self, LogLevel},
    progress::ReadingSession,
    state::{BookStore, State},
};

use clap::Parser;
use eyre::{Result, WrapErr, bail, eyre};
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogLevel::from_flags(cli.verbose, cli.debug));

    let config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::new()?,
    };
    let database = config.database_path();
    let store = State::open(&database)
        .wrap_err_with(|| format!("could not open {}", database.display()))?;
    info!(database = %database.display(), "Book store ready");

    let page_size = config.settings.page_size;
    match cli.command {
        Command::Import { path, encoding } => {
            let mut options = config.import_options();
            if encoding.is_some() {
                options.encoding = encoding;
            }
            import(&store, &path, options)
        }
        Command::List { filter, sort } => {
            let query = LibraryQuery {
                filter,
                sort: sort.unwrap_or(config.settings.library_sort),
            };
            list(&store, &query)
        }
        Command::Read { id, chapter, page } => navigate(&store, id, page_size, |session| {
            jump(session, chapter, page)
        }),
        Command::Next { id } => navigate(&store, id, page_size, |s| {
            s.next_page()?;
            Ok(())
        }),
        Command::Prev { id } => navigate(&store, id, page_size, |s| {
            s.prev_page()?;
            Ok(())
        }),
        Command::NextChapter { id } => navigate(&store, id, page_size, |s| {
            s.next_chapter()?;
            Ok(())
        }),
        Command::PrevChapter { id } => navigate(&store, id, page_size, |s| {
            s.prev_chapter()?;
            Ok(())
        }),
        Command::Chapters { id } => chapters(&store, id),
        Command::Delete { id } => {
            let book = find_book(&store, id)?;
            store.delete(id)?;
            println!("Deleted {} ({})", book.title, id);
            Ok(())
        }
        Command::Dump { id } => dump(&store, id),
    }
}

fn import(store: &State, path: &Path, options: ImportOptions) -> Result<()> {
    let mut task = importer::spawn_import(path, options);
    let source = task.path().to_path_buf();
    let progress = task.take_progress();
    let reporter = std::thread::spawn(move || {
        for pct in progress.into_iter().flatten() {
            eprint!("\rImporting... {pct:>3}%");
        }
        eprintln!();
    });

    let result = task.finish(store);
    let _ = reporter.join();
    let imported = result.wrap_err_with(|| format!("failed to import {}", source.display()))?;

    let verb = if imported.replaced { "Updated" } else { "Imported" };
    println!(
        "{} [{}] {} ({} chapters)",
        verb, imported.id, imported.title, imported.chapter_count
    );
    Ok(())
}

fn list(store: &State, query: &LibraryQuery) -> Result<()> {
    let books = library::list_books(store, query)?;
    if books.is_empty() {
        println!("No books on the shelf");
        return Ok(());
    }
    for book in books {
        let author = if book.author.is_empty() { "-" } else { &book.author };
        println!(
            "[{}] {} / {}  {:>3}%  {}",
            book.id,
            book.title,
            author,
            book.percent,
            book.current_chapter.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn find_book(store: &State, id: i64) -> Result<novelshelf::models::Book> {
    store
        .find_by_id(id)?
        .ok_or_else(|| eyre!(novelshelf::Error::NotFound(id)))
}

fn navigate<F>(store: &State, id: i64, page_size: usize, action: F) -> Result<()>
where
    F: FnOnce(&mut ReadingSession<'_, State>) -> Result<()>,
{
    let book = find_book(store, id)?;
    let mut session = ReadingSession::open(store, book, page_size)?;
    action(&mut session)?;
    render(&session);
    Ok(())
}

/// Explicit jump for `read`. Out-of-range numbers are rejected before
/// anything is saved.
fn jump(session: &mut ReadingSession<'_, State>, chapter: Option<usize>, page: Option<usize>) -> Result<()> {
    let chapters = session.doc().chapters.len();
    let target = match chapter {
        Some(n) if (1..=chapters).contains(&n) => n - 1,
        Some(n) => bail!("chapter {n} is out of range (1-{chapters})"),
        None => session.position().chapter,
    };

    if let Some(page) = page {
        let pages = session.chapter_page_count(target);
        if !(1..=pages).contains(&page) {
            bail!(
                "page {page} is out of range for chapter {} (1-{pages})",
                target + 1
            );
        }
    }

    if chapter.is_some() {
        session.goto_chapter(target)?;
    }
    if let Some(page) = page {
        session.turn_to(page)?;
    }
    Ok(())
}

fn render(session: &ReadingSession<'_, State>) {
    let doc = session.doc();
    let pos = session.position();
    println!("{}", doc.title);
    if let Some(chapter) = session.current_chapter() {
        if pos.page == 1 {
            println!("\n{}\n", chapter.title);
        }
        for paragraph in session.current_page() {
            println!("{paragraph}\n");
        }
    }
    println!(
        "-- chapter {}/{}  page {}/{}  {}% --",
        pos.chapter + 1,
        doc.chapters.len(),
        pos.page,
        pos.page_count,
        pos.percent
    );
}

fn chapters(store: &State, id: i64) -> Result<()> {
    let book = find_book(store, id)?;
    let saved = store.find_progress(id)?.map(|p| p.global_offset);
    println!("{}", book.title);
    for entry in library::table_of_contents(&book, saved) {
        let marker = if entry.current { '*' } else { ' ' };
        println!("{} {:>4}  {}", marker, entry.position + 1, entry.title);
    }
    Ok(())
}

fn dump(store: &State, id: i64) -> Result<()> {
    let book = find_book(store, id)?;
    println!("{}", book.content.title);
    if !book.content.author.is_empty() {
        println!("作者：{}", book.content.author);
    }
    for chapter in &book.content.chapters {
        println!("\n{}\n{}", chapter.title, chapter.content);
    }
    Ok(())
}
