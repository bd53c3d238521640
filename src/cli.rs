use crate::models::SortKey;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "novelshelf",
    version,
    about = "A bookshelf and pager for plain-text novels.",
    long_about = None
)]
pub struct Cli {
    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a .txt novel, replacing any earlier import of the same file
    Import {
        #[clap(value_name = "FILE")]
        path: PathBuf,
        /// Encoding label to use instead of detection (e.g. gbk)
        #[clap(long)]
        encoding: Option<String>,
    },
    /// List the bookshelf
    List {
        /// Only books whose title or author contains this text
        #[clap(short, long)]
        filter: Option<String>,
        #[clap(short, long, value_enum)]
        sort: Option<SortKey>,
    },
    /// Show the current page, optionally jumping first
    Read {
        id: i64,
        /// 1-based chapter number
        #[clap(long)]
        chapter: Option<usize>,
        /// 1-based page within the chapter
        #[clap(long)]
        page: Option<usize>,
    },
    /// Turn to the next page
    Next { id: i64 },
    /// Turn to the previous page
    Prev { id: i64 },
    /// Jump to the start of the next chapter
    NextChapter { id: i64 },
    /// Jump to the start of the previous chapter
    PrevChapter { id: i64 },
    /// List chapter titles, marking the one being read
    Chapters { id: i64 },
    /// Remove a book and its reading progress
    Delete { id: i64 },
    /// Print every chapter of a book
    Dump { id: i64 },
}
