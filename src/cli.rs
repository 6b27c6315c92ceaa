use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use linkmirror::models::ReadingMode;

#[derive(Parser)]
#[command(name = "linkmirror")]
#[command(about = "Offline mirror of your Linkding bookmarks")]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one sync now
    Sync {
        /// Forget the last sync and enumerate every bookmark again
        #[arg(long)]
        full: bool,
    },
    /// Sync periodically until interrupted
    Watch,
    /// Show sync state and pending work
    Status,
    /// Stop scheduled syncs
    Pause,
    /// Allow scheduled syncs again
    Resume,
    /// Mark a bookmark read locally
    Read { id: i64 },
    /// Record reading progress for a bookmark
    Progress {
        id: i64,
        fraction: f64,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// List bookmarks in the local replica
    List {
        #[arg(long)]
        archived: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Readable,
    Original,
}

impl From<ModeArg> for ReadingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Readable => ReadingMode::Readable,
            ModeArg::Original => ReadingMode::Original,
        }
    }
}
