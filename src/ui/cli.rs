//! Command-line interface implementation

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for r-medialist
#[derive(Parser, Debug)]
#[command(author, version, about = "Media list player and downloader", long_about = None)]
pub struct Args {
    /// Catalog document URL
    #[arg(short = 'u', long, env = "MEDIALIST_CATALOG_URL")]
    pub catalog_url: Option<String>,

    /// Directory downloads are written to
    #[arg(short, long, env = "MEDIALIST_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, env = "MEDIALIST_CONFIG")]
    pub config: Option<PathBuf>,
}

/// One line typed at the prompt. Item numbers are 1-based as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    List,
    Play(usize),
    Stop(usize),
    Download(usize),
    Seek(usize, i32),
    Reload,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command '{0}'. Type 'help' for the list of commands")]
    Unknown(String),
    #[error("Missing {0}")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),
    #[error("Item numbers start at 1")]
    ZeroItem,
}

pub const HELP_TEXT: &str = "\
Commands:
  list            show the items
  play N          play item N, or stop it if it is playing
  stop N          stop item N
  download N      download item N
  seek N P        move playing item N to P percent
  reload          fetch the catalog again
  quit            exit";

fn item_number(arg: Option<&str>) -> Result<usize, CommandParseError> {
    let raw = arg.ok_or(CommandParseError::MissingArgument("item number"))?;
    let number = raw
        .parse::<usize>()
        .map_err(|_| CommandParseError::InvalidNumber(raw.to_string()))?;
    if number == 0 {
        return Err(CommandParseError::ZeroItem);
    }
    Ok(number)
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Self, CommandParseError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandParseError::Empty)?.to_lowercase();
        let command = match verb.as_str() {
            "l" | "ls" | "list" => ReplCommand::List,
            "p" | "play" => ReplCommand::Play(item_number(words.next())?),
            "s" | "stop" => ReplCommand::Stop(item_number(words.next())?),
            "d" | "download" => ReplCommand::Download(item_number(words.next())?),
            "seek" => {
                let item = item_number(words.next())?;
                let raw = words.next().ok_or(CommandParseError::MissingArgument("percent"))?;
                let percent = raw
                    .parse::<i32>()
                    .map_err(|_| CommandParseError::InvalidNumber(raw.to_string()))?;
                ReplCommand::Seek(item, percent)
            }
            "r" | "reload" => ReplCommand::Reload,
            "h" | "help" | "?" => ReplCommand::Help,
            "q" | "quit" | "exit" => ReplCommand::Quit,
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    /// The 0-based list position the command targets, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            ReplCommand::Play(n) | ReplCommand::Stop(n) | ReplCommand::Download(n) | ReplCommand::Seek(n, _) => {
                Some(n - 1)
            }
            _ => None,
        }
    }
}

/// CLI user interface for interacting with the application
pub struct Cli {
    pub args: Args,
}

impl Cli {
    pub fn new() -> Self {
        Cli { args: Args::parse() }
    }

    pub fn display_error(&self, error: &dyn std::error::Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
