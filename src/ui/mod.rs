//! Line-oriented terminal front end: argument parsing, REPL commands and
//! rendering of the item list.

mod cli;
mod render;

pub use cli::*;
pub use render::*;
