//! Authoritative per-item state shared between the coordinator and observers

mod item_state;
mod table;

pub use item_state::*;
pub use table::*;
