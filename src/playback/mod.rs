//! Single-slot playback: the player seam, the slot state machine, the
//! progress ticker and the symphonia-backed player.

mod backend;
mod slot;
mod symphonia_backend;
mod ticker;

pub use backend::*;
pub use slot::*;
pub use symphonia_backend::*;
pub use ticker::*;
