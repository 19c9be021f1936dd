pub mod channel;
pub mod events;
pub mod player;
pub mod tracks;

pub use channel::*;
pub use events::*;
pub use player::*;
pub use tracks::*;
