pub mod game_state;
pub mod info;
pub mod misc;
pub mod parser;
pub mod play;
pub mod roster;
pub mod schemas;
pub mod stats;
pub mod traits;
