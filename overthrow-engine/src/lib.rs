#![warn(unused_crate_dependencies)]
pub mod action;
mod coins;
mod current_player;
pub mod deck;
mod game;
pub use game::match_to_indices;
pub mod machine;
pub mod players;
