pub mod sim;
pub mod wire;

pub use overthrow_engine::{
    action::{Action, Blocks, Challenge, Reaction},
    deck::Card,
    machine::{Outcome, Summary},
    players::PlayerId,
};
