//! Bot decision policies, grounded in `examples/original_source/src/
//! client/bots.py`'s `TestBot.choose_message` (`random.choice` over
//! `possible_messages`) and `CoupBot`'s stubbed-out "always coup when
//! legal" intent (`bots.py`'s `CoupBot` is an unimplemented
//! `NotImplementedError` placeholder; `Coup` below is the filled-in
//! version `SPEC_FULL.md` §6 asks for).
//!
//! Every policy chooses from an already-legal, already-un-banned
//! candidate list (`Participant::legal_replies`, filtered by the caller
//! to drop anything the referee just answered ILLEGAL to), so none of
//! these can themselves produce an illegal reply.

use crate::participant::Participant;
use clap::ValueEnum;
use overthrow_types::wire::GameMessage;
use rand::seq::SliceRandom;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BotKind {
    /// Uniform pick over the legal set.
    Random,
    /// Never bluffs or speculatively blocks/challenges; acts on claims it
    /// actually holds the card for, otherwise takes Income.
    Honest,
    /// Deterministic first-legal-reply, for repeatable integration tests.
    Test,
    /// Coups whenever a legal coup target exists, else behaves like `Random`.
    Coup,
}

impl BotKind {
    pub fn choose(self, participant: &Participant, candidates: &[String]) -> String {
        match self {
            BotKind::Random => random_choice(candidates),
            BotKind::Test => candidates
                .first()
                .cloned()
                .expect("caller only invokes choose with a non-empty candidate list"),
            BotKind::Coup => coup_choice(candidates).unwrap_or_else(|| random_choice(candidates)),
            BotKind::Honest => honest_choice(participant, candidates).unwrap_or_else(|| random_choice(candidates)),
        }
    }
}

fn random_choice(candidates: &[String]) -> String {
    candidates
        .choose(&mut rand::thread_rng())
        .cloned()
        .expect("caller only invokes choose with a non-empty candidate list")
}

fn coup_choice(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|line| matches!(GameMessage::parse(line.as_str()), Ok(GameMessage::Act { action, .. }) if action == overthrow_types::wire::ActionLetter::Coup))
        .cloned()
}

/// Prefers OK over CHAL/BLOCK (never bluffs a reaction), and on its own
/// turn prefers an action backed by a card it actually holds.
fn honest_choice(participant: &Participant, candidates: &[String]) -> Option<String> {
    if let Some(ok) = candidates.iter().find(|line| line.as_str() == "OK") {
        return Some(ok.clone());
    }

    candidates
        .iter()
        .find(|line| match GameMessage::parse(line.as_str()) {
            Ok(GameMessage::Act { action, .. }) => holds_claim(participant, action),
            _ => false,
        })
        .or_else(|| {
            candidates.iter().find(|line| {
                matches!(
                    GameMessage::parse(line.as_str()),
                    Ok(GameMessage::Act { action: overthrow_types::wire::ActionLetter::Income, .. })
                )
            })
        })
        .cloned()
}

fn holds_claim(participant: &Participant, action: overthrow_types::wire::ActionLetter) -> bool {
    use overthrow_types::Card;
    use overthrow_types::wire::ActionLetter;
    let needed = match action {
        ActionLetter::Tax => Card::Duke,
        ActionLetter::Exchange => Card::Ambassador,
        ActionLetter::Steal => Card::Captain,
        ActionLetter::Assassinate => Card::Assassin,
        ActionLetter::Income | ActionLetter::ForeignAid | ActionLetter::Coup => return true,
    };
    participant.sim.hand.contains(&needed)
}
