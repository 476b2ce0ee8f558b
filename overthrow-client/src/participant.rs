//! Drives one [`PlayerSim`]'s phase forward as wire messages arrive,
//! grounded in `examples/original_source/src/client/player.py`'s
//! `InformedPlayer.pre_update_state`/`post_update_state` (the
//! message-to-phase dispatch table) and `examples/original_source/src/
//! client/game/state_machine.py`'s `Tag`. The legal-reply computation
//! itself lives in `overthrow_types::sim`; this module only tracks which
//! phase that computation should run in.
//!
//! Two differences from `player.py`'s dispatch, both forced by this
//! workspace's wire grammar rather than chosen for style:
//!
//! - COINS/DECK/PLAYER broadcasts never block on a reply here (the
//!   referee does not wait for one either), so they leave the phase at
//!   `Idle` instead of `Informational`.
//! - CHOOSE is disambiguated purely by arity against the held hand
//!   (`cards.len() > hand.len()` is an exchange draw, otherwise it's a
//!   forced reveal) since the referee sends one combined candidate set
//!   rather than a separate DECK-style "these are new" announcement.

use overthrow_types::Card;
use overthrow_types::sim::{Phase, PlayerSim};
use overthrow_types::wire::{ActionLetter, Addr, GameMessage};

#[derive(Debug, Clone, Copy)]
struct Claim {
    claimant: Addr,
    card: Card,
}

fn claim_for(action: ActionLetter) -> Option<Card> {
    match action {
        ActionLetter::Tax => Some(Card::Duke),
        ActionLetter::Exchange => Some(Card::Ambassador),
        ActionLetter::Steal => Some(Card::Captain),
        ActionLetter::Assassinate => Some(Card::Assassin),
        ActionLetter::Income | ActionLetter::ForeignAid | ActionLetter::Coup => None,
    }
}

/// The cards in `cards` that are not already in `hand`, one-for-one by
/// multiset (so two held Dukes don't cancel out two drawn Dukes).
fn multiset_diff(cards: &[Card], hand: &[Card]) -> Vec<Card> {
    let mut remaining = hand.to_vec();
    cards
        .iter()
        .filter(|&&card| match remaining.iter().position(|&c| c == card) {
            Some(i) => {
                remaining.remove(i);
                false
            }
            None => true,
        })
        .copied()
        .collect()
}

/// Tracks one player's view of the game: its [`PlayerSim`] (hand, coins,
/// phase), the opponents it has met via PLAYER, and the claim currently
/// live for a CHAL to land on (an action's implicit claim, superseded by
/// a block's claim the instant one is announced).
pub struct Participant {
    pub sim: PlayerSim,
    pub opponents: Vec<Addr>,
    current_claim: Option<Claim>,
    last_challenger: Option<Addr>,
}

impl Participant {
    pub fn new(id: Addr) -> Participant {
        Participant {
            sim: PlayerSim::new(id),
            opponents: Vec::new(),
            current_claim: None,
            last_challenger: None,
        }
    }

    pub fn legal_replies(&self) -> Vec<String> {
        self.sim.legal_replies()
    }

    /// Keeps local hand tracking in sync for replies that are never
    /// echoed back by the referee (KEEP is private; everything else the
    /// participant sends gets broadcast and is handled by [`Self::on_message`]).
    pub fn apply_own_reply(&mut self, reply: &GameMessage) {
        if let GameMessage::Keep { cards } = reply {
            self.sim.hand = cards.clone();
        }
    }

    pub fn on_message(&mut self, msg: &GameMessage) {
        if matches!(msg, GameMessage::Exit) {
            self.sim.phase = Phase::End;
            return;
        }
        if !self.sim.alive {
            self.sim.phase = Phase::Idle;
            return;
        }

        match msg {
            GameMessage::Hello | GameMessage::Ready | GameMessage::Ok | GameMessage::Illegal => {}
            GameMessage::Start => self.sim.phase = Phase::Start,
            GameMessage::Player { id } => {
                if *id != self.sim.id && !self.opponents.contains(id) {
                    self.opponents.push(*id);
                }
                self.sim.phase = Phase::Idle;
            }
            GameMessage::Coins { id, coins } => {
                if *id == self.sim.id {
                    self.sim.coins = *coins;
                }
                self.sim.phase = Phase::Idle;
            }
            GameMessage::Deck { cards } => {
                self.sim.hand = cards.clone();
                if cards.is_empty() {
                    self.sim.alive = false;
                }
                self.sim.phase = Phase::Idle;
            }
            GameMessage::Dead { id } => {
                if *id == self.sim.id {
                    self.sim.alive = false;
                }
                self.sim.phase = Phase::Idle;
            }
            GameMessage::Turn { id } => {
                if *id == self.sim.id {
                    self.sim.turn = true;
                    self.sim.phase = Phase::MyTurn { opponents: self.opponents.clone() };
                } else {
                    self.sim.turn = false;
                    self.sim.phase = Phase::OtherTurn;
                }
            }
            GameMessage::Act { id, action, target } => {
                self.current_claim = claim_for(*action).map(|card| Claim { claimant: *id, card });
                self.last_challenger = None;
                self.sim.phase = self.phase_for_act(*id, *action, *target);
            }
            GameMessage::Block { id, card } => {
                self.current_claim = Some(Claim { claimant: *id, card: *card });
                self.last_challenger = None;
                self.sim.phase = if *id == self.sim.id { Phase::Idle } else { Phase::BlockAnnounced };
            }
            GameMessage::Chal { id } => {
                self.last_challenger = Some(*id);
                self.sim.phase = if *id == self.sim.id {
                    Phase::Idle
                } else {
                    match self.current_claim {
                        Some(claim) if claim.claimant == self.sim.id => Phase::ChallengeMine { claim: claim.card },
                        Some(_) => Phase::ChallengeOther,
                        None => Phase::Idle,
                    }
                };
            }
            GameMessage::Show { id, .. } => {
                if *id == Some(self.sim.id) {
                    self.sim.phase = Phase::Idle;
                } else {
                    self.sim.phase = Phase::Show { self_challenged: self.last_challenger == Some(self.sim.id) };
                }
            }
            GameMessage::Lose { id, card } => {
                if *id == Some(self.sim.id) {
                    if let Some(card) = card {
                        self.sim.hand.retain(|&c| c != *card);
                    }
                    if self.sim.hand.is_empty() {
                        self.sim.alive = false;
                    }
                    self.sim.phase = Phase::Idle;
                } else {
                    self.sim.phase = Phase::LoseOther;
                }
            }
            GameMessage::Choose { cards } => {
                if cards.len() > self.sim.hand.len() {
                    let drawn = multiset_diff(cards, &self.sim.hand);
                    self.sim.phase = Phase::Choose { drawn, pre_exchange_hand_size: self.sim.hand.len() };
                } else {
                    self.sim.phase = Phase::LoseMine;
                }
            }
            GameMessage::Keep { .. } => {}
        }
    }

    fn phase_for_act(&self, actor: Addr, action: ActionLetter, target: Option<Addr>) -> Phase {
        if actor == self.sim.id {
            return Phase::Idle;
        }
        let targets_self = target == Some(self.sim.id);
        match action {
            ActionLetter::Income => Phase::Income,
            ActionLetter::ForeignAid => Phase::ForeignAid,
            ActionLetter::Tax => Phase::Witness { claim: Card::Duke },
            ActionLetter::Exchange => Phase::Witness { claim: Card::Ambassador },
            ActionLetter::Steal if targets_self => Phase::StealTarget,
            ActionLetter::Steal => Phase::Witness { claim: Card::Captain },
            ActionLetter::Assassinate if targets_self => Phase::AssassinateTarget,
            ActionLetter::Assassinate => Phase::Witness { claim: Card::Assassin },
            ActionLetter::Coup if targets_self => Phase::CoupTarget,
            ActionLetter::Coup => Phase::Coup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn turn_for_self_enters_my_turn_with_known_opponents() {
        let mut p = Participant::new(1);
        p.on_message(&GameMessage::Player { id: 2 });
        p.on_message(&GameMessage::Turn { id: 1 });
        assert_eq!(p.sim.phase, Phase::MyTurn { opponents: vec![2] });
    }

    #[test]
    fn witness_to_tax_can_challenge_duke() {
        let mut p = Participant::new(1);
        p.on_message(&GameMessage::Act { id: 2, action: ActionLetter::Tax, target: None });
        assert_eq!(p.sim.phase, Phase::Witness { claim: Card::Duke });
    }

    #[test]
    fn challenge_against_self_action_enters_challenge_mine() {
        let mut p = Participant::new(1);
        p.sim.id = 1;
        p.on_message(&GameMessage::Act { id: 1, action: ActionLetter::Tax, target: None });
        p.on_message(&GameMessage::Chal { id: 2 });
        assert_eq!(p.sim.phase, Phase::ChallengeMine { claim: Card::Duke });
    }

    #[test]
    fn block_supersedes_action_as_the_live_claim() {
        let mut p = Participant::new(3);
        p.on_message(&GameMessage::Act { id: 1, action: ActionLetter::Steal, target: Some(3) });
        p.on_message(&GameMessage::Block { id: 3, card: Card::Captain });
        // player 3 is the blocker; a CHAL now targets player 3's claim, not 1's steal.
        p.on_message(&GameMessage::Chal { id: 2 });
        assert_eq!(p.sim.phase, Phase::ChallengeMine { claim: Card::Captain });
    }

    #[test]
    fn choose_with_more_cards_than_hand_is_an_exchange_draw() {
        let mut p = Participant::new(1);
        p.sim.hand = vec![Card::Duke];
        p.on_message(&GameMessage::Choose { cards: vec![Card::Duke, Card::Assassin, Card::Captain] });
        assert_eq!(
            p.sim.phase,
            Phase::Choose { drawn: vec![Card::Assassin, Card::Captain], pre_exchange_hand_size: 1 }
        );
    }

    #[test]
    fn choose_matching_hand_size_is_a_forced_reveal() {
        let mut p = Participant::new(1);
        p.sim.hand = vec![Card::Duke, Card::Contessa];
        p.on_message(&GameMessage::Choose { cards: vec![Card::Duke, Card::Contessa] });
        assert_eq!(p.sim.phase, Phase::LoseMine);
    }

    #[test]
    fn losing_last_card_marks_self_dead() {
        let mut p = Participant::new(1);
        p.sim.hand = vec![Card::Duke];
        p.on_message(&GameMessage::Lose { id: Some(1), card: Some(Card::Duke) });
        assert!(!p.sim.alive);
    }

    #[test]
    fn dead_player_ignores_further_prompts_until_exit() {
        let mut p = Participant::new(1);
        p.sim.alive = false;
        p.on_message(&GameMessage::Turn { id: 2 });
        assert_eq!(p.sim.phase, Phase::Idle);
        p.on_message(&GameMessage::Exit);
        assert_eq!(p.sim.phase, Phase::End);
    }
}
