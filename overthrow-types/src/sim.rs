//! The per-player phase machine (`spec.md` §4.2). Given a [`PlayerSim`]'s
//! local state and its current [`Phase`], [`PlayerSim::legal_replies`]
//! produces the exact set of legal reply strings — the surface that bots,
//! humans, and the referee's own legality check all share.

use crate::wire::{ActionLetter, Addr, GameMessage};
use overthrow_engine::deck::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tag {
    #[default]
    None,
    Blocking,
    Blocked,
    Challenging,
    Challenged,
}

const ALL_CARDS: [Card; 5] = [
    Card::Duke,
    Card::Assassin,
    Card::Contessa,
    Card::Captain,
    Card::Ambassador,
];

/// The claim associated with a challengeable action or block, used by
/// `R_CHAL_MY_*`/`R_TAX`-style phases to know which card would defend it.
fn claim_for_action(action: ActionLetter) -> Option<Card> {
    match action {
        ActionLetter::Tax => Some(Card::Duke),
        ActionLetter::Exchange => Some(Card::Ambassador),
        ActionLetter::Steal => Some(Card::Captain),
        ActionLetter::Assassinate => Some(Card::Assassin),
        ActionLetter::Income | ActionLetter::ForeignAid | ActionLetter::Coup => None,
    }
}

/// Context carried by each phase variant. Named per `spec.md`'s table;
/// phases that the table marks as context-free carry no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Start,
    /// `TURN(self)`; coin-gated legal action set.
    MyTurn { opponents: Vec<Addr> },
    OtherTurn,
    Income,
    Coup,
    /// Foreign aid taken by someone else; `self` may `BLOCK(Duke)`.
    ForeignAid,
    /// Non-target witness to a Tax/Exchange/Steal/Assassinate claim.
    Witness { claim: Card },
    StealTarget,
    AssassinateTarget,
    /// Self is the coup target; must give up a card immediately.
    CoupTarget,
    /// Some block was announced; self may `OK` or `CHAL`.
    BlockAnnounced,
    /// A challenge was raised against another player.
    ChallengeOther,
    /// A challenge was raised against self's claim.
    ChallengeMine { claim: Card },
    /// Another player must reveal and lose a card.
    LoseOther,
    /// Self must lose a card (assassination/coup/lost challenge).
    LoseMine,
    /// Self was the challenger and a SHOW occurred; `self_challenged`
    /// distinguishes the "or LOSE if the challenge was originally from
    /// self" branch in the table (kept for clarity even though it
    /// coincides with this phase always being entered by the challenger).
    Show { self_challenged: bool },
    Informational,
    /// Self received exchange draws; `pre_exchange_hand_size` sizes the
    /// KEEP permutations.
    Choose {
        drawn: Vec<Card>,
        pre_exchange_hand_size: usize,
    },
    End,
}

#[derive(Debug, Clone)]
pub struct PlayerSim {
    pub id: Addr,
    pub coins: u32,
    pub hand: Vec<Card>,
    pub exchange_cards: Vec<Card>,
    pub alive: bool,
    pub turn: bool,
    pub tag: Tag,
    pub phase: Phase,
    pub replied: bool,
    pub last_msg: Option<String>,
    pub announced: bool,
    pub ready: bool,
}

impl PlayerSim {
    pub fn new(id: Addr) -> PlayerSim {
        PlayerSim {
            id,
            coins: 2,
            hand: Vec::new(),
            exchange_cards: Vec::new(),
            alive: true,
            turn: false,
            tag: Tag::None,
            phase: Phase::Idle,
            replied: false,
            last_msg: None,
            announced: false,
            ready: false,
        }
    }

    /// Reset transient per-turn bookkeeping; called on turn exit per
    /// `spec.md` §4.1 ("Reset ... all player tags on turn exit").
    pub fn reset_for_turn_exit(&mut self) {
        self.tag = Tag::None;
        self.turn = false;
        self.replied = false;
    }

    /// The exact set of legal reply strings for this player's current
    /// phase. Order is stable but not meaningful; callers needing set
    /// semantics should collect into a `HashSet`.
    pub fn legal_replies(&self) -> Vec<String> {
        match &self.phase {
            Phase::Idle | Phase::End => Vec::new(),
            Phase::Start => vec![GameMessage::Ready.serialize()],
            Phase::MyTurn { opponents } => self.legal_actions(opponents),
            Phase::OtherTurn
            | Phase::Income
            | Phase::Coup
            | Phase::LoseOther
            | Phase::Informational => vec![GameMessage::Ok.serialize()],
            Phase::ForeignAid => {
                let mut replies = vec![GameMessage::Ok.serialize()];
                replies.push(
                    GameMessage::Block {
                        id: self.id,
                        card: Card::Duke,
                    }
                    .serialize(),
                );
                replies
            }
            Phase::Witness { .. } => vec![
                GameMessage::Ok.serialize(),
                GameMessage::Chal { id: self.id }.serialize(),
            ],
            Phase::StealTarget => vec![
                GameMessage::Ok.serialize(),
                GameMessage::Chal { id: self.id }.serialize(),
                GameMessage::Block {
                    id: self.id,
                    card: Card::Captain,
                }
                .serialize(),
                GameMessage::Block {
                    id: self.id,
                    card: Card::Ambassador,
                }
                .serialize(),
            ],
            Phase::AssassinateTarget => vec![
                GameMessage::Ok.serialize(),
                GameMessage::Chal { id: self.id }.serialize(),
                GameMessage::Block {
                    id: self.id,
                    card: Card::Contessa,
                }
                .serialize(),
            ],
            Phase::CoupTarget | Phase::LoseMine => self.lose_replies(),
            Phase::BlockAnnounced => vec![
                GameMessage::Ok.serialize(),
                GameMessage::Chal { id: self.id }.serialize(),
            ],
            Phase::ChallengeOther => vec![GameMessage::Ok.serialize()],
            Phase::ChallengeMine { claim } => self.show_or_lose_replies(*claim),
            Phase::Show { self_challenged } => {
                if *self_challenged {
                    self.lose_replies()
                } else {
                    vec![GameMessage::Ok.serialize()]
                }
            }
            Phase::Choose {
                drawn,
                pre_exchange_hand_size,
            } => self.keep_permutations(drawn, *pre_exchange_hand_size),
        }
    }

    fn legal_actions(&self, opponents: &[Addr]) -> Vec<String> {
        if self.coins >= 10 {
            return opponents
                .iter()
                .map(|&target| {
                    GameMessage::Act {
                        id: self.id,
                        action: ActionLetter::Coup,
                        target: Some(target),
                    }
                    .serialize()
                })
                .collect();
        }

        let mut replies = vec![
            GameMessage::Act {
                id: self.id,
                action: ActionLetter::Income,
                target: None,
            }
            .serialize(),
            GameMessage::Act {
                id: self.id,
                action: ActionLetter::ForeignAid,
                target: None,
            }
            .serialize(),
            GameMessage::Act {
                id: self.id,
                action: ActionLetter::Tax,
                target: None,
            }
            .serialize(),
            GameMessage::Act {
                id: self.id,
                action: ActionLetter::Exchange,
                target: None,
            }
            .serialize(),
        ];

        for &target in opponents {
            replies.push(
                GameMessage::Act {
                    id: self.id,
                    action: ActionLetter::Steal,
                    target: Some(target),
                }
                .serialize(),
            );
        }
        if self.coins >= 3 {
            for &target in opponents {
                replies.push(
                    GameMessage::Act {
                        id: self.id,
                        action: ActionLetter::Assassinate,
                        target: Some(target),
                    }
                    .serialize(),
                );
            }
        }
        if self.coins >= 7 {
            for &target in opponents {
                replies.push(
                    GameMessage::Act {
                        id: self.id,
                        action: ActionLetter::Coup,
                        target: Some(target),
                    }
                    .serialize(),
                );
            }
        }

        replies
    }

    fn lose_replies(&self) -> Vec<String> {
        self.hand
            .iter()
            .map(|&card| {
                GameMessage::Lose {
                    id: Some(self.id),
                    card: Some(card),
                }
                .serialize()
            })
            .collect()
    }

    /// Each held card is its own independent choice: `SHOW(card)` if it
    /// matches the claim, `LOSE(card)` otherwise — a player holding both a
    /// matching and a non-matching card may still concede rather than
    /// reveal, per `spec.md`'s `R_CHAL_MY_*` table.
    fn show_or_lose_replies(&self, claim: Card) -> Vec<String> {
        self.hand
            .iter()
            .map(|&card| {
                if card == claim {
                    GameMessage::Show {
                        id: Some(self.id),
                        card: Some(card),
                    }
                    .serialize()
                } else {
                    GameMessage::Lose {
                        id: Some(self.id),
                        card: Some(card),
                    }
                    .serialize()
                }
            })
            .collect()
    }

    /// Every distinct `KEEP` permutation sized to the hand the player had
    /// before the exchange, drawn from `hand ∪ drawn`.
    fn keep_permutations(&self, drawn: &[Card], pre_exchange_hand_size: usize) -> Vec<String> {
        let mut pool: Vec<Card> = self.hand.clone();
        pool.extend_from_slice(drawn);

        let mut seen: Vec<Vec<Card>> = Vec::new();
        combinations(&pool, pre_exchange_hand_size, &mut seen);

        seen.into_iter()
            .map(|cards| GameMessage::Keep { cards }.serialize())
            .collect()
    }
}

/// Distinct (order-insensitive) card combinations of the given size, drawn
/// from `pool` by index so duplicate cards (e.g. two Dukes) still produce
/// distinct combinations when they occupy different slots.
fn combinations(pool: &[Card], size: usize, out: &mut Vec<Vec<Card>>) {
    fn go(pool: &[Card], start: usize, size: usize, chosen: &mut Vec<Card>, out: &mut Vec<Vec<Card>>) {
        if chosen.len() == size {
            out.push(chosen.clone());
            return;
        }
        for i in start..pool.len() {
            chosen.push(pool[i]);
            go(pool, i + 1, size, chosen, out);
            chosen.pop();
        }
    }
    if size == 0 {
        out.push(Vec::new());
        return;
    }
    let mut chosen = Vec::new();
    go(pool, 0, size, &mut chosen, out);
}

/// Whether `reply` is a member of the set `sim.legal_replies()` would
/// generate. Convenience used by the referee's legality check without
/// materializing the whole set, kept in terms of [`ActionLetter`]/[`Card`]
/// to avoid re-parsing work the referee already did.
pub fn is_challengeable_claim(card: Card) -> bool {
    matches!(
        card,
        Card::Duke | Card::Ambassador | Card::Captain | Card::Assassin
    )
}

pub fn blockable_claims_for_action(action: ActionLetter) -> &'static [Card] {
    match action {
        ActionLetter::ForeignAid => &[Card::Duke],
        ActionLetter::Assassinate => &[Card::Contessa],
        ActionLetter::Steal => &[Card::Captain, Card::Ambassador],
        _ => &[],
    }
}

pub fn all_cards() -> &'static [Card] {
    &ALL_CARDS
}

pub use claim_for_action as claim_for;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn idle_and_end_have_no_legal_replies() {
        let mut sim = PlayerSim::new(1);
        sim.phase = Phase::Idle;
        assert!(sim.legal_replies().is_empty());
        sim.phase = Phase::End;
        assert!(sim.legal_replies().is_empty());
    }

    #[test]
    fn forced_coup_at_ten_coins_collapses_legal_set() {
        let mut sim = PlayerSim::new(1);
        sim.coins = 10;
        sim.phase = Phase::MyTurn { opponents: vec![2, 3] };
        let replies = sim.legal_replies();
        assert_eq!(replies.len(), 2);
        for r in &replies {
            assert!(r.starts_with("ACT 1 C "));
        }
    }

    #[test]
    fn my_turn_under_three_coins_excludes_assassinate_and_coup() {
        let mut sim = PlayerSim::new(1);
        sim.coins = 2;
        sim.phase = Phase::MyTurn { opponents: vec![2] };
        let replies = sim.legal_replies();
        assert!(replies.contains(&"ACT 1 I".to_string()));
        assert!(replies.contains(&"ACT 1 S 2".to_string()));
        assert!(!replies.iter().any(|r| r.contains(" A ")));
        assert!(!replies.iter().any(|r| r.contains(" C ")));
    }

    #[test]
    fn steal_target_can_block_with_either_claim() {
        let mut sim = PlayerSim::new(2);
        sim.phase = Phase::StealTarget;
        let replies = sim.legal_replies();
        assert_eq!(
            replies,
            vec!["OK", "CHAL 2", "BLOCK 2 C", "BLOCK 2 B"]
        );
    }

    #[test]
    fn challenge_mine_must_show_if_holding_the_claim() {
        let mut sim = PlayerSim::new(1);
        sim.hand = vec![Card::Assassin, Card::Duke];
        sim.phase = Phase::ChallengeMine { claim: Card::Duke };
        assert_eq!(sim.legal_replies(), vec!["SHOW 1 D"]);
    }

    #[test]
    fn challenge_mine_must_concede_without_the_claim() {
        let mut sim = PlayerSim::new(1);
        sim.hand = vec![Card::Assassin, Card::Captain];
        sim.phase = Phase::ChallengeMine { claim: Card::Duke };
        assert_eq!(sim.legal_replies(), vec!["LOSE 1 A", "LOSE 1 C"]);
    }

    #[test]
    fn lose_mine_offers_every_held_card() {
        let mut sim = PlayerSim::new(1);
        sim.hand = vec![Card::Captain, Card::Contessa];
        sim.phase = Phase::LoseMine;
        assert_eq!(sim.legal_replies(), vec!["LOSE 1 C", "LOSE 1 E"]);
    }

    #[test]
    fn choose_permutations_match_pre_exchange_hand_size() {
        let mut sim = PlayerSim::new(1);
        sim.hand = vec![Card::Duke];
        sim.phase = Phase::Choose {
            drawn: vec![Card::Assassin, Card::Captain],
            pre_exchange_hand_size: 1,
        };
        let mut replies = sim.legal_replies();
        replies.sort();
        assert_eq!(replies, vec!["KEEP A", "KEEP C", "KEEP D"]);
    }

    #[test]
    fn choose_permutations_for_two_card_hand() {
        let mut sim = PlayerSim::new(1);
        sim.hand = vec![Card::Duke, Card::Captain];
        sim.phase = Phase::Choose {
            drawn: vec![Card::Assassin, Card::Contessa],
            pre_exchange_hand_size: 2,
        };
        let replies = sim.legal_replies();
        // C(4, 2) = 6 distinct keep-pairs
        assert_eq!(replies.len(), 6);
    }
}
