//! The two ASCII grammars that make up the protocol: the inner game
//! message (`<CMD>[ <arg>]*`) and the outer routing envelope
//! (`<KIND>@[<addr>@]<payload>`).
//!
//! Both grammars are terminator-free; a caller reads one line at a time
//! and hands it to [`GameMessage::parse`] / [`Envelope::parse`].

use overthrow_engine::deck::Card;
use std::fmt;
use thiserror::Error;

pub type Addr = u32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("empty message")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing required argument {arg} for {cmd}")]
    MissingArgument { cmd: &'static str, arg: &'static str },
    #[error("invalid argument {arg} for {cmd}: {value:?}")]
    InvalidArgument {
        cmd: &'static str,
        arg: &'static str,
        value: String,
    },
    #[error("trailing arguments after {cmd}")]
    TrailingArguments { cmd: &'static str },
    #[error("malformed envelope: {0:?}")]
    MalformedEnvelope(String),
    #[error("unknown envelope kind {0:?}")]
    UnknownEnvelopeKind(String),
}

/// Wire-level action letter. Distinct from [`overthrow_engine::action::Act`]
/// which bundles the target into the enum itself; here the target travels
/// as a separate optional argument, per the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLetter {
    Income,
    ForeignAid,
    Coup,
    Tax,
    Assassinate,
    Steal,
    Exchange,
}

impl ActionLetter {
    pub fn requires_target(self) -> bool {
        matches!(
            self,
            ActionLetter::Coup | ActionLetter::Assassinate | ActionLetter::Steal
        )
    }

    fn letter(self) -> char {
        match self {
            ActionLetter::Income => 'I',
            ActionLetter::ForeignAid => 'F',
            ActionLetter::Coup => 'C',
            ActionLetter::Tax => 'T',
            ActionLetter::Assassinate => 'A',
            ActionLetter::Steal => 'S',
            ActionLetter::Exchange => 'X',
        }
    }

    fn from_letter(c: char) -> Option<ActionLetter> {
        Some(match c {
            'I' => ActionLetter::Income,
            'F' => ActionLetter::ForeignAid,
            'C' => ActionLetter::Coup,
            'T' => ActionLetter::Tax,
            'A' => ActionLetter::Assassinate,
            'S' => ActionLetter::Steal,
            'X' => ActionLetter::Exchange,
            _ => return None,
        })
    }
}

impl fmt::Display for ActionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

fn card_letter(card: Card) -> char {
    match card {
        Card::Duke => 'D',
        Card::Assassin => 'A',
        Card::Contessa => 'E',
        Card::Captain => 'C',
        Card::Ambassador => 'B',
    }
}

fn card_from_letter(c: char) -> Option<Card> {
    Some(match c {
        'D' => Card::Duke,
        'A' => Card::Assassin,
        'E' => Card::Contessa,
        'C' => Card::Captain,
        'B' => Card::Ambassador,
        _ => return None,
    })
}

fn fmt_card(card: Card) -> String {
    card_letter(card).to_string()
}

fn parse_addr(cmd: &'static str, arg: &'static str, value: &str) -> Result<Addr, WireError> {
    value
        .parse::<Addr>()
        .map_err(|_| WireError::InvalidArgument {
            cmd,
            arg,
            value: value.to_string(),
        })
}

fn parse_card(cmd: &'static str, arg: &'static str, value: &str) -> Result<Card, WireError> {
    let mut chars = value.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return Err(WireError::InvalidArgument {
            cmd,
            arg,
            value: value.to_string(),
        });
    };
    card_from_letter(c).ok_or_else(|| WireError::InvalidArgument {
        cmd,
        arg,
        value: value.to_string(),
    })
}

fn parse_action(cmd: &'static str, arg: &'static str, value: &str) -> Result<ActionLetter, WireError> {
    let mut chars = value.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return Err(WireError::InvalidArgument {
            cmd,
            arg,
            value: value.to_string(),
        });
    };
    ActionLetter::from_letter(c).ok_or_else(|| WireError::InvalidArgument {
        cmd,
        arg,
        value: value.to_string(),
    })
}

fn parse_coins(cmd: &'static str, arg: &'static str, value: &str) -> Result<u32, WireError> {
    value
        .parse::<u32>()
        .map_err(|_| WireError::InvalidArgument {
            cmd,
            arg,
            value: value.to_string(),
        })
}

/// The inner, space-separated game message grammar (`spec.md` §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameMessage {
    Act {
        id: Addr,
        action: ActionLetter,
        target: Option<Addr>,
    },
    Ok,
    Chal {
        id: Addr,
    },
    Block {
        id: Addr,
        card: Card,
    },
    Show {
        id: Option<Addr>,
        card: Option<Card>,
    },
    Lose {
        id: Option<Addr>,
        card: Option<Card>,
    },
    Coins {
        id: Addr,
        coins: u32,
    },
    Deck {
        cards: Vec<Card>,
    },
    Choose {
        cards: Vec<Card>,
    },
    Keep {
        cards: Vec<Card>,
    },
    Hello,
    Player {
        id: Addr,
    },
    Start,
    Ready,
    Turn {
        id: Addr,
    },
    Exit,
    Illegal,
    Dead {
        id: Addr,
    },
}

impl GameMessage {
    pub fn parse(line: &str) -> Result<GameMessage, WireError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut parts = line.split(' ').filter(|s| !s.is_empty());
        let cmd = parts.next().ok_or(WireError::Empty)?;
        let rest: Vec<&str> = parts.collect();

        match cmd {
            "ACT" => {
                const CMD: &str = "ACT";
                let id = parse_addr(CMD, "ID1", rest.first().ok_or(WireError::MissingArgument {
                    cmd: CMD,
                    arg: "ID1",
                })?)?;
                let action = parse_action(CMD, "action", rest.get(1).ok_or(WireError::MissingArgument {
                    cmd: CMD,
                    arg: "action",
                })?)?;
                let target = rest.get(2).map(|v| parse_addr(CMD, "ID2", v)).transpose()?;
                if rest.len() > 3 {
                    return Err(WireError::TrailingArguments { cmd: CMD });
                }
                Ok(GameMessage::Act { id, action, target })
            }
            "OK" => no_args("OK", &rest, GameMessage::Ok),
            "CHAL" => {
                const CMD: &str = "CHAL";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                trailing(CMD, &rest, 1)?;
                Ok(GameMessage::Chal { id })
            }
            "BLOCK" => {
                const CMD: &str = "BLOCK";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                let card = parse_card(
                    CMD,
                    "card1",
                    rest.get(1).ok_or(WireError::MissingArgument {
                        cmd: CMD,
                        arg: "card1",
                    })?,
                )?;
                trailing(CMD, &rest, 2)?;
                Ok(GameMessage::Block { id, card })
            }
            "SHOW" => {
                const CMD: &str = "SHOW";
                let id = rest.first().map(|v| parse_addr(CMD, "ID1", v)).transpose()?;
                let card = rest.get(1).map(|v| parse_card(CMD, "card1", v)).transpose()?;
                trailing(CMD, &rest, 2)?;
                Ok(GameMessage::Show { id, card })
            }
            "LOSE" => {
                const CMD: &str = "LOSE";
                let id = rest.first().map(|v| parse_addr(CMD, "ID1", v)).transpose()?;
                let card = rest.get(1).map(|v| parse_card(CMD, "card1", v)).transpose()?;
                trailing(CMD, &rest, 2)?;
                Ok(GameMessage::Lose { id, card })
            }
            "COINS" => {
                const CMD: &str = "COINS";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                let coins = parse_coins(
                    CMD,
                    "coins",
                    rest.get(1).ok_or(WireError::MissingArgument {
                        cmd: CMD,
                        arg: "coins",
                    })?,
                )?;
                trailing(CMD, &rest, 2)?;
                Ok(GameMessage::Coins { id, coins })
            }
            "DECK" => {
                const CMD: &str = "DECK";
                let cards = parse_optional_cards(CMD, &rest, 2)?;
                Ok(GameMessage::Deck { cards })
            }
            "CHOOSE" => {
                const CMD: &str = "CHOOSE";
                if rest.is_empty() {
                    return Err(WireError::MissingArgument { cmd: CMD, arg: "card1" });
                }
                let cards = parse_optional_cards(CMD, &rest, 2)?;
                Ok(GameMessage::Choose { cards })
            }
            "KEEP" => {
                const CMD: &str = "KEEP";
                if rest.is_empty() {
                    return Err(WireError::MissingArgument { cmd: CMD, arg: "card1" });
                }
                let cards = parse_optional_cards(CMD, &rest, 2)?;
                Ok(GameMessage::Keep { cards })
            }
            "HELLO" => no_args("HELLO", &rest, GameMessage::Hello),
            "PLAYER" => {
                const CMD: &str = "PLAYER";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                trailing(CMD, &rest, 1)?;
                Ok(GameMessage::Player { id })
            }
            "START" => no_args("START", &rest, GameMessage::Start),
            "READY" => no_args("READY", &rest, GameMessage::Ready),
            "TURN" => {
                const CMD: &str = "TURN";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                trailing(CMD, &rest, 1)?;
                Ok(GameMessage::Turn { id })
            }
            "EXIT" => no_args("EXIT", &rest, GameMessage::Exit),
            "ILLEGAL" => no_args("ILLEGAL", &rest, GameMessage::Illegal),
            "DEAD" => {
                const CMD: &str = "DEAD";
                let id = parse_addr(CMD, "ID1", first_required(CMD, "ID1", &rest)?)?;
                trailing(CMD, &rest, 1)?;
                Ok(GameMessage::Dead { id })
            }
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            GameMessage::Act { id, action, target } => match target {
                Some(t) => format!("ACT {id} {action} {t}"),
                None => format!("ACT {id} {action}"),
            },
            GameMessage::Ok => "OK".to_string(),
            GameMessage::Chal { id } => format!("CHAL {id}"),
            GameMessage::Block { id, card } => format!("BLOCK {id} {}", fmt_card(*card)),
            GameMessage::Show { id, card } => join_optional("SHOW", id.map(|i| i.to_string()), card.map(fmt_card)),
            GameMessage::Lose { id, card } => join_optional("LOSE", id.map(|i| i.to_string()), card.map(fmt_card)),
            GameMessage::Coins { id, coins } => format!("COINS {id} {coins}"),
            GameMessage::Deck { cards } => join_cards("DECK", cards),
            GameMessage::Choose { cards } => join_cards("CHOOSE", cards),
            GameMessage::Keep { cards } => join_cards("KEEP", cards),
            GameMessage::Hello => "HELLO".to_string(),
            GameMessage::Player { id } => format!("PLAYER {id}"),
            GameMessage::Start => "START".to_string(),
            GameMessage::Ready => "READY".to_string(),
            GameMessage::Turn { id } => format!("TURN {id}"),
            GameMessage::Exit => "EXIT".to_string(),
            GameMessage::Illegal => "ILLEGAL".to_string(),
            GameMessage::Dead { id } => format!("DEAD {id}"),
        }
    }
}

impl fmt::Display for GameMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

fn first_required<'a>(cmd: &'static str, arg: &'static str, rest: &'a [&str]) -> Result<&'a str, WireError> {
    rest.first().copied().ok_or(WireError::MissingArgument { cmd, arg })
}

fn trailing(cmd: &'static str, rest: &[&str], expected: usize) -> Result<(), WireError> {
    if rest.len() > expected {
        Err(WireError::TrailingArguments { cmd })
    } else {
        Ok(())
    }
}

fn no_args(cmd: &'static str, rest: &[&str], value: GameMessage) -> Result<GameMessage, WireError> {
    trailing(cmd, rest, 0)?;
    Ok(value)
}

fn parse_optional_cards(cmd: &'static str, rest: &[&str], max: usize) -> Result<Vec<Card>, WireError> {
    if rest.len() > max {
        return Err(WireError::TrailingArguments { cmd });
    }
    rest.iter()
        .enumerate()
        .map(|(i, v)| {
            let arg = if i == 0 { "card1" } else { "card2" };
            parse_card(cmd, arg, v)
        })
        .collect()
}

fn join_optional(cmd: &str, id: Option<String>, card: Option<String>) -> String {
    let mut parts = vec![cmd.to_string()];
    parts.extend(id);
    parts.extend(card);
    parts.join(" ")
}

fn join_cards(cmd: &str, cards: &[Card]) -> String {
    let mut parts = vec![cmd.to_string()];
    parts.extend(cards.iter().map(|c| fmt_card(*c)));
    parts.join(" ")
}

/// The outer, `@`-separated routing envelope (`spec.md` §4.3/§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Single { addr: Addr, payload: String },
    Except { addr: Addr, payload: String },
    All { payload: String },
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Envelope, WireError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut parts = line.splitn(2, '@');
        let kind = parts.next().ok_or_else(|| WireError::MalformedEnvelope(line.to_string()))?;
        let rest = parts
            .next()
            .ok_or_else(|| WireError::MalformedEnvelope(line.to_string()))?;

        match kind {
            "ALL" => Ok(Envelope::All {
                payload: rest.to_string(),
            }),
            "SINGLE" | "EXCEPT" => {
                let mut rest_parts = rest.splitn(2, '@');
                let addr = rest_parts
                    .next()
                    .ok_or_else(|| WireError::MalformedEnvelope(line.to_string()))?;
                let payload = rest_parts
                    .next()
                    .ok_or_else(|| WireError::MalformedEnvelope(line.to_string()))?;
                let addr: Addr = addr
                    .parse()
                    .map_err(|_| WireError::MalformedEnvelope(line.to_string()))?;
                if kind == "SINGLE" {
                    Ok(Envelope::Single {
                        addr,
                        payload: payload.to_string(),
                    })
                } else {
                    Ok(Envelope::Except {
                        addr,
                        payload: payload.to_string(),
                    })
                }
            }
            other => Err(WireError::UnknownEnvelopeKind(other.to_string())),
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            Envelope::Single { addr, payload } => format!("SINGLE@{addr}@{payload}"),
            Envelope::Except { addr, payload } => format!("EXCEPT@{addr}@{payload}"),
            Envelope::All { payload } => format!("ALL@{payload}"),
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Envelope::Single { payload, .. } | Envelope::Except { payload, .. } => payload,
            Envelope::All { payload } => payload,
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

/// Splits a buffer of one-or-more newline-terminated lines, keeping any
/// trailing partial line for the next read (`spec.md` §4.3's "a read may
/// also yield a partial final envelope that must be buffered").
pub fn split_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        lines.push(line);
        buf.drain(..=pos);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn act_round_trip_with_target() {
        let msg = GameMessage::Act {
            id: 1,
            action: ActionLetter::Steal,
            target: Some(2),
        };
        let line = msg.serialize();
        assert_eq!(line, "ACT 1 S 2");
        assert_eq!(GameMessage::parse(&line).unwrap(), msg);
    }

    #[test]
    fn act_round_trip_without_target() {
        let msg = GameMessage::Act {
            id: 1,
            action: ActionLetter::Income,
            target: None,
        };
        let line = msg.serialize();
        assert_eq!(line, "ACT 1 I");
        assert_eq!(GameMessage::parse(&line).unwrap(), msg);
    }

    #[test]
    fn ok_chal_block() {
        assert_eq!(GameMessage::parse("OK").unwrap(), GameMessage::Ok);
        assert_eq!(GameMessage::parse("CHAL 2").unwrap(), GameMessage::Chal { id: 2 });
        assert_eq!(
            GameMessage::parse("BLOCK 2 B").unwrap(),
            GameMessage::Block {
                id: 2,
                card: Card::Ambassador
            }
        );
    }

    #[test]
    fn show_and_lose_allow_no_args() {
        assert_eq!(
            GameMessage::parse("SHOW").unwrap(),
            GameMessage::Show { id: None, card: None }
        );
        assert_eq!(
            GameMessage::parse("SHOW 1 D").unwrap(),
            GameMessage::Show {
                id: Some(1),
                card: Some(Card::Duke)
            }
        );
    }

    #[test]
    fn deck_allows_zero_one_or_two_cards() {
        assert_eq!(GameMessage::parse("DECK").unwrap(), GameMessage::Deck { cards: vec![] });
        assert_eq!(
            GameMessage::parse("DECK D").unwrap(),
            GameMessage::Deck {
                cards: vec![Card::Duke]
            }
        );
        assert_eq!(
            GameMessage::parse("DECK D A").unwrap(),
            GameMessage::Deck {
                cards: vec![Card::Duke, Card::Assassin]
            }
        );
    }

    #[test]
    fn keep_requires_at_least_one_card() {
        assert!(matches!(
            GameMessage::parse("KEEP"),
            Err(WireError::MissingArgument { cmd: "KEEP", .. })
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            GameMessage::parse("NOPE"),
            Err(WireError::UnknownCommand(s)) if s == "NOPE"
        ));
    }

    #[test]
    fn trailing_arguments_are_rejected() {
        assert!(matches!(
            GameMessage::parse("OK extra"),
            Err(WireError::TrailingArguments { cmd: "OK" })
        ));
    }

    #[test]
    fn invalid_action_letter_is_rejected() {
        assert!(matches!(
            GameMessage::parse("ACT 1 Z"),
            Err(WireError::InvalidArgument { cmd: "ACT", arg: "action", .. })
        ));
    }

    #[test]
    fn envelope_round_trip() {
        let env = Envelope::Single {
            addr: 3,
            payload: "TURN 2".to_string(),
        };
        let line = env.serialize();
        assert_eq!(line, "SINGLE@3@TURN 2");
        assert_eq!(Envelope::parse(&line).unwrap(), env);
    }

    #[test]
    fn envelope_all_and_except() {
        assert_eq!(
            Envelope::parse("ALL@START").unwrap(),
            Envelope::All {
                payload: "START".to_string()
            }
        );
        assert_eq!(
            Envelope::parse("EXCEPT@0@ACT 1 I").unwrap(),
            Envelope::Except {
                addr: 0,
                payload: "ACT 1 I".to_string()
            }
        );
    }

    #[test]
    fn split_lines_buffers_partial_tail() {
        let mut buf = "ALL@START\nSINGLE@1@OK\nSINGLE@2@TU".to_string();
        let lines = split_lines(&mut buf);
        assert_eq!(lines, vec!["ALL@START", "SINGLE@1@OK"]);
        assert_eq!(buf, "SINGLE@2@TU");
    }
}
