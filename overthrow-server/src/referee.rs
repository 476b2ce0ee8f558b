//! The referee: drives one [`CoupGame`] to completion by reading wire
//! envelopes off a single relay connection and broadcasting the engine's
//! decisions back out.
//!
//! Unlike the teacher's `game.rs`, which resolved a whole action
//! sub-tree atomically inside one async function (awaiting every
//! player's in-process channel at once via `select!`/`join_all`), every
//! player here is multiplexed through one TCP socket. The referee can
//! only see messages one at a time, in arrival order, so it keeps the
//! in-progress sub-tree alive across `.await` points as an explicit
//! [`Stage`] plus a [`ReactWindow`] accumulator. Grounded in the
//! teacher's `game.rs` for which engine call corresponds to which
//! decision, and in `examples/original_source/src/server/root.py` for
//! the overall setup → turn → teardown shape.

use overthrow_engine::action::{Act, Action, Blocks, PossibleActions};
use overthrow_engine::deck::{Card, Hand};
use overthrow_engine::machine::{
    ActionKind, Block, BlockState, ChooseOneFromThree, ChooseOneFromThreeState, ChooseTwoFromFour,
    ChooseTwoFromFourState, ChooseVictimCard, ChooseVictimCardState, Challenge, ChallengeState,
    CoupGame, GameState, OnlyBlockable, OnlyBlockableState, OnlyChallengeable,
    OnlyChallengeableState, Outcome, Reactable, ReactableState, Safe, SafeState, Wait, WaitState,
};
use overthrow_engine::players::{PlayerId, RawPlayers};
use overthrow_types::wire::{ActionLetter, Addr, Envelope, GameMessage, WireError, split_lines};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub const REFEREE_ADDR: Addr = 0;
const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum RefereeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("relay connection closed")]
    RelayClosed,
    #[error("relay did not welcome us as address 0")]
    NotReferee,
    #[error("not enough players joined before start")]
    NotEnoughPlayers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Auto,
    Manual,
}

fn addr_to_player(addr: Addr) -> Option<PlayerId> {
    Some(match addr {
        1 => PlayerId::One,
        2 => PlayerId::Two,
        3 => PlayerId::Three,
        4 => PlayerId::Four,
        5 => PlayerId::Five,
        6 => PlayerId::Six,
        _ => return None,
    })
}

fn player_to_addr(id: PlayerId) -> Addr {
    id as u32
}

fn hand_cards(hand: &Hand) -> Vec<Card> {
    match hand {
        Hand::Full(c1, c2) => vec![*c1, *c2],
        Hand::Last(c1, _) => vec![*c1],
    }
}

fn act_matches(act: Act, letter: ActionLetter, target: Option<PlayerId>) -> bool {
    match (act, letter) {
        (Act::Income, ActionLetter::Income) => target.is_none(),
        (Act::ForeignAid, ActionLetter::ForeignAid) => target.is_none(),
        (Act::Tax, ActionLetter::Tax) => target.is_none(),
        (Act::Exchange, ActionLetter::Exchange) => target.is_none(),
        (Act::Steal { victim }, ActionLetter::Steal) => target == Some(victim),
        (Act::Assassinate { victim }, ActionLetter::Assassinate) => target == Some(victim),
        (Act::Coup { victim }, ActionLetter::Coup) => target == Some(victim),
        _ => false,
    }
}

fn find_action(actions: &PossibleActions, actor: PlayerId, letter: ActionLetter, target: Option<PlayerId>) -> Option<Action> {
    actions
        .all()
        .find(|a| a.actor() == actor && act_matches(a.kind(), letter, target))
        .cloned()
}

/// Tracks one round of replies following a blockable/challengeable/reactable
/// action (`spec.md` §4.1.1 / §5): who has replied, and the first block and
/// first challenge seen. A block, once seen, always wins — so the window
/// resolves the instant one arrives rather than waiting for the rest of the
/// replies. A challenge only resolves the window once every expected player
/// has replied, since a later block would still override it.
struct ReactWindow {
    expected: HashSet<PlayerId>,
    replied: HashSet<PlayerId>,
    first_challenge: Option<PlayerId>,
}

impl ReactWindow {
    fn new(expected: impl IntoIterator<Item = PlayerId>) -> Self {
        ReactWindow {
            expected: expected.into_iter().collect(),
            replied: HashSet::new(),
            first_challenge: None,
        }
    }

    fn mark_replied(&mut self, id: PlayerId) {
        self.replied.insert(id);
    }

    fn all_replied(&self) -> bool {
        self.expected.is_subset(&self.replied)
    }
}

enum Stage {
    Lobby,
    Turn(CoupGame<Wait>),
    Reacting(CoupGame<Reactable>, ReactWindow),
    OnlyBlockable(CoupGame<OnlyBlockable>, ReactWindow),
    OnlyChallengeable(CoupGame<OnlyChallengeable>, ReactWindow),
    Blocked(CoupGame<Block>, ReactWindow),
    ChallengeResolve(CoupGame<Challenge>, PlayerId),
    ChooseVictim(CoupGame<ChooseVictimCard>),
    ChooseOne(CoupGame<ChooseOneFromThree>),
    ChooseTwo(CoupGame<ChooseTwoFromFour>),
    Ended,
}

pub struct Referee {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
    buf: String,
    pending: VecDeque<String>,
    mode: Mode,
    roster: Vec<Addr>,
    stage: Stage,
}

impl Referee {
    pub async fn connect(relay_addr: std::net::SocketAddr, mode: Mode) -> Result<Referee, RefereeError> {
        let stream = TcpStream::connect(relay_addr).await?;
        let (read_half, writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let envelope = Envelope::parse(line.trim_end())?;
        let Envelope::Single { addr: REFEREE_ADDR, payload } = envelope else {
            return Err(RefereeError::NotReferee);
        };
        if !payload.starts_with("WELCOME") {
            return Err(RefereeError::NotReferee);
        }

        Ok(Referee {
            reader,
            writer,
            buf: String::new(),
            pending: VecDeque::new(),
            mode,
            roster: Vec::new(),
            stage: Stage::Lobby,
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<(), RefereeError> {
        self.writer.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }

    async fn send_all(&mut self, msg: GameMessage) -> Result<(), RefereeError> {
        let line = Envelope::All { payload: msg.serialize() }.serialize();
        self.write_line(&line).await
    }

    async fn send_single(&mut self, addr: Addr, msg: GameMessage) -> Result<(), RefereeError> {
        let line = Envelope::Single { addr, payload: msg.serialize() }.serialize();
        self.write_line(&line).await
    }

    /// Blocks on the socket until a full envelope line is available.
    async fn next_envelope(&mut self) -> Result<Envelope, RefereeError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Envelope::parse(&line)?);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(RefereeError::RelayClosed);
            }
            self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            self.pending.extend(split_lines(&mut self.buf));
        }
    }

    /// Runs the lobby: collects HELLO messages and waits for the start
    /// trigger (six players in auto mode, or an operator keypress in
    /// manual mode, grounded in `run_game.py`'s upfront player count and
    /// `terminal.py`'s blocking-stdin operator prompt).
    async fn run_lobby(&mut self) -> Result<(), RefereeError> {
        let (stdin_tx, mut stdin_rx) = oneshot::channel::<()>();
        if self.mode == Mode::Manual {
            tokio::task::spawn_blocking(move || {
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
                let _ = stdin_tx.send(());
            });
        }

        loop {
            let enough = match self.mode {
                Mode::Auto => self.roster.len() == 6,
                Mode::Manual => self.roster.len() >= 2,
            };
            if self.mode == Mode::Auto && enough {
                break;
            }
            if self.mode == Mode::Manual && enough {
                tokio::select! {
                    envelope = self.next_envelope() => {
                        self.handle_lobby_envelope(envelope?).await?;
                    }
                    _ = &mut stdin_rx => {
                        break;
                    }
                }
                continue;
            }
            let envelope = self.next_envelope().await?;
            self.handle_lobby_envelope(envelope).await?;
        }

        if self.roster.len() < 2 {
            return Err(RefereeError::NotEnoughPlayers);
        }
        self.roster.sort_unstable();
        Ok(())
    }

    async fn handle_lobby_envelope(&mut self, envelope: Envelope) -> Result<(), RefereeError> {
        let Envelope::Single { addr, payload } = envelope else {
            return Ok(());
        };
        if payload == "DISCONNECT" {
            self.roster.retain(|&a| a != addr);
            return Ok(());
        }
        if let Ok(GameMessage::Hello) = GameMessage::parse(&payload) {
            if !self.roster.contains(&addr) {
                info!(addr, "player joined lobby");
                self.roster.push(addr);
                self.send_all(GameMessage::Player { id: addr }).await?;
            }
        }
        Ok(())
    }

    /// Privately deals each player's starting two cards (`spec.md` §4.1's
    /// setup sequence: "deal two cards privately to each player").
    async fn deal_hands(&mut self, wait_game: &CoupGame<Wait>) -> Result<(), RefereeError> {
        let info = wait_game.info();
        let hands: Vec<(Addr, Vec<Card>)> = info
            .players
            .alive()
            .iter()
            .map(|(&id, player)| (player_to_addr(id), hand_cards(player.hand())))
            .collect();
        for (addr, cards) in hands {
            self.send_single(addr, GameMessage::Deck { cards }).await?;
        }
        Ok(())
    }

    async fn announce_turn(&mut self, wait_game: &CoupGame<Wait>) -> Result<(), RefereeError> {
        let info = wait_game.info();
        for (&id, player) in info.players.alive() {
            self.send_all(GameMessage::Coins {
                id: player_to_addr(id),
                coins: player.coins().amount() as u32,
            })
            .await?;
        }
        let current = info.current_player;
        self.send_all(GameMessage::Turn { id: player_to_addr(current) }).await
    }

    async fn broadcast_outcome(&mut self, outcome: Outcome) -> Result<(), RefereeError> {
        match outcome {
            Outcome::GainCoins { actor, amount } | Outcome::LoseCoins { actor, amount } => {
                debug!(?actor, amount, "outcome applied");
            }
            Outcome::LosesInfluence { victim } => {
                debug!(?victim, "influence at stake");
            }
            Outcome::ExchangesCards { actor } => {
                debug!(?actor, "exchange in progress");
            }
            Outcome::LoseTurn { victim } => {
                debug!(?victim, "turn forfeited");
            }
        }
        Ok(())
    }

    /// Applies a `GameState` returned by `advance()`, broadcasting a DEAD
    /// notice when a player was eliminated outright (their hand was
    /// already down to one card) and moving the referee into whichever
    /// stage the new state calls for.
    async fn enter_game_state(&mut self, state: GameState, eliminated: Option<PlayerId>) -> Result<Stage, RefereeError> {
        if let (GameState::Wait(_) | GameState::End(_), Some(victim)) = (&state, eliminated) {
            self.send_all(GameMessage::Dead { id: player_to_addr(victim) }).await?;
        }
        Ok(match state {
            GameState::Wait(wait_game) => {
                self.announce_turn(&wait_game).await?;
                Stage::Turn(wait_game)
            }
            GameState::ChooseVictimCard(game) => {
                let victim = game.victim();
                let choices = game.choices();
                self.send_single(
                    player_to_addr(victim),
                    GameMessage::Choose { cards: choices.to_vec() },
                )
                .await?;
                Stage::ChooseVictim(game)
            }
            GameState::ChooseOneFromThree(game) => {
                let actor = game.actor();
                let choices = game.choices();
                self.send_single(
                    player_to_addr(actor),
                    GameMessage::Choose { cards: choices.to_vec() },
                )
                .await?;
                Stage::ChooseOne(game)
            }
            GameState::ChooseTwoFromFour(game) => {
                let actor = game.actor();
                let choices = game.choices();
                self.send_single(
                    player_to_addr(actor),
                    GameMessage::Choose { cards: choices.to_vec() },
                )
                .await?;
                Stage::ChooseTwo(game)
            }
            GameState::End(game) => {
                let summary = game.summary();
                info!(winner = ?summary.winner, "game over");
                self.send_all(GameMessage::Exit).await?;
                Stage::Ended
            }
        })
    }

    /// Runs one full game: lobby, then turns until someone wins.
    pub async fn run(mut self) -> Result<(), RefereeError> {
        self.run_lobby().await?;

        let names: Vec<String> = self.roster.iter().map(|a| format!("Player{a}")).collect();
        let raw = RawPlayers::with_names(names.iter().map(String::as_str))
            .expect("lobby enforces 2..=6 players");
        let game = CoupGame::with_players(raw);

        self.deal_hands(&game).await?;
        self.send_all(GameMessage::Start).await?;
        self.announce_turn(&game).await?;
        self.stage = Stage::Turn(game);

        loop {
            if matches!(self.stage, Stage::Ended) {
                return Ok(());
            }
            let envelope = self.next_envelope().await?;
            self.handle_envelope(envelope).await?;
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), RefereeError> {
        let Envelope::Single { addr, payload } = envelope else {
            return Ok(());
        };

        if payload == "DISCONNECT" {
            self.handle_disconnect(addr).await?;
            return Ok(());
        }

        let Some(sender) = addr_to_player(addr) else {
            self.send_single(addr, GameMessage::Illegal).await?;
            return Ok(());
        };

        let msg = match GameMessage::parse(&payload) {
            Ok(msg) => msg,
            Err(_) => {
                self.send_single(addr, GameMessage::Illegal).await?;
                return Ok(());
            }
        };

        let stage = std::mem::replace(&mut self.stage, Stage::Ended);
        self.stage = match stage {
            Stage::Turn(wait_game) => self.on_turn(wait_game, sender, msg).await?,
            Stage::Reacting(game, window) => self.on_reacting(game, window, sender, msg).await?,
            Stage::OnlyBlockable(game, window) => self.on_only_blockable(game, window, sender, msg).await?,
            Stage::OnlyChallengeable(game, window) => self.on_only_challengeable(game, window, sender, msg).await?,
            Stage::Blocked(game, window) => self.on_blocked(game, window, sender, msg).await?,
            Stage::ChallengeResolve(game, accused) => self.on_challenge_resolve(game, accused, sender, msg).await?,
            Stage::ChooseVictim(game) => self.on_choose_victim(game, sender, msg).await?,
            Stage::ChooseOne(game) => self.on_choose_one(game, sender, msg).await?,
            Stage::ChooseTwo(game) => self.on_choose_two(game, sender, msg).await?,
            other @ (Stage::Lobby | Stage::Ended) => {
                self.send_single(addr, GameMessage::Illegal).await?;
                other
            }
        };
        Ok(())
    }

    /// A disconnect mid-round is treated as an implicit pass so the game
    /// does not stall; a disconnect on the acting player's own turn is
    /// left for the operator to notice (`spec.md` names no auto-forfeit
    /// rule for this case).
    async fn handle_disconnect(&mut self, addr: Addr) -> Result<(), RefereeError> {
        warn!(addr, "player disconnected mid-game");
        let Some(id) = addr_to_player(addr) else { return Ok(()) };
        match &mut self.stage {
            Stage::Reacting(_, window)
            | Stage::OnlyBlockable(_, window)
            | Stage::OnlyChallengeable(_, window)
            | Stage::Blocked(_, window) => {
                window.mark_replied(id);
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_turn(&mut self, wait_game: CoupGame<Wait>, sender: PlayerId, msg: GameMessage) -> Result<Stage, RefereeError> {
        let current = wait_game.info().current_player;
        let GameMessage::Act { action: letter, target, .. } = msg else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::Turn(wait_game));
        };
        if sender != current {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::Turn(wait_game));
        }
        let target_id = match target.map(addr_to_player) {
            Some(None) => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                return Ok(Stage::Turn(wait_game));
            }
            Some(Some(id)) => Some(id),
            None => None,
        };

        let Some(action) = find_action(wait_game.actions(), sender, letter, target_id) else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::Turn(wait_game));
        };

        let alive: HashSet<PlayerId> = wait_game.info().players.alive().keys().copied().collect();
        let others: HashSet<PlayerId> = alive.iter().copied().filter(|&id| id != sender).collect();

        self.send_all(GameMessage::Act { id: player_to_addr(sender), action: letter, target }).await?;

        Ok(match wait_game.play(action) {
            ActionKind::Safe(safe_game) => {
                let outcome = safe_game.outcome();
                self.broadcast_outcome(outcome).await?;
                let eliminated = match outcome {
                    Outcome::LosesInfluence { victim } => Some(victim),
                    _ => None,
                };
                let state = safe_game.advance();
                self.enter_game_state(state, eliminated).await?
            }
            ActionKind::OnlyChallengeable(game) => Stage::OnlyChallengeable(game, ReactWindow::new(others)),
            ActionKind::OnlyBlockable(game) => Stage::OnlyBlockable(game, ReactWindow::new(others)),
            ActionKind::Reactable(game) => Stage::Reacting(game, ReactWindow::new(others)),
        })
    }

    async fn on_reacting(
        &mut self,
        game: CoupGame<Reactable>,
        mut window: ReactWindow,
        sender: PlayerId,
        msg: GameMessage,
    ) -> Result<Stage, RefereeError> {
        if !window.expected.contains(&sender) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::Reacting(game, window));
        }

        match msg {
            GameMessage::Block { card, .. } => {
                let found = match game.reactions().block() {
                    Blocks::Other(b) if b.blocker() == sender => Some(b.clone()),
                    Blocks::Steal(b1, b2) => {
                        if b1.blocker() == sender && b1.claim() == card {
                            Some(b1.clone())
                        } else if b2.blocker() == sender && b2.claim() == card {
                            Some(b2.clone())
                        } else {
                            None
                        }
                    }
                    _ => None,
                };
                let Some(block) = found else {
                    self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                    return Ok(Stage::Reacting(game, window));
                };
                self.send_all(GameMessage::Block { id: player_to_addr(sender), card }).await?;
                let blocked = game.block(block);
                let rest: HashSet<PlayerId> =
                    window.expected.iter().copied().filter(|&id| id != sender).collect();
                Ok(Stage::Blocked(blocked, ReactWindow::new(rest)))
            }
            GameMessage::Chal { .. } => {
                window.mark_replied(sender);
                window.first_challenge.get_or_insert(sender);
                self.send_all(GameMessage::Chal { id: player_to_addr(sender) }).await?;
                self.resolve_reacting(game, window).await
            }
            GameMessage::Ok => {
                window.mark_replied(sender);
                self.resolve_reacting(game, window).await
            }
            _ => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                Ok(Stage::Reacting(game, window))
            }
        }
    }

    async fn resolve_reacting(&mut self, game: CoupGame<Reactable>, window: ReactWindow) -> Result<Stage, RefereeError> {
        if !window.all_replied() {
            return Ok(Stage::Reacting(game, window));
        }
        if let Some(challenger) = window.first_challenge {
            let challenge = game.reactions().challenges()[&challenger].clone();
            let accused = challenge.actor();
            let resolving = game.challenge(challenge);
            Ok(Stage::ChallengeResolve(resolving, accused))
        } else {
            let outcome = game.outcome();
            self.broadcast_outcome(outcome).await?;
            let eliminated = match outcome {
                Outcome::LosesInfluence { victim } => Some(victim),
                _ => None,
            };
            let state = game.advance();
            self.enter_game_state(state, eliminated).await
        }
    }

    async fn on_only_blockable(
        &mut self,
        game: CoupGame<OnlyBlockable>,
        mut window: ReactWindow,
        sender: PlayerId,
        msg: GameMessage,
    ) -> Result<Stage, RefereeError> {
        if !window.expected.contains(&sender) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::OnlyBlockable(game, window));
        }
        match msg {
            GameMessage::Block { card, .. } => {
                let Some(block) = game.blocks().all().get(&sender).cloned() else {
                    self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                    return Ok(Stage::OnlyBlockable(game, window));
                };
                self.send_all(GameMessage::Block { id: player_to_addr(sender), card }).await?;
                let blocked = game.block(block);
                let rest: HashSet<PlayerId> =
                    window.expected.iter().copied().filter(|&id| id != sender).collect();
                Ok(Stage::Blocked(blocked, ReactWindow::new(rest)))
            }
            GameMessage::Ok => {
                window.mark_replied(sender);
                if window.all_replied() {
                    let outcome = game.outcome();
                    self.broadcast_outcome(outcome).await?;
                    let wait_game = game.advance();
                    self.announce_turn(&wait_game).await?;
                    Ok(Stage::Turn(wait_game))
                } else {
                    Ok(Stage::OnlyBlockable(game, window))
                }
            }
            _ => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                Ok(Stage::OnlyBlockable(game, window))
            }
        }
    }

    async fn on_only_challengeable(
        &mut self,
        game: CoupGame<OnlyChallengeable>,
        mut window: ReactWindow,
        sender: PlayerId,
        msg: GameMessage,
    ) -> Result<Stage, RefereeError> {
        if !window.expected.contains(&sender) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::OnlyChallengeable(game, window));
        }
        match msg {
            GameMessage::Chal { .. } => {
                window.mark_replied(sender);
                window.first_challenge.get_or_insert(sender);
                self.send_all(GameMessage::Chal { id: player_to_addr(sender) }).await?;
                self.resolve_only_challengeable(game, window).await
            }
            GameMessage::Ok => {
                window.mark_replied(sender);
                self.resolve_only_challengeable(game, window).await
            }
            _ => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                Ok(Stage::OnlyChallengeable(game, window))
            }
        }
    }

    async fn resolve_only_challengeable(
        &mut self,
        game: CoupGame<OnlyChallengeable>,
        window: ReactWindow,
    ) -> Result<Stage, RefereeError> {
        if !window.all_replied() {
            return Ok(Stage::OnlyChallengeable(game, window));
        }
        if let Some(challenger) = window.first_challenge {
            let challenge = game.challenges().all()[&challenger].clone();
            let accused = challenge.actor();
            let resolving = game.challenge(challenge);
            Ok(Stage::ChallengeResolve(resolving, accused))
        } else {
            let outcome = game.outcome();
            self.broadcast_outcome(outcome).await?;
            let eliminated = match outcome {
                Outcome::LosesInfluence { victim } => Some(victim),
                _ => None,
            };
            let state = game.advance();
            self.enter_game_state(state, eliminated).await
        }
    }

    async fn on_blocked(
        &mut self,
        game: CoupGame<Block>,
        mut window: ReactWindow,
        sender: PlayerId,
        msg: GameMessage,
    ) -> Result<Stage, RefereeError> {
        if !window.expected.contains(&sender) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::Blocked(game, window));
        }
        match msg {
            GameMessage::Chal { .. } => {
                let Some(challenge) = game.challenges().all().get(&sender).cloned() else {
                    self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                    return Ok(Stage::Blocked(game, window));
                };
                self.send_all(GameMessage::Chal { id: player_to_addr(sender) }).await?;
                let accused = challenge.actor();
                let resolving = game.challenge(challenge);
                Ok(Stage::ChallengeResolve(resolving, accused))
            }
            GameMessage::Ok => {
                window.mark_replied(sender);
                if window.all_replied() {
                    let outcome = game.outcome();
                    self.broadcast_outcome(outcome).await?;
                    let wait_game = game.advance();
                    self.announce_turn(&wait_game).await?;
                    Ok(Stage::Turn(wait_game))
                } else {
                    Ok(Stage::Blocked(game, window))
                }
            }
            _ => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                Ok(Stage::Blocked(game, window))
            }
        }
    }

    async fn on_challenge_resolve(
        &mut self,
        game: CoupGame<Challenge>,
        accused: PlayerId,
        sender: PlayerId,
        msg: GameMessage,
    ) -> Result<Stage, RefereeError> {
        if sender != accused {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChallengeResolve(game, accused));
        }
        match msg {
            GameMessage::Show { card, .. } => {
                self.send_all(GameMessage::Show { id: Some(player_to_addr(accused)), card }).await?;
            }
            GameMessage::Lose { card, .. } => {
                self.send_all(GameMessage::Lose { id: Some(player_to_addr(accused)), card }).await?;
            }
            _ => {
                self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
                return Ok(Stage::ChallengeResolve(game, accused));
            }
        }
        let outcome = game.outcome();
        self.broadcast_outcome(outcome).await?;
        let eliminated = match outcome {
            Outcome::LosesInfluence { victim } => Some(victim),
            _ => None,
        };
        let state = game.advance();
        self.enter_game_state(state, eliminated).await
    }

    async fn on_choose_victim(&mut self, game: CoupGame<ChooseVictimCard>, sender: PlayerId, msg: GameMessage) -> Result<Stage, RefereeError> {
        let victim = game.victim();
        if sender != victim {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseVictim(game));
        }
        let GameMessage::Lose { card: Some(card), .. } = msg else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseVictim(game));
        };
        if !game.choices().contains(&card) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseVictim(game));
        }
        self.send_all(GameMessage::Lose { id: Some(player_to_addr(victim)), card: Some(card) }).await?;
        let wait_game = game.advance(card);
        self.announce_turn(&wait_game).await?;
        Ok(Stage::Turn(wait_game))
    }

    async fn on_choose_one(&mut self, game: CoupGame<ChooseOneFromThree>, sender: PlayerId, msg: GameMessage) -> Result<Stage, RefereeError> {
        let actor = game.actor();
        if sender != actor {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseOne(game));
        }
        let GameMessage::Keep { cards } = msg else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseOne(game));
        };
        let [kept] = cards.as_slice() else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseOne(game));
        };
        if !game.choices().contains(kept) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseOne(game));
        }
        let wait_game = game.advance(*kept);
        self.announce_turn(&wait_game).await?;
        Ok(Stage::Turn(wait_game))
    }

    async fn on_choose_two(&mut self, game: CoupGame<ChooseTwoFromFour>, sender: PlayerId, msg: GameMessage) -> Result<Stage, RefereeError> {
        let actor = game.actor();
        if sender != actor {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseTwo(game));
        }
        let GameMessage::Keep { cards } = msg else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseTwo(game));
        };
        let [c1, c2] = cards.as_slice() else {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseTwo(game));
        };
        let choices = game.choices();
        if !choices.contains(c1) || !choices.contains(c2) {
            self.send_single(player_to_addr(sender), GameMessage::Illegal).await?;
            return Ok(Stage::ChooseTwo(game));
        }
        let wait_game = game.advance([*c1, *c2]);
        self.announce_turn(&wait_game).await?;
        Ok(Stage::Turn(wait_game))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    /// A raw player connection driven at the wire level, so these tests
    /// exercise the same envelope/grammar round trip a real bot does
    /// rather than calling `Referee`'s private handlers directly.
    struct TestPlayer {
        addr: Addr,
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestPlayer {
        async fn connect(relay_addr: std::net::SocketAddr) -> TestPlayer {
            let stream = TcpStream::connect(relay_addr).await.unwrap();
            let (read_half, writer) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let Envelope::Single { addr, payload } = Envelope::parse(line.trim_end()).unwrap() else {
                panic!("relay did not welcome this connection: {line:?}");
            };
            assert!(payload.starts_with("WELCOME"));
            TestPlayer { addr, reader, writer }
        }

        async fn send(&mut self, msg: GameMessage) {
            let line = Envelope::Single { addr: REFEREE_ADDR, payload: msg.serialize() }.serialize();
            self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> GameMessage {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.unwrap();
            assert!(n > 0, "relay closed the connection unexpectedly");
            let Envelope::Single { payload, .. } = Envelope::parse(line.trim_end()).unwrap() else {
                panic!("expected a Single envelope, got {line:?}");
            };
            GameMessage::parse(&payload).unwrap()
        }

        /// Reads messages until one matches `pred`, returning every message
        /// seen (including the match) so callers can assert on what did, or
        /// did not, appear along the way.
        async fn recv_sequence_until(&mut self, pred: impl Fn(&GameMessage) -> bool) -> Vec<GameMessage> {
            let mut seen = Vec::new();
            loop {
                let msg = self.recv().await;
                let done = pred(&msg);
                seen.push(msg);
                if done {
                    return seen;
                }
            }
        }

        async fn recv_until(&mut self, pred: impl Fn(&GameMessage) -> bool) -> GameMessage {
            self.recv_sequence_until(pred).await.pop().unwrap()
        }
    }

    /// Starts a relay plus referee in-process (auto mode, six players so
    /// the lobby closes deterministically) and returns one `TestPlayer`
    /// per address, sorted so `players[0]` is address 1 and so on.
    async fn start_six_player_game() -> Vec<TestPlayer> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let relay_addr = listener.local_addr().unwrap();
        tokio::spawn(crate::relay::run(listener));

        let referee = Referee::connect(relay_addr, Mode::Auto).await.unwrap();
        tokio::spawn(referee.run());

        let mut players = Vec::new();
        for _ in 0..6 {
            players.push(TestPlayer::connect(relay_addr).await);
        }
        players.sort_by_key(|p| p.addr);

        for player in players.iter_mut() {
            player.send(GameMessage::Hello).await;
        }

        // Every player sees a DECK of their own two cards, then START,
        // then the opening COINS/TURN pair once all six have joined.
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Deck { .. })).await;
            player.recv_until(|m| matches!(m, GameMessage::Start)).await;
            player.recv_until(|m| matches!(m, GameMessage::Turn { .. })).await;
        }
        players
    }

    fn addr_of(id: u32) -> Addr {
        id
    }

    /// Drives one full Income turn for `actor` and waits for every player
    /// to see the next TURN announcement. Income is `Safe`, so there is no
    /// reaction window to resolve in between.
    async fn income_turn(players: &mut [TestPlayer], actor: Addr) {
        let idx = players.iter().position(|p| p.addr == actor).unwrap();
        players[idx]
            .send(GameMessage::Act { id: actor, action: ActionLetter::Income, target: None })
            .await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Turn { .. })).await;
        }
    }

    /// Drives plain Income turns in wire-level turn order — starting from
    /// whoever's turn `turn` names — until `actor` has banked `target`
    /// coins, stopping with play back on `actor`'s own turn so a caller
    /// can immediately follow up with a different action. `coins` is
    /// `actor`'s starting balance.
    async fn build_coins(players: &mut [TestPlayer], actor: Addr, mut turn: Addr, mut coins: u32, target: u32) {
        while !(turn == actor && coins >= target) {
            income_turn(players, turn).await;
            if turn == actor {
                coins += 1;
            }
            turn = if turn == 6 { 1 } else { turn + 1 };
        }
    }

    #[tokio::test]
    async fn block_wins_over_an_already_recorded_challenge() {
        let mut players = start_six_player_game().await;
        // Player One is first to act (test-only deterministic turn order).
        let actor = addr_of(1);
        let victim = addr_of(2);
        let challenger = addr_of(3);

        let actor_idx = players.iter().position(|p| p.addr == actor).unwrap();
        players[actor_idx]
            .send(GameMessage::Act {
                id: actor,
                action: ActionLetter::Assassinate,
                target: Some(victim),
            })
            .await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Act { .. })).await;
        }

        // Player Three challenges the assassination claim first...
        let challenger_idx = players.iter().position(|p| p.addr == challenger).unwrap();
        players[challenger_idx].send(GameMessage::Chal { id: challenger }).await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Chal { .. })).await;
        }

        // ...but the victim's block arrives after, and a block always wins
        // regardless of an already-recorded challenge (`ReactWindow`'s
        // block-short-circuits rule).
        let victim_idx = players.iter().position(|p| p.addr == victim).unwrap();
        players[victim_idx]
            .send(GameMessage::Block { id: victim, card: Card::Contessa })
            .await;
        for player in players.iter_mut() {
            let seen = player
                .recv_sequence_until(|m| matches!(m, GameMessage::Block { .. }))
                .await;
            assert!(
                !seen.iter().any(|m| matches!(m, GameMessage::Show { .. } | GameMessage::Lose { .. })),
                "the pending challenge must never resolve once a block has arrived: {seen:?}",
            );
        }

        // The block itself goes unchallenged: every other still-expected
        // player just OKs it, and the turn moves on without any SHOW/LOSE
        // ever appearing for the original challenge.
        let rest: Vec<Addr> = players
            .iter()
            .map(|p| p.addr)
            .filter(|&a| a != actor && a != victim)
            .collect();
        for addr in rest {
            let idx = players.iter().position(|p| p.addr == addr).unwrap();
            players[idx].send(GameMessage::Ok).await;
        }
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Turn { .. })).await;
        }
    }

    #[tokio::test]
    async fn coins_at_ten_or_more_make_every_non_coup_action_illegal() {
        let mut players = start_six_player_game().await;
        let actor = addr_of(1);
        let others: Vec<Addr> = players.iter().map(|p| p.addr).filter(|&a| a != actor).collect();

        // Player One starts at 2 coins; eight Income turns reach the
        // forced-coup threshold of 10 (`spec.md`'s 10-coin rule).
        build_coins(&mut players, actor, actor, 2, 10).await;

        let actor_idx = players.iter().position(|p| p.addr == actor).unwrap();
        players[actor_idx]
            .send(GameMessage::Act { id: actor, action: ActionLetter::ForeignAid, target: None })
            .await;
        let illegal = players[actor_idx].recv().await;
        assert_eq!(illegal, GameMessage::Illegal);

        // Coup remains legal and proceeds as normal.
        let victim = others[0];
        players[actor_idx]
            .send(GameMessage::Act { id: actor, action: ActionLetter::Coup, target: Some(victim) })
            .await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Act { .. })).await;
        }
    }

    #[tokio::test]
    async fn a_victim_with_one_card_left_is_killed_outright_with_no_choose() {
        let mut players = start_six_player_game().await;
        let actor = addr_of(1);
        let victim = addr_of(2);

        // Build Player One up to coup-affordable coins (7) via Income.
        build_coins(&mut players, actor, actor, 2, 7).await;

        let actor_idx = players.iter().position(|p| p.addr == actor).unwrap();
        let victim_idx = players.iter().position(|p| p.addr == victim).unwrap();

        // First coup: the victim still has two cards, so the referee must
        // ask which one to lose.
        players[actor_idx]
            .send(GameMessage::Act { id: actor, action: ActionLetter::Coup, target: Some(victim) })
            .await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Act { .. })).await;
        }
        let GameMessage::Choose { cards } = players[victim_idx]
            .recv_until(|m| matches!(m, GameMessage::Choose { .. }))
            .await
        else {
            unreachable!()
        };
        let discarded = cards[0];
        players[victim_idx].send(GameMessage::Lose { id: Some(victim), card: Some(discarded) }).await;
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Turn { .. })).await;
        }

        // Rebuild Player One's coins for a second coup. Losing influence
        // does not change turn order, so play has simply moved on to the
        // victim, and the normal 1→2→3→4→5→6 cycle resumes from there.
        build_coins(&mut players, actor, victim, 0, 7).await;

        // Second coup: the victim is already on their last card, so
        // `lose_influence` must go straight through `kill()` — a DEAD
        // notice with no intervening CHOOSE.
        players[actor_idx]
            .send(GameMessage::Act { id: actor, action: ActionLetter::Coup, target: Some(victim) })
            .await;
        for player in players.iter_mut() {
            let seen = player
                .recv_sequence_until(|m| matches!(m, GameMessage::Dead { .. }))
                .await;
            assert!(
                !seen.iter().any(|m| matches!(m, GameMessage::Choose { .. })),
                "a one-card victim must be killed outright, not offered a choice: {seen:?}",
            );
            assert!(seen.iter().any(|m| matches!(m, GameMessage::Dead { id } if *id == victim)));
        }
        for player in players.iter_mut() {
            player.recv_until(|m| matches!(m, GameMessage::Turn { .. })).await;
        }
    }
}
