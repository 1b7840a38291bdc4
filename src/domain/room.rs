//! Room aggregate: two seats, an optional game, and the agreement
//! protocols around it.
//!
//! A room owns its game exclusively: board, clock, pending draw/rematch
//! sets and the move log all live behind the room and are only reachable
//! through the transition methods here. Every mutator validates fully
//! before touching state, so a rejected transition leaves the aggregate
//! unchanged (apart from ordinary clock sampling).

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::board::{BoardEngine, BoardTermination, Side};
use super::clock::GameClock;
use super::error::SessionError;
use super::value_object::{RoomId, UserId, Username};

/// An occupant of a room (also the shape presence reports online users in).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub user_id: UserId,
    pub username: Username,
}

/// Room lifecycle phase as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Ready,
    Playing,
}

/// Terminal-status classification of a game snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Timeout,
    Draw,
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
}

/// One applied move as kept in the per-game log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub san: String,
    pub by_user_id: UserId,
    pub timestamp: i64,
}

/// The authoritative view of game + clock + terminal status at a moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub fen: String,
    pub turn: Side,
    pub is_check: bool,
    pub status: GameStatus,
    pub winner: Option<Side>,
    pub white_ms: i64,
    pub black_ms: i64,
    pub white: Player,
    pub black: Player,
}

impl GameSnapshot {
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }
}

/// Data broadcast when a game starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStart {
    pub white: Player,
    pub black: Player,
    pub fen: String,
    pub turn: Side,
}

/// Result of removing an occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub player: Player,
    pub game_dropped: bool,
    pub now_empty: bool,
}

/// Outcome of a draw offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRequestOutcome {
    pub opponent: Player,
}

/// Outcome of responding to a draw offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawRespondOutcome {
    Accepted,
    Declined,
}

/// Outcome of a rematch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RematchRequestOutcome {
    Waiting { opponent: Player },
    Started(GameStart),
}

/// Outcome of responding to a rematch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RematchRespondOutcome {
    Declined,
    Started(GameStart),
}

/// A game in progress (or just finished) between the two seats.
#[derive(Debug, Clone)]
pub struct Game {
    board: BoardEngine,
    white: Player,
    black: Player,
    clock: GameClock,
    agreed_draw: bool,
    pending_draw: HashSet<UserId>,
    pending_rematch: HashSet<UserId>,
    moves: Vec<MoveRecord>,
    over_announced: bool,
}

impl Game {
    fn new(white: Player, black: Player, now: i64) -> Self {
        Self {
            board: BoardEngine::new(),
            white,
            black,
            clock: GameClock::start(now),
            agreed_draw: false,
            pending_draw: HashSet::new(),
            pending_rematch: HashSet::new(),
            moves: Vec::new(),
            over_announced: false,
        }
    }

    pub fn seat_of(&self, user_id: &UserId) -> Option<Side> {
        if &self.white.user_id == user_id {
            Some(Side::White)
        } else if &self.black.user_id == user_id {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// The other seat, as stored at game start (the opponent may have
    /// left the room since, for an ended game).
    pub fn opponent(&self, user_id: &UserId) -> Option<&Player> {
        match self.seat_of(user_id)? {
            Side::White => Some(&self.black),
            Side::Black => Some(&self.white),
        }
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    /// Fold the clock and classify, applying the termination precedence:
    /// clock expiry, agreed draw, then the board-derived endings.
    fn snapshot(&mut self, now: i64) -> GameSnapshot {
        self.clock.sample(now);
        let (status, winner) = if let Some(flagged) = self.clock.expired() {
            (GameStatus::Timeout, Some(flagged.opposite()))
        } else if self.agreed_draw {
            (GameStatus::Draw, None)
        } else {
            match self.board.termination() {
                BoardTermination::Checkmate => {
                    (GameStatus::Checkmate, Some(self.board.turn().opposite()))
                }
                BoardTermination::Stalemate => (GameStatus::Stalemate, None),
                BoardTermination::InsufficientMaterial => {
                    (GameStatus::InsufficientMaterial, None)
                }
                BoardTermination::ThreefoldRepetition => {
                    (GameStatus::ThreefoldRepetition, None)
                }
                BoardTermination::Draw => (GameStatus::Draw, None),
                BoardTermination::Active => (GameStatus::Active, None),
            }
        };
        if status != GameStatus::Active {
            self.clock.freeze();
        }
        GameSnapshot {
            fen: self.board.fen(),
            turn: self.board.turn(),
            is_check: self.board.is_check(),
            status,
            winner,
            white_ms: self.clock.remaining(Side::White),
            black_ms: self.clock.remaining(Side::Black),
            white: self.white.clone(),
            black: self.black.clone(),
        }
    }
}

/// The room aggregate.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    players: Vec<Player>,
    game: Option<Game>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            players: Vec::new(),
            game: None,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn is_occupant(&self, user_id: &UserId) -> bool {
        self.players.iter().any(|p| &p.user_id == user_id)
    }

    pub fn phase(&self) -> RoomPhase {
        if self.game.is_some() {
            RoomPhase::Playing
        } else if self.players.len() == 2 {
            RoomPhase::Ready
        } else {
            RoomPhase::Waiting
        }
    }

    /// Seat color of `user_id` in the current game, if any.
    pub fn seat_of(&self, user_id: &UserId) -> Option<Side> {
        self.game.as_ref().and_then(|g| g.seat_of(user_id))
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    /// Add an occupant. Re-joining an occupied seat is a no-op.
    pub fn join(&mut self, player: Player) -> Result<(), SessionError> {
        if self.is_occupant(&player.user_id) {
            return Ok(());
        }
        if self.players.len() >= 2 {
            return Err(SessionError::RoomFull);
        }
        self.players.push(player);
        Ok(())
    }

    /// Remove an occupant. A leaver seated in an active game takes the
    /// game down with them; an ended game is kept so the survivor can
    /// still read the final position.
    pub fn leave(&mut self, user_id: &UserId, now: i64) -> Option<LeaveOutcome> {
        let idx = self.players.iter().position(|p| &p.user_id == user_id)?;
        let player = self.players.remove(idx);
        let game_dropped = match self.game.as_mut() {
            Some(game) => game.seat_of(user_id).is_some() && game.snapshot(now).is_active(),
            None => false,
        };
        if game_dropped {
            self.game = None;
        }
        Some(LeaveOutcome {
            player,
            game_dropped,
            now_empty: self.players.is_empty(),
        })
    }

    /// Start a game when exactly two seats are taken and no live game
    /// between them exists. Colors are a uniform-random permutation.
    pub fn maybe_start(&mut self, now: i64) -> Option<GameStart> {
        if self.players.len() != 2 {
            return None;
        }
        if let Some(game) = &self.game {
            let both_present = self.is_occupant(&game.white.user_id)
                && self.is_occupant(&game.black.user_id);
            if both_present {
                return None;
            }
            // stale game from a departed pairing
            self.game = None;
        }
        let mut seats = [self.players[0].clone(), self.players[1].clone()];
        if rand::thread_rng().gen_bool(0.5) {
            seats.swap(0, 1);
        }
        let [white, black] = seats;
        let game = Game::new(white.clone(), black.clone(), now);
        let start = GameStart {
            white,
            black,
            fen: game.board.fen(),
            turn: game.board.turn(),
        };
        self.game = Some(game);
        Some(start)
    }

    /// Authoritative game view, folding the clock at `now`.
    pub fn snapshot(&mut self, now: i64) -> Option<GameSnapshot> {
        Some(self.game.as_mut()?.snapshot(now))
    }

    /// First terminal snapshot after a game ends, exactly once.
    ///
    /// Callers broadcast `game:over` iff this returns `Some`, regardless
    /// of which event observed the end.
    pub fn announce_over_once(&mut self, now: i64) -> Option<GameSnapshot> {
        let game = self.game.as_mut()?;
        let snap = game.snapshot(now);
        if !snap.is_active() && !game.over_announced {
            game.over_announced = true;
            Some(snap)
        } else {
            None
        }
    }

    /// Apply a move for `user_id`, enforcing the pre-checks in order.
    pub fn apply_move(
        &mut self,
        user_id: &UserId,
        from: &str,
        to: &str,
        promotion: Option<char>,
        now: i64,
    ) -> Result<(MoveRecord, GameSnapshot), SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        if !game.snapshot(now).is_active() {
            return Err(SessionError::GameAlreadyOver);
        }
        let seat = game.seat_of(user_id).ok_or(SessionError::NotAPlayer)?;
        if game.board.turn() != seat {
            return Err(SessionError::NotYourTurn);
        }
        let from = from.trim().to_ascii_lowercase();
        let to = to.trim().to_ascii_lowercase();
        if from.is_empty() || to.is_empty() {
            return Err(SessionError::MissingSquares);
        }
        let applied = game
            .board
            .apply(&from, &to, promotion)
            .map_err(|_| SessionError::IllegalMove)?;

        game.clock.switch(now);
        let record = MoveRecord {
            from,
            to,
            san: applied.san,
            by_user_id: user_id.clone(),
            timestamp: now,
        };
        game.moves.push(record.clone());
        let snapshot = game.snapshot(now);
        Ok((record, snapshot))
    }

    /// Offer a draw. Repeating an offer is idempotent; offers stay
    /// pending until responded or the game ends.
    pub fn request_draw(
        &mut self,
        user_id: &UserId,
        now: i64,
    ) -> Result<DrawRequestOutcome, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        if !game.snapshot(now).is_active() {
            return Err(SessionError::GameAlreadyOver);
        }
        game.seat_of(user_id).ok_or(SessionError::NotAPlayer)?;
        let opponent = game
            .opponent(user_id)
            .cloned()
            .ok_or(SessionError::NotAPlayer)?;
        game.pending_draw.insert(user_id.clone());
        Ok(DrawRequestOutcome { opponent })
    }

    /// Answer the opponent's draw offer. Accept ends the game as an
    /// agreed draw; either answer clears the pending offer.
    pub fn respond_draw(
        &mut self,
        user_id: &UserId,
        accept: bool,
        now: i64,
    ) -> Result<DrawRespondOutcome, SessionError> {
        let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
        if !game.snapshot(now).is_active() {
            return Err(SessionError::GameAlreadyOver);
        }
        game.seat_of(user_id).ok_or(SessionError::NotAPlayer)?;
        let opponent = game
            .opponent(user_id)
            .cloned()
            .ok_or(SessionError::NotAPlayer)?;
        if !game.pending_draw.contains(&opponent.user_id) {
            return Err(SessionError::NoDrawRequest);
        }
        game.pending_draw.clear();
        if accept {
            game.agreed_draw = true;
            Ok(DrawRespondOutcome::Accepted)
        } else {
            Ok(DrawRespondOutcome::Declined)
        }
    }

    /// Request a rematch after a finished game. When both seats have
    /// requested, the old game is replaced and colors re-randomized.
    pub fn request_rematch(
        &mut self,
        user_id: &UserId,
        now: i64,
    ) -> Result<RematchRequestOutcome, SessionError> {
        let (opponent, both_ready) = {
            let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
            game.seat_of(user_id)
                .ok_or(SessionError::RematchRequestNotPlayer)?;
            if game.snapshot(now).is_active() {
                return Err(SessionError::RematchBeforeGameOver);
            }
            let opponent = game
                .opponent(user_id)
                .cloned()
                .ok_or(SessionError::OpponentGone)?;
            if !self.players.iter().any(|p| p.user_id == opponent.user_id) {
                return Err(SessionError::OpponentGone);
            }
            game.pending_rematch.insert(user_id.clone());
            let both = game.pending_rematch.contains(&opponent.user_id);
            (opponent, both)
        };
        if !both_ready {
            return Ok(RematchRequestOutcome::Waiting { opponent });
        }
        self.game = None;
        let start = self.maybe_start(now).ok_or(SessionError::OpponentGone)?;
        Ok(RematchRequestOutcome::Started(start))
    }

    /// Answer the opponent's rematch request.
    pub fn respond_rematch(
        &mut self,
        user_id: &UserId,
        accept: bool,
        now: i64,
    ) -> Result<RematchRespondOutcome, SessionError> {
        {
            let game = self.game.as_mut().ok_or(SessionError::GameNotStarted)?;
            game.seat_of(user_id)
                .ok_or(SessionError::RematchRespondNotPlayer)?;
            let opponent = game
                .opponent(user_id)
                .cloned()
                .ok_or(SessionError::OpponentGone)?;
            if !game.pending_rematch.contains(&opponent.user_id) {
                return Err(SessionError::NoRematchRequest);
            }
            if !accept {
                game.pending_rematch.clear();
                return Ok(RematchRespondOutcome::Declined);
            }
            if !self.players.iter().any(|p| p.user_id == opponent.user_id) {
                return Err(SessionError::OpponentGone);
            }
        }
        self.game = None;
        let start = self.maybe_start(now).ok_or(SessionError::OpponentGone)?;
        Ok(RematchRespondOutcome::Started(start))
    }
}
