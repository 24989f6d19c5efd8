//! Game state machine: turns, selection, promotion prompt, terminal
//! detection, clocks, undo history and the move log.

use crate::board::{Color, Move, PieceKind, Position, Square};
use crate::error::MoveError;
use crate::fen::to_fen;
use crate::movegen::{is_in_check, legal_moves, legal_moves_from, resolve_uci};
use crate::time::GameClock;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Position as _};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Timeout { loser: Color },
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::Ongoing
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Ongoing => f.write_str("ongoing"),
            GameStatus::Checkmate { winner } => write!(f, "checkmate, {winner} wins"),
            GameStatus::Stalemate => f.write_str("stalemate"),
            GameStatus::Timeout { loser } => {
                write!(f, "{loser} lost on time, {} wins", loser.opposite())
            }
        }
    }
}

/// Result of clicking a square.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Own piece picked up; these are its legal destinations.
    Selected { from: Square, targets: Vec<Square> },
    Played(GameStatus),
    /// Move parked until a piece is chosen with [`Game::promote`].
    PromotionRequired { from: Square, to: Square },
    Cleared,
    /// Game over or a promotion choice is pending.
    Ignored,
}

pub struct Game {
    position: Position,
    /// Positions before each applied move, oldest first.
    history: Vec<Position>,
    status: GameStatus,
    clock: GameClock,
    per_side: Duration,
    moves: Vec<String>,
    last_move: Option<Move>,
    selected: Option<Square>,
    pending_promotion: Option<Move>,
}

impl Game {
    pub fn new(per_side: Duration) -> Self {
        Self::from_position(Position::standard(), per_side)
    }

    pub fn from_position(position: Position, per_side: Duration) -> Self {
        let mut game = Self {
            position,
            history: Vec::new(),
            status: GameStatus::Ongoing,
            clock: GameClock::new(per_side),
            per_side,
            moves: Vec::new(),
            last_move: None,
            selected: None,
            pending_promotion: None,
        };
        game.status = classify(&game.position);
        game
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Move log in SAN.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    pub fn pending_promotion(&self) -> Option<Move> {
        self.pending_promotion
    }

    /// Half-moves played since the start or the last reset.
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    pub fn fen(&self) -> String {
        to_fen(&self.position)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(&self.position)
    }

    pub fn legal_targets(&self, from: Square) -> Vec<Square> {
        legal_moves_from(&self.position, from)
            .into_iter()
            .map(|mv| mv.to)
            .collect()
    }

    /// King of the side to move, if it is in check.
    pub fn checked_king(&self) -> Option<Square> {
        let side = self.position.side;
        if is_in_check(&self.position.board, side) {
            self.position.board.king_square(side)
        } else {
            None
        }
    }

    /// Apply `mv` if it is legal. Rejected moves leave the game untouched
    /// apart from clearing the selection.
    pub fn play(&mut self, mv: Move) -> Result<GameStatus, MoveError> {
        if self.status.is_over() {
            return Err(MoveError::GameOver(self.status));
        }
        let own = self
            .position
            .board
            .get(mv.from)
            .is_some_and(|p| p.color == self.position.side);
        if !own {
            self.clear_selection();
            return Err(MoveError::NoPiece(mv.from));
        }
        let legal = legal_moves_from(&self.position, mv.from)
            .into_iter()
            .find(|m| m.to == mv.to);
        let Some(legal) = legal else {
            self.clear_selection();
            return Err(MoveError::Illegal(mv.to_uci()));
        };
        let chosen = match mv.promote_to {
            Some(kind) if legal.promotion => legal.with_promotion(kind),
            _ => legal,
        };
        Ok(self.commit(chosen))
    }

    /// Apply a move given in coordinate notation.
    pub fn play_uci(&mut self, uci: &str) -> Result<GameStatus, MoveError> {
        if self.status.is_over() {
            return Err(MoveError::GameOver(self.status));
        }
        match resolve_uci(&self.position, uci) {
            Ok(mv) => Ok(self.commit(mv)),
            Err(err) => {
                self.clear_selection();
                Err(err)
            }
        }
    }

    fn commit(&mut self, mv: Move) -> GameStatus {
        let san = san_for(&self.position, &mv);
        self.history.push(self.position);
        self.position = self.position.apply(&mv);
        self.moves.push(san);
        self.last_move = Some(mv);
        self.clear_selection();
        self.status = classify(&self.position);
        debug!(mv = %mv, ply = self.history.len(), "move applied");
        if self.status.is_over() {
            info!(status = %self.status, "game over");
        }
        self.status
    }

    /// Click on a square.
    pub fn select(&mut self, sq: Square) -> Selection {
        if self.status.is_over() || self.pending_promotion.is_some() {
            return Selection::Ignored;
        }

        if let Some(from) = self.selected {
            let candidate = legal_moves_from(&self.position, from)
                .into_iter()
                .find(|mv| mv.to == sq);
            if let Some(mv) = candidate {
                if mv.promotion {
                    self.pending_promotion = Some(mv);
                    return Selection::PromotionRequired { from, to: sq };
                }
                return Selection::Played(self.commit(mv));
            }
        }

        let own = self
            .position
            .board
            .get(sq)
            .is_some_and(|p| p.color == self.position.side);
        if own {
            self.selected = Some(sq);
            Selection::Selected {
                from: sq,
                targets: self.legal_targets(sq),
            }
        } else {
            self.clear_selection();
            Selection::Cleared
        }
    }

    /// Finish a parked promotion with the chosen piece.
    pub fn promote(&mut self, kind: PieceKind) -> Result<GameStatus, MoveError> {
        let mv = self
            .pending_promotion
            .take()
            .ok_or(MoveError::NoPendingPromotion)?;
        let kind = match kind {
            PieceKind::Pawn | PieceKind::King => PieceKind::Queen,
            other => other,
        };
        self.play(mv.with_promotion(kind))
    }

    pub fn cancel_promotion(&mut self) {
        self.clear_selection();
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.pending_promotion = None;
    }

    /// Take back one half-move. Lifts checkmate or stalemate; a lost clock
    /// stays lost until reset.
    pub fn undo(&mut self) -> bool {
        if matches!(self.status, GameStatus::Timeout { .. }) {
            return false;
        }
        let Some(previous) = self.history.pop() else {
            return false;
        };
        self.position = previous;
        self.moves.pop();
        self.last_move = None;
        self.clear_selection();
        self.status = GameStatus::Ongoing;
        debug!(ply = self.history.len(), "move undone");
        true
    }

    /// Clock length used from the next [`Game::reset`] on.
    pub fn set_time_control(&mut self, per_side: Duration) {
        self.per_side = per_side;
    }

    /// Back to the initial position with fresh clocks.
    pub fn reset(&mut self) {
        *self = Self::new(self.per_side);
        info!("new game");
    }

    /// Run the side to move's clock down. Has no effect once the game is over.
    pub fn tick(&mut self, elapsed: Duration) -> GameStatus {
        if self.status == GameStatus::Ongoing {
            self.clock.tick(self.position.side, elapsed);
            if let Some(loser) = self.clock.flagged() {
                self.status = GameStatus::Timeout { loser };
                info!(status = %self.status, "game over");
            }
        }
        self.status
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

/// Status of `pos` for the side about to move.
pub fn classify(pos: &Position) -> GameStatus {
    if !legal_moves(pos).is_empty() {
        return GameStatus::Ongoing;
    }
    if is_in_check(&pos.board, pos.side) {
        GameStatus::Checkmate {
            winner: pos.side.opposite(),
        }
    } else {
        GameStatus::Stalemate
    }
}

/// Standard algebraic notation for `mv` played from `pos`.
pub fn san_for(pos: &Position, mv: &Move) -> String {
    shakmaty_san(pos, mv).unwrap_or_else(|| plain_notation(mv))
}

fn shakmaty_san(pos: &Position, mv: &Move) -> Option<String> {
    let fen: Fen = to_fen(pos).parse().ok()?;
    let chess: Chess = fen.into_position(CastlingMode::Standard).ok()?;
    let uci = mv.to_uci();
    let m = chess
        .legal_moves()
        .into_iter()
        .find(|m| m.to_uci(CastlingMode::Standard).to_string() == uci)?;
    Some(SanPlus::from_move(chess, &m).to_string())
}

/// `e2-e4`, or `e7-e8=Q` for promotions.
fn plain_notation(mv: &Move) -> String {
    let mut text = format!("{}-{}", mv.from, mv.to);
    if let Some(kind) = mv.promotion_piece() {
        text.push('=');
        text.push(kind.to_char().to_ascii_uppercase());
    }
    text
}
