//! Positions, the Chebyshev metric, and per-room terrain.
//!
//! The scheduler only ever asks two questions of terrain: "is this tile
//! usable as a harvest slot?" and "does it carry a surface improvement?".
//! Both are answered through the [`TerrainQuery`] trait so the slot survey
//! and expansion scans stay independent of how terrain is stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A tile coordinate within a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: diagonal steps count as one.
    pub fn chebyshev(self, other: Position) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Two distinct tiles within one step of each other.
    pub fn is_adjacent(self, other: Position) -> bool {
        self != other && self.chebyshev(other) <= 1
    }

    /// The 8 surrounding tiles in row-major scan order. Scan order is part
    /// of the slot-ordering contract and must stay fixed.
    pub fn neighbors(self) -> [Position; 8] {
        [
            Position::new(self.x - 1, self.y - 1),
            Position::new(self.x, self.y - 1),
            Position::new(self.x + 1, self.y - 1),
            Position::new(self.x - 1, self.y),
            Position::new(self.x + 1, self.y),
            Position::new(self.x - 1, self.y + 1),
            Position::new(self.x, self.y + 1),
            Position::new(self.x + 1, self.y + 1),
        ]
    }

    /// One step toward `target` (sign of each axis delta). Returns `self`
    /// when already there.
    pub fn step_toward(self, target: Position) -> Position {
        Position::new(
            self.x + (target.x - self.x).signum(),
            self.y + (target.y - self.y).signum(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tiles
// ---------------------------------------------------------------------------

/// Base terrain of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    /// Usable as a harvest slot as-is.
    Open,
    /// Usable only once a surface improvement is built on it.
    Rough,
    /// Never usable.
    Blocked,
}

/// Read-only terrain and improvement queries used by slot surveys and
/// expansion scans. Out-of-bounds tiles report [`Tile::Blocked`].
pub trait TerrainQuery {
    fn tile(&self, pos: Position) -> Tile;
    fn has_improvement(&self, pos: Position) -> bool;

    /// Whether a tile can host a harvest slot right now.
    fn is_usable(&self, pos: Position) -> bool {
        match self.tile(pos) {
            Tile::Open => true,
            Tile::Rough => self.has_improvement(pos),
            Tile::Blocked => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Room grid
// ---------------------------------------------------------------------------

/// Durability given to improvements declared via the `=` glyph.
const GLYPH_DURABILITY: u32 = 100;

/// Errors from building a room grid out of glyph rows.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("terrain rows are empty or ragged")]
    BadDimensions,
    #[error("unknown terrain glyph '{glyph}' at row {row}, column {col}")]
    UnknownGlyph { glyph: char, row: usize, col: usize },
}

/// Per-room tile grid plus the surface-improvement overlay.
///
/// Improvements carry durability; they decay over time and are kept alive
/// by upkeep crews. An improvement at zero durability is gone and its tile
/// reverts to bare [`Tile::Rough`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
    improvements: BTreeMap<Position, u32>,
}

impl RoomGrid {
    /// An all-open grid.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Open; (width * height) as usize],
            improvements: BTreeMap::new(),
        }
    }

    /// Parse glyph rows: `.` open, `~` rough, `#` blocked, `=` rough with
    /// an improvement already built.
    pub fn from_rows(rows: &[&str]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(GridError::BadDimensions);
        }

        let mut tiles = Vec::with_capacity(width * height);
        let mut improvements = BTreeMap::new();
        for (row, line) in rows.iter().enumerate() {
            if line.chars().count() != width {
                return Err(GridError::BadDimensions);
            }
            for (col, glyph) in line.chars().enumerate() {
                let tile = match glyph {
                    '.' => Tile::Open,
                    '~' => Tile::Rough,
                    '#' => Tile::Blocked,
                    '=' => {
                        improvements
                            .insert(Position::new(col as i32, row as i32), GLYPH_DURABILITY);
                        Tile::Rough
                    }
                    _ => return Err(GridError::UnknownGlyph { glyph, row, col }),
                };
                tiles.push(tile);
            }
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            tiles,
            improvements,
        })
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width as i32 || pos.y >= self.height as i32 {
            return None;
        }
        Some((pos.y as u32 * self.width + pos.x as u32) as usize)
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) {
        if let Some(i) = self.index(pos) {
            self.tiles[i] = tile;
        }
    }

    /// Place an improvement with the given durability. Replaces any
    /// existing one.
    pub fn build_improvement(&mut self, pos: Position, durability: u32) {
        if self.index(pos).is_some() {
            self.improvements.insert(pos, durability.max(1));
        }
    }

    /// Restore durability on an existing improvement, capped at `max`.
    /// Returns the durability actually added.
    pub fn repair_improvement(&mut self, pos: Position, amount: u32, max: u32) -> u32 {
        match self.improvements.get_mut(&pos) {
            Some(d) => {
                let gain = amount.min(max.saturating_sub(*d));
                *d += gain;
                gain
            }
            None => 0,
        }
    }

    /// Decay every improvement by `rate`; fully decayed ones are removed.
    /// Returns the positions that lost their improvement this call.
    pub fn decay_improvements(&mut self, rate: u32) -> Vec<Position> {
        let mut gone = Vec::new();
        for (pos, d) in self.improvements.iter_mut() {
            *d = d.saturating_sub(rate);
            if *d == 0 {
                gone.push(*pos);
            }
        }
        for pos in &gone {
            self.improvements.remove(pos);
        }
        gone
    }

    /// The most-worn improvement within one tile of any of `anchors`.
    /// Ties break on the lowest position, keeping the choice deterministic.
    pub fn most_worn_near(&self, anchors: &[Position]) -> Option<(Position, u32)> {
        self.improvements
            .iter()
            .filter(|(pos, _)| anchors.iter().any(|a| a.chebyshev(**pos) <= 1))
            .map(|(pos, d)| (*pos, *d))
            .min_by_key(|(pos, d)| (*d, *pos))
    }

    pub fn improvement_durability(&self, pos: Position) -> Option<u32> {
        self.improvements.get(&pos).copied()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl TerrainQuery for RoomGrid {
    fn tile(&self, pos: Position) -> Tile {
        match self.index(pos) {
            Some(i) => self.tiles[i],
            None => Tile::Blocked,
        }
    }

    fn has_improvement(&self, pos: Position) -> bool {
        self.improvements.contains_key(&pos)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_counts_diagonals_as_one() {
        let a = Position::new(2, 2);
        assert_eq!(a.chebyshev(Position::new(3, 3)), 1);
        assert_eq!(a.chebyshev(Position::new(5, 2)), 3);
        assert_eq!(a.chebyshev(Position::new(2, 2)), 0);
    }

    #[test]
    fn adjacency_excludes_self() {
        let a = Position::new(4, 4);
        assert!(a.is_adjacent(Position::new(5, 5)));
        assert!(!a.is_adjacent(a));
        assert!(!a.is_adjacent(Position::new(6, 4)));
    }

    #[test]
    fn neighbors_are_row_major() {
        let n = Position::new(1, 1).neighbors();
        assert_eq!(n[0], Position::new(0, 0));
        assert_eq!(n[3], Position::new(0, 1));
        assert_eq!(n[7], Position::new(2, 2));
    }

    #[test]
    fn step_toward_moves_diagonally() {
        let a = Position::new(0, 0);
        assert_eq!(a.step_toward(Position::new(3, 5)), Position::new(1, 1));
        assert_eq!(a.step_toward(a), a);
    }

    #[test]
    fn from_rows_parses_all_glyphs() {
        let grid = RoomGrid::from_rows(&[".~#", "=..", "..."]).unwrap();
        assert_eq!(grid.tile(Position::new(0, 0)), Tile::Open);
        assert_eq!(grid.tile(Position::new(1, 0)), Tile::Rough);
        assert_eq!(grid.tile(Position::new(2, 0)), Tile::Blocked);
        assert_eq!(grid.tile(Position::new(0, 1)), Tile::Rough);
        assert!(grid.has_improvement(Position::new(0, 1)));
        assert!(grid.is_usable(Position::new(0, 1)));
        assert!(!grid.is_usable(Position::new(1, 0)));
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        assert!(matches!(
            RoomGrid::from_rows(&["..", "..."]),
            Err(GridError::BadDimensions)
        ));
        assert!(matches!(RoomGrid::from_rows(&[]), Err(GridError::BadDimensions)));
    }

    #[test]
    fn from_rows_rejects_unknown_glyph() {
        assert!(matches!(
            RoomGrid::from_rows(&[".x"]),
            Err(GridError::UnknownGlyph { glyph: 'x', row: 0, col: 1 })
        ));
    }

    #[test]
    fn out_of_bounds_is_blocked() {
        let grid = RoomGrid::open(3, 3);
        assert_eq!(grid.tile(Position::new(-1, 0)), Tile::Blocked);
        assert_eq!(grid.tile(Position::new(3, 0)), Tile::Blocked);
    }

    #[test]
    fn improvement_decay_removes_at_zero() {
        let mut grid = RoomGrid::open(3, 3);
        grid.set_tile(Position::new(1, 1), Tile::Rough);
        grid.build_improvement(Position::new(1, 1), 3);

        assert!(grid.decay_improvements(1).is_empty());
        assert!(grid.decay_improvements(1).is_empty());
        let gone = grid.decay_improvements(1);
        assert_eq!(gone, vec![Position::new(1, 1)]);
        assert!(!grid.has_improvement(Position::new(1, 1)));
        assert!(!grid.is_usable(Position::new(1, 1)));
    }

    #[test]
    fn repair_is_capped() {
        let mut grid = RoomGrid::open(3, 3);
        grid.build_improvement(Position::new(0, 0), 5);
        assert_eq!(grid.repair_improvement(Position::new(0, 0), 10, 8), 3);
        assert_eq!(grid.improvement_durability(Position::new(0, 0)), Some(8));
        assert_eq!(grid.repair_improvement(Position::new(2, 2), 10, 8), 0);
    }

    #[test]
    fn most_worn_prefers_lowest_durability() {
        let mut grid = RoomGrid::open(5, 5);
        grid.build_improvement(Position::new(1, 1), 9);
        grid.build_improvement(Position::new(2, 1), 4);
        grid.build_improvement(Position::new(4, 4), 1); // out of range of anchors

        let anchors = [Position::new(1, 2), Position::new(2, 2)];
        assert_eq!(grid.most_worn_near(&anchors), Some((Position::new(2, 1), 4)));
    }
}
