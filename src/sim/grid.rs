//! Uniform-grid broad phase
//!
//! Cells are `2 * max_radius` wide, so any two touching circles sit in the
//! same cell or in one of the eight cells around it. The grid is rebuilt from
//! scratch every step.

use glam::Vec2;
use rustc_hash::FxHashMap;

/// Maps positions to integer cell coordinates and packed 64-bit keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHasher {
    pub cell_size: f32,
}

impl GridHasher {
    pub fn new(cell_size: f32) -> Self {
        Self { cell_size }
    }

    /// Pack two signed cell coordinates into one key: `x` in the high 32
    /// bits, `y` in the low 32 bits.
    #[inline]
    pub fn hash(x: i32, y: i32) -> i64 {
        ((x as i64) << 32) | (y as u32 as i64)
    }

    /// Inverse of `hash`
    #[inline]
    pub fn unhash(key: i64) -> (i32, i32) {
        ((key >> 32) as i32, key as u32 as i32)
    }

    #[inline]
    pub fn grid_coord(&self, value: f32) -> i32 {
        (value / self.cell_size).floor() as i32
    }

    #[inline]
    fn cell_of(&self, position: Vec2) -> (i32, i32) {
        (self.grid_coord(position.x), self.grid_coord(position.y))
    }

    #[inline]
    pub fn key_of(&self, position: Vec2) -> i64 {
        let (x, y) = self.cell_of(position);
        Self::hash(x, y)
    }
}

/// Particle indices bucketed by cell
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cells: FxHashMap<i64, Vec<usize>>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from `positions`, where each position's slice index is its
    /// particle index. One pass, no incremental update.
    pub fn build<I>(&mut self, hasher: &GridHasher, positions: I)
    where
        I: IntoIterator<Item = Vec2>,
    {
        self.cells.clear();
        for (index, position) in positions.into_iter().enumerate() {
            self.cells
                .entry(hasher.key_of(position))
                .or_default()
                .push(index);
        }
    }

    /// The nine keys around (and including) `key`
    pub fn neighbors_of(key: i64) -> [i64; 9] {
        let (x, y) = GridHasher::unhash(key);
        let mut keys = [0i64; 9];
        let mut n = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                keys[n] = GridHasher::hash(x.wrapping_add(dx), y.wrapping_add(dy));
                n += 1;
            }
        }
        keys
    }

    pub fn cell(&self, key: i64) -> Option<&[usize]> {
        self.cells.get(&key).map(Vec::as_slice)
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Every unordered index pair that shares a cell or sits in adjacent
    /// cells, each pair exactly once as `(i, j)` with `i < j`.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        self.collect_candidate_pairs(&mut pairs);
        pairs
    }

    /// `candidate_pairs` into a reusable buffer
    pub fn collect_candidate_pairs(&self, pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        for (&key, members) in &self.cells {
            for neighbor_key in Self::neighbors_of(key) {
                let Some(neighbors) = self.cells.get(&neighbor_key) else {
                    continue;
                };
                for &i in members {
                    for &j in neighbors {
                        if i < j {
                            pairs.push((i, j));
                        }
                    }
                }
            }
        }
    }
}
