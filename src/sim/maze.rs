//! Perfect maze generation
//!
//! Randomized Kruskal over the odd-indexed cells: every (odd, odd) cell is a
//! passage seed, every cell between two seeds is a removable wall, and walls
//! are knocked down in shuffled order whenever they join two separate
//! regions. The result is a spanning tree over the seeds.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::consts::{MAX_MAZE_SIZE, MIN_MAZE_SIZE};
use crate::error::{Result, SimError};

/// A grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Wall,
    Passage,
}

/// Row-major wall/passage grid with odd dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, cell: Cell) -> Self {
        Self {
            width,
            height,
            cells: vec![cell; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    pub fn is_wall(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == Some(Cell::Wall)
    }

    pub fn is_passage(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == Some(Cell::Passage)
    }

    /// (odd, odd) cells are the passage seeds
    pub fn is_seed(x: usize, y: usize) -> bool {
        x % 2 == 1 && y % 2 == 1
    }

    /// Seed cells that are passages, row by row
    pub fn seed_cells(&self) -> Vec<(usize, usize)> {
        (1..self.height)
            .step_by(2)
            .flat_map(|y| (1..self.width).step_by(2).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_passage(x, y))
            .collect()
    }

    /// Every wall cell, row by row
    pub fn wall_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_wall(x, y))
    }

    pub fn passage_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Cell::Passage).count()
    }

    /// Force the outer ring back to walls
    pub fn enclose(&mut self) {
        let (w, h) = (self.width, self.height);
        for x in 0..w {
            self.set(x, 0, Cell::Wall);
            self.set(x, h - 1, Cell::Wall);
        }
        for y in 0..h {
            self.set(0, y, Cell::Wall);
            self.set(w - 1, y, Cell::Wall);
        }
    }

    /// Punch a centered gap into the top row.
    ///
    /// The gap is always odd so it stays symmetric around the middle column:
    /// a requested width of `w` opens `2 * (w / 2) + 1` cells. Returns the
    /// opened column range.
    pub fn open_top(&mut self, width: usize) -> std::ops::RangeInclusive<usize> {
        let middle = self.width / 2;
        let half = (width / 2).min(middle);
        let range = (middle - half)..=(middle + half).min(self.width.saturating_sub(1));
        for x in range.clone() {
            self.set(x, 0, Cell::Passage);
        }
        range
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = if self.is_wall(x, y) { '#' } else { ' ' };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Wall cell between two seed cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallEdge {
    pub a: (usize, usize),
    pub b: (usize, usize),
    pub wall: (usize, usize),
}

/// Union-find over seed indices with path halving and union by rank
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merge the groups of `a` and `b`; false if they were already joined
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// Round an even size down to the nearest odd value
#[inline]
pub fn coerce_odd(n: usize) -> usize {
    if n % 2 == 0 { n.saturating_sub(1) } else { n }
}

/// Generate a perfect maze of (coerced) size `width` x `height`
pub fn generate<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Result<Grid> {
    let (width, height) = (coerce_odd(width), coerce_odd(height));
    let range = MIN_MAZE_SIZE..=MAX_MAZE_SIZE;
    if !range.contains(&width) || !range.contains(&height) {
        return Err(SimError::InvalidSize { width, height });
    }

    let mut grid = Grid::filled(width, height, Cell::Wall);
    let seeds_per_row = (width - 1) / 2;
    let seed_index = |(x, y): (usize, usize)| ((y - 1) / 2) * seeds_per_row + (x - 1) / 2;

    let mut edges = Vec::new();
    for y in (1..height).step_by(2) {
        for x in (1..width).step_by(2) {
            grid.set(x, y, Cell::Passage);
            if x + 2 < width {
                edges.push(WallEdge {
                    a: (x, y),
                    b: (x + 2, y),
                    wall: (x + 1, y),
                });
            }
            if y + 2 < height {
                edges.push(WallEdge {
                    a: (x, y),
                    b: (x, y + 2),
                    wall: (x, y + 1),
                });
            }
        }
    }

    edges.shuffle(rng);

    let mut groups = DisjointSet::new(seeds_per_row * ((height - 1) / 2));
    let mut carved = 0usize;
    for edge in edges {
        if groups.union(seed_index(edge.a), seed_index(edge.b)) {
            grid.set(edge.wall.0, edge.wall.1, Cell::Passage);
            carved += 1;
        }
    }

    grid.enclose();
    log::debug!("Generated {width}x{height} maze, {carved} walls carved");
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::collections::VecDeque;

    const NEIGHBORS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

    fn passage_neighbors(grid: &Grid, x: usize, y: usize) -> Vec<(usize, usize)> {
        NEIGHBORS
            .iter()
            .filter_map(|&(dx, dy)| {
                let nx = x.checked_add_signed(dx)?;
                let ny = y.checked_add_signed(dy)?;
                grid.is_passage(nx, ny).then_some((nx, ny))
            })
            .collect()
    }

    /// Number of passage cells reachable from the first passage
    fn reachable(grid: &Grid) -> usize {
        let Some(start) = grid.seed_cells().first().copied() else {
            return 0;
        };
        let mut seen = vec![false; grid.width() * grid.height()];
        let mut queue = VecDeque::from([start]);
        seen[start.1 * grid.width() + start.0] = true;
        let mut count = 0;
        while let Some((x, y)) = queue.pop_front() {
            count += 1;
            for (nx, ny) in passage_neighbors(grid, x, y) {
                let idx = ny * grid.width() + nx;
                if !seen[idx] {
                    seen[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        count
    }

    /// Independent cycles in the passage graph (E - N + components), assuming connected
    fn cycle_rank(grid: &Grid) -> isize {
        let mut edges = 0;
        for y in 0..grid.height() {
            for x in 0..grid.width() {
                if grid.is_passage(x, y) {
                    edges += [(1, 0), (0, 1)]
                        .iter()
                        .filter(|&&(dx, dy)| grid.is_passage(x + dx, y + dy))
                        .count();
                }
            }
        }
        edges as isize - grid.passage_count() as isize + 1
    }

    fn carved_walls(grid: &Grid) -> usize {
        (0..grid.height())
            .flat_map(|y| (0..grid.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| grid.is_passage(x, y) && !Grid::is_seed(x, y))
            .count()
    }

    #[test]
    fn test_eleven_by_eleven_is_a_tree() {
        let mut rng = Pcg32::seed_from_u64(7);
        let grid = generate(11, 11, &mut rng).unwrap();
        assert_eq!(grid.seed_cells().len(), 25);
        assert_eq!(carved_walls(&grid), 24);
        assert_eq!(reachable(&grid), grid.passage_count());
        assert_eq!(cycle_rank(&grid), 0);
    }

    #[test]
    fn test_even_sizes_round_down() {
        let mut rng = Pcg32::seed_from_u64(1);
        let grid = generate(12, 10, &mut rng).unwrap();
        assert_eq!((grid.width(), grid.height()), (11, 9));
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(matches!(
            generate(2, 11, &mut rng),
            Err(SimError::InvalidSize { width: 1, height: 11 })
        ));
        assert!(matches!(
            generate(11, 103, &mut rng),
            Err(SimError::InvalidSize { .. })
        ));
        // 102 coerces to 101 which is allowed
        assert!(generate(3, 102, &mut rng).is_ok());
    }

    #[test]
    fn test_smallest_maze() {
        let mut rng = Pcg32::seed_from_u64(3);
        let grid = generate(3, 3, &mut rng).unwrap();
        assert_eq!(grid.passage_count(), 1);
        assert!(grid.is_passage(1, 1));
    }

    #[test]
    fn test_open_top_is_centered_and_odd() {
        let mut rng = Pcg32::seed_from_u64(11);
        let mut grid = generate(25, 25, &mut rng).unwrap();
        assert_eq!(grid.open_top(5), 10..=14);
        assert!((10..=14).all(|x| grid.is_passage(x, 0)));
        assert!(grid.is_wall(9, 0) && grid.is_wall(15, 0));

        // Even request widens to stay symmetric
        let mut grid = generate(11, 11, &mut rng).unwrap();
        assert_eq!(grid.open_top(2), 4..=6);
    }

    #[test]
    fn test_disjoint_set_union() {
        let mut set = DisjointSet::new(4);
        assert!(set.union(0, 1));
        assert!(set.union(2, 3));
        assert!(!set.union(1, 0));
        assert!(set.union(1, 3));
        assert_eq!(set.find(0), set.find(2));
    }

    #[test]
    fn test_display_draws_walls() {
        let mut rng = Pcg32::seed_from_u64(5);
        let grid = generate(5, 3, &mut rng).unwrap();
        let text = grid.to_string();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().next(), Some("#####"));
        assert_eq!(text.lines().nth(1), Some("#   #"));
    }

    proptest! {
        #[test]
        fn generated_maze_is_perfect(w in 3usize..45, h in 3usize..45, seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let grid = generate(w, h, &mut rng).unwrap();

            // Border is always wall
            for x in 0..grid.width() {
                prop_assert!(grid.is_wall(x, 0));
                prop_assert!(grid.is_wall(x, grid.height() - 1));
            }
            for y in 0..grid.height() {
                prop_assert!(grid.is_wall(0, y));
                prop_assert!(grid.is_wall(grid.width() - 1, y));
            }

            // Connected and acyclic
            prop_assert_eq!(reachable(&grid), grid.passage_count());
            prop_assert_eq!(cycle_rank(&grid), 0);
            let seeds = grid.seed_cells().len();
            prop_assert_eq!(carved_walls(&grid), seeds - 1);
        }

        #[test]
        fn reopening_any_wall_adds_one_cycle(seed in any::<u64>()) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let grid = generate(9, 9, &mut rng).unwrap();
            let candidates: Vec<_> = grid
                .wall_cells()
                .filter(|&(x, y)| {
                    x > 0 && y > 0 && x < grid.width() - 1 && y < grid.height() - 1
                        && (x % 2) != (y % 2)
                })
                .collect();
            for (x, y) in candidates {
                let mut opened = grid.clone();
                opened.set(x, y, Cell::Passage);
                prop_assert_eq!(cycle_rank(&opened), 1);
            }
        }
    }
}
