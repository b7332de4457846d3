//! Uniform-grid spatial hashing and overlap resolution.
//!
//! The grid is rebuilt from scratch on every collision pass with a
//! counting sort, so each cell owns a contiguous run of particle indices.
//! Cells are at least one particle diameter wide, so a particle can only
//! overlap particles in its own cell or one of the eight around it. Each
//! cell checks itself and its four forward neighbours, which visits every
//! neighbouring pair exactly once.

use glam::Vec2;
use std::ops::Range;

/// Forward neighbour offsets `(dx, dy)`.
pub const FORWARD_NEIGHBORS: [(i64, i64); 4] = [(1, -1), (1, 0), (1, 1), (0, 1)];

/// Grid geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridDims {
    /// Side length of a cell in pixels.
    pub cell_size: f32,
    /// Number of columns.
    pub cells_x: u32,
    /// Number of rows.
    pub cells_y: u32,
}

impl GridDims {
    /// Grid covering a `width` x `height` canvas.
    pub fn covering(width: f32, height: f32, cell_size: f32) -> Self {
        Self {
            cell_size,
            cells_x: (width / cell_size) as u32 + 1,
            cells_y: (height / cell_size) as u32 + 1,
        }
    }

    /// Total number of cells.
    #[inline]
    pub fn total_cells(&self) -> usize {
        self.cells_x as usize * self.cells_y as usize
    }

    /// Cell id for a position, clamped into the grid.
    #[inline]
    pub fn cell_of(&self, p: Vec2) -> u32 {
        let cx = ((p.x / self.cell_size).floor() as i64).clamp(0, self.cells_x as i64 - 1) as u32;
        let cy = ((p.y / self.cell_size).floor() as i64).clamp(0, self.cells_y as i64 - 1) as u32;
        cx + cy * self.cells_x
    }
}

/// Cell-sorted particle index, rebuilt every pass.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    dims: GridDims,
    /// `cell_start[c]..cell_start[c + 1]` is the run of cell `c` in `sorted`.
    cell_start: Vec<u32>,
    /// Particle indices grouped by cell, ascending within a cell.
    sorted: Vec<u32>,
    cell_ids: Vec<u32>,
    cursor: Vec<u32>,
}

impl SpatialHash {
    pub fn new(dims: GridDims) -> Self {
        let cells = dims.total_cells();
        Self {
            dims,
            cell_start: vec![0; cells + 1],
            sorted: Vec::new(),
            cell_ids: Vec::new(),
            cursor: vec![0; cells],
        }
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Bucket `positions` by cell.
    pub fn rebuild(&mut self, positions: &[Vec2]) {
        let n = positions.len();
        self.cell_ids.clear();
        self.cell_ids.extend(positions.iter().map(|&p| self.dims.cell_of(p)));

        // Count, then exclusive prefix sum.
        self.cell_start.fill(0);
        for &c in &self.cell_ids {
            self.cell_start[c as usize + 1] += 1;
        }
        for c in 0..self.dims.total_cells() {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        self.cursor.copy_from_slice(&self.cell_start[..self.dims.total_cells()]);
        self.sorted.resize(n, 0);
        for (i, &c) in self.cell_ids.iter().enumerate() {
            let slot = &mut self.cursor[c as usize];
            self.sorted[*slot as usize] = i as u32;
            *slot += 1;
        }
    }

    /// Range into [`sorted`](Self::sorted) owned by `cell`.
    #[inline]
    pub fn cell_range(&self, cell: usize) -> Range<usize> {
        self.cell_start[cell] as usize..self.cell_start[cell + 1] as usize
    }

    /// Particle indices in `cell`.
    #[inline]
    pub fn cell_particles(&self, cell: usize) -> &[u32] {
        &self.sorted[self.cell_range(cell)]
    }

    /// All particle indices in cell order.
    #[inline]
    pub fn sorted(&self) -> &[u32] {
        &self.sorted
    }

    /// Push apart every overlapping pair.
    ///
    /// Each pair is separated along its center line by
    /// `(min_dist - d) * correction`, split evenly between the two
    /// particles. Coincident centers are split along x.
    pub fn resolve(&self, positions: &mut [Vec2], radii: &[f32], correction: f32) {
        let cells_x = self.dims.cells_x as i64;
        let cells_y = self.dims.cells_y as i64;

        for cell in 0..self.dims.total_cells() {
            let own = self.cell_range(cell);
            if own.is_empty() {
                continue;
            }

            for a in own.clone() {
                let i = self.sorted[a] as usize;
                for b in (a + 1)..own.end {
                    let j = self.sorted[b] as usize;
                    resolve_pair(positions, radii, i, j, correction);
                }
            }

            let cx = cell as i64 % cells_x;
            let cy = cell as i64 / cells_x;
            for (dx, dy) in FORWARD_NEIGHBORS {
                let (nx, ny) = (cx + dx, cy + dy);
                if nx < 0 || nx >= cells_x || ny < 0 || ny >= cells_y {
                    continue;
                }
                let other = self.cell_range((nx + ny * cells_x) as usize);
                if other.is_empty() {
                    continue;
                }
                for a in own.clone() {
                    let i = self.sorted[a] as usize;
                    for b in other.clone() {
                        let j = self.sorted[b] as usize;
                        resolve_pair(positions, radii, i, j, correction);
                    }
                }
            }
        }
    }
}

#[inline]
fn resolve_pair(positions: &mut [Vec2], radii: &[f32], i: usize, j: usize, correction: f32) {
    let delta = positions[j] - positions[i];
    let dist = delta.length();
    let min_dist = radii[i] + radii[j];
    if dist >= min_dist {
        return;
    }
    if dist > 0.0 {
        let shift = delta / dist * ((min_dist - dist) * correction * 0.5);
        positions[i] -= shift;
        positions[j] += shift;
    } else {
        let shift = min_dist * correction * 0.5;
        positions[i].x -= shift;
        positions[j].x += shift;
    }
}
