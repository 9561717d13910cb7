//! Rasterised occupancy grid.
//!
//! One cell per world unit.  Walls are stamped in as axis-aligned rectangles;
//! anything outside the grid counts as occupied.

use datmo_types::{DatmoError, Point2};
use serde::{Deserialize, Serialize};

/// An axis-aligned wall rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: i32,
    height: i32,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// An empty grid of `width × height` cells.
    ///
    /// # Errors
    ///
    /// Returns [`DatmoError::World`] when either dimension is not positive.
    pub fn new(width: i32, height: i32) -> Result<Self, DatmoError> {
        if width <= 0 || height <= 0 {
            return Err(DatmoError::World(format!(
                "grid dimensions must be positive, got {width}×{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            cells: vec![false; (width as usize) * (height as usize)],
        })
    }

    /// Build a grid and stamp every rectangle in `walls`.
    pub fn with_walls(width: i32, height: i32, walls: &[Rect]) -> Result<Self, DatmoError> {
        let mut grid = Self::new(width, height)?;
        for wall in walls {
            grid.fill(*wall);
        }
        Ok(grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Mark every cell of `rect` that falls inside the grid as a wall.
    pub fn fill(&mut self, rect: Rect) {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = (rect.x + rect.width).min(self.width);
        let y1 = (rect.y + rect.height).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = self.index(x, y);
                self.cells[idx] = true;
            }
        }
    }

    /// Wall test for an integer cell.  Outside the grid is a wall.
    pub fn is_wall_cell(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return true;
        }
        self.cells[self.index(x, y)]
    }

    /// Wall test for the cell containing `p`.
    pub fn is_wall(&self, p: Point2) -> bool {
        let (x, y) = cell_of(p);
        self.is_wall_cell(x, y)
    }

    /// `true` when `p` is closer than `buffer` cells to the grid edge, or when
    /// any wall cell lies in the `(2·buffer + 1)²` square around it.
    pub fn is_blocked(&self, p: Point2, buffer: i32) -> bool {
        let (x, y) = cell_of(p);
        if self.near_edge(x, y, buffer) {
            return true;
        }
        (-buffer..=buffer).any(|dy| {
            (-buffer..=buffer).any(|dx| {
                let (cx, cy) = (x + dx, y + dy);
                self.contains_cell(cx, cy) && self.cells[self.index(cx, cy)]
            })
        })
    }

    /// `true` when the cell containing `p` is closer than `buffer` to an edge.
    pub fn is_near_edge(&self, p: Point2, buffer: i32) -> bool {
        let (x, y) = cell_of(p);
        self.near_edge(x, y, buffer)
    }

    fn near_edge(&self, x: i32, y: i32, buffer: i32) -> bool {
        x < buffer || x >= self.width - buffer || y < buffer || y >= self.height - buffer
    }

    fn contains_cell(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }
}

fn cell_of(p: Point2) -> (i32, i32) {
    (p.x.floor() as i32, p.y.floor() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_grid_rejected() {
        assert!(matches!(OccupancyGrid::new(0, 10), Err(DatmoError::World(_))));
        assert!(OccupancyGrid::new(10, -1).is_err());
    }

    #[test]
    fn outside_is_wall() {
        let grid = OccupancyGrid::new(10, 10).unwrap();
        assert!(!grid.is_wall(Point2::new(5.0, 5.0)));
        assert!(grid.is_wall(Point2::new(-0.5, 5.0)));
        assert!(grid.is_wall(Point2::new(10.0, 5.0)));
        assert!(grid.is_wall(Point2::new(5.0, 11.0)));
    }

    #[test]
    fn filled_rect_is_wall() {
        let grid = OccupancyGrid::with_walls(20, 20, &[Rect::new(5, 5, 3, 2)]).unwrap();
        assert!(grid.is_wall(Point2::new(5.0, 5.0)));
        assert!(grid.is_wall(Point2::new(7.9, 6.9)));
        assert!(!grid.is_wall(Point2::new(8.0, 5.0)));
        assert!(!grid.is_wall(Point2::new(5.0, 7.0)));
    }

    #[test]
    fn rect_is_clipped_to_grid() {
        let grid = OccupancyGrid::with_walls(10, 10, &[Rect::new(-5, -5, 7, 7)]).unwrap();
        assert!(grid.is_wall(Point2::new(1.0, 1.0)));
        assert!(!grid.is_wall(Point2::new(2.0, 2.0)));
    }

    #[test]
    fn buffer_blocks_near_walls_and_edges() {
        let grid = OccupancyGrid::with_walls(100, 100, &[Rect::new(50, 0, 1, 100)]).unwrap();
        assert!(!grid.is_blocked(Point2::new(30.0, 50.0), 15));
        assert!(grid.is_blocked(Point2::new(40.0, 50.0), 15));
        assert!(grid.is_blocked(Point2::new(10.0, 50.0), 15));
        assert!(grid.is_near_edge(Point2::new(90.0, 50.0), 15));
        assert!(!grid.is_near_edge(Point2::new(30.0, 50.0), 15));
    }
}
