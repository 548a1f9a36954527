//! Grid layout planning: how many rows and columns an output page gets.
//!
//! The plan is a pure function of the items-per-page setting, the page
//! orientation and the aspect ratio of the *first* image placed on the page.
//! Small counts use fixed tables tuned for the sheet shape; above 16 the
//! grid is derived from `ceil(sqrt(n))` and stretched by one row or column
//! when the first image clearly fights the page shape.

use crate::config::Orientation;
use serde::{Deserialize, Serialize};

/// Aspect ratio (width / height) above which an image counts as wide.
pub const WIDE_ASPECT: f32 = 1.2;
/// Aspect ratio below which an image counts as tall.
pub const TALL_ASPECT: f32 = 0.8;

/// Rows × columns for one output page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPlan {
    pub rows: usize,
    pub cols: usize,
}

impl GridPlan {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of cells on the page.
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// Plan the grid for a page holding up to `items_per_page` images.
///
/// `aspect_ratio` is width / height of the first image on the page.
/// A value of `0` is treated as "use the orientation default".
pub fn plan(items_per_page: usize, aspect_ratio: f32, orientation: Orientation) -> GridPlan {
    use Orientation::{Landscape, Portrait};

    let portrait = orientation == Portrait;
    match items_per_page {
        0 | 1 => GridPlan::new(1, 1),
        2 => {
            if aspect_ratio > WIDE_ASPECT {
                GridPlan::new(2, 1)
            } else if aspect_ratio < TALL_ASPECT && aspect_ratio > 0.0 {
                GridPlan::new(1, 2)
            } else if portrait {
                GridPlan::new(2, 1)
            } else {
                GridPlan::new(1, 2)
            }
        }
        3..=4 => GridPlan::new(2, 2),
        5..=6 if portrait => GridPlan::new(3, 2),
        5..=6 => GridPlan::new(2, 3),
        7..=9 => GridPlan::new(3, 3),
        10..=12 if portrait => GridPlan::new(4, 3),
        10..=12 => GridPlan::new(3, 4),
        13..=16 => GridPlan::new(4, 4),
        n => {
            let g = (n as f64).sqrt().ceil() as usize;
            let short = g.saturating_sub(1).max(1);
            let stretched = match orientation {
                Portrait if aspect_ratio > WIDE_ASPECT => Some(GridPlan::new(g + 1, short)),
                Landscape if aspect_ratio < TALL_ASPECT && aspect_ratio > 0.0 => {
                    Some(GridPlan::new(short, g + 1))
                }
                _ => None,
            };
            // (g+1)(g-1) = g²-1 cannot hold a perfect square's worth of items.
            match stretched {
                Some(grid) if grid.cells() >= n => grid,
                _ => GridPlan::new(g, g),
            }
        }
    }
}
