use crate::vm::color::Color;
use crate::vm::{Grid, Pos};

pub mod generate;
pub mod painter;

/// A grid that grows to fit whatever is painted on it. Cells never painted
/// render as black.
#[derive(Clone, Debug, Default)]
pub struct Canvas {
    rows: Vec<Vec<Option<Color>>>,
    width: usize,
}

impl Canvas {
    pub fn get(&self, pos: Pos) -> Option<Color> {
        *self.rows.get(pos.y)?.get(pos.x)?
    }

    pub fn set(&mut self, pos: Pos, color: Color) {
        if self.rows.len() <= pos.y {
            self.rows.resize_with(pos.y + 1, Vec::new);
        }
        let row = &mut self.rows[pos.y];
        if row.len() <= pos.x {
            row.resize(pos.x + 1, None);
        }
        row[pos.x] = Some(color);
        self.width = self.width.max(pos.x + 1);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn to_grid(&self) -> Grid {
        let mut cells = Vec::with_capacity(self.width * self.rows.len());
        for row in &self.rows {
            cells.extend(row.iter().map(|cell| cell.unwrap_or(Color::Black)));
            cells.extend(std::iter::repeat_n(Color::Black, self.width - row.len()));
        }
        Grid::new(self.width, self.rows.len(), cells)
    }
}
