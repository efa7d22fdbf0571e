use std::collections::VecDeque;
use std::rc::Rc;

use super::color::Color;
use super::{Codel, Direction, Grid, Pos};

/// Lazily splits a grid into codels, remembering every region it has filled.
pub struct Reader {
    grid: Grid,
    owner: Vec<Option<usize>>,
    codels: Vec<Rc<Codel>>,
}

impl Reader {
    pub fn new(grid: Grid) -> Self {
        let owner = vec![None; grid.width() * grid.height()];
        Reader {
            grid,
            owner,
            codels: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pixel_at(&self, pos: Pos) -> Option<Color> {
        self.grid.get(pos)
    }

    /// The codel containing `pos`, flood-filling it on first use.
    pub fn codel_at(&mut self, pos: Pos) -> Option<Rc<Codel>> {
        let color = self.grid.get(pos)?;
        let width = self.grid.width();
        if let Some(idx) = self.owner[pos.y * width + pos.x] {
            return Some(self.codels[idx].clone());
        }

        let idx = self.codels.len();
        let mut codel = Codel::new(color, pos);
        self.owner[pos.y * width + pos.x] = Some(idx);
        let mut queue = VecDeque::from([pos]);
        while let Some(here) = queue.pop_front() {
            for dir in Direction::ALL {
                let Some(next) = here.step(dir) else {
                    continue;
                };
                if self.grid.get(next) != Some(color) {
                    continue;
                }
                let owner = &mut self.owner[next.y * width + next.x];
                if owner.is_none() {
                    *owner = Some(idx);
                    codel.push(next);
                    queue.push_back(next);
                }
            }
        }

        let codel = Rc::new(codel);
        self.codels.push(codel.clone());
        Some(codel)
    }

    /// The shortest run of equal pixels along any row or column.
    pub fn smallest_codel_side(&self) -> usize {
        let (width, height) = (self.grid.width(), self.grid.height());
        let at = |y, x| self.grid.get(Pos::new(y, x));

        let rows = (0..height).map(|y| shortest_run((0..width).map(|x| at(y, x))));
        let cols = (0..width).map(|x| shortest_run((0..height).map(|y| at(y, x))));
        rows.chain(cols).min().unwrap_or(1).max(1)
    }
}

fn shortest_run<T: PartialEq>(cells: impl Iterator<Item = T>) -> usize {
    let mut shortest = usize::MAX;
    let mut run: Option<(T, usize)> = None;
    for cell in cells {
        run = match run {
            Some((prev, len)) if prev == cell => Some((prev, len + 1)),
            Some((_, len)) => {
                shortest = shortest.min(len);
                Some((cell, 1))
            }
            None => Some((cell, 1)),
        };
    }
    if let Some((_, len)) = run {
        shortest = shortest.min(len);
    }
    shortest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::color::Shade;

    fn red() -> Color {
        Color::Shade(Shade::new(1, 0))
    }

    #[test]
    fn codels_are_shared_by_their_pixels() {
        let mut grid = Grid::filled(3, 3, Color::Black);
        for pos in [Pos::new(0, 0), Pos::new(0, 1), Pos::new(1, 1), Pos::new(2, 1)] {
            grid.set(pos, red());
        }
        grid.set(Pos::new(2, 2), red());
        let mut reader = Reader::new(grid);

        let a = reader.codel_at(Pos::new(0, 0)).unwrap();
        let b = reader.codel_at(Pos::new(2, 2)).unwrap();
        assert_eq!(a.size(), 5);
        assert!(Rc::ptr_eq(&a, &b));

        let black = reader.codel_at(Pos::new(1, 0)).unwrap();
        assert_eq!(black.color, Color::Black);
        assert_eq!(black.size(), 2);
        assert!(reader.codel_at(Pos::new(3, 0)).is_none());
    }

    #[test]
    fn diagonal_pixels_are_separate() {
        let mut grid = Grid::filled(2, 2, Color::White);
        grid.set(Pos::new(0, 0), red());
        grid.set(Pos::new(1, 1), red());
        let mut reader = Reader::new(grid);
        assert_eq!(reader.codel_at(Pos::new(0, 0)).unwrap().size(), 1);
        assert_eq!(reader.codel_at(Pos::new(1, 1)).unwrap().size(), 1);
    }

    #[test]
    fn smallest_side_of_scaled_image() {
        let mut grid = Grid::filled(6, 4, Color::White);
        for y in 0..2 {
            for x in 0..2 {
                grid.set(Pos::new(y, x), red());
            }
        }
        assert_eq!(Reader::new(grid.clone()).smallest_codel_side(), 2);
        grid.set(Pos::new(3, 5), red());
        assert_eq!(Reader::new(grid).smallest_codel_side(), 1);
    }
}
