use std::fmt;

use color::Color;

pub mod color;
pub mod interp;
pub mod reader;
pub mod runtime;

/// A pixel coordinate, row first.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Pos {
    pub y: usize,
    pub x: usize,
}

impl Pos {
    pub fn new(y: usize, x: usize) -> Pos {
        Pos { y, x }
    }

    /// The neighboring pixel in direction `dir`, or `None` if that would leave
    /// the top or left edge.
    pub fn step(self, dir: Direction) -> Option<Pos> {
        let (dy, dx) = dir.offset();
        Some(Pos {
            y: self.y.checked_add_signed(dy)?,
            x: self.x.checked_add_signed(dx)?,
        })
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.y, self.x)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Direction {
    #[default]
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    /// Rotate clockwise by `turns` quarter turns; negative turns go
    /// counterclockwise.
    pub fn rotate(self, turns: i64) -> Direction {
        let idx = (self as i64 + turns.rem_euclid(4)).rem_euclid(4);
        Direction::ALL[idx as usize]
    }

    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Up => (-1, 0),
        }
    }

    /// How far `pos` lies in this direction; larger is further.
    fn extent(self, pos: Pos) -> i64 {
        let (y, x) = (pos.y as i64, pos.x as i64);
        match self {
            Direction::Right => x,
            Direction::Down => y,
            Direction::Left => -x,
            Direction::Up => -y,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Up => "up",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Chooser {
    #[default]
    Left,
    Right,
}

impl Chooser {
    /// Toggle once for every odd `times`.
    pub fn flip(self, times: i64) -> Chooser {
        match (self, times % 2 != 0) {
            (c, false) => c,
            (Chooser::Left, true) => Chooser::Right,
            (Chooser::Right, true) => Chooser::Left,
        }
    }

    /// Quarter turns from the DP to the side this chooser prefers.
    fn turns(self) -> i64 {
        match self {
            Chooser::Left => -1,
            Chooser::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Chooser::Left => "left",
            Chooser::Right => "right",
        }
    }
}

/// Pick the pixel the interpreter leaves `pixels` from: furthest along `dp`,
/// breaking ties toward the side `cc` chooses.
pub fn furthest(pixels: &[Pos], dp: Direction, cc: Chooser) -> Option<Pos> {
    let side = dp.rotate(cc.turns());
    pixels
        .iter()
        .copied()
        .max_by_key(|&pos| (dp.extent(pos), side.extent(pos)))
}

/// A maximal 4-connected region of one color.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Codel {
    pub color: Color,
    pixels: Vec<Pos>,
}

impl Codel {
    pub fn new(color: Color, first: Pos) -> Codel {
        Codel {
            color,
            pixels: vec![first],
        }
    }

    pub fn push(&mut self, pos: Pos) {
        self.pixels.push(pos);
    }

    pub fn pixels(&self) -> &[Pos] {
        &self.pixels
    }

    pub fn size(&self) -> usize {
        self.pixels.len()
    }

    pub fn exit(&self, dp: Direction, cc: Chooser) -> Pos {
        furthest(&self.pixels, dp, cc).expect("codels are never empty")
    }
}

/// A dense, immutable-by-convention raster of Piet colors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Color>,
}

impl Grid {
    pub fn new(width: usize, height: usize, cells: Vec<Color>) -> Grid {
        assert_eq!(width * height, cells.len());
        Grid {
            width,
            height,
            cells,
        }
    }

    pub fn filled(width: usize, height: usize, color: Color) -> Grid {
        Grid::new(width, height, vec![color; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, pos: Pos) -> Option<Color> {
        if pos.y < self.height && pos.x < self.width {
            Some(self.cells[pos.y * self.width + pos.x])
        } else {
            None
        }
    }

    pub fn set(&mut self, pos: Pos, color: Color) {
        assert!(pos.y < self.height && pos.x < self.width);
        self.cells[pos.y * self.width + pos.x] = color;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Color]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Keep the top-left pixel of every `size`×`size` block.
    pub fn scale_down(&self, size: usize) -> Grid {
        if size <= 1 {
            return self.clone();
        }
        let width = self.width.div_ceil(size);
        let height = self.height.div_ceil(size);
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(self.cells[y * size * self.width + x * size]);
            }
        }
        Grid::new(width, height, cells)
    }
}
