use crate::io::{Error, Result};
use crate::vm::color::{Color, Shade};
use crate::vm::runtime::{Instruction, Runtime};
use crate::vm::{Direction, Grid, Pos, furthest};

use super::Canvas;

/// What to put in a cell. An instruction paints the shade that executes it
/// when the interpreter arrives from the current codel; `Op(Noop)` grows
/// the current codel instead.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Brush {
    White,
    Black,
    Op(Instruction),
}

/// A cell next to the pen, relative to the direction pointer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Offset {
    Front,
    Right,
    Back,
    Left,
    FrontRight,
    BackRight,
    BackLeft,
    FrontLeft,
}

impl Offset {
    pub fn apply(self, pos: Pos, dp: Direction) -> Option<Pos> {
        let idx = self as i64;
        if idx < 4 {
            pos.step(dp.rotate(idx))
        } else {
            pos.step(dp.rotate(idx - 4))?.step(dp.rotate(idx - 3))
        }
    }
}

/// Paints a program one cell at a time while executing it on a shadow
/// runtime, so the pen is always where the interpreter will be.
pub struct Painter {
    canvas: Canvas,
    shade: Shade,
    codel: Vec<Pos>,
    on_white: bool,
    pen: Pos,
    shadow: Runtime<Vec<u8>>,
}

impl Painter {
    /// Start a program at the origin. `input` is what the finished program
    /// will be given to read.
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        let origin = Pos::default();
        let shade = Shade::new(0, 0);
        let mut canvas = Canvas::default();
        canvas.set(origin, Color::Shade(shade));
        Painter {
            canvas,
            shade,
            codel: vec![origin],
            on_white: false,
            pen: origin,
            shadow: Runtime::new(Vec::new(), input),
        }
    }

    pub fn pen(&self) -> Pos {
        self.pen
    }

    pub fn direction(&self) -> Direction {
        self.shadow.dp
    }

    /// What the program has printed so far.
    pub fn output(&self) -> &[u8] {
        &self.shadow.output
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn finish(self) -> Grid {
        self.canvas.to_grid()
    }

    pub fn set_command(&mut self, brush: Brush, pos: Pos) -> Result<()> {
        if self.canvas.get(pos).is_some() {
            return Err(Error::Overlap { y: pos.y, x: pos.x });
        }
        match brush {
            Brush::Black => self.canvas.set(pos, Color::Black),
            Brush::White => {
                if !self.on_white {
                    self.codel.clear();
                    self.on_white = true;
                }
                self.canvas.set(pos, Color::White);
                self.codel.push(pos);
                self.pen = pos;
            }
            Brush::Op(op) => {
                let shade = self.shade.shift(op.change());
                let starts = self.on_white || op != Instruction::Noop;
                self.check_merge(pos, shade, starts)?;
                if starts {
                    if !self.on_white {
                        self.shadow.execute(op, self.codel.len())?;
                    }
                    self.codel.clear();
                }
                self.canvas.set(pos, Color::Shade(shade));
                self.codel.push(pos);
                self.shade = shade;
                self.on_white = false;
                self.pen = furthest(&self.codel, self.shadow.dp, self.shadow.cc)
                    .expect("codel was just painted");
            }
        }
        Ok(())
    }

    /// Paint `multiplier` cells where the interpreter goes next. Only the
    /// first cell of an instruction executes it; the rest grow its codel.
    pub fn set_next_command(&mut self, brush: Brush, multiplier: usize) -> Result<()> {
        for i in 0..multiplier {
            let brush = match brush {
                Brush::Op(_) if i > 0 => Brush::Op(Instruction::Noop),
                brush => brush,
            };
            let pos = self.pen.step(self.direction()).ok_or(Error::OffCanvas)?;
            self.set_command(brush, pos)?;
        }
        Ok(())
    }

    pub fn set_command_at(&mut self, brush: Brush, offset: Offset) -> Result<()> {
        let pos = offset.apply(self.pen, self.direction()).ok_or(Error::OffCanvas)?;
        self.set_command(brush, pos)
    }

    /// End the program: cross one white cell into a codel that no DP/CC
    /// combination can leave. The codel spans two rows, the second on the
    /// `side` of the direction pointer, and reaches back behind the white
    /// cell so its trailing exit never points at the way in.
    pub fn seal(&mut self, side: Offset) -> Result<()> {
        let dp = self.direction();
        self.set_next_command(Brush::White, 1)?;

        let s = dp.rotate(side as i64);
        let to = |pos: Pos, dir| pos.step(dir).ok_or(Error::OffCanvas);
        let entry = self.pen;
        let f0 = to(entry, dp)?;
        let f1 = to(f0, dp)?;
        let se = to(entry, s)?;
        let s0 = to(f0, s)?;
        let s1 = to(f1, s)?;

        let (back, out) = (dp.rotate(2), s.rotate(2));
        let walls = [
            f1.step(dp),
            s1.step(dp),
            se.step(back),
            se.step(s),
            s0.step(s),
            s1.step(s),
            f0.step(out),
            f1.step(out),
        ];
        for wall in walls.into_iter().flatten() {
            if !matches!(self.canvas.get(wall), None | Some(Color::Black)) {
                return Err(Error::Overlap {
                    y: wall.y,
                    x: wall.x,
                });
            }
        }

        for pos in [f0, f1, s0, s1, se] {
            self.set_command(Brush::Op(Instruction::Noop), pos)?;
        }
        for wall in walls.into_iter().flatten() {
            if self.canvas.get(wall).is_none() {
                self.set_command(Brush::Black, wall)?;
            }
        }
        Ok(())
    }

    fn check_merge(&self, pos: Pos, shade: Shade, starts: bool) -> Result<()> {
        for dir in Direction::ALL {
            let Some(next) = pos.step(dir) else {
                continue;
            };
            if self.canvas.get(next) == Some(Color::Shade(shade))
                && (starts || !self.codel.contains(&next))
            {
                return Err(Error::Merge { y: pos.y, x: pos.x });
            }
        }
        Ok(())
    }
}
