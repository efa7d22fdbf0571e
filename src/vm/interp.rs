use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use log::trace;

use super::color::Color;
use super::reader::Reader;
use super::runtime::{Instruction, Runtime};
use super::{Codel, Grid, Pos};

#[derive(Args, Clone, Copy, Debug)]
pub struct Config {
    /// Give up after executing this many steps
    #[arg(long, default_value_t = 1_000_000)]
    pub step_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            step_limit: 1_000_000,
        }
    }
}

/// Why a program stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Halt {
    /// Every way out of the current codel is blocked.
    Finished,
    StepLimit,
}

/// What one call to [`Interpreter::step`] did.
#[derive(Clone, Debug)]
pub struct Step {
    pub iteration: u64,
    pub position: Pos,
    pub instruction: Instruction,
    pub blocked: bool,
    pub flipped: bool,
    pub last: Rc<Codel>,
    pub current: Rc<Codel>,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} at {}: ", self.iteration, self.position)?;
        if self.blocked {
            f.write_str(if self.flipped { "blocked, flip" } else { "blocked, rotate" })
        } else {
            write!(
                f,
                "{} ({} -> {} pixels)",
                self.instruction.name(),
                self.last.size(),
                self.current.size()
            )
        }
    }
}

pub struct Interpreter<W> {
    reader: Reader,
    pub runtime: Runtime<W>,
    config: Config,
    iteration: u64,
    flips: u32,
    flipped: bool,
    position: Pos,
    last: Rc<Codel>,
    current: Rc<Codel>,
}

impl<W: io::Write> Interpreter<W> {
    pub fn new(mut reader: Reader, runtime: Runtime<W>, config: Config) -> Option<Self> {
        let origin = Pos::default();
        let current = match reader.pixel_at(origin)? {
            Color::White => Rc::new(Codel::new(Color::White, origin)),
            _ => reader.codel_at(origin)?,
        };
        let mut interp = Interpreter {
            reader,
            runtime,
            config,
            iteration: 0,
            flips: 0,
            flipped: false,
            position: origin,
            last: current.clone(),
            current,
        };
        interp.reposition();
        Some(interp)
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn flips(&self) -> u32 {
        self.flips
    }

    pub fn position(&self) -> Pos {
        self.position
    }

    pub fn current(&self) -> &Rc<Codel> {
        &self.current
    }

    pub fn into_runtime(self) -> Runtime<W> {
        self.runtime
    }

    pub fn step(&mut self) -> io::Result<ControlFlow<Halt, Step>> {
        if self.iteration >= self.config.step_limit {
            return Ok(ControlFlow::Break(Halt::StepLimit));
        }

        let dp = self.runtime.dp;
        let next = self
            .position
            .step(dp)
            .filter(|&pos| !matches!(self.reader.pixel_at(pos), None | Some(Color::Black)));

        let (instruction, blocked) = match next {
            None => {
                // Alternate CC flips with DP rotations until all eight
                // combinations have been tried.
                if self.flipped {
                    if self.flips >= 4 {
                        return Ok(ControlFlow::Break(Halt::Finished));
                    }
                    self.runtime.dp = dp.rotate(1);
                    self.flipped = false;
                } else {
                    self.runtime.cc = self.runtime.cc.flip(1);
                    self.flips += 1;
                    self.flipped = true;
                }
                self.reposition();
                (Instruction::Noop, true)
            }
            Some(next) => {
                self.flipped = false;
                (self.enter(next)?, false)
            }
        };

        let step = Step {
            iteration: self.iteration,
            position: self.position,
            instruction,
            blocked,
            flipped: self.flipped,
            last: self.last.clone(),
            current: self.current.clone(),
        };
        trace!("{step}");
        self.iteration += 1;
        Ok(ControlFlow::Continue(step))
    }

    fn enter(&mut self, next: Pos) -> io::Result<Instruction> {
        let dp = self.runtime.dp;
        let current = match self.reader.pixel_at(next) {
            Some(Color::White) => {
                let mut white = Codel::new(Color::White, next);
                let mut pos = next;
                while let Some(ahead) = pos
                    .step(dp)
                    .filter(|&p| self.reader.pixel_at(p) == Some(Color::White))
                {
                    white.push(ahead);
                    pos = ahead;
                }
                self.position = pos;
                Rc::new(white)
            }
            _ => {
                let codel = self
                    .reader
                    .codel_at(next)
                    .expect("next pixel is inside the grid");
                self.position = codel.exit(dp, self.runtime.cc);
                codel
            }
        };
        self.last = std::mem::replace(&mut self.current, current);

        let instruction = match (self.last.color.shade(), self.current.color.shade()) {
            (Some(from), Some(to)) => {
                self.flips = 0;
                Instruction::from_change(from.change_to(to))
            }
            _ => {
                if self.last.color != self.current.color {
                    self.flips = 0;
                }
                Instruction::Noop
            }
        };

        self.runtime.execute(instruction, self.last.size())?;
        if matches!(instruction, Instruction::Pointer | Instruction::Switch) {
            self.reposition();
        }
        Ok(instruction)
    }

    fn reposition(&mut self) {
        if self.current.color != Color::White {
            self.position = self.current.exit(self.runtime.dp, self.runtime.cc);
        }
    }

    /// Step until the program halts, executing at most `speed` steps per
    /// wall-clock second. A non-positive speed runs unthrottled.
    pub fn run(&mut self, speed: i64) -> io::Result<Halt> {
        let budget = u64::try_from(speed).ok().filter(|&s| s > 0);
        let mut second = Instant::now();
        let mut taken = 0;
        loop {
            if let Some(budget) = budget {
                if second.elapsed() >= Duration::from_secs(1) {
                    second = Instant::now();
                    taken = 0;
                } else if taken >= budget {
                    thread::sleep(Duration::from_secs(1).saturating_sub(second.elapsed()));
                    second = Instant::now();
                    taken = 0;
                }
            }
            match self.step()? {
                ControlFlow::Continue(_) => taken += 1,
                ControlFlow::Break(halt) => return Ok(halt),
            }
        }
    }
}

/// Run `grid` to completion with `input`, collecting its output.
pub fn interpret(grid: &Grid, input: &[u8], config: Config) -> io::Result<(Vec<u8>, Halt)> {
    let runtime = Runtime::new(Vec::new(), input);
    let Some(mut interp) = Interpreter::new(Reader::new(grid.clone()), runtime, config) else {
        return Ok((Vec::new(), Halt::Finished));
    };
    let halt = interp.run(-1)?;
    Ok((interp.into_runtime().output, halt))
}
