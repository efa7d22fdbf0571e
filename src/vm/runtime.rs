use std::io::{self, Cursor, Read, Write};

use log::debug;
use thiserror::Error;

use super::color::Change;
use super::{Chooser, Direction};

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Instruction {
    Noop,
    Add,
    Divide,
    Greater,
    Duplicate,
    InChar,
    Push,
    Subtract,
    Mod,
    Pointer,
    Roll,
    OutNum,
    Pop,
    Multiply,
    Not,
    Switch,
    InNum,
    OutChar,
}

// Indexed by lightness change, then hue change.
const TABLE: [[Instruction; 6]; 3] = {
    use Instruction::*;
    [
        [Noop, Add, Divide, Greater, Duplicate, InChar],
        [Push, Subtract, Mod, Pointer, Roll, OutNum],
        [Pop, Multiply, Not, Switch, InNum, OutChar],
    ]
};

impl Instruction {
    pub const ALL: [Instruction; 18] = {
        let [a, b, c] = TABLE;
        let mut all = [Instruction::Noop; 18];
        let mut i = 0;
        while i < 6 {
            all[i] = a[i];
            all[i + 6] = b[i];
            all[i + 12] = c[i];
            i += 1;
        }
        all
    };

    pub fn from_change(change: Change) -> Instruction {
        TABLE[usize::from(change.lightness)][usize::from(change.hue)]
    }

    pub fn change(self) -> Change {
        let (lightness, hue) = match self {
            Instruction::Noop => (0, 0),
            Instruction::Add => (0, 1),
            Instruction::Divide => (0, 2),
            Instruction::Greater => (0, 3),
            Instruction::Duplicate => (0, 4),
            Instruction::InChar => (0, 5),
            Instruction::Push => (1, 0),
            Instruction::Subtract => (1, 1),
            Instruction::Mod => (1, 2),
            Instruction::Pointer => (1, 3),
            Instruction::Roll => (1, 4),
            Instruction::OutNum => (1, 5),
            Instruction::Pop => (2, 0),
            Instruction::Multiply => (2, 1),
            Instruction::Not => (2, 2),
            Instruction::Switch => (2, 3),
            Instruction::InNum => (2, 4),
            Instruction::OutChar => (2, 5),
        };
        Change { lightness, hue }
    }

    pub fn name(self) -> &'static str {
        match self {
            Instruction::Noop => "noop",
            Instruction::Add => "add",
            Instruction::Divide => "divide",
            Instruction::Greater => "greater",
            Instruction::Duplicate => "duplicate",
            Instruction::InChar => "in-char",
            Instruction::Push => "push",
            Instruction::Subtract => "subtract",
            Instruction::Mod => "mod",
            Instruction::Pointer => "pointer",
            Instruction::Roll => "roll",
            Instruction::OutNum => "out-num",
            Instruction::Pop => "pop",
            Instruction::Multiply => "multiply",
            Instruction::Not => "not",
            Instruction::Switch => "switch",
            Instruction::InNum => "in-num",
            Instruction::OutChar => "out-char",
        }
    }
}

#[derive(Debug, Error)]
pub enum Fault {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("roll depth {0} out of range")]
    InvalidRoll(i64),
    #[error("input exhausted")]
    InputExhausted,
    #[error("write failed")]
    Output(#[from] io::Error),
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stack(Vec<i64>);

impl Stack {
    pub fn push(&mut self, value: i64) {
        self.0.push(value);
    }

    pub fn pop(&mut self) -> Option<i64> {
        self.0.pop()
    }

    pub fn peek(&self) -> Option<i64> {
        self.0.last().copied()
    }

    /// Pop `n` values, top first. Takes nothing if fewer than `n` are present.
    pub fn pop_many(&mut self, n: usize) -> Option<Vec<i64>> {
        let keep = self.0.len().checked_sub(n)?;
        let mut popped = self.0.split_off(keep);
        popped.reverse();
        Some(popped)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    fn top2(&self) -> Option<(i64, i64)> {
        match *self.0.as_slice() {
            [.., b, a] => Some((a, b)),
            _ => None,
        }
    }
}

impl Extend<i64> for Stack {
    fn extend<T: IntoIterator<Item = i64>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl From<Vec<i64>> for Stack {
    fn from(values: Vec<i64>) -> Self {
        Stack(values)
    }
}

/// The machine state a Piet program manipulates: stack, pointers, and I/O.
pub struct Runtime<W> {
    pub output: W,
    pub input: Cursor<Vec<u8>>,
    pub stack: Stack,
    pub dp: Direction,
    pub cc: Chooser,
}

impl<W: io::Write> Runtime<W> {
    pub fn new(output: W, input: impl Into<Vec<u8>>) -> Self {
        Runtime {
            output,
            input: Cursor::new(input.into()),
            stack: Stack::default(),
            dp: Direction::default(),
            cc: Chooser::default(),
        }
    }

    /// Run one instruction. `last_size` is the size of the codel just left,
    /// which is what `Push` pushes. Invalid operations leave the stack as it
    /// was; only failing to write output is reported.
    pub fn execute(&mut self, inst: Instruction, last_size: usize) -> io::Result<()> {
        match self.apply(inst, last_size) {
            Ok(()) => Ok(()),
            Err(Fault::Output(err)) => Err(err),
            Err(fault) => {
                debug!("{} ignored: {fault}", inst.name());
                Ok(())
            }
        }
    }

    fn apply(&mut self, inst: Instruction, last_size: usize) -> Result<(), Fault> {
        match inst {
            Instruction::Noop => {}
            Instruction::Push => self
                .stack
                .push(i64::try_from(last_size).unwrap_or(i64::MAX)),
            Instruction::Pop => {
                self.pop()?;
            }
            Instruction::Add => self.binop(|b, a| Ok(b.wrapping_add(a)))?,
            Instruction::Subtract => self.binop(|b, a| Ok(b.wrapping_sub(a)))?,
            Instruction::Multiply => self.binop(|b, a| Ok(b.wrapping_mul(a)))?,
            Instruction::Divide => self.binop(floor_div)?,
            Instruction::Mod => self.binop(floor_mod)?,
            Instruction::Greater => self.binop(|b, a| Ok(i64::from(b > a)))?,
            Instruction::Not => {
                let a = self.pop()?;
                self.stack.push(i64::from(a == 0));
            }
            Instruction::Duplicate => {
                let a = self.stack.peek().ok_or(Fault::StackUnderflow)?;
                self.stack.push(a);
            }
            Instruction::Pointer => {
                let n = self.pop()?;
                self.dp = self.dp.rotate(n);
            }
            Instruction::Switch => {
                let n = self.pop()?;
                self.cc = self.cc.flip(n);
            }
            Instruction::Roll => self.roll()?,
            Instruction::InChar => {
                let mut byte = [0];
                if self.input.read(&mut byte).map_err(|_| Fault::InputExhausted)? == 0 {
                    return Err(Fault::InputExhausted);
                }
                self.stack.push(byte[0].into());
            }
            Instruction::InNum => self.in_num()?,
            Instruction::OutNum => {
                let a = self.pop()?;
                write!(self.output, "{a}")?;
            }
            Instruction::OutChar => {
                let a = self.pop()?;
                self.output.write_all(&[a.rem_euclid(256) as u8])?;
            }
        }
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    // Operands are only consumed once the result is known to exist.
    fn binop(&mut self, f: impl FnOnce(i64, i64) -> Result<i64, Fault>) -> Result<(), Fault> {
        let (a, b) = self.stack.top2().ok_or(Fault::StackUnderflow)?;
        let result = f(b, a)?;
        self.stack.pop_many(2);
        self.stack.push(result);
        Ok(())
    }

    fn roll(&mut self) -> Result<(), Fault> {
        let (count, depth) = self.stack.top2().ok_or(Fault::StackUnderflow)?;
        let len = self.stack.len() - 2;
        let depth_len = usize::try_from(depth)
            .ok()
            .filter(|&d| d <= len)
            .ok_or(Fault::InvalidRoll(depth))?;
        self.stack.pop_many(2);
        if depth_len > 0 {
            let shift = count.rem_euclid(depth) as usize;
            self.stack.0[len - depth_len..].rotate_right(shift);
        }
        Ok(())
    }

    fn in_num(&mut self) -> Result<(), Fault> {
        let start = self.input.position();
        let buf = self.input.get_ref();
        let rest = &buf[usize::try_from(start).map_or(buf.len(), |s| s.min(buf.len()))..];

        let blank = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
        let signed = usize::from(matches!(rest.get(blank), Some(b'+' | b'-')));
        let digits = rest[blank + signed..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(Fault::InputExhausted);
        }

        let end = blank + signed + digits;
        let value = std::str::from_utf8(&rest[blank..end])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(Fault::InputExhausted)?;
        self.input.set_position(start + end as u64);
        self.stack.push(value);
        Ok(())
    }
}

fn floor_div(b: i64, a: i64) -> Result<i64, Fault> {
    if a == 0 {
        return Err(Fault::DivisionByZero);
    }
    let q = b.wrapping_div(a);
    if b.wrapping_rem(a) != 0 && (b < 0) != (a < 0) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(b: i64, a: i64) -> Result<i64, Fault> {
    if a == 0 {
        return Err(Fault::DivisionByZero);
    }
    let r = b.wrapping_rem(a);
    if r != 0 && (r < 0) != (a < 0) {
        Ok(r + a)
    } else {
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(stack: &[i64]) -> Runtime<Vec<u8>> {
        let mut rt = Runtime::new(Vec::new(), Vec::new());
        rt.stack = stack.to_vec().into();
        rt
    }

    fn run(stack: &[i64], insts: &[Instruction]) -> Vec<i64> {
        let mut rt = runtime(stack);
        for &inst in insts {
            rt.execute(inst, 1).unwrap();
        }
        rt.stack.as_slice().to_vec()
    }

    #[test]
    fn table_matches_changes() {
        for inst in Instruction::ALL {
            assert_eq!(Instruction::from_change(inst.change()), inst);
        }
    }

    #[test]
    fn push_uses_previous_codel_size() {
        let mut rt = runtime(&[]);
        rt.execute(Instruction::Push, 42).unwrap();
        assert_eq!(rt.stack.as_slice(), &[42]);
    }

    #[test]
    fn arithmetic() {
        use Instruction::*;
        assert_eq!(run(&[5, 3], &[Add]), [8]);
        assert_eq!(run(&[5, 3], &[Subtract]), [2]);
        assert_eq!(run(&[5, 3], &[Multiply]), [15]);
        assert_eq!(run(&[5, 3], &[Greater]), [1]);
        assert_eq!(run(&[3, 5], &[Greater]), [0]);
        assert_eq!(run(&[0], &[Not]), [1]);
        assert_eq!(run(&[7], &[Not]), [0]);
    }

    #[test]
    fn division_floors() {
        use Instruction::*;
        assert_eq!(run(&[7, 2], &[Divide]), [3]);
        assert_eq!(run(&[-7, 2], &[Divide]), [-4]);
        assert_eq!(run(&[7, -2], &[Divide]), [-4]);
        assert_eq!(run(&[-7, -2], &[Divide]), [3]);
        assert_eq!(run(&[7, 0], &[Divide]), [7, 0]);
    }

    #[test]
    fn modulo_takes_divisor_sign() {
        use Instruction::*;
        assert_eq!(run(&[7, 3], &[Mod]), [1]);
        assert_eq!(run(&[-7, 3], &[Mod]), [2]);
        assert_eq!(run(&[7, -3], &[Mod]), [-2]);
        assert_eq!(run(&[-7, -3], &[Mod]), [-1]);
        assert_eq!(run(&[7, 0], &[Mod]), [7, 0]);
    }

    #[test]
    fn underflow_leaves_stack_alone() {
        use Instruction::*;
        for inst in [Add, Subtract, Multiply, Divide, Mod, Greater, Roll] {
            assert_eq!(run(&[4], &[inst]), [4], "{}", inst.name());
        }
        for inst in [Pop, Not, Duplicate, Pointer, Switch, OutNum, OutChar] {
            assert_eq!(run(&[], &[inst]), [] as [i64; 0], "{}", inst.name());
        }
    }

    #[test]
    fn duplicate_then_pop_is_identity() {
        use Instruction::*;
        assert_eq!(run(&[1, 2, 3], &[Duplicate, Pop]), [1, 2, 3]);
    }

    #[test]
    fn roll() {
        use Instruction::*;
        assert_eq!(run(&[1, 2, 3, 3, 1], &[Roll]), [3, 1, 2]);
        assert_eq!(run(&[1, 2, 3, 3, -1], &[Roll]), [2, 3, 1]);
        assert_eq!(run(&[1, 2, 3, 3, 0], &[Roll]), [1, 2, 3]);
        assert_eq!(run(&[1, 2, 3, 2, 1], &[Roll]), [1, 3, 2]);
        assert_eq!(run(&[1, 2, 3, 3, 4], &[Roll]), [3, 1, 2]);
        assert_eq!(run(&[1, 2, 3, 0, 5], &[Roll]), [1, 2, 3]);
        assert_eq!(run(&[1, 2, 3, 4, 1], &[Roll]), [1, 2, 3, 4, 1]);
        assert_eq!(run(&[1, 2, 3, -1, 1], &[Roll]), [1, 2, 3, -1, 1]);
    }

    #[test]
    fn pointer_and_switch() {
        let mut rt = runtime(&[-1, 3, 2]);
        rt.execute(Instruction::Pointer, 1).unwrap();
        assert_eq!(rt.dp, Direction::Left);
        rt.execute(Instruction::Switch, 1).unwrap();
        assert_eq!(rt.cc, Chooser::Right);
        rt.execute(Instruction::Pointer, 1).unwrap();
        assert_eq!(rt.dp, Direction::Down);
    }

    #[test]
    fn output() {
        let mut rt = runtime(&[-12, 321, 65]);
        rt.execute(Instruction::OutChar, 1).unwrap();
        rt.execute(Instruction::OutChar, 1).unwrap();
        rt.execute(Instruction::OutNum, 1).unwrap();
        assert_eq!(rt.output, b"AA-12");
    }

    #[test]
    fn in_char_stops_at_eof() {
        let mut rt = Runtime::new(Vec::new(), b"A".to_vec());
        rt.execute(Instruction::InChar, 1).unwrap();
        rt.execute(Instruction::InChar, 1).unwrap();
        assert_eq!(rt.stack.as_slice(), &[65]);
    }

    #[test]
    fn in_num_parses_and_restores() {
        let mut rt = Runtime::new(Vec::new(), b"  -42 17x".to_vec());
        rt.execute(Instruction::InNum, 1).unwrap();
        rt.execute(Instruction::InNum, 1).unwrap();
        assert_eq!(rt.stack.as_slice(), &[-42, 17]);
        assert_eq!(rt.input.position(), 8);

        rt.execute(Instruction::InNum, 1).unwrap();
        assert_eq!(rt.stack.as_slice(), &[-42, 17]);
        assert_eq!(rt.input.position(), 8);
        rt.execute(Instruction::InChar, 1).unwrap();
        assert_eq!(rt.stack.as_slice(), &[-42, 17, i64::from(b'x')]);
    }

    #[test]
    fn pop_many_is_top_first() {
        let mut stack = Stack::from(vec![1, 2, 3]);
        assert_eq!(stack.pop_many(2), Some(vec![3, 2]));
        assert_eq!(stack.pop_many(2), None);
        assert_eq!(stack.as_slice(), &[1]);
    }
}
