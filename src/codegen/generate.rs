use clap::Args;
use log::debug;

use crate::io::{Error, Result};
use crate::vm::Grid;
use crate::vm::runtime::Instruction;

use super::painter::{Brush, Offset, Painter};

/// Largest image side the generator will produce.
pub const MAX_SIDE: usize = 1 << 14;

#[derive(Args, Clone, Copy, Debug)]
pub struct Layout {
    /// Bytes encoded on each row before the program turns around
    #[arg(long, default_value_t = 8)]
    pub cols: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Layout { cols: 8 }
    }
}

type Stroke = (Brush, usize);

// Cells a turn occupies on its own row, not counting padding: one white,
// the rotation count as a codel, then push, duplicate and pointer.
fn turn_len(turns: usize) -> usize {
    1 + turns + 3
}

/// Build an image whose program prints `data`.
///
/// With a key, byte `i` is stored as `data[i] + key[i % key.len()]` and the
/// program subtracts a byte it reads from input, so it only reproduces
/// `data` when fed the key.
///
/// Rows of the image alternate direction. Each row carries `cols` bytes,
/// padded with white to a common width, and ends in a pair of pointer
/// codels that send the program down into the next row. Even rows
/// between them stay black apart from the turn itself.
pub fn generate(data: &[u8], key: Option<&[u8]>, layout: Layout) -> Result<Grid> {
    if key.is_some_and(<[u8]>::is_empty) {
        return Err(Error::EmptyKey);
    }
    let key_at = |idx: usize| key.map(|key| key[idx % key.len()]);

    let strokes: Vec<Vec<Stroke>> = data
        .iter()
        .enumerate()
        .map(|(idx, &byte)| encode_byte(byte, key_at(idx)))
        .collect();
    let mut lanes: Vec<&[Vec<Stroke>]> = strokes.chunks(layout.cols.max(1)).collect();
    if lanes.is_empty() {
        lanes.push(&[]);
    }

    let widest = lanes.iter().map(|lane| lane_len(lane)).max().unwrap_or(0);
    let width = 1 + widest + turn_len(3) + 1;
    let height = 2 * lanes.len();
    if layout.cols == 0 || width > MAX_SIDE || height > MAX_SIDE {
        return Err(Error::EncodeCapacityExceeded {
            width,
            height,
            max: MAX_SIDE,
        });
    }
    debug!(
        "encoding {} bytes in {} rows of width {width}",
        data.len(),
        lanes.len()
    );

    let input: Vec<u8> = (0..data.len()).filter_map(key_at).collect();
    let mut painter = Painter::new(input);
    for (idx, lane) in lanes.iter().enumerate() {
        for &(brush, count) in lane.iter().flatten() {
            painter.set_next_command(brush, count)?;
        }
        let rightward = idx % 2 == 0;
        if idx + 1 == lanes.len() {
            painter.seal(if rightward { Offset::Right } else { Offset::Left })?;
        } else {
            turn(&mut painter, width, rightward)?;
        }
    }

    if painter.output() != data {
        return Err(Error::Unfaithful);
    }
    Ok(painter.finish())
}

fn encode_byte(byte: u8, key: Option<u8>) -> Vec<Stroke> {
    let mut strokes = vec![(Brush::White, 1)];
    match key {
        None => push_value(&mut strokes, byte),
        Some(key) => {
            push_value(&mut strokes, byte.wrapping_add(key));
            // value - key may be negative; (value - key) mod 16*16 is the byte.
            strokes.extend([
                (Brush::Op(Instruction::InChar), 1),
                (Brush::Op(Instruction::Subtract), 16),
                (Brush::Op(Instruction::Push), 1),
                (Brush::Op(Instruction::Duplicate), 1),
                (Brush::Op(Instruction::Multiply), 1),
                (Brush::Op(Instruction::Mod), 1),
            ]);
        }
    }
    strokes.push((Brush::Op(Instruction::OutChar), 1));
    strokes
}

// Push takes the size of the codel being left, which cannot be zero.
fn push_value(strokes: &mut Vec<Stroke>, value: u8) {
    if value == 0 {
        strokes.extend([
            (Brush::Op(Instruction::Noop), 1),
            (Brush::Op(Instruction::Push), 1),
            (Brush::Op(Instruction::Not), 1),
        ]);
    } else {
        strokes.extend([
            (Brush::Op(Instruction::Noop), usize::from(value)),
            (Brush::Op(Instruction::Push), 1),
        ]);
    }
}

fn lane_len(lane: &[Vec<Stroke>]) -> usize {
    lane.iter().flatten().map(|&(_, count)| count).sum()
}

/// Pad the row out to its far edge, then rotate the DP twice around a
/// two-cell pointer codel: clockwise at the right edge, counterclockwise
/// (three turns) at the left.
fn turn(painter: &mut Painter, width: usize, rightward: bool) -> Result<()> {
    let turns = if rightward { 1 } else { 3 };
    let pen = painter.pen().x;
    let pad = if rightward {
        (width - 1).checked_sub(pen + turn_len(turns))
    } else {
        pen.checked_sub(turn_len(turns))
    }
    .ok_or(Error::OffCanvas)?;

    painter.set_next_command(Brush::White, 1 + pad)?;
    painter.set_next_command(Brush::Op(Instruction::Noop), turns)?;
    for inst in [Instruction::Push, Instruction::Duplicate, Instruction::Pointer] {
        painter.set_next_command(Brush::Op(inst), 1)?;
    }
    painter.set_next_command(Brush::Op(Instruction::Noop), 1)?;
    painter.set_next_command(Brush::Op(Instruction::Pointer), 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::interp::{Config, Halt, interpret};

    fn round_trip(data: &[u8], key: Option<&[u8]>, cols: usize) -> (Vec<u8>, Halt) {
        let grid = generate(data, key, Layout { cols }).unwrap();
        let input: Vec<u8> = match key {
            Some(key) => key.iter().copied().cycle().take(data.len()).collect(),
            None => Vec::new(),
        };
        interpret(&grid, &input, Config::default()).unwrap()
    }

    #[test]
    fn two_letters_one_per_row() {
        assert_eq!(round_trip(b"AB", None, 1), (b"AB".to_vec(), Halt::Finished));
    }

    #[test]
    fn sentence_four_per_row() {
        let text = b"Hello, world! This a test string.";
        assert_eq!(round_trip(text, None, 4), (text.to_vec(), Halt::Finished));
    }

    #[test]
    fn masked_with_key() {
        let key: &[u8] = b"passkey";
        assert_eq!(
            round_trip(b"AB", Some(key), 8),
            (b"AB".to_vec(), Halt::Finished)
        );
        let text = b"key bytes cycle past the end";
        assert_eq!(round_trip(text, Some(key), 3), (text.to_vec(), Halt::Finished));
    }

    #[test]
    fn extreme_bytes() {
        let data = [0, 255, 0, 1, 254];
        assert_eq!(round_trip(&data, None, 2), (data.to_vec(), Halt::Finished));
        // 1 + 255 wraps to a stored zero.
        assert_eq!(
            round_trip(&data, Some(&[1][..]), 2),
            (data.to_vec(), Halt::Finished)
        );
    }

    #[test]
    fn wrong_key_scrambles_output() {
        let grid = generate(b"secret", Some(&b"k"[..]), Layout::default()).unwrap();
        let (output, halt) = interpret(&grid, b"jjjjjj", Config::default()).unwrap();
        assert_eq!(halt, Halt::Finished);
        assert_eq!(output, b"tfdsfu");
    }

    #[test]
    fn empty_payload_still_halts() {
        assert_eq!(round_trip(b"", None, 4), (Vec::new(), Halt::Finished));
    }

    #[test]
    fn capacity_and_key_errors() {
        assert!(matches!(
            generate(b"x", None, Layout { cols: 0 }),
            Err(Error::EncodeCapacityExceeded { .. })
        ));
        let wide = vec![255; 100];
        assert!(matches!(
            generate(&wide, None, Layout { cols: 100 }),
            Err(Error::EncodeCapacityExceeded { max: MAX_SIDE, .. })
        ));
        assert!(matches!(
            generate(b"x", Some(&b""[..]), Layout::default()),
            Err(Error::EmptyKey)
        ));
    }
}
