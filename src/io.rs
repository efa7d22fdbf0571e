use std::io::{self, Cursor};
use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use crate::vm::color::{Color, InvalidColor};
use crate::vm::{Grid, Pos};

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O failed")]
    IO(#[from] io::Error),
    #[error("image codec failed")]
    Image(#[from] image::ImageError),
    #[error("pixel ({y}, {x}) has an invalid color")]
    InvalidColor {
        y: usize,
        x: usize,
        #[source]
        color: InvalidColor,
    },
    #[error("image has no pixels")]
    EmptyImage,
    #[error("payload needs a {width}x{height} image but sides are limited to {max}")]
    EncodeCapacityExceeded {
        width: usize,
        height: usize,
        max: usize,
    },
    #[error("key must not be empty")]
    EmptyKey,
    #[error("cell ({y}, {x}) is already painted")]
    Overlap { y: usize, x: usize },
    #[error("painting ({y}, {x}) would merge two codels")]
    Merge { y: usize, x: usize },
    #[error("pen left the canvas")]
    OffCanvas,
    #[error("generated program does not reproduce its payload")]
    Unfaithful,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Convert decoded pixels to a grid. In lenient mode colors outside the
/// palette read as black.
pub fn decode(img: &RgbImage, lenient: bool) -> Result<Grid> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage);
    }
    let mut cells = Vec::with_capacity(width * height);
    for (x, y, &Rgb(rgb)) in img.enumerate_pixels() {
        cells.push(match Color::from_rgb(rgb) {
            Ok(color) => color,
            Err(_) if lenient => Color::Black,
            Err(color) => {
                return Err(Error::InvalidColor {
                    y: y as usize,
                    x: x as usize,
                    color,
                });
            }
        });
    }
    Ok(Grid::new(width, height, cells))
}

pub fn encode(grid: &Grid) -> RgbImage {
    RgbImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        let color = grid.get(Pos::new(y as usize, x as usize));
        Rgb(color.unwrap_or(Color::Black).rgb())
    })
}

pub fn load(path: impl AsRef<Path>, lenient: bool) -> Result<Grid> {
    let img = image::open(path)?.to_rgb8();
    decode(&img, lenient)
}

pub fn save(grid: &Grid, path: impl AsRef<Path>) -> Result<()> {
    encode(grid).save(path)?;
    Ok(())
}

pub fn encode_png(grid: &Grid) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    encode(grid).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8], lenient: bool) -> Result<Grid> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgb8();
    decode(&img, lenient)
}
