use thiserror::Error;

pub const WHITE: [u8; 3] = [255, 255, 255];
pub const BLACK: [u8; 3] = [0, 0, 0];

pub const LIGHTNESSES: u8 = 3;
pub const HUES: u8 = 6;

// Rows are light, normal, dark; columns run red, yellow, green, cyan, blue,
// magenta.
const PALETTE: [[[u8; 3]; HUES as usize]; LIGHTNESSES as usize] = [
    [
        [255, 192, 192],
        [255, 255, 192],
        [192, 255, 192],
        [192, 255, 255],
        [192, 192, 255],
        [255, 192, 255],
    ],
    [
        [255, 0, 0],
        [255, 255, 0],
        [0, 255, 0],
        [0, 255, 255],
        [0, 0, 255],
        [255, 0, 255],
    ],
    [
        [192, 0, 0],
        [192, 192, 0],
        [0, 192, 0],
        [0, 192, 192],
        [0, 0, 192],
        [192, 0, 192],
    ],
];

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("#{r:02x}{g:02x}{b:02x} is not a Piet color")]
pub struct InvalidColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One of the 18 program colors, as a point on the lightness/hue lattice.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Shade {
    lightness: u8,
    hue: u8,
}

impl Shade {
    pub fn new(lightness: i64, hue: i64) -> Shade {
        Shade {
            lightness: lightness.rem_euclid(i64::from(LIGHTNESSES)) as u8,
            hue: hue.rem_euclid(i64::from(HUES)) as u8,
        }
    }

    pub fn all() -> impl Iterator<Item = Shade> {
        (0..LIGHTNESSES).flat_map(|l| (0..HUES).map(move |h| Shade::new(l.into(), h.into())))
    }

    pub fn lightness(self) -> u8 {
        self.lightness
    }

    pub fn hue(self) -> u8 {
        self.hue
    }

    pub fn rgb(self) -> [u8; 3] {
        PALETTE[usize::from(self.lightness)][usize::from(self.hue)]
    }

    pub fn shift(self, change: Change) -> Shade {
        Shade::new(
            i64::from(self.lightness + change.lightness),
            i64::from(self.hue + change.hue),
        )
    }

    pub fn change_to(self, to: Shade) -> Change {
        Change {
            lightness: (to.lightness + LIGHTNESSES - self.lightness) % LIGHTNESSES,
            hue: (to.hue + HUES - self.hue) % HUES,
        }
    }
}

/// The step between two shades, both components wrapped to be non-negative.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Change {
    pub lightness: u8,
    pub hue: u8,
}

impl Change {
    pub fn new(lightness: i64, hue: i64) -> Change {
        let Shade { lightness, hue } = Shade::new(lightness, hue);
        Change { lightness, hue }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Color {
    White,
    Black,
    Shade(Shade),
}

impl Color {
    pub fn from_rgb(rgb: [u8; 3]) -> Result<Color, InvalidColor> {
        match rgb {
            WHITE => Ok(Color::White),
            BLACK => Ok(Color::Black),
            _ => piet_color_position(rgb)
                .map(|(lightness, hue)| Color::Shade(Shade::new(lightness.into(), hue.into()))),
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            Color::White => WHITE,
            Color::Black => BLACK,
            Color::Shade(shade) => shade.rgb(),
        }
    }

    pub fn shade(self) -> Option<Shade> {
        match self {
            Color::Shade(shade) => Some(shade),
            _ => None,
        }
    }
}

/// Locate `rgb` on the program lattice as `(lightness, hue)`.
pub fn piet_color_position(rgb: [u8; 3]) -> Result<(u8, u8), InvalidColor> {
    for (lightness, row) in PALETTE.iter().enumerate() {
        if let Some(hue) = row.iter().position(|&c| c == rgb) {
            return Ok((lightness as u8, hue as u8));
        }
    }
    let [r, g, b] = rgb;
    Err(InvalidColor { r, g, b })
}

pub fn piet_color_at(lightness: i64, hue: i64) -> [u8; 3] {
    Shade::new(lightness, hue).rgb()
}
