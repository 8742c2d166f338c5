use core::{ops, str::FromStr};

use geom::{v64, ParseVectorError};

/// Linear color. Channels are not clamped, light intensities routinely
/// exceed 255.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// invalid color, expected `r,g,b`: {0}
#[derive(Debug, displaydoc::Display)]
pub struct ParseColorError(ParseVectorError);

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Color {
        Color { r, g, b }
    }

    pub fn max_channel(&self) -> f64 {
        self.r.max(self.g).max(self.b)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Color, ParseColorError> {
        let v = s.parse::<v64>().map_err(ParseColorError)?;
        Ok(Color::new(v.x, v.y, v.z))
    }
}

impl ops::Mul for Color {
    type Output = Color;

    fn mul(self, rhs: Color) -> Color {
        Color::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b)
    }
}

impl ops::Mul<f64> for Color {
    type Output = Color;

    fn mul(self, c: f64) -> Color {
        Color::new(self.r * c, self.g * c, self.b * c)
    }
}

impl ops::Add for Color {
    type Output = Color;

    fn add(self, rhs: Color) -> Color {
        Color::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}
