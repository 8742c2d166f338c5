use crate::{Color, Uv};

/// Decoded RGBA8 bitmap, row 0 at the top.
#[derive(Clone, Copy)]
pub struct Texture<'m> {
    dim: [u32; 2],
    rgba: &'m [u8],
}

/// texture is {0}x{1}, but has {2} bytes of RGBA data
#[derive(Debug, displaydoc::Display)]
pub struct InvalidTexture(u32, u32, usize);

impl<'m> Texture<'m> {
    pub fn new(dim @ [w, h]: [u32; 2], rgba: &'m [u8]) -> Result<Texture<'m>, InvalidTexture> {
        let expected = (w as usize).checked_mul(h as usize).and_then(|it| it.checked_mul(4));
        if w == 0 || h == 0 || expected != Some(rgba.len()) {
            return Err(InvalidTexture(w, h, rgba.len()));
        }
        Ok(Texture { dim, rgba })
    }

    /// Pixel lookup with wrap-around addressing, coordinates are truncated.
    ///
    /// Returns raw byte values, so channels are in `0..=255`.
    pub fn sample(&self, uv: Uv) -> Color {
        let [w, h] = self.dim;
        let u = wrap(uv.u);
        let v = wrap(uv.v);
        let x = texel(u * (w - 1) as f64);
        let y = texel((1.0 - v) * (h - 1) as f64);
        let idx = 4 * (y * w as usize + x);
        let [r, g, b] = [0, 1, 2].map(|c| self.rgba[idx + c] as f64);
        Color::new(r, g, b)
    }
}

/// Pixel containing a non-negative coordinate.
fn texel(x: f64) -> usize {
    x as usize
}

fn wrap(x: f64) -> f64 {
    let x = x % 1.0;
    if x < 0.0 {
        x + 1.0
    } else {
        x
    }
}
