pub mod rgb;
pub mod threads;
mod trace;

use geom::{v64, Ray};
use scene::{Color, InvalidScene, Scene};

use crate::threads::Threads;

pub use crate::trace::{Hit, Tracer};

/// {0}
#[derive(Debug, displaydoc::Display)]
pub struct Error(ErrorRepr);

#[derive(Debug, displaydoc::Display)]
enum ErrorRepr {
    /// invalid scene: {0}
    InvalidScene(InvalidScene),
    /// output buffer is {0}x{1}, but camera resolution is {2}x{3}
    DimensionMismatch(u32, u32, u32, u32),
}

impl From<ErrorRepr> for Error {
    fn from(repr: ErrorRepr) -> Error {
        Error(repr)
    }
}

/// Renders every pixel on the calling thread, in row-major order.
pub fn render(scene: &Scene<'_>, buf: &mut rgb::Buf<'_>) -> Result<(), Error> {
    let (tracer, view) = prepare(scene, buf.dim())?;
    let [width, height] = buf.dim();
    for y in 0..height {
        for x in 0..width {
            buf[[x, y]] = render_pixel(&tracer, &view, [x, y]);
        }
        if (y + 1) % 50 == 0 {
            log::debug!("rendered {}/{height} rows", y + 1);
        }
    }
    Ok(())
}

/// Renders one contiguous band of rows per worker of `threads`.
///
/// The pool outlives the call and can be reused across renders. Bands are
/// split once, by `threads.len()`, so each worker gets exactly one band only
/// while no other `in_parallel` call shares the pool. The output is identical
/// to [`render`].
pub fn render_parallel(
    scene: &Scene<'_>,
    threads: &Threads,
    buf: &mut rgb::Buf<'_>,
) -> Result<(), Error> {
    let (tracer, view) = prepare(scene, buf.dim())?;
    let bands = buf.partition(threads.len());
    threads.in_parallel(&|| {
        let Some(mut band) = bands.next_band() else { return };
        log::debug!("band {}: rendering rows {:?}", band.index, band.rows);
        for (y, row) in band.rows_mut() {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = render_pixel(&tracer, &view, [x as u32, y]);
            }
        }
        log::debug!("band {}: done", band.index);
    });
    Ok(())
}

fn prepare<'a>(scene: &'a Scene<'a>, dim: rgb::Idx) -> Result<(Tracer<'a>, View), Error> {
    scene.validate().map_err(ErrorRepr::InvalidScene)?;
    let [width, height] = scene.camera.resolution;
    if dim != [width, height] {
        Err(ErrorRepr::DimensionMismatch(dim[0], dim[1], width, height))?
    }
    let view = View::new(&scene.camera)
        .ok_or(ErrorRepr::InvalidScene(InvalidScene::DegenerateCamera))?;
    let tracer = Tracer::new(scene).map_err(ErrorRepr::InvalidScene)?;
    Ok((tracer, view))
}

fn render_pixel(tracer: &Tracer<'_>, view: &View, idx: rgb::Idx) -> rgb::Color {
    let ray = view.cast(idx);
    to_rgb(&tracer.trace(&ray))
}

fn to_rgb(color: &Color) -> rgb::Color {
    fn f(value: f64) -> u8 {
        value.clamp(0.0, 255.0) as u8
    }
    rgb::Color::opaque(f(color.r), f(color.g), f(color.b))
}

/// Primary ray generator: maps pixel centers onto the near plane.
pub(crate) struct View {
    pos: v64,
    /// Top left corner of the near plane.
    corner: v64,
    right: v64,
    down: v64,
}

impl View {
    pub(crate) fn new(camera: &scene::Camera) -> Option<View> {
        let basis = camera.basis()?;
        let plane = camera.near_plane;
        let [width, height] = camera.resolution;
        let corner = camera.pos - basis.w * camera.near_distance
            + basis.u * plane.left
            + basis.v * plane.top;
        let right = basis.u * ((plane.right - plane.left) / width as f64);
        let down = -basis.v * ((plane.top - plane.bottom) / height as f64);
        Some(View { pos: camera.pos, corner, right, down })
    }

    pub(crate) fn cast(&self, [x, y]: rgb::Idx) -> Ray {
        let to = self.corner + self.right * (x as f64 + 0.5) + self.down * (y as f64 + 0.5);
        Ray::from_to(self.pos, to)
    }
}

#[cfg(test)]
mod tests;
