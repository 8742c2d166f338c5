mod color;

use std::{
    marker::PhantomData,
    ops::{self, Range},
    slice,
    sync::atomic::{AtomicUsize, Ordering::SeqCst},
};

pub use self::color::Color;

pub type Idx = [u32; 2];

pub struct Buf<'m> {
    dim: [u32; 2],
    buf: &'m mut [Color],
}

impl<'m> Buf<'m> {
    pub fn new(dim @ [dx, dy]: Idx, buf: &'m mut [Color]) -> Buf<'m> {
        assert!(dx as usize * dy as usize == buf.len());
        Buf { dim, buf }
    }
    pub fn by_row(&self) -> impl Iterator<Item = Idx> {
        let [dx, dy] = self.dim;
        (0..dy).flat_map(move |y| (0..dx).map(move |x| [x, y]))
    }
    /// Tightly packed RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&*self.buf)
    }
    pub fn dim(&self) -> Idx {
        self.dim
    }
    pub fn width(&self) -> u32 {
        self.dim[0]
    }
    pub fn height(&self) -> u32 {
        self.dim[1]
    }
    /// Splits the rows into `n_bands` contiguous bands, see [`band_rows`].
    pub(crate) fn partition(&mut self, n_bands: usize) -> BufPartition<'_, 'm> {
        BufPartition {
            p: PhantomData,
            buf: self.buf.as_mut_ptr(),
            dim: self.dim,
            n_bands,
            next_band: AtomicUsize::new(0),
        }
    }
    fn linear(&self, idx: Idx) -> Option<usize> {
        if !(idx[0] < self.dim[0] && idx[1] < self.dim[1]) {
            return None;
        }
        Some(idx[0] as usize + idx[1] as usize * self.dim[0] as usize)
    }
}

impl<'m> ops::Index<Idx> for Buf<'m> {
    type Output = Color;

    fn index(&self, index: Idx) -> &Self::Output {
        let l = self.linear(index).unwrap();
        &self.buf[l]
    }
}

impl<'m> ops::IndexMut<Idx> for Buf<'m> {
    fn index_mut(&mut self, index: Idx) -> &mut Self::Output {
        let l = self.linear(index).unwrap();
        &mut self.buf[l]
    }
}

/// Rows of band `i` out of `n`: `height / n` rows each, the last band also
/// takes the remainder.
pub fn band_rows(height: u32, n: usize, i: usize) -> Range<u32> {
    assert!(i < n);
    let per_band = height / n as u32;
    let start = per_band * i as u32;
    let end = if i + 1 == n { height } else { start + per_band };
    start..end
}

pub(crate) struct BufPartition<'a, 'm> {
    p: PhantomData<&'a mut Buf<'m>>,
    dim: Idx,
    buf: *mut Color,
    n_bands: usize,
    next_band: AtomicUsize,
}

unsafe impl Send for BufPartition<'_, '_> {}
unsafe impl Sync for BufPartition<'_, '_> {}

pub(crate) struct Band<'a> {
    pub(crate) index: usize,
    pub(crate) rows: Range<u32>,
    width: u32,
    buf: &'a mut [Color],
}

impl<'a, 'm> BufPartition<'a, 'm> {
    /// Hands out every band exactly once.
    pub(crate) fn next_band(&self) -> Option<Band<'a>> {
        let index = self.next_band.fetch_add(1, SeqCst);
        if index >= self.n_bands {
            self.next_band.fetch_sub(1, SeqCst);
            return None;
        }
        let [width, height] = self.dim;
        let rows = band_rows(height, self.n_bands, index);
        let start = rows.start as usize * width as usize;
        let len = rows.len() * width as usize;
        // Bands are disjoint and each index is claimed once.
        let buf = unsafe { slice::from_raw_parts_mut(self.buf.add(start), len) };
        Some(Band { index, rows, width, buf })
    }
}

impl<'a> Band<'a> {
    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = (u32, &mut [Color])> + '_ {
        let width = self.width.max(1) as usize;
        self.rows.clone().zip(self.buf.chunks_mut(width))
    }
}
