#![no_std]
use core::{mem, ptr, str};

/// Bump allocator over a borrowed byte buffer.
///
/// Everything allocated from a `Mem<'m>` lives for `'m` and is never dropped,
/// so it is only suitable for plain data such as scene geometry.
pub struct Mem<'m> {
    raw: &'m mut [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oom;

impl<'m> Mem<'m> {
    pub fn new(raw: &'m mut [u8]) -> Mem<'m> {
        Mem { raw }
    }

    pub fn free(&self) -> usize {
        self.raw.len()
    }

    /// Allocates `n` elements, initializing the `i`-th one with `element(i)`.
    ///
    /// If `element` panics, the already written elements are leaked, which is
    /// fine: the partially filled slice is never handed out.
    pub fn alloc_array<T>(
        &mut self,
        n: usize,
        mut element: impl FnMut(usize) -> T,
    ) -> Result<&'m mut [T], Oom> {
        let size = mem::size_of::<T>();
        let align = mem::align_of::<T>();
        assert!(size % align == 0);
        self.align_to(align)?;
        let alloc_size = size.checked_mul(n).ok_or(Oom)?;
        let res = self.alloc_bytes(alloc_size)?;
        let mut ptr = res as *mut u8 as *mut T;
        let res = ptr::slice_from_raw_parts_mut(ptr, n);
        for i in 0..n {
            unsafe {
                ptr::write(ptr, element(i));
                ptr = ptr.add(1);
            }
        }

        Ok(unsafe { &mut *res })
    }

    pub fn alloc_array_default<T: Default>(&mut self, n: usize) -> Result<&'m mut [T], Oom> {
        self.alloc_array(n, |_| T::default())
    }

    /// Copies `s` into the arena, detaching it from the input's lifetime.
    pub fn alloc_str(&mut self, s: &str) -> Result<&'m str, Oom> {
        let bytes = s.as_bytes();
        let res = self.alloc_array(bytes.len(), |i| bytes[i])?;
        // Byte-for-byte copy of a valid `str`.
        Ok(unsafe { str::from_utf8_unchecked(res) })
    }

    fn align_to(&mut self, align: usize) -> Result<(), Oom> {
        debug_assert!(align.is_power_of_two());
        let addr = self.raw.as_ptr() as usize;
        let aligned = addr.wrapping_add(align - 1) & !(align - 1);
        let waste = aligned.checked_sub(addr).ok_or(Oom)?;
        let _ = self.alloc_bytes(waste)?;
        Ok(())
    }

    fn alloc_bytes(&mut self, n: usize) -> Result<*mut [u8], Oom> {
        if self.raw.len() < n {
            return Err(Oom);
        }
        let raw = mem::take(&mut self.raw);
        let (res, raw) = raw.split_at_mut(n);
        self.raw = raw;
        Ok(res)
    }
}

#[test]
fn test_alloc_str() {
    let mut buf = [0u8; 8];
    let mut mem = Mem::new(&mut buf);
    let owned = {
        let input = [b'm', b'i', b'r', b'r', b'o', b'r'];
        let input = str::from_utf8(&input).unwrap();
        mem.alloc_str(input).unwrap()
    };
    assert_eq!(owned, "mirror");
    assert_eq!(mem.free(), 2);
    assert_eq!(mem.alloc_str("abc"), Err(Oom));
}

#[test]
fn test_alloc_array_alignment() {
    let mut buf = [0u8; 64];
    let mut mem = Mem::new(&mut buf);
    let _ = mem.alloc_str("x").unwrap();
    let xs = mem.alloc_array(3, |i| i as u64 * 10).unwrap();
    assert_eq!(xs, &[0, 10, 20]);
    assert_eq!(xs.as_ptr() as usize % core::mem::align_of::<u64>(), 0);
    assert!(mem.alloc_array_default::<u64>(16).is_err());
}
