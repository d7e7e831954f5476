//! Aligned operand storage.
//!
//! [`AlignedBuf`] owns a zero-initialised, 64-byte aligned heap block. The
//! memory is released in `Drop`, so a buffer created inside a shape iteration
//! is freed on every exit path of that iteration, including `?` returns.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use crate::bf16::{bf16, widen};
use crate::{Error, Result};

/// Alignment of every operand buffer, one cache line.
pub const BUFFER_ALIGN: usize = 64;

mod sealed {
    pub trait Sealed {}
}

/// Scalar types that can live in an operand buffer.
///
/// Sealed: each implementor is valid when all of its bytes are zero, which
/// [`AlignedBuf`] relies on.
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed
{
    /// Value as `f64`, used by the error scan. bf16 widens exactly.
    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {
                #[inline]
                fn to_f64(self) -> f64 {
                    f64::from(self)
                }
            }
        )*
    };
}

impl_element!(f64, f32, i32, i16, i8, u8);

impl sealed::Sealed for bf16 {}
impl Element for bf16 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(widen(self))
    }
}

/// Zeroed, 64-byte aligned, fixed-length buffer of `T`.
pub struct AlignedBuf<T: Element> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
}

// SAFETY: AlignedBuf uniquely owns its allocation, like Vec<T>.
unsafe impl<T: Element> Send for AlignedBuf<T> {}
unsafe impl<T: Element> Sync for AlignedBuf<T> {}

impl<T: Element> AlignedBuf<T> {
    /// Allocate `len` zeroed elements.
    pub fn zeroed(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::InvalidShape(
                "operand buffer length must be > 0".to_owned(),
            ));
        }
        let layout = Layout::array::<T>(len)
            .and_then(|layout| layout.align_to(BUFFER_ALIGN))
            .map_err(|e| {
                Error::InvalidShape(format!("operand buffer of {len} elements: {e}"))
            })?;

        // SAFETY: layout has non-zero size (len > 0 and T is not a ZST).
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<T>()) else {
            alloc::handle_alloc_error(layout);
        };
        Ok(Self { ptr, len, layout })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset every element to zero.
    pub fn clear(&mut self) {
        self.fill(T::default());
    }

    /// Size of the allocation in bytes.
    pub fn byte_len(&self) -> usize {
        self.layout.size()
    }
}

impl<T: Element> Deref for AlignedBuf<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // SAFETY: ptr points to `len` initialised (zeroed or written) elements we own.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Element> DerefMut for AlignedBuf<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Element> Drop for AlignedBuf<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

impl<T: Element> fmt::Debug for AlignedBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuf")
            .field("len", &self.len)
            .field("align", &self.layout.align())
            .finish()
    }
}
