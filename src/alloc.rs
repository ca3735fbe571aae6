use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::slice;

use log::debug;

use crate::element::Element;
use crate::error::{MdError, MdResult};
use crate::simd::BUFFER_ALIGN;

/// Heap buffer of `len` zero-initialised elements whose first element sits on
/// an `align`-byte boundary.
pub struct AlignedBuf<T> {
    ptr: NonNull<T>,
    len: usize,
    align: usize,
}

unsafe impl<T: Send> Send for AlignedBuf<T> {}
unsafe impl<T: Sync> Sync for AlignedBuf<T> {}

impl<T: Element> AlignedBuf<T> {
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            align: BUFFER_ALIGN,
        }
    }

    pub fn zeroed(len: usize) -> MdResult<Self> {
        Self::allocate(len, BUFFER_ALIGN)
    }

    pub fn allocate(len: usize, align: usize) -> MdResult<Self> {
        let align = align.max(std::mem::align_of::<T>());
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                align,
            });
        }
        let layout = Self::layout(len, align)?;
        // all-zero bits is a valid value for every `Element`
        let ptr = unsafe { alloc_zeroed(layout) } as *mut T;
        let ptr = NonNull::new(ptr).ok_or(MdError::Alloc {
            size: layout.size(),
            align,
        })?;
        debug!(
            "allocate {} elements ({} bytes, align {}) at {:p}",
            len,
            layout.size(),
            align,
            ptr
        );
        Ok(Self { ptr, len, align })
    }

    fn layout(len: usize, align: usize) -> MdResult<Layout> {
        let size = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(MdError::Alloc {
                size: usize::MAX,
                align,
            })?;
        Layout::from_size_align(size, align).map_err(|_| MdError::Alloc { size, align })
    }

    pub fn try_clone(&self) -> MdResult<Self> {
        let mut b = Self::allocate(self.len, self.align)?;
        b.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(b)
    }
}

impl<T> AlignedBuf<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn as_non_null(&self) -> NonNull<T> {
        self.ptr
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr() as *const T, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> Drop for AlignedBuf<T> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let size = self.len * std::mem::size_of::<T>();
        debug!("release {} bytes at {:p}", size, self.ptr);
        unsafe {
            let layout = Layout::from_size_align_unchecked(size, self.align);
            dealloc(self.ptr.as_ptr() as *mut u8, layout);
        }
    }
}
