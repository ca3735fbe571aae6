use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;
use std::ptr::NonNull;
use std::slice;

use rawpointer::PointerExt;

use crate::array::MdArray;
use crate::dimension::Dimension;
use crate::element::Element;
use crate::error::{MdError, MdResult};
use crate::slice::slice_layout;

pub(crate) struct RawView<T, D: Dimension> {
    ptr: NonNull<T>,
    dim: D,
    stride: D,
    len: usize,
}

impl<T, D: Dimension> Clone for RawView<T, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, D: Dimension> Copy for RawView<T, D> {}

impl<T, D: Dimension> RawView<T, D> {
    pub(crate) fn new(ptr: NonNull<T>, dim: D) -> Self {
        let stride = dim.strides();
        Self::with_strides(ptr, dim, stride)
    }

    pub(crate) fn with_strides(ptr: NonNull<T>, dim: D, stride: D) -> Self {
        Self {
            ptr,
            dim,
            stride,
            len: dim.size(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(NonNull::dangling(), D::zeros())
    }

    pub(crate) fn extent(&self, axis: usize) -> usize {
        self.dim.as_slice()[axis]
    }

    pub(crate) fn shape(&self) -> &[usize] {
        self.dim.as_slice()
    }

    pub(crate) fn dim(&self) -> D {
        self.dim
    }

    pub(crate) fn strides(&self) -> &[usize] {
        self.stride.as_slice()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub(crate) fn linear_index(&self, index: &D) -> usize {
        D::stride_offset(index, &self.stride) as usize
    }

    pub(crate) fn linear_index_of(&self, index: &[usize]) -> MdResult<usize> {
        let index = D::from_indices(index)?;
        self.dim.check_index(&index)?;
        Ok(self.linear_index(&index))
    }

    #[inline]
    pub(crate) unsafe fn uget(&self, index: &D) -> *mut T {
        if cfg!(any(debug_assertions, feature = "hardened")) {
            if let Err(e) = self.dim.check_index(index) {
                panic!("{}", e);
            }
        }
        let mut ptr = self.ptr;
        for (&ix, &s) in index.as_slice().iter().zip(self.stride.as_slice()) {
            ptr = ptr.stride_offset(s as isize, ix);
        }
        ptr.as_ptr()
    }

    pub(crate) fn get(&self, index: &D) -> MdResult<*mut T> {
        self.dim.check_index(index)?;
        Ok(unsafe { self.uget(index) })
    }

    pub(crate) unsafe fn window(&self, offset: usize, dim: D) -> Self {
        Self::with_strides(self.ptr.offset(offset as isize), dim, self.stride)
    }

    pub(crate) fn slice(&self, slices: &D::Slices) -> MdResult<Self> {
        let (offset, dim) = slice_layout(&self.dim, &self.stride, slices.as_ref())?;
        Ok(unsafe { self.window(offset, dim) })
    }

    /// The caller picks a lifetime no longer than the memory's.
    pub(crate) unsafe fn as_slice<'a>(&self) -> &'a [T] {
        slice::from_raw_parts(self.ptr.as_ptr() as *const T, self.len)
    }

    pub(crate) unsafe fn as_mut_slice<'a>(&self) -> &'a mut [T] {
        slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}

/// Read-only view over borrowed, contiguous row-major memory.
pub struct ArrayView<'a, T, D: Dimension> {
    pub(crate) view: RawView<T, D>,
    life: PhantomData<&'a T>,
}

impl<'a, T, D: Dimension> Clone for ArrayView<'a, T, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T, D: Dimension> Copy for ArrayView<'a, T, D> {}

impl<'a, T: Element, D: Dimension> ArrayView<'a, T, D> {
    pub(crate) fn from_raw(view: RawView<T, D>) -> Self {
        Self {
            view,
            life: PhantomData,
        }
    }

    pub fn from_slice(data: &'a [T], dim: D) -> MdResult<Self> {
        if dim.size_checked() != Some(data.len()) {
            return Err(MdError::shape_mismatch(dim.as_slice(), &[data.len()]));
        }
        let ptr = NonNull::from(data).cast::<T>();
        Ok(Self::from_raw(RawView::new(ptr, dim)))
    }

    /// # Safety
    ///
    /// `ptr` must be non-null and valid for reads of `dim.size()` elements
    /// for `'a`, with no concurrent writer.
    pub unsafe fn from_raw_parts(ptr: *const T, dim: D) -> Self {
        Self::from_raw(RawView::new(NonNull::new_unchecked(ptr as *mut T), dim))
    }

    pub fn extent(&self, axis: usize) -> usize {
        self.view.extent(axis)
    }

    pub fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    pub fn dims(&self) -> D {
        self.view.dim()
    }

    pub fn strides(&self) -> &[usize] {
        self.view.strides()
    }

    pub fn ndim(&self) -> usize {
        D::NDIM
    }

    pub fn size(&self) -> usize {
        self.view.len()
    }

    pub fn as_ptr(&self) -> *const T {
        self.view.as_ptr()
    }

    pub fn data(&self) -> &'a [T] {
        unsafe { self.view.as_slice() }
    }

    pub fn iter(&self) -> slice::Iter<'a, T> {
        self.data().iter()
    }

    pub fn linear_index(&self, index: D) -> usize {
        self.view.linear_index(&index)
    }

    pub fn linear_index_of(&self, index: &[usize]) -> MdResult<usize> {
        self.view.linear_index_of(index)
    }

    pub fn at(&self, index: D) -> MdResult<&'a T> {
        let p = self.view.get(&index)?;
        Ok(unsafe { &*p })
    }

    /// # Safety
    ///
    /// Every component of `index` must be below its axis extent.
    pub unsafe fn get_unchecked(&self, index: D) -> &'a T {
        &*self.view.uget(&index)
    }

    pub fn slice(&self, slices: D::Slices) -> MdResult<ArrayView<'a, T, D>> {
        Ok(Self::from_raw(self.view.slice(&slices)?))
    }

    pub fn to_owned(&self) -> MdResult<MdArray<T, D>> {
        MdArray::from_slice(self.data(), self.dims())
    }
}

impl<'a, T: Element, D: Dimension> Index<D> for ArrayView<'a, T, D> {
    type Output = T;

    fn index(&self, index: D) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a, T: Element, D: Dimension> fmt::Debug for ArrayView<'a, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_nd(self.data(), self.shape(), f)
    }
}

pub(crate) fn format_nd<T: fmt::Debug>(
    data: &[T],
    shape: &[usize],
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    match shape {
        [] => {}
        [_] => {
            f.write_str("[")?;
            for (i, v) in data.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{:?}", v)?;
            }
            f.write_str("]")?;
        }
        [n, rest @ ..] => {
            let step: usize = rest.iter().product();
            f.write_str("[")?;
            for i in 0..*n {
                if i > 0 {
                    f.write_str(",\n ")?;
                }
                format_nd(&data[i * step..(i + 1) * step], rest, f)?;
            }
            f.write_str("]")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slices;

    fn seq(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_view_strides_and_access() {
        let data = seq(120);
        let v = ArrayView::from_slice(&data, [4, 5, 6]).unwrap();
        assert_eq!(v.shape(), &[4, 5, 6]);
        assert_eq!(v.strides(), &[30, 6, 1]);
        assert_eq!(v.extent(1), 5);
        assert_eq!(v.size(), 120);
        assert_eq!(v[[1, 2, 3]], 45.0);
        assert_eq!(*v.at([3, 4, 5]).unwrap(), 119.0);
        assert_eq!(unsafe { *v.get_unchecked([2, 0, 1]) }, 61.0);
        assert_eq!(v.linear_index([2, 0, 1]), 61);
        assert_eq!(v.linear_index_of(&[2, 0, 1]), Ok(61));
        assert_eq!(
            v.linear_index_of(&[2, 0]),
            Err(MdError::IndexRank {
                expected: 3,
                got: 2
            })
        );
        assert!(matches!(
            v.linear_index_of(&[0, 5, 0]),
            Err(MdError::OutOfRange { axis: 1, .. })
        ));
    }

    #[test]
    fn test_view_bounds() {
        let data = seq(6);
        let v = ArrayView::from_slice(&data, [6]).unwrap();
        assert_eq!(*v.at([5]).unwrap(), 5.0);
        assert_eq!(
            v.at([6]),
            Err(MdError::OutOfRange {
                axis: 0,
                index: 6,
                extent: 6
            })
        );
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_view_index_panics() {
        let data = seq(6);
        let v = ArrayView::from_slice(&data, [2, 3]).unwrap();
        let _ = v[[2, 0]];
    }

    #[test]
    fn test_view_len_mismatch() {
        let data = seq(5);
        assert!(matches!(
            ArrayView::from_slice(&data, [2, 3]),
            Err(MdError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_view_slice() {
        let data = seq(24);
        let v = ArrayView::from_slice(&data, [2, 3, 4]).unwrap();
        let w = v.slice(slices![1, 1..=2, ..]).unwrap();
        assert_eq!(w.shape(), &[1, 2, 4]);
        assert_eq!(w.strides(), v.strides());
        assert_eq!(w.data(), &data[16..24]);
        assert_eq!(w[[0, 1, 3]], 23.0);
        let owned = w.to_owned().unwrap();
        assert_eq!(owned.data(), w.data());
    }

    #[test]
    fn test_view_debug() {
        let data = seq(6);
        let v = ArrayView::from_slice(&data, [2, 3]).unwrap();
        assert_eq!(format!("{:?}", v), "[[0.0, 1.0, 2.0],\n [3.0, 4.0, 5.0]]");
        let v = ArrayView::from_slice(&data[..3], [3]).unwrap();
        assert_eq!(format!("{:?}", v), "[0.0, 1.0, 2.0]");
    }
}
