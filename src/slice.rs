use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, RangeFrom, RangeFull, RangeInclusive, RangeToInclusive};
use std::ptr::NonNull;
use std::slice;

use log::debug;

use crate::dimension::Dimension;
use crate::element::Element;
use crate::error::{MdError, MdResult};
use crate::op::{eval_into, Expression};
use crate::simd::Alignment;
use crate::view::{format_nd, ArrayView, RawView};

/// Inclusive range along one axis.
///
/// Negative bounds count from the end of the axis, `-1` being the last
/// element. `full` selects the whole axis and ignores the bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub start: isize,
    pub end: isize,
    pub full: bool,
}

impl Slice {
    pub const fn all() -> Self {
        Slice {
            start: 0,
            end: -1,
            full: true,
        }
    }

    pub const fn new(start: isize, end: isize) -> Self {
        Slice {
            start,
            end,
            full: false,
        }
    }

    pub const fn index(i: isize) -> Self {
        Slice::new(i, i)
    }
}

impl From<isize> for Slice {
    fn from(i: isize) -> Self {
        Slice::index(i)
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::all()
    }
}

impl From<RangeInclusive<isize>> for Slice {
    fn from(r: RangeInclusive<isize>) -> Self {
        Slice::new(*r.start(), *r.end())
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(r: RangeFrom<isize>) -> Self {
        Slice::new(r.start, -1)
    }
}

impl From<RangeToInclusive<isize>> for Slice {
    fn from(r: RangeToInclusive<isize>) -> Self {
        Slice::new(0, r.end)
    }
}

#[inline]
pub fn normalize_index(i: isize, extent: usize) -> isize {
    if i < 0 {
        i + extent as isize
    } else {
        i
    }
}

// (start, len) of one axis after normalisation
fn axis_range(axis: usize, s: &Slice, extent: usize) -> MdResult<(usize, usize)> {
    if s.full {
        return Ok((0, extent));
    }
    let start = normalize_index(s.start, extent);
    let end = normalize_index(s.end, extent);
    if start < 0 || start >= extent as isize {
        return Err(MdError::OutOfRange {
            axis,
            index: s.start,
            extent,
        });
    }
    if end < 0 || end >= extent as isize {
        return Err(MdError::OutOfRange {
            axis,
            index: s.end,
            extent,
        });
    }
    if start > end {
        return Err(MdError::InvalidArgument {
            axis,
            start: s.start,
            end: s.end,
        });
    }
    Ok((start as usize, (end - start + 1) as usize))
}

/// Offset and extents of the window `slices` cut from `dim`.
///
/// The window must be one unbroken run of memory: every axis in front of the
/// innermost partially covered axis has to keep exactly one element.
pub(crate) fn slice_layout<D: Dimension>(
    dim: &D,
    stride: &D,
    slices: &[Slice],
) -> MdResult<(usize, D)> {
    assert_eq!(slices.len(), D::NDIM, "one slice per axis");
    let mut starts = D::zeros();
    let mut new_dim = *dim;
    for (axis, s) in slices.iter().enumerate() {
        let (start, len) = axis_range(axis, s, dim.as_slice()[axis])?;
        starts.as_slice_mut()[axis] = start;
        new_dim.as_slice_mut()[axis] = len;
    }

    let (old, new) = (dim.as_slice(), new_dim.as_slice());
    if let Some(k) = (0..D::NDIM).rev().find(|&a| new[a] != old[a]) {
        if let Some(axis) = (0..k).find(|&a| new[a] != 1) {
            return Err(MdError::NonContiguousSlice { axis });
        }
    }

    let offset = D::stride_offset(&starts, stride) as usize;
    debug!(
        "slice {:?} of {:?}: offset {}, extents {:?}",
        slices, dim, offset, new_dim
    );
    Ok((offset, new_dim))
}

/// Mutable contiguous window into memory it does not own. Never resized.
pub struct SubView<'a, T, D: Dimension> {
    pub(crate) view: RawView<T, D>,
    life: PhantomData<&'a mut T>,
}

impl<'a, T: Element, D: Dimension> SubView<'a, T, D> {
    pub const ALIGNMENT: Alignment = Alignment::Unaligned;

    pub(crate) fn from_raw(view: RawView<T, D>) -> Self {
        Self {
            view,
            life: PhantomData,
        }
    }

    pub fn new(data: &'a mut [T], dim: D, slices: D::Slices) -> MdResult<Self> {
        if dim.size_checked() != Some(data.len()) {
            return Err(MdError::shape_mismatch(dim.as_slice(), &[data.len()]));
        }
        let base = RawView::new(NonNull::from(data).cast::<T>(), dim);
        Ok(Self::from_raw(base.slice(&slices)?))
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

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.view.as_ptr()
    }

    pub fn data(&self) -> &[T] {
        unsafe { self.view.as_slice() }
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        unsafe { self.view.as_mut_slice() }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.data().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.data_mut().iter_mut()
    }

    pub fn linear_index(&self, index: D) -> usize {
        self.view.linear_index(&index)
    }

    pub fn linear_index_of(&self, index: &[usize]) -> MdResult<usize> {
        self.view.linear_index_of(index)
    }

    pub fn at(&self, index: D) -> MdResult<&T> {
        let p = self.view.get(&index)?;
        Ok(unsafe { &*p })
    }

    pub fn at_mut(&mut self, index: D) -> MdResult<&mut T> {
        let p = self.view.get(&index)?;
        Ok(unsafe { &mut *p })
    }

    /// # Safety
    ///
    /// Every component of `index` must be below its axis extent.
    pub unsafe fn get_unchecked(&self, index: D) -> &T {
        &*self.view.uget(&index)
    }

    /// # Safety
    ///
    /// Every component of `index` must be below its axis extent.
    pub unsafe fn get_unchecked_mut(&mut self, index: D) -> &mut T {
        &mut *self.view.uget(&index)
    }

    pub fn set_value(&mut self, v: T) {
        self.data_mut().fill(v);
    }

    pub fn view(&self) -> ArrayView<'_, T, D> {
        ArrayView::from_raw(self.view)
    }

    pub fn reborrow(&mut self) -> SubView<'_, T, D> {
        SubView::from_raw(self.view)
    }

    pub fn slice_mut(&mut self, slices: D::Slices) -> MdResult<SubView<'_, T, D>> {
        Ok(SubView::from_raw(self.view.slice(&slices)?))
    }

    pub fn assign<E>(&mut self, expr: E) -> MdResult<()>
    where
        E: Expression<Elem = T, Dim = D>,
    {
        unsafe { eval_into(&expr, &self.view, Self::ALIGNMENT) }
    }
}

impl<'a, T: Element, D: Dimension> Index<D> for SubView<'a, T, D> {
    type Output = T;

    fn index(&self, index: D) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a, T: Element, D: Dimension> IndexMut<D> for SubView<'a, T, D> {
    fn index_mut(&mut self, index: D) -> &mut T {
        match self.at_mut(index) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a, T: Element, D: Dimension> fmt::Debug for SubView<'a, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_nd(self.data(), self.shape(), f)
    }
}
