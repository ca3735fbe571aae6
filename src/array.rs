use std::fmt;
use std::ops::{Index, IndexMut};
use std::slice;

use log::debug;

use crate::alloc::AlignedBuf;
use crate::dimension::{Dimension, Indices};
use crate::element::Element;
use crate::error::{MdError, MdResult};
use crate::op::{eval_into, Expression};
use crate::simd::Alignment;
use crate::slice::SubView;
use crate::view::{format_nd, ArrayView, RawView};

pub struct MdArray<T: Element, D: Dimension> {
    pub(crate) view: RawView<T, D>,
    buf: AlignedBuf<T>,
}

unsafe impl<T: Element, D: Dimension> Send for MdArray<T, D> {}
unsafe impl<T: Element, D: Dimension> Sync for MdArray<T, D> {}

pub type Array1<T> = MdArray<T, [usize; 1]>;
pub type Array2<T> = MdArray<T, [usize; 2]>;
pub type Array3<T> = MdArray<T, [usize; 3]>;
pub type Array4<T> = MdArray<T, [usize; 4]>;
pub type Array5<T> = MdArray<T, [usize; 5]>;
pub type Array6<T> = MdArray<T, [usize; 6]>;

impl<T: Element, D: Dimension> MdArray<T, D> {
    pub const ALIGNMENT: Alignment = Alignment::Aligned;

    pub fn new() -> Self {
        Self {
            view: RawView::empty(),
            buf: AlignedBuf::empty(),
        }
    }

    fn from_buf(buf: AlignedBuf<T>, dim: D) -> Self {
        let view = RawView::new(buf.as_non_null(), dim);
        Self { view, buf }
    }

    fn alloc_for(dim: &D) -> MdResult<AlignedBuf<T>> {
        let len = dim.size_checked().ok_or(MdError::Alloc {
            size: usize::MAX,
            align: crate::simd::BUFFER_ALIGN,
        })?;
        AlignedBuf::zeroed(len)
    }

    pub fn with_shape(dim: D) -> MdResult<Self> {
        Ok(Self::from_buf(Self::alloc_for(&dim)?, dim))
    }

    pub fn zeros(dim: D) -> MdResult<Self> {
        Self::with_shape(dim)
    }

    pub fn from_elem(dim: D, v: T) -> MdResult<Self> {
        let mut a = Self::with_shape(dim)?;
        a.set_value(v);
        Ok(a)
    }

    pub fn from_slice(data: &[T], dim: D) -> MdResult<Self> {
        if dim.size_checked() != Some(data.len()) {
            return Err(MdError::shape_mismatch(dim.as_slice(), &[data.len()]));
        }
        let mut a = Self::with_shape(dim)?;
        a.data_mut().copy_from_slice(data);
        Ok(a)
    }

    pub fn from_vec(v: Vec<T>, dim: D) -> MdResult<Self> {
        Self::from_slice(&v, dim)
    }

    pub fn from_expr<E>(expr: E) -> MdResult<Self>
    where
        E: Expression<Elem = T, Dim = D>,
    {
        let a = Self::with_shape(expr.dims())?;
        unsafe { eval_into(&expr, &a.view, Self::ALIGNMENT)? };
        Ok(a)
    }

    /// Reshapes to `dim`.
    ///
    /// With an unchanged element count the buffer and its contents are kept.
    /// Otherwise a new zeroed buffer replaces the old one; on failure the
    /// array is left as it was.
    pub fn reset(&mut self, dim: D) -> MdResult<()> {
        if dim.size_checked() == Some(self.buf.len()) {
            debug!("reset {:?} -> {:?}: buffer kept", self.view.dim(), dim);
            self.view = RawView::new(self.buf.as_non_null(), dim);
            return Ok(());
        }
        let buf = Self::alloc_for(&dim)?;
        debug!(
            "reset {:?} -> {:?}: {} -> {} elements",
            self.view.dim(),
            dim,
            self.buf.len(),
            buf.len()
        );
        *self = Self::from_buf(buf, dim);
        Ok(())
    }

    /// Evaluates `expr` into this array, reshaping first if the shapes differ.
    pub fn assign<E>(&mut self, expr: E) -> MdResult<()>
    where
        E: Expression<Elem = T, Dim = D>,
    {
        if expr.shape() != self.shape() {
            self.reset(expr.dims())?;
        }
        unsafe { eval_into(&expr, &self.view, Self::ALIGNMENT) }
    }

    pub fn ndim(&self) -> usize {
        D::NDIM
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

    pub fn size(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn as_ptr(&self) -> *const T {
        self.buf.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buf.as_mut_ptr()
    }

    pub fn data(&self) -> &[T] {
        self.buf.as_slice()
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        self.buf.as_mut_slice()
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.data().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.data_mut().iter_mut()
    }

    pub fn indexed_iter(&self) -> impl Iterator<Item = (D, &T)> + '_ {
        Indices::new(self.dims()).zip(self.iter())
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
    #[inline]
    pub unsafe fn get_unchecked(&self, index: D) -> &T {
        &*self.view.uget(&index)
    }

    /// # Safety
    ///
    /// Every component of `index` must be below its axis extent.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: D) -> &mut T {
        &mut *self.view.uget(&index)
    }

    pub fn set_value(&mut self, v: T) {
        self.data_mut().fill(v);
    }

    pub fn view(&self) -> ArrayView<'_, T, D> {
        ArrayView::from_raw(self.view)
    }

    pub fn slice(&self, slices: D::Slices) -> MdResult<ArrayView<'_, T, D>> {
        Ok(ArrayView::from_raw(self.view.slice(&slices)?))
    }

    pub fn slice_mut(&mut self, slices: D::Slices) -> MdResult<SubView<'_, T, D>> {
        Ok(SubView::from_raw(self.view.slice(&slices)?))
    }

    pub fn try_clone(&self) -> MdResult<Self> {
        Ok(Self::from_buf(self.buf.try_clone()?, self.dims()))
    }
}

impl<T: Element, D: Dimension> Default for MdArray<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, D: Dimension> Clone for MdArray<T, D> {
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(a) => a,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T: Element, D: Dimension> PartialEq for MdArray<T, D> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.data() == other.data()
    }
}

impl<T: Element, D: Dimension> Index<D> for MdArray<T, D> {
    type Output = T;

    fn index(&self, index: D) -> &T {
        match self.at(index) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T: Element, D: Dimension> IndexMut<D> for MdArray<T, D> {
    fn index_mut(&mut self, index: D) -> &mut T {
        match self.at_mut(index) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T: Element, D: Dimension> fmt::Debug for MdArray<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_nd(self.data(), self.shape(), f)
    }
}
