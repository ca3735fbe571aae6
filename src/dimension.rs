use std::fmt;
use std::iter;

use crate::error::{MdError, MdResult};
use crate::slice::Slice;

pub(crate) fn zip<I, J>(i: I, j: J) -> iter::Zip<I::IntoIter, J::IntoIter>
where
    I: IntoIterator,
    J: IntoIterator,
{
    i.into_iter().zip(j)
}

#[inline(always)]
pub fn stride_offset(n: usize, stride: usize) -> isize {
    (n * stride) as isize
}

/// Shape of a fixed-rank array, `[usize; N]` for ranks 1 through 6.
///
/// The same type carries extents, strides and multi-indices.
pub trait Dimension: Copy + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    const NDIM: usize;

    type Slices: AsRef<[Slice]> + Copy + fmt::Debug;

    fn as_slice(&self) -> &[usize];

    fn as_slice_mut(&mut self) -> &mut [usize];

    fn zeros() -> Self;

    fn ndim(&self) -> usize {
        Self::NDIM
    }

    fn size(&self) -> usize {
        self.as_slice().iter().fold(1, |s, &a| s * a)
    }

    fn size_checked(&self) -> Option<usize> {
        self.as_slice()
            .iter()
            .try_fold(1usize, |s, &a| s.checked_mul(a))
    }

    // [a, b, c] => strides [b * c, c, 1]
    fn strides(&self) -> Self {
        let mut x = Self::zeros();
        let s = self.as_slice().iter().rev();
        let mut prod = 1;
        let mut temp = 1;
        for (m, dim) in x.as_slice_mut().iter_mut().rev().zip(s) {
            prod *= temp;
            *m = prod;
            temp = *dim;
        }
        x
    }

    fn from_indices(ix: &[usize]) -> MdResult<Self> {
        if ix.len() != Self::NDIM {
            return Err(MdError::IndexRank {
                expected: Self::NDIM,
                got: ix.len(),
            });
        }
        let mut d = Self::zeros();
        d.as_slice_mut().copy_from_slice(ix);
        Ok(d)
    }

    #[inline]
    fn first_index(&self) -> Option<Self> {
        for ax in self.as_slice().iter() {
            if *ax == 0 {
                return None;
            }
        }
        Some(Self::zeros())
    }

    #[inline]
    fn next_for(&self, index: Self) -> Option<Self> {
        let mut index = index;
        let mut done = false;
        for (&dim, ix) in zip(self.as_slice(), index.as_slice_mut()).rev() {
            *ix += 1;
            if *ix == dim {
                *ix = 0;
            } else {
                done = true;
                break;
            }
        }
        if done {
            Some(index)
        } else {
            None
        }
    }

    #[inline]
    fn stride_offset(index: &Self, strides: &Self) -> isize {
        let mut offset = 0;
        for (&i, &s) in index.as_slice().iter().zip(strides.as_slice().iter()) {
            offset += stride_offset(i, s);
        }
        offset
    }

    fn check_index(&self, index: &Self) -> MdResult<()> {
        for (axis, (&i, &n)) in zip(index.as_slice(), self.as_slice()).enumerate() {
            if i >= n {
                return Err(MdError::OutOfRange {
                    axis,
                    index: i as isize,
                    extent: n,
                });
            }
        }
        Ok(())
    }
}

macro_rules! dimension_impl_array {
    ($n:expr) => {
        impl Dimension for [usize; $n] {
            const NDIM: usize = $n;

            type Slices = [Slice; $n];

            fn as_slice(&self) -> &[usize] {
                self
            }

            fn as_slice_mut(&mut self) -> &mut [usize] {
                self
            }

            fn zeros() -> Self {
                [0usize; $n]
            }
        }
    };
}

dimension_impl_array!(1);
dimension_impl_array!(2);
dimension_impl_array!(3);
dimension_impl_array!(4);
dimension_impl_array!(5);
dimension_impl_array!(6);

pub struct Indices<D: Dimension> {
    dim: D,
    index: Option<D>,
}

impl<D: Dimension> Indices<D> {
    pub fn new(dim: D) -> Self {
        Self {
            index: dim.first_index(),
            dim,
        }
    }
}

impl<D: Dimension> Iterator for Indices<D> {
    type Item = D;

    fn next(&mut self) -> Option<D> {
        let ix = self.index?;
        self.index = self.dim.next_for(ix);
        Some(ix)
    }
}
