//! Fixed-width lane backend.
//!
//! A [`Pack`] holds one vector register worth of elements. Operations are
//! written as straight loops over `[T; N]`, which the optimiser lowers to the
//! target's vector instructions; nothing here depends on a particular ISA.

use std::mem::size_of;
use std::ptr;

use half::f16;
use num_traits::{One, Zero};

/// Bytes in one vector register of the compilation target.
#[cfg(target_feature = "avx512f")]
pub const REGISTER_BYTES: usize = 64;
#[cfg(all(target_feature = "avx", not(target_feature = "avx512f")))]
pub const REGISTER_BYTES: usize = 32;
#[cfg(not(any(target_feature = "avx", target_feature = "avx512f")))]
pub const REGISTER_BYTES: usize = 16;

/// Alignment of every owned buffer. At least one cache line.
pub const BUFFER_ALIGN: usize = if REGISTER_BYTES > 64 {
    REGISTER_BYTES
} else {
    64
};

pub const fn pack_size<T>() -> usize {
    REGISTER_BYTES / size_of::<T>()
}

/// Lane arithmetic of one element. Integer lanes wrap on overflow like
/// vector registers do; division by zero still panics.
pub trait Scalar: Copy + Zero + One {
    fn lane_add(self, rhs: Self) -> Self;

    fn lane_sub(self, rhs: Self) -> Self;

    fn lane_mul(self, rhs: Self) -> Self;

    fn lane_div(self, rhs: Self) -> Self;
}

macro_rules! impl_scalar_float {
    ($($t:ty),*) => {
        $(impl Scalar for $t {
            #[inline(always)]
            fn lane_add(self, rhs: Self) -> Self {
                self + rhs
            }

            #[inline(always)]
            fn lane_sub(self, rhs: Self) -> Self {
                self - rhs
            }

            #[inline(always)]
            fn lane_mul(self, rhs: Self) -> Self {
                self * rhs
            }

            #[inline(always)]
            fn lane_div(self, rhs: Self) -> Self {
                self / rhs
            }
        })*
    };
}

macro_rules! impl_scalar_int {
    ($($t:ty),*) => {
        $(impl Scalar for $t {
            #[inline(always)]
            fn lane_add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            #[inline(always)]
            fn lane_sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            #[inline(always)]
            fn lane_mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            #[inline(always)]
            fn lane_div(self, rhs: Self) -> Self {
                self.wrapping_div(rhs)
            }
        })*
    };
}

impl_scalar_float!(f16, f32, f64);
impl_scalar_int!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Width-W vector operations.
///
/// Pointer arguments must be valid for `PACK_SIZE` elements (or `count`
/// elements for the masked variants); `load`/`store` additionally require a
/// register-aligned pointer.
pub trait Lanes: Copy {
    type Elem: Copy;

    const PACK_SIZE: usize;

    unsafe fn load(ptr: *const Self::Elem) -> Self;

    unsafe fn loadu(ptr: *const Self::Elem) -> Self;

    /// Reads `count < PACK_SIZE` elements; the other lanes hold one.
    unsafe fn mask_load(ptr: *const Self::Elem, count: usize) -> Self;

    unsafe fn store(self, ptr: *mut Self::Elem);

    unsafe fn storeu(self, ptr: *mut Self::Elem);

    /// Writes exactly the first `count` lanes.
    unsafe fn mask_store(self, ptr: *mut Self::Elem, count: usize);

    fn splat(v: Self::Elem) -> Self;

    fn mask_one(self, count: usize) -> Self;

    fn add(self, rhs: Self) -> Self;

    fn sub(self, rhs: Self) -> Self;

    fn mul(self, rhs: Self) -> Self;

    fn div(self, rhs: Self) -> Self;
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(transparent)]
pub struct Pack<T, const N: usize>(pub [T; N]);

macro_rules! lane_binary_op {
    ($mth:ident, $lane:ident) => {
        #[inline(always)]
        fn $mth(self, rhs: Self) -> Self {
            let mut out = self.0;
            for (o, r) in out.iter_mut().zip(rhs.0) {
                *o = (*o).$lane(r);
            }
            Pack(out)
        }
    };
}

impl<T: Scalar, const N: usize> Lanes for Pack<T, N> {
    type Elem = T;

    const PACK_SIZE: usize = N;

    #[inline(always)]
    unsafe fn load(ptr: *const T) -> Self {
        debug_assert_eq!(ptr as usize % (N * size_of::<T>()), 0);
        Pack(ptr::read(ptr as *const [T; N]))
    }

    #[inline(always)]
    unsafe fn loadu(ptr: *const T) -> Self {
        Pack(ptr::read_unaligned(ptr as *const [T; N]))
    }

    #[inline(always)]
    unsafe fn mask_load(ptr: *const T, count: usize) -> Self {
        debug_assert!(count < N);
        let mut lanes = [T::one(); N];
        ptr::copy_nonoverlapping(ptr, lanes.as_mut_ptr(), count);
        Pack(lanes)
    }

    #[inline(always)]
    unsafe fn store(self, ptr: *mut T) {
        debug_assert_eq!(ptr as usize % (N * size_of::<T>()), 0);
        ptr::write(ptr as *mut [T; N], self.0)
    }

    #[inline(always)]
    unsafe fn storeu(self, ptr: *mut T) {
        ptr::write_unaligned(ptr as *mut [T; N], self.0)
    }

    #[inline(always)]
    unsafe fn mask_store(self, ptr: *mut T, count: usize) {
        debug_assert!(count < N);
        ptr::copy_nonoverlapping(self.0.as_ptr(), ptr, count)
    }

    #[inline(always)]
    fn splat(v: T) -> Self {
        Pack([v; N])
    }

    #[inline(always)]
    fn mask_one(self, count: usize) -> Self {
        let mut out = self.0;
        for o in out.iter_mut().skip(count) {
            *o = T::one();
        }
        Pack(out)
    }

    lane_binary_op!(add, lane_add);
    lane_binary_op!(sub, lane_sub);
    lane_binary_op!(mul, lane_mul);
    lane_binary_op!(div, lane_div);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Aligned,
    Unaligned,
}

impl Alignment {
    #[inline(always)]
    pub(crate) unsafe fn load<L: Lanes>(self, ptr: *const L::Elem) -> L {
        match self {
            Alignment::Aligned => L::load(ptr),
            Alignment::Unaligned => L::loadu(ptr),
        }
    }

    #[inline(always)]
    pub(crate) unsafe fn store<L: Lanes>(self, ptr: *mut L::Elem, v: L) {
        match self {
            Alignment::Aligned => v.store(ptr),
            Alignment::Unaligned => v.storeu(ptr),
        }
    }
}
