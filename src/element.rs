use std::fmt;

use half::f16;

use crate::simd::{pack_size, Lanes, Pack, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl DType {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I8 | DType::U8 => 1,
            DType::F16 | DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }
}

/// A numeric type that can live in an [`MdArray`](crate::MdArray).
///
/// Every implementor is plain data for which the all-zero bit pattern is a
/// valid value; buffers rely on that when they are handed out zeroed.
pub trait Element: Scalar + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    type Pack: Lanes<Elem = Self>;

    fn pack_size() -> usize {
        <Self::Pack as Lanes>::PACK_SIZE
    }
}

macro_rules! impl_element {
    ($($t:ident => $d:ident),* $(,)*) => {
        $(impl Element for $t {
            const DTYPE: DType = DType::$d;
            type Pack = Pack<$t, { pack_size::<$t>() }>;
        })*
    };
}

impl_element!(
    f16 => F16,
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);
