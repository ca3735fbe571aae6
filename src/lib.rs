//! Owned and borrowed n-dimensional arrays with lazily evaluated,
//! register-width elementwise arithmetic.
//!
//! ```
//! use mdvec::{slices, Array2};
//!
//! let a = Array2::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
//! let b = Array2::from_elem([2, 3], 2.0f32).unwrap();
//! let c = Array2::from_expr(&a * &b + &a).unwrap();
//! assert_eq!(c[[1, 2]], 18.0);
//!
//! let d = Array2::from_expr((&a + &b) / 2.0f32).unwrap();
//! assert_eq!(d[[0, 0]], 1.5);
//!
//! let row = c.slice(slices![1, ..]).unwrap();
//! assert_eq!(row.data(), &[12.0, 15.0, 18.0]);
//! ```

mod alloc;
mod array;
mod dimension;
mod element;
mod error;
mod macros;
mod op;
mod simd;
mod slice;
mod view;

pub use crate::alloc::AlignedBuf;
pub use crate::array::{Array1, Array2, Array3, Array4, Array5, Array6, MdArray};
pub use crate::dimension::{Dimension, Indices};
pub use crate::element::{DType, Element};
pub use crate::error::{MdError, MdResult};
pub use crate::op::{
    AddExpr, AddOp, BinaryExpr, BinaryOp, DivExpr, DivOp, Expression, MulExpr, MulOp, PackOf,
    ScalarExpr, SubExpr, SubOp,
};
pub use crate::simd::{pack_size, Alignment, Lanes, Pack, Scalar, BUFFER_ALIGN, REGISTER_BYTES};
pub use crate::slice::{normalize_index, Slice, SubView};
pub use crate::view::ArrayView;

pub use half::f16;
