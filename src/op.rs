//! Lazy elementwise arithmetic.
//!
//! `&a + &b * &c` builds a tree of [`BinaryExpr`] nodes without touching any
//! element. Assigning the tree to an [`MdArray`] or [`SubView`] runs one pass
//! over the destination in register-wide chunks, and a single masked step for
//! the leftover elements.

use std::marker::PhantomData;
use std::ops;

use half::f16;
use log::trace;

use crate::array::MdArray;
use crate::dimension::Dimension;
use crate::element::Element;
use crate::error::{MdError, MdResult};
use crate::simd::{Alignment, Lanes};
use crate::slice::SubView;
use crate::view::{ArrayView, RawView};

pub type PackOf<T> = <T as Element>::Pack;

/// Anything that can produce its elements one register at a time.
///
/// Evaluation covers exactly the destination's elements, and only after
/// `shape()` has been checked against the destination's shape.
///
/// # Safety
///
/// Callers of the `eval_*` methods guarantee `i + PACK_SIZE <= n` for
/// `eval_pack`, and `count < PACK_SIZE`, `i + count <= n` for
/// `eval_pack_masked`, where `n` is the product of `shape()`.
pub trait Expression {
    type Elem: Element;
    type Dim: Dimension;

    fn dims(&self) -> Self::Dim;

    fn shape(&self) -> &[usize];

    fn size(&self) -> usize {
        self.dims().size()
    }

    unsafe fn eval_pack(&self, i: usize) -> PackOf<Self::Elem>;

    /// Only the first `count` lanes are meaningful; the rest hold one.
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<Self::Elem>;
}

impl<E: Expression + ?Sized> Expression for &E {
    type Elem = E::Elem;
    type Dim = E::Dim;

    fn dims(&self) -> E::Dim {
        (**self).dims()
    }

    fn shape(&self) -> &[usize] {
        (**self).shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<E::Elem> {
        (**self).eval_pack(i)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<E::Elem> {
        (**self).eval_pack_masked(i, count)
    }
}

#[inline(always)]
unsafe fn leaf_pack<T: Element, D: Dimension>(
    view: &RawView<T, D>,
    align: Alignment,
    i: usize,
) -> PackOf<T> {
    align.load::<PackOf<T>>(view.as_ptr().add(i) as *const T)
}

#[inline(always)]
unsafe fn leaf_pack_masked<T: Element, D: Dimension>(
    view: &RawView<T, D>,
    i: usize,
    count: usize,
) -> PackOf<T> {
    PackOf::<T>::mask_load(view.as_ptr().add(i), count)
}

impl<T: Element, D: Dimension> Expression for MdArray<T, D> {
    type Elem = T;
    type Dim = D;

    fn dims(&self) -> D {
        self.view.dim()
    }

    fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<T> {
        leaf_pack(&self.view, Self::ALIGNMENT, i)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<T> {
        leaf_pack_masked(&self.view, i, count)
    }
}

impl<'a, T: Element, D: Dimension> Expression for SubView<'a, T, D> {
    type Elem = T;
    type Dim = D;

    fn dims(&self) -> D {
        self.view.dim()
    }

    fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<T> {
        leaf_pack(&self.view, Self::ALIGNMENT, i)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<T> {
        leaf_pack_masked(&self.view, i, count)
    }
}

impl<'a, T: Element, D: Dimension> Expression for ArrayView<'a, T, D> {
    type Elem = T;
    type Dim = D;

    fn dims(&self) -> D {
        self.view.dim()
    }

    fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<T> {
        leaf_pack(&self.view, Alignment::Unaligned, i)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<T> {
        leaf_pack_masked(&self.view, i, count)
    }
}

// The destination of a compound assignment, read back as the left operand.
struct RawLeaf<T, D: Dimension> {
    view: RawView<T, D>,
    align: Alignment,
}

impl<T: Element, D: Dimension> Expression for RawLeaf<T, D> {
    type Elem = T;
    type Dim = D;

    fn dims(&self) -> D {
        self.view.dim()
    }

    fn shape(&self) -> &[usize] {
        self.view.shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<T> {
        leaf_pack(&self.view, self.align, i)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<T> {
        leaf_pack_masked(&self.view, i, count)
    }
}

/// A scalar broadcast to the shape of the operand it is combined with.
#[derive(Clone, Copy, Debug)]
pub struct ScalarExpr<T, D> {
    value: T,
    dim: D,
}

impl<T: Element, D: Dimension> ScalarExpr<T, D> {
    pub fn new(value: T, dim: D) -> Self {
        Self { value, dim }
    }

    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Element, D: Dimension> Expression for ScalarExpr<T, D> {
    type Elem = T;
    type Dim = D;

    fn dims(&self) -> D {
        self.dim
    }

    fn shape(&self) -> &[usize] {
        self.dim.as_slice()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, _i: usize) -> PackOf<T> {
        PackOf::<T>::splat(self.value)
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, _i: usize, count: usize) -> PackOf<T> {
        PackOf::<T>::splat(self.value).mask_one(count)
    }
}

pub trait BinaryOp {
    const OP: &'static str;

    fn apply<P: Lanes>(l: P, r: P) -> P;
}

#[derive(Debug, Clone, Copy)]
pub struct AddOp;

#[derive(Debug, Clone, Copy)]
pub struct SubOp;

#[derive(Debug, Clone, Copy)]
pub struct MulOp;

#[derive(Debug, Clone, Copy)]
pub struct DivOp;

macro_rules! impl_binary_op_tag {
    ($tag:ident, $name:expr, $mth:ident) => {
        impl BinaryOp for $tag {
            const OP: &'static str = $name;

            #[inline(always)]
            fn apply<P: Lanes>(l: P, r: P) -> P {
                l.$mth(r)
            }
        }
    };
}

impl_binary_op_tag!(AddOp, "add", add);
impl_binary_op_tag!(SubOp, "sub", sub);
impl_binary_op_tag!(MulOp, "mul", mul);
impl_binary_op_tag!(DivOp, "div", div);

/// Unevaluated `lhs <op> rhs`.
///
/// Shape and size are those of `lhs`; the operands are checked for equal
/// shapes once, when the node is built.
#[derive(Clone, Copy)]
pub struct BinaryExpr<L, R, O> {
    lhs: L,
    rhs: R,
    op: PhantomData<O>,
}

pub type AddExpr<L, R> = BinaryExpr<L, R, AddOp>;
pub type SubExpr<L, R> = BinaryExpr<L, R, SubOp>;
pub type MulExpr<L, R> = BinaryExpr<L, R, MulOp>;
pub type DivExpr<L, R> = BinaryExpr<L, R, DivOp>;

impl<L, R, O> BinaryExpr<L, R, O>
where
    L: Expression,
    R: Expression<Elem = L::Elem, Dim = L::Dim>,
    O: BinaryOp,
{
    pub fn new(lhs: L, rhs: R) -> Self {
        assert!(
            lhs.shape() == rhs.shape(),
            "{}: operand shapes differ: {:?} vs {:?}",
            O::OP,
            lhs.shape(),
            rhs.shape()
        );
        Self {
            lhs,
            rhs,
            op: PhantomData,
        }
    }
}

impl<L, R, O> Expression for BinaryExpr<L, R, O>
where
    L: Expression,
    R: Expression<Elem = L::Elem, Dim = L::Dim>,
    O: BinaryOp,
{
    type Elem = L::Elem;
    type Dim = L::Dim;

    fn dims(&self) -> L::Dim {
        self.lhs.dims()
    }

    fn shape(&self) -> &[usize] {
        self.lhs.shape()
    }

    #[inline(always)]
    unsafe fn eval_pack(&self, i: usize) -> PackOf<L::Elem> {
        O::apply(self.lhs.eval_pack(i), self.rhs.eval_pack(i))
    }

    #[inline(always)]
    unsafe fn eval_pack_masked(&self, i: usize, count: usize) -> PackOf<L::Elem> {
        let l = self.lhs.eval_pack_masked(i, count);
        let r = self.rhs.eval_pack_masked(i, count);
        // keep dead lanes at one so an integer division further up stays defined
        O::apply(l, r).mask_one(count)
    }
}

/// Writes `expr` over every element of `dst`.
///
/// Fails with `ShapeMismatch` before touching memory if the shapes differ.
/// Full chunks go through `align`'s store; the `len % W` leftover elements
/// through one masked store.
///
/// # Safety
///
/// `dst` must be valid for `dst.len()` writes and register-aligned when
/// `align` is [`Alignment::Aligned`]. It may coincide with a leaf of `expr`
/// element for element, but must not otherwise overlap one.
pub(crate) unsafe fn eval_into<E: Expression>(
    expr: &E,
    dst: &RawView<E::Elem, E::Dim>,
    align: Alignment,
) -> MdResult<()> {
    if expr.shape() != dst.shape() {
        return Err(MdError::shape_mismatch(dst.shape(), expr.shape()));
    }
    let n = dst.len();
    let ptr = dst.as_ptr();
    let w = <PackOf<E::Elem> as Lanes>::PACK_SIZE;
    let full = n - n % w;
    trace!(
        "eval {} x {:?} into {:?} destination: lane width {}, {} chunks, tail {}",
        n,
        <E::Elem as Element>::DTYPE,
        align,
        w,
        full / w,
        n - full
    );
    let mut i = 0;
    while i < full {
        let v = expr.eval_pack(i);
        align.store(ptr.add(i), v);
        i += w;
    }
    let rest = n - full;
    if rest > 0 {
        let v = expr.eval_pack_masked(full, rest);
        v.mask_store(ptr.add(full), rest);
    }
    Ok(())
}

// `dst <op>= rhs`, in place.
fn eval_compound<T, D, R, O>(view: &RawView<T, D>, align: Alignment, rhs: R)
where
    T: Element,
    D: Dimension,
    R: Expression<Elem = T, Dim = D>,
    O: BinaryOp,
{
    let lhs = RawLeaf { view: *view, align };
    let expr = BinaryExpr::<_, _, O>::new(lhs, rhs);
    if let Err(e) = unsafe { eval_into(&expr, view, align) } {
        panic!("{}", e);
    }
}

fn eval_compound_scalar<T, D, O>(view: &RawView<T, D>, align: Alignment, value: T)
where
    T: Element,
    D: Dimension,
    O: BinaryOp,
{
    let rhs = ScalarExpr::new(value, view.dim());
    eval_compound::<T, D, _, O>(view, align, rhs)
}

fn with_scalar_rhs<E, O>(lhs: E, value: E::Elem) -> BinaryExpr<E, ScalarExpr<E::Elem, E::Dim>, O>
where
    E: Expression,
    O: BinaryOp,
{
    let rhs = ScalarExpr::new(value, lhs.dims());
    BinaryExpr::new(lhs, rhs)
}

fn with_scalar_lhs<E, O>(value: E::Elem, rhs: E) -> BinaryExpr<ScalarExpr<E::Elem, E::Dim>, E, O>
where
    E: Expression,
    O: BinaryOp,
{
    let lhs = ScalarExpr::new(value, rhs.dims());
    BinaryExpr::new(lhs, rhs)
}

macro_rules! impl_expr_op {
    ($trt:ident, $mth:ident, $op:ident) => {
        impl<'a, T: Element, D: Dimension, R> ops::$trt<R> for &'a MdArray<T, D>
        where
            R: Expression<Elem = T, Dim = D>,
        {
            type Output = BinaryExpr<&'a MdArray<T, D>, R, $op>;
            fn $mth(self, rhs: R) -> Self::Output {
                BinaryExpr::new(self, rhs)
            }
        }

        impl<'a, 's, T: Element, D: Dimension, R> ops::$trt<R> for &'a SubView<'s, T, D>
        where
            R: Expression<Elem = T, Dim = D>,
        {
            type Output = BinaryExpr<&'a SubView<'s, T, D>, R, $op>;
            fn $mth(self, rhs: R) -> Self::Output {
                BinaryExpr::new(self, rhs)
            }
        }

        impl<'a, T: Element, D: Dimension, R> ops::$trt<R> for ArrayView<'a, T, D>
        where
            R: Expression<Elem = T, Dim = D>,
        {
            type Output = BinaryExpr<ArrayView<'a, T, D>, R, $op>;
            fn $mth(self, rhs: R) -> Self::Output {
                BinaryExpr::new(self, rhs)
            }
        }

        impl<L, R0, O, R> ops::$trt<R> for BinaryExpr<L, R0, O>
        where
            L: Expression,
            R0: Expression<Elem = L::Elem, Dim = L::Dim>,
            O: BinaryOp,
            R: Expression<Elem = L::Elem, Dim = L::Dim>,
        {
            type Output = BinaryExpr<Self, R, $op>;
            fn $mth(self, rhs: R) -> Self::Output {
                BinaryExpr::new(self, rhs)
            }
        }

        impl<'e, L, R0, O, R> ops::$trt<R> for &'e BinaryExpr<L, R0, O>
        where
            L: Expression,
            R0: Expression<Elem = L::Elem, Dim = L::Dim>,
            O: BinaryOp,
            R: Expression<Elem = L::Elem, Dim = L::Dim>,
        {
            type Output = BinaryExpr<Self, R, $op>;
            fn $mth(self, rhs: R) -> Self::Output {
                BinaryExpr::new(self, rhs)
            }
        }
    };
}

impl_expr_op!(Add, add, AddOp); // +
impl_expr_op!(Sub, sub, SubOp); // -
impl_expr_op!(Mul, mul, MulOp); // *
impl_expr_op!(Div, div, DivOp); // /

// Scalar operands are implemented per element type: a generic `T` would
// overlap with the `R: Expression` impls above.
macro_rules! impl_scalar_op {
    ($trt:ident, $mth:ident, $op:ident, $($t:ty),*) => {
        $(
            impl<'a, D: Dimension> ops::$trt<$t> for &'a MdArray<$t, D> {
                type Output = BinaryExpr<Self, ScalarExpr<$t, D>, $op>;
                fn $mth(self, rhs: $t) -> Self::Output {
                    with_scalar_rhs(self, rhs)
                }
            }

            impl<'a, 's, D: Dimension> ops::$trt<$t> for &'a SubView<'s, $t, D> {
                type Output = BinaryExpr<Self, ScalarExpr<$t, D>, $op>;
                fn $mth(self, rhs: $t) -> Self::Output {
                    with_scalar_rhs(self, rhs)
                }
            }

            impl<'a, D: Dimension> ops::$trt<$t> for ArrayView<'a, $t, D> {
                type Output = BinaryExpr<Self, ScalarExpr<$t, D>, $op>;
                fn $mth(self, rhs: $t) -> Self::Output {
                    with_scalar_rhs(self, rhs)
                }
            }

            impl<L, R0, O> ops::$trt<$t> for BinaryExpr<L, R0, O>
            where
                L: Expression<Elem = $t>,
                R0: Expression<Elem = $t, Dim = L::Dim>,
                O: BinaryOp,
            {
                type Output = BinaryExpr<Self, ScalarExpr<$t, L::Dim>, $op>;
                fn $mth(self, rhs: $t) -> Self::Output {
                    with_scalar_rhs(self, rhs)
                }
            }

            impl<'e, L, R0, O> ops::$trt<$t> for &'e BinaryExpr<L, R0, O>
            where
                L: Expression<Elem = $t>,
                R0: Expression<Elem = $t, Dim = L::Dim>,
                O: BinaryOp,
            {
                type Output = BinaryExpr<Self, ScalarExpr<$t, L::Dim>, $op>;
                fn $mth(self, rhs: $t) -> Self::Output {
                    with_scalar_rhs(self, rhs)
                }
            }

            impl<'a, D: Dimension> ops::$trt<&'a MdArray<$t, D>> for $t {
                type Output = BinaryExpr<ScalarExpr<$t, D>, &'a MdArray<$t, D>, $op>;
                fn $mth(self, rhs: &'a MdArray<$t, D>) -> Self::Output {
                    with_scalar_lhs(self, rhs)
                }
            }

            impl<'a, 's, D: Dimension> ops::$trt<&'a SubView<'s, $t, D>> for $t {
                type Output = BinaryExpr<ScalarExpr<$t, D>, &'a SubView<'s, $t, D>, $op>;
                fn $mth(self, rhs: &'a SubView<'s, $t, D>) -> Self::Output {
                    with_scalar_lhs(self, rhs)
                }
            }

            impl<'a, D: Dimension> ops::$trt<ArrayView<'a, $t, D>> for $t {
                type Output = BinaryExpr<ScalarExpr<$t, D>, ArrayView<'a, $t, D>, $op>;
                fn $mth(self, rhs: ArrayView<'a, $t, D>) -> Self::Output {
                    with_scalar_lhs(self, rhs)
                }
            }

            impl<L, R0, O> ops::$trt<BinaryExpr<L, R0, O>> for $t
            where
                L: Expression<Elem = $t>,
                R0: Expression<Elem = $t, Dim = L::Dim>,
                O: BinaryOp,
            {
                type Output = BinaryExpr<ScalarExpr<$t, L::Dim>, BinaryExpr<L, R0, O>, $op>;
                fn $mth(self, rhs: BinaryExpr<L, R0, O>) -> Self::Output {
                    with_scalar_lhs(self, rhs)
                }
            }
        )*
    };
}

impl_scalar_op!(Add, add, AddOp, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);
impl_scalar_op!(Sub, sub, SubOp, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);
impl_scalar_op!(Mul, mul, MulOp, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);
impl_scalar_op!(Div, div, DivOp, f16, f32, f64, i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! impl_assign_op {
    ($trt:ident, $mth:ident, $op:ident, [$($lt:lifetime),*] $target:ty) => {
        impl<'b, $($lt,)* T: Element, D: Dimension> ops::$trt<&'b MdArray<T, D>> for $target {
            fn $mth(&mut self, rhs: &'b MdArray<T, D>) {
                eval_compound::<T, D, _, $op>(&self.view, Self::ALIGNMENT, rhs)
            }
        }

        impl<'b, 'c, $($lt,)* T: Element, D: Dimension> ops::$trt<&'b SubView<'c, T, D>>
            for $target
        {
            fn $mth(&mut self, rhs: &'b SubView<'c, T, D>) {
                eval_compound::<T, D, _, $op>(&self.view, Self::ALIGNMENT, rhs)
            }
        }

        impl<'b, $($lt,)* T: Element, D: Dimension> ops::$trt<ArrayView<'b, T, D>> for $target {
            fn $mth(&mut self, rhs: ArrayView<'b, T, D>) {
                eval_compound::<T, D, _, $op>(&self.view, Self::ALIGNMENT, rhs)
            }
        }

        impl<$($lt,)* T: Element, D: Dimension> ops::$trt<T> for $target {
            fn $mth(&mut self, rhs: T) {
                eval_compound_scalar::<T, D, $op>(&self.view, Self::ALIGNMENT, rhs)
            }
        }
    };
}

impl_assign_op!(AddAssign, add_assign, AddOp, [] MdArray<T, D>); // +=
impl_assign_op!(SubAssign, sub_assign, SubOp, [] MdArray<T, D>); // -=
impl_assign_op!(MulAssign, mul_assign, MulOp, [] MdArray<T, D>); // *=
impl_assign_op!(DivAssign, div_assign, DivOp, [] MdArray<T, D>); // /=
impl_assign_op!(AddAssign, add_assign, AddOp, ['a] SubView<'a, T, D>);
impl_assign_op!(SubAssign, sub_assign, SubOp, ['a] SubView<'a, T, D>);
impl_assign_op!(MulAssign, mul_assign, MulOp, ['a] SubView<'a, T, D>);
impl_assign_op!(DivAssign, div_assign, DivOp, ['a] SubView<'a, T, D>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MdError;
    use crate::slices;
    use half::f16;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sizes_around<T: Element>() -> Vec<usize> {
        let w = T::pack_size();
        vec![1, w - 1, w, w + 1, 2 * w + 1, 5 * w + 3]
    }

    fn random_f64(rng: &mut StdRng, n: usize) -> MdArray<f64, [usize; 1]> {
        let v: Vec<f64> = (0..n).map(|_| rng.gen_range(0.5, 4.0)).collect();
        MdArray::from_vec(v, [n]).unwrap()
    }

    fn random_f32(rng: &mut StdRng, n: usize) -> MdArray<f32, [usize; 1]> {
        let v: Vec<f32> = (0..n).map(|_| rng.gen_range(0.5f32, 4.0)).collect();
        MdArray::from_vec(v, [n]).unwrap()
    }

    #[test]
    fn test_expr_shape_from_lhs() {
        let a = MdArray::<f32, _>::zeros([2, 3]).unwrap();
        let b = MdArray::<f32, _>::zeros([2, 3]).unwrap();
        let e = &a + &b;
        assert_eq!(e.shape(), &[2, 3]);
        assert_eq!(e.size(), 6);
        assert_eq!(e.dims(), [2, 3]);
    }

    #[test]
    #[should_panic(expected = "operand shapes differ")]
    fn test_expr_shape_mismatch_panics() {
        let a = MdArray::<f32, _>::zeros([2, 3]).unwrap();
        let b = MdArray::<f32, _>::zeros([3, 2]).unwrap();
        let _ = &a + &b;
    }

    #[test]
    fn test_expr_chain_f64_matches_scalar() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in sizes_around::<f64>() {
            let a = random_f64(&mut rng, n);
            let b = random_f64(&mut rng, n);
            let c = random_f64(&mut rng, n);
            let r = MdArray::from_expr((&a + &b) * &c - &a / &b).unwrap();
            assert_eq!(r.shape(), &[n]);
            for i in 0..n {
                let (x, y, z) = (a[[i]], b[[i]], c[[i]]);
                assert_eq!(r[[i]], (x + y) * z - x / y, "n = {}, i = {}", n, i);
            }
        }
    }

    #[test]
    fn test_expr_chain_f32_matches_scalar() {
        let mut rng = StdRng::seed_from_u64(11);
        for n in sizes_around::<f32>() {
            let a = random_f32(&mut rng, n);
            let b = random_f32(&mut rng, n);
            let r = MdArray::from_expr(&a / &b + &a * &a - &b).unwrap();
            for i in 0..n {
                let (x, y) = (a[[i]], b[[i]]);
                assert_eq!(r[[i]], x / y + x * x - y, "n = {}, i = {}", n, i);
            }
        }
    }

    #[test]
    fn test_expr_i32_tail_division_is_defined() {
        for n in sizes_around::<i32>() {
            let a = MdArray::from_vec((0..n as i32).map(|i| i * 7 + 3).collect(), [n]).unwrap();
            let b = MdArray::from_vec((0..n as i32).map(|i| i % 5 + 2).collect(), [n]).unwrap();
            let c = MdArray::from_elem([n], 1i32).unwrap();
            // (b - c) is never zero on live lanes; dead lanes must not trap either
            let r = MdArray::from_expr(&a / (&b - &c)).unwrap();
            for i in 0..n {
                assert_eq!(r[[i]], a[[i]] / (b[[i]] - 1));
            }
        }
    }

    #[test]
    fn test_expr_f16() {
        for n in sizes_around::<f16>() {
            let a = MdArray::from_elem([n], f16::from_f32(1.5)).unwrap();
            let b = MdArray::from_elem([n], f16::from_f32(2.0)).unwrap();
            let r = MdArray::from_expr(&a * &b + &a).unwrap();
            assert!(r.iter().all(|&x| x == f16::from_f32(4.5)));
        }
    }

    #[test]
    fn test_masked_tail_writes_only_live_elements() {
        let w = f32::pack_size();
        let n = 2 * w + 1;
        let a = MdArray::from_elem([n], 2.0f32).unwrap();
        let mut data = vec![-1.0f32; n + w];
        {
            let mut dst = SubView::new(&mut data, [n + w], slices![0..=(n as isize - 1)]).unwrap();
            dst.assign(&a * &a).unwrap();
        }
        assert!(data[..n].iter().all(|&x| x == 4.0));
        assert!(data[n..].iter().all(|&x| x == -1.0));
    }

    #[test]
    fn test_deep_expression_via_reference() {
        let a = MdArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
        let e = &a + &a;
        let f = &e * &a;
        let g = f - &e;
        let r = MdArray::from_expr(&g).unwrap();
        assert_eq!(r.shape(), &[2, 3]);
        for (x, y) in a.iter().zip(r.iter()) {
            assert_eq!(*y, (x + x) * x - (x + x));
        }
    }

    #[test]
    fn test_views_as_leaves() {
        let a = MdArray::from_vec((0..24).map(|i| i as f32).collect(), [2, 3, 4]).unwrap();
        let mut b = MdArray::from_elem([2, 3, 4], 10.0f32).unwrap();
        let lo = a.slice(slices![0, .., ..]).unwrap();
        let hi = a.slice(slices![1, .., ..]).unwrap();
        let mut top = b.slice_mut(slices![0, .., ..]).unwrap();
        top.assign(hi - lo).unwrap();
        top += 10.0;
        assert!(top.iter().all(|&x| x == 22.0));
        assert!(b.data()[12..].iter().all(|&x| x == 10.0));
    }

    #[test]
    fn test_subview_assign_shape_mismatch() {
        let a = MdArray::<f32, _>::zeros([2, 3]).unwrap();
        let mut b = MdArray::<f32, _>::zeros([2, 3]).unwrap();
        let mut w = b.slice_mut(slices![1, ..]).unwrap();
        assert!(matches!(w.assign(&a), Err(MdError::ShapeMismatch { .. })));
    }

    // `size()` and `dims()` disagree with `shape()` on purpose.
    struct Inconsistent {
        dim: [usize; 1],
        shape: [usize; 1],
        extra: usize,
    }

    impl Expression for Inconsistent {
        type Elem = f32;
        type Dim = [usize; 1];

        fn dims(&self) -> [usize; 1] {
            self.dim
        }

        fn shape(&self) -> &[usize] {
            &self.shape
        }

        fn size(&self) -> usize {
            self.dim[0] + self.extra
        }

        unsafe fn eval_pack(&self, _i: usize) -> PackOf<f32> {
            PackOf::<f32>::splat(7.0)
        }

        unsafe fn eval_pack_masked(&self, _i: usize, count: usize) -> PackOf<f32> {
            PackOf::<f32>::splat(7.0).mask_one(count)
        }
    }

    #[test]
    fn test_eval_bounded_by_destination() {
        let w = f32::pack_size();
        let mut data = vec![0.0f32; 64];
        {
            let mut win = SubView::new(&mut data, [64], slices![8..=11]).unwrap();
            let expr = Inconsistent {
                dim: [4],
                shape: [4],
                extra: 2 * w,
            };
            win.assign(&expr).unwrap();
        }
        assert!(data[8..12].iter().all(|&x| x == 7.0));
        let outside = data[..8].iter().chain(&data[12..]).filter(|&&x| x != 0.0);
        assert_eq!(outside.count(), 0);

        let mut a = MdArray::from_elem([4], 1.0f32).unwrap();
        a.assign(&expr_of(4, 2 * w)).unwrap();
        assert_eq!(a.data(), &[7.0; 4]);
    }

    fn expr_of(n: usize, extra: usize) -> Inconsistent {
        Inconsistent {
            dim: [n],
            shape: [n],
            extra,
        }
    }

    #[test]
    fn test_eval_rejects_dims_shape_disagreement() {
        let expr = Inconsistent {
            dim: [4],
            shape: [16],
            extra: 0,
        };
        assert!(matches!(
            MdArray::from_expr(&expr),
            Err(MdError::ShapeMismatch { .. })
        ));
        let mut data = vec![0.0f32; 16];
        let mut win = SubView::new(&mut data, [16], slices![0..=3]).unwrap();
        assert!(win.assign(&expr).is_err());
        assert!(win.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_scalar_operands_f32() {
        let mut rng = StdRng::seed_from_u64(5);
        for n in sizes_around::<f32>() {
            let a = random_f32(&mut rng, n);
            let b = random_f32(&mut rng, n);
            let r = MdArray::from_expr(&a * 2.0f32 + 1.0f32).unwrap();
            let q = MdArray::from_expr(10.0f32 - (&a + &b) / 4.0f32).unwrap();
            for i in 0..n {
                assert_eq!(r[[i]], a[[i]] * 2.0 + 1.0);
                assert_eq!(q[[i]], 10.0 - (a[[i]] + b[[i]]) / 4.0);
            }
        }
    }

    #[test]
    fn test_scalar_operands_int_tail() {
        for n in sizes_around::<i32>() {
            let a = MdArray::from_vec((0..n as i32).map(|i| i * 5 - 9).collect(), [n]).unwrap();
            let b = MdArray::from_vec((0..n as i32).map(|i| i % 3 + 1).collect(), [n]).unwrap();
            let r = MdArray::from_expr(&a / 3i32 + 100i32 / &b).unwrap();
            let s = MdArray::from_expr(2i32 * (&a - &b) - 1i32).unwrap();
            for i in 0..n {
                assert_eq!(r[[i]], a[[i]] / 3 + 100 / b[[i]]);
                assert_eq!(s[[i]], 2 * (a[[i]] - b[[i]]) - 1);
            }
        }
    }

    #[test]
    fn test_scalar_operands_on_views() {
        let a = MdArray::from_vec((0..12).map(|i| i as f64).collect(), [3, 4]).unwrap();
        let mut b = MdArray::<f64, _>::zeros([3, 4]).unwrap();
        let row = a.slice(slices![2, ..]).unwrap();
        let mut dst = b.slice_mut(slices![0, ..]).unwrap();
        dst.assign(row * 0.5f64).unwrap();
        assert_eq!(dst.data(), &[4.0, 4.5, 5.0, 5.5]);
        let e = 1.0f64 + &dst;
        let r = MdArray::from_expr(&e * 2.0f64).unwrap();
        assert_eq!(r.data(), &[10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_integer_expressions_wrap() {
        let n = u8::pack_size() + 3;
        let a = MdArray::from_elem([n], 3u8).unwrap();
        let r = MdArray::from_expr(&a * 100u8).unwrap();
        assert!(r.iter().all(|&x| x == 44));
        let mut m = MdArray::from_elem([n], i32::MAX).unwrap();
        m += 1;
        assert!(m.iter().all(|&x| x == i32::MIN));
    }

    #[test]
    fn test_compound_with_array() {
        let mut a = MdArray::from_vec((1..=13).map(|i| i as f64).collect(), [13]).unwrap();
        let b = MdArray::from_elem([13], 2.0f64).unwrap();
        a += &b;
        assert_eq!(a[[0]], 3.0);
        a *= &b;
        assert_eq!(a[[12]], 30.0);
        a -= &b;
        a /= &b;
        for i in 0..13 {
            assert_eq!(a[[i]], ((i + 1) as f64 + 2.0) * 2.0 / 2.0 - 1.0);
        }
    }

    #[test]
    fn test_compound_scalar_round_trip_int() {
        for n in sizes_around::<i64>() {
            let orig: Vec<i64> = (0..n as i64).map(|i| i * 31 - 17).collect();
            let mut a = MdArray::from_vec(orig.clone(), [n]).unwrap();
            a += 1234;
            a -= 1234;
            assert_eq!(a.data(), &orig[..]);
            a *= 3;
            a /= 3;
            assert_eq!(a.data(), &orig[..]);
        }
    }

    #[test]
    fn test_compound_scalar_round_trip_float() {
        let mut rng = StdRng::seed_from_u64(3);
        for n in sizes_around::<f32>() {
            let orig = random_f32(&mut rng, n);
            let mut a = orig.clone();
            a += 0.7;
            a -= 0.7;
            for (x, y) in a.iter().zip(orig.iter()) {
                assert!((x - y).abs() <= f32::EPSILON * 4.0 * y.abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_compound_on_subview() {
        let mut a = MdArray::from_elem([3, 4], 1u32).unwrap();
        let b = MdArray::from_elem([1, 4], 5u32).unwrap();
        {
            let mut row = a.slice_mut(slices![1, ..]).unwrap();
            row += &b;
            row *= 2;
            row -= b.view();
        }
        assert_eq!(a.data(), &[1, 1, 1, 1, 7, 7, 7, 7, 1, 1, 1, 1]);
    }

    #[test]
    #[should_panic(expected = "operand shapes differ")]
    fn test_compound_shape_mismatch_panics() {
        let mut a = MdArray::from_elem([4], 1.0f32).unwrap();
        let b = MdArray::from_elem([5], 1.0f32).unwrap();
        a += &b;
    }

    #[test]
    fn test_op_names() {
        assert_eq!(AddOp::OP, "add");
        assert_eq!(DivOp::OP, "div");
    }
}
