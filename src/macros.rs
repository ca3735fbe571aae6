/// Builds the per-axis slice array taken by `slice`, `slice_mut` and
/// `SubView::new`.
///
/// Each argument is an integer (single element), `..` (whole axis), or an
/// inclusive range such as `1..=3`, `2..` or `..=-2`.
///
/// ```
/// use mdvec::{slices, Array3};
///
/// let a = Array3::<f32>::zeros([4, 5, 6]).unwrap();
/// let w = a.slice(slices![1..=2, .., ..]).unwrap();
/// assert_eq!(w.shape(), &[2, 5, 6]);
/// ```
#[macro_export]
macro_rules! slices {
    ($($s:expr),+ $(,)*) => {
        [$($crate::Slice::from($s)),+]
    };
}
