use thiserror::Error;

pub type MdResult<T> = Result<T, MdError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MdError {
    #[error("index {index} out of range for axis {axis} with extent {extent}")]
    OutOfRange {
        axis: usize,
        index: isize,
        extent: usize,
    },
    #[error("slice on axis {axis}: start {start} must not exceed end {end}")]
    InvalidArgument { axis: usize, start: isize, end: isize },
    #[error("slice breaks contiguity at axis {axis}")]
    NonContiguousSlice { axis: usize },
    #[error("cannot allocate {size} bytes aligned to {align}")]
    Alloc { size: usize, align: usize },
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("index of rank {got} used on rank {expected} array")]
    IndexRank { expected: usize, got: usize },
}

impl MdError {
    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        MdError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

impl From<MdError> for String {
    fn from(e: MdError) -> Self {
        format!("{}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = MdError::OutOfRange {
            axis: 0,
            index: 6,
            extent: 6,
        };
        assert_eq!(
            String::from(e),
            "index 6 out of range for axis 0 with extent 6"
        );
        let e = MdError::shape_mismatch(&[2, 3], &[3, 2]);
        assert_eq!(e.to_string(), "shape mismatch: expected [2, 3], got [3, 2]");
    }
}
