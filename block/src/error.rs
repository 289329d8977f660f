use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block: unknown block type tag {tag}")]
    InvalidBlockType { tag: u8 },

    #[error("block: declared size {declared} does not fit the remaining {remaining} bytes of input")]
    InvalidLength { declared: usize, remaining: usize },

    #[error("block: {what} is below the minimum allowed size of {min}")]
    TooSmall { what: &'static str, min: usize },

    #[error("block: {what} exceeds the maximum allowed size of {max}")]
    TooLarge { what: &'static str, max: usize },

    #[error("block list: only the last block may be Padding")]
    PaddingNotLast,

    #[error("block list: total size {total} exceeds carrier capacity {capacity}")]
    CarrierOverflow { total: usize, capacity: usize },
}
