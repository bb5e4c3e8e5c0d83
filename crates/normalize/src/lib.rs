pub mod fuzz;
pub mod normalizer;

pub use fuzz::{Alignment, partial_ratio, partial_ratio_alignment, ratio, token_sort_ratio};
pub use normalizer::{collapse_whitespace, is_latin, normalize};
