pub mod node;
pub mod segmenter;

pub use node::{SegmentNode, spans_overlap};
pub use segmenter::{Segmenter, SegmenterConfig, clean};
