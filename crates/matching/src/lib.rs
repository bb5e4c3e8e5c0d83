pub mod candidate;
pub mod engine;
pub mod error;
pub mod profile;
pub mod ranker;
pub mod result;
pub mod scorer;
pub mod selection;

pub use candidate::CandidateMatch;
pub use engine::Matcher;
pub use error::MatchError;
pub use profile::{ComparisonMode, MatchingProfile, SegmentationMode};
pub use result::{MatchResult, MatchTrace};
