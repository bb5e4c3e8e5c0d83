use index::SearchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("'affiliation' parameter missing")]
    MissingAffiliation,

    /// Every query issued for the request failed.
    #[error("search backend query failed: {0}")]
    Backend(#[from] SearchError),
}
