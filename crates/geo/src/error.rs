use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("malformed {file} table at line {line}: {reason}")]
    Parse {
        file: &'static str,
        line: usize,
        reason: &'static str,
    },
}

impl GeoError {
    pub(crate) fn parse(file: &'static str, line: usize, reason: &'static str) -> Self {
        Self::Parse { file, line, reason }
    }
}
