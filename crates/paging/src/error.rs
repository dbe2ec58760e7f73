use verdure_common::Cell2D;

/// Errors surfaced by the paging manager.
///
/// Only configuration mistakes and grid corruption reach the caller. Load
/// failures are logged and absorbed per page.
#[derive(Debug, thiserror::Error)]
pub enum PagingError {
    #[error("detail level far distance {far} must exceed its near distance {near}")]
    InvalidDetailLevel { near: f32, far: f32 },
    #[error("fade range must be a non-negative number, got {0}")]
    InvalidFadeRange(f32),
    #[error("invalid paging configuration: {0}")]
    InvalidConfig(String),
    #[error("live grid slot {cell} is unexpectedly empty")]
    EmptyGridSlot { cell: Cell2D },
    #[error("live grid holds {actual} pages, expected {expected}")]
    GridCoverage { expected: usize, actual: usize },
    #[error("failed to start paging worker: {0}")]
    Executor(#[from] std::io::Error),
}

/// Why a background load produced no result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("load failed: {0}")]
    Failed(String),
    #[error("load task panicked: {0}")]
    Panicked(String),
    #[error("load task was cancelled")]
    Cancelled,
    #[error("paging worker dropped the task")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = PagingError::InvalidDetailLevel {
            near: 300.0,
            far: 200.0,
        };
        assert!(e.to_string().contains("300"));

        let e = PagingError::EmptyGridSlot {
            cell: Cell2D::new(1, -2),
        };
        assert!(e.to_string().contains("(1, -2)"));

        assert_eq!(
            LoadError::Failed("no density map".into()).to_string(),
            "load failed: no density map"
        );
    }
}
