use sceneforge_contracts::{ImageId, PointId, ResultId};

/// Errors surfaced across the studio boundary.
///
/// External-service failures of translation, analysis and per-item rendering
/// never reach this type; they are logged and absorbed where they happen.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// A batch or single re-render is already running.
    #[error("a render is already in progress")]
    BatchInProgress,

    /// The point that produced a result is no longer in the store.
    #[error("point {point_id} behind result {result_id} no longer exists; re-run the batch")]
    OriginPointMissing {
        result_id: ResultId,
        point_id: PointId,
    },

    /// The source image of a result was deleted.
    #[error("source image {image_id} behind result {result_id} no longer exists")]
    SourceImageMissing {
        result_id: ResultId,
        image_id: ImageId,
    },

    #[error("result {0} not found")]
    ResultMissing(ResultId),

    /// The selling-point expansion call failed or returned the wrong shape.
    #[error("prompt generation failed: {0:#}")]
    Expansion(#[source] anyhow::Error),

    #[error("failed writing session summary: {0:#}")]
    Summary(#[source] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Integrity failures the user can fix by re-running the batch.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OriginPointMissing { .. } | Self::SourceImageMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failures_are_recoverable() {
        let err = StudioError::OriginPointMissing {
            result_id: ResultId::from("res-1"),
            point_id: PointId::from("pt-1"),
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("re-run the batch"));
        assert!(!StudioError::BatchInProgress.is_recoverable());
        assert!(!StudioError::Expansion(anyhow::anyhow!("timeout")).is_recoverable());
    }

    #[test]
    fn expansion_keeps_the_cause_chain() {
        let cause = anyhow::anyhow!("connection reset").context("Gemini request failed");
        let err = StudioError::Expansion(cause);
        assert_eq!(
            err.to_string(),
            "prompt generation failed: Gemini request failed: connection reset"
        );
        let source = std::error::Error::source(&err).map(|source| source.to_string());
        assert_eq!(source.as_deref(), Some("Gemini request failed"));
    }
}
