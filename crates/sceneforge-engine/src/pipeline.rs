use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use sceneforge_contracts::{
    EditablePoint, EditablePointStore, GeneratedResult, IdGenerator, ImageId, ImageLibrary,
    PointId, RenderOptions, ResultGallery, ResultId, ResultPatch, SourceImage,
};

use crate::error::StudioError;
use crate::services::SceneRenderer;
use crate::util::error_chain_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
}

/// Status for one point, sent before its render call. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
    pub slogan: String,
}

impl BatchProgress {
    pub fn message(&self) -> String {
        format!("rendering {}/{}: {}", self.index, self.total, self.slogan)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub index: usize,
    pub point_id: PointId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSignal {
    Started { image_id: ImageId, total: usize },
    Progress(BatchProgress),
    RenderFailed(RenderFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// No active image or no points; nothing ran.
    Skipped,
    /// `results` were prepended to the gallery as one block.
    Completed {
        results: Vec<ResultId>,
        failures: Vec<RenderFailure>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateOutcome {
    Regenerated {
        result_id: ResultId,
        point_id: PointId,
    },
    /// The render call failed; the result is unchanged.
    RenderFailed { error: String },
}

/// Inputs of one batch run.
pub struct BatchRequest<'a> {
    pub image: Option<&'a SourceImage>,
    pub points: &'a [EditablePoint],
    pub options: RenderOptions,
    pub renderer: &'a dyn SceneRenderer,
    pub ids: &'a dyn IdGenerator,
}

/// Renders every editable point against the active image, one at a time.
///
/// At most one batch or re-render runs per pipeline; a second caller gets
/// [`StudioError::BatchInProgress`] instead of waiting.
#[derive(Debug)]
pub struct BatchRenderPipeline {
    state: Mutex<BatchState>,
}

impl Default for BatchRenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningGuard<'a> {
    state: &'a Mutex<BatchState>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *lock_state(self.state) = BatchState::Idle;
    }
}

fn lock_state(state: &Mutex<BatchState>) -> MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchRenderPipeline {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BatchState::Idle),
        }
    }

    pub fn state(&self) -> BatchState {
        *lock_state(&self.state)
    }

    fn try_acquire(&self) -> Result<RunningGuard<'_>, StudioError> {
        let mut state = lock_state(&self.state);
        if *state == BatchState::Running {
            return Err(StudioError::BatchInProgress);
        }
        *state = BatchState::Running;
        Ok(RunningGuard { state: &self.state })
    }

    pub fn start(
        &self,
        request: BatchRequest<'_>,
        gallery: &mut ResultGallery,
        on_signal: &mut dyn FnMut(BatchSignal),
    ) -> Result<BatchOutcome, StudioError> {
        let Some(image) = request.image else {
            return Ok(BatchOutcome::Skipped);
        };
        if request.points.is_empty() {
            return Ok(BatchOutcome::Skipped);
        }
        let _running = self.try_acquire()?;

        let total = request.points.len();
        tracing::info!(image = %image.id, total, "batch started");
        on_signal(BatchSignal::Started {
            image_id: image.id.clone(),
            total,
        });
        let mut produced = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (offset, point) in request.points.iter().enumerate() {
            let index = offset + 1;
            on_signal(BatchSignal::Progress(BatchProgress {
                index,
                total,
                slogan: point.slogan.clone(),
            }));
            match request.renderer.render(&image.payload, point, request.options) {
                Ok(output_image) => produced.push(GeneratedResult {
                    id: ResultId::generate(request.ids),
                    output_image,
                    final_prompt_text: point.scene_instruction(),
                    slogan: point.slogan.clone(),
                    source_image_id: image.id.clone(),
                    point_id: point.id.clone(),
                    created_at: Utc::now(),
                }),
                Err(err) => {
                    let error = error_chain_text(&err, 300);
                    tracing::warn!(
                        point = %point.id,
                        index,
                        error = %error,
                        "render failed; skipping point"
                    );
                    let failure = RenderFailure {
                        index,
                        point_id: point.id.clone(),
                        error,
                    };
                    on_signal(BatchSignal::RenderFailed(failure.clone()));
                    failures.push(failure);
                }
            }
        }

        let results: Vec<ResultId> = produced.iter().map(|result| result.id.clone()).collect();
        gallery.append(produced, true);
        tracing::info!(
            produced = results.len(),
            failed = failures.len(),
            "batch finished"
        );
        Ok(BatchOutcome::Completed { results, failures })
    }

    /// Re-renders one result from its originating point and source image.
    ///
    /// The point and image are looked up fresh, so edits made since the batch
    /// are honoured. Only the image and timestamp of the result change.
    pub fn regenerate(
        &self,
        result_id: &ResultId,
        store: &EditablePointStore,
        library: &ImageLibrary,
        gallery: &mut ResultGallery,
        options: RenderOptions,
        renderer: &dyn SceneRenderer,
    ) -> Result<RegenerateOutcome, StudioError> {
        let result = gallery
            .get(result_id)
            .ok_or_else(|| StudioError::ResultMissing(result_id.clone()))?;
        let point = store
            .get(&result.point_id)
            .ok_or_else(|| StudioError::OriginPointMissing {
                result_id: result_id.clone(),
                point_id: result.point_id.clone(),
            })?;
        let image = library
            .get(&result.source_image_id)
            .ok_or_else(|| StudioError::SourceImageMissing {
                result_id: result_id.clone(),
                image_id: result.source_image_id.clone(),
            })?;
        let _running = self.try_acquire()?;

        match renderer.render(&image.payload, point, options) {
            Ok(output_image) => {
                gallery.update_in_place(
                    result_id,
                    ResultPatch {
                        output_image,
                        created_at: Utc::now(),
                    },
                );
                Ok(RegenerateOutcome::Regenerated {
                    result_id: result_id.clone(),
                    point_id: point.id.clone(),
                })
            }
            Err(err) => {
                let error = error_chain_text(&err, 300);
                tracing::warn!(result = %result_id, error = %error, "re-render failed");
                Ok(RegenerateOutcome::RenderFailed { error })
            }
        }
    }
}
