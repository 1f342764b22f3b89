use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use sceneforge_contracts::{
    now_utc_iso, split_points, write_summary, AnalysisField, EditablePoint, EditablePointStore,
    EventLog, GeneratedResult, IdGenerator, ImageId, ImageLibrary, Language, PointField, PointId,
    ResultGallery, ResultId, SessionSummary, SourceImage, StudioConfig, StudioEvent, StyleCatalog,
    UploadFile, UploadReport, VisualAnalysis,
};

use crate::error::StudioError;
use crate::pipeline::{
    BatchOutcome, BatchRenderPipeline, BatchRequest, BatchSignal, BatchState, RegenerateOutcome,
};
use crate::services::{ExpansionRequest, StudioBackend};
use crate::sync::{SyncOutcome, SyncTrigger, TranslationSyncController};
use crate::util::error_chain_text;

/// One editing session: owns every component and routes calls between them.
///
/// All external calls go through `backend`; everything the user would see is
/// also written to the session's event log. A failed log write is only
/// warned about and never fails the operation that produced the event.
pub struct Studio {
    out_dir: PathBuf,
    session_id: String,
    started_at: String,
    summary_path: PathBuf,
    events: EventLog,
    config: StudioConfig,
    styles: StyleCatalog,
    backend: Arc<dyn StudioBackend>,
    ids: Arc<dyn IdGenerator>,
    library: ImageLibrary,
    store: EditablePointStore,
    gallery: ResultGallery,
    analysis: VisualAnalysis,
    sync: TranslationSyncController,
    pipeline: BatchRenderPipeline,
    batches: usize,
    render_failures: usize,
}

impl Studio {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        backend: Arc<dyn StudioBackend>,
        ids: Arc<dyn IdGenerator>,
        config: StudioConfig,
    ) -> Result<Self, StudioError> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        let session_id = out_dir
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("session")
            .to_string();
        let events = EventLog::new(events_path.into(), session_id.clone());
        let studio = Self {
            summary_path: out_dir.join("summary.json"),
            started_at: now_utc_iso(),
            sync: TranslationSyncController::new(Arc::new(Arc::clone(&backend))),
            library: ImageLibrary::new(Arc::clone(&ids)),
            store: EditablePointStore::new(Arc::clone(&ids)),
            gallery: ResultGallery::new(),
            analysis: VisualAnalysis::default(),
            styles: StyleCatalog::default(),
            pipeline: BatchRenderPipeline::new(),
            batches: 0,
            render_failures: 0,
            out_dir,
            session_id,
            events,
            config,
            backend,
            ids,
        };
        studio.emit(StudioEvent::SessionStarted {
            out_dir: studio.out_dir.to_string_lossy().to_string(),
            backend: studio.backend.name().to_string(),
        });
        tracing::info!(
            session = %studio.session_id,
            backend = studio.backend.name(),
            "studio session started"
        );
        Ok(studio)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut StudioConfig {
        &mut self.config
    }

    pub fn styles(&self) -> &StyleCatalog {
        &self.styles
    }

    pub fn library(&self) -> &ImageLibrary {
        &self.library
    }

    pub fn analysis(&self) -> &VisualAnalysis {
        &self.analysis
    }

    pub fn points(&self) -> &[EditablePoint] {
        self.store.list()
    }

    pub fn results(&self) -> &[GeneratedResult] {
        self.gallery.list()
    }

    pub fn is_rendering(&self) -> bool {
        self.pipeline.state() == BatchState::Running
    }

    fn emit(&self, event: StudioEvent) {
        record_event(&self.events, &event);
    }

    pub fn upload(&mut self, files: Vec<UploadFile>) -> Result<UploadReport, StudioError> {
        let report = self.library.upload(files);
        self.emit(StudioEvent::ImagesUploaded {
            added: report.added.len(),
            clamped: report.clamped,
            rejected: report.rejected.len(),
        });
        Ok(report)
    }

    pub fn replace_image(&mut self, id: &ImageId, file: UploadFile) -> bool {
        self.library.replace(id, file)
    }

    pub fn remove_image(&mut self, id: &ImageId) -> Option<SourceImage> {
        self.library.remove(id)
    }

    pub fn set_active(&mut self, id: &ImageId) -> bool {
        self.library.set_active(id)
    }

    /// Analyzes the active image. A failed call installs the fallback record.
    ///
    /// Returns `None` when no image is active.
    pub fn analyze(&mut self) -> Result<Option<&VisualAnalysis>, StudioError> {
        let Some(image) = self.library.active() else {
            return Ok(None);
        };
        let image_id = image.id.clone();
        let (analysis, fallback) = match self
            .backend
            .analyze(&image.payload, self.config.competitor_context())
        {
            Ok(analysis) => (analysis, false),
            Err(err) => {
                tracing::warn!(
                    image = %image_id,
                    error = %error_chain_text(&err, 300),
                    "analysis failed; using fallback"
                );
                (VisualAnalysis::fallback(), true)
            }
        };
        self.analysis = analysis;
        self.emit(StudioEvent::AnalysisCompleted {
            image_id: image_id.to_string(),
            fallback,
        });
        Ok(Some(&self.analysis))
    }

    pub fn set_analysis_field(&mut self, field: AnalysisField, value: impl Into<String>) {
        self.analysis.set(field, value);
    }

    pub fn set_selling_points(&mut self, text: impl Into<String>) {
        self.config.selling_points = text.into();
    }

    /// Expands the selling points into a fresh point list.
    ///
    /// Returns `None` without calling out when no image is active or there
    /// are no selling points. On error the current points are kept.
    pub fn generate_points(&mut self) -> Result<Option<usize>, StudioError> {
        let points = split_points(&self.config.selling_points);
        if self.library.active().is_none() || points.is_empty() {
            return Ok(None);
        }
        let style_template = self
            .styles
            .resolve(&self.config.style_id)
            .map(|style| style.prompt_template.clone())
            .unwrap_or_default();
        let request = ExpansionRequest {
            style_template,
            points,
            analysis: self.analysis.clone(),
            market: self.config.target_market.clone(),
            category: self.config.category.clone(),
            platform: self.config.marketing_platform.clone(),
            competitor_context: self.config.competitor_context().map(str::to_string),
        };

        let drafts = self.backend.expand(&request).map_err(StudioError::Expansion)?;
        if drafts.len() != request.points.len() {
            return Err(StudioError::Expansion(anyhow!(
                "expected {} prompts, got {}",
                request.points.len(),
                drafts.len()
            )));
        }

        let count = self.store.replace_all(drafts).len();
        self.emit(StudioEvent::PointsGenerated { count });
        tracing::info!(count, "points generated");
        Ok(Some(count))
    }

    /// Edits one field of a point. Never triggers a translation by itself.
    pub fn edit_point(&mut self, id: &PointId, field: PointField) -> bool {
        self.store.update_field(id, field)
    }

    pub fn translate_point(&mut self, id: &PointId, source: Language) -> SyncOutcome {
        let outcome = self.sync.on_translate_requested(&mut self.store, id, source);
        self.record_sync(id, &outcome, SyncTrigger::Explicit);
        outcome
    }

    /// Call when editing focus leaves the `field` prompt of a point.
    pub fn blur_prompt(&mut self, id: &PointId, field: Language) -> SyncOutcome {
        let outcome = self.sync.on_blur(&mut self.store, id, field);
        self.record_sync(id, &outcome, SyncTrigger::Blur);
        outcome
    }

    fn record_sync(&self, id: &PointId, outcome: &SyncOutcome, trigger: SyncTrigger) {
        if let SyncOutcome::Updated { target } = outcome {
            let target = match target {
                Language::Zh => "zh",
                Language::En => "en",
            };
            self.emit(StudioEvent::TranslationSynced {
                point_id: id.to_string(),
                target: target.to_string(),
                trigger: trigger.as_str().to_string(),
            });
        }
    }

    /// Renders every point against the active image and prepends the results.
    pub fn start_batch(&mut self) -> Result<BatchOutcome, StudioError> {
        let events = &self.events;
        let record = |event: StudioEvent| record_event(events, &event);

        let outcome = self.pipeline.start(
            BatchRequest {
                image: self.library.active(),
                points: self.store.list(),
                options: self.config.render_options(),
                renderer: &self.backend,
                ids: self.ids.as_ref(),
            },
            &mut self.gallery,
            &mut |signal| match signal {
                BatchSignal::Started { image_id, total } => record(StudioEvent::BatchStarted {
                    image_id: image_id.to_string(),
                    total,
                }),
                BatchSignal::Progress(progress) => {
                    tracing::info!("{}", progress.message());
                    record(StudioEvent::BatchProgress {
                        index: progress.index,
                        total: progress.total,
                        slogan: progress.slogan,
                    });
                }
                BatchSignal::RenderFailed(failure) => record(StudioEvent::RenderFailed {
                    point_id: failure.point_id.to_string(),
                    index: failure.index,
                    error: failure.error,
                }),
            },
        )?;

        if let BatchOutcome::Completed { results, failures } = &outcome {
            self.batches += 1;
            self.render_failures += failures.len();
            record(StudioEvent::BatchFinished {
                produced: results.len(),
                failed: failures.len(),
            });
        }
        Ok(outcome)
    }

    /// Re-renders one result with its point's current content and the
    /// current render settings.
    pub fn regenerate(&mut self, result_id: &ResultId) -> Result<RegenerateOutcome, StudioError> {
        let outcome = self.pipeline.regenerate(
            result_id,
            &self.store,
            &self.library,
            &mut self.gallery,
            self.config.render_options(),
            &self.backend,
        )?;
        if let RegenerateOutcome::Regenerated {
            result_id,
            point_id,
        } = &outcome
        {
            self.emit(StudioEvent::ResultRegenerated {
                result_id: result_id.to_string(),
                point_id: point_id.to_string(),
            });
        }
        Ok(outcome)
    }

    /// Writes a result's image to `dir/product-scene-<millis>.<ext>`.
    pub fn export_result(&self, result_id: &ResultId, dir: &Path) -> Result<PathBuf, StudioError> {
        let result = self
            .gallery
            .get(result_id)
            .ok_or_else(|| StudioError::ResultMissing(result_id.clone()))?;
        std::fs::create_dir_all(dir)?;
        let stem = format!("product-scene-{}", Utc::now().timestamp_millis());
        let ext = result.output_image.extension();
        let mut path = dir.join(format!("{stem}.{ext}"));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{stem}-{suffix}.{ext}"));
            suffix += 1;
        }
        std::fs::write(&path, &result.output_image.bytes)?;
        Ok(path)
    }

    /// Writes `summary.json` and closes the event log.
    pub fn finish(&mut self) -> Result<PathBuf, StudioError> {
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            images: self.library.len(),
            points: self.store.len(),
            results: self.gallery.len(),
            batches: self.batches,
            render_failures: self.render_failures,
        };
        write_summary(&self.summary_path, &summary).map_err(StudioError::Summary)?;
        self.emit(StudioEvent::SessionFinished {
            results: self.gallery.len(),
        });
        tracing::info!(
            session = %self.session_id,
            results = self.gallery.len(),
            "studio session finished"
        );
        Ok(self.summary_path.clone())
    }
}

fn record_event(events: &EventLog, event: &StudioEvent) {
    match events.record(event) {
        Ok(_) => tracing::debug!(event = event.kind(), "event recorded"),
        Err(err) => tracing::warn!(
            event = event.kind(),
            path = %events.path().display(),
            error = %format!("{err:#}"),
            "event log write failed"
        ),
    }
}
