//! Studio engine: external-service seams, the dryrun and Gemini backends,
//! translation sync, the batch render pipeline and the `Studio` controller.

pub mod dryrun;
pub mod error;
pub mod gemini;
pub mod pipeline;
pub mod services;
pub mod studio;
pub mod sync;
pub mod testing;
mod util;

pub use dryrun::DryrunBackend;
pub use error::StudioError;
pub use gemini::GeminiBackend;
pub use pipeline::{
    BatchOutcome, BatchProgress, BatchRenderPipeline, BatchRequest, BatchSignal, BatchState,
    RegenerateOutcome, RenderFailure,
};
pub use services::{
    default_backend_registry, BackendRegistry, ExpansionRequest, ProductAnalyzer,
    PromptTranslator, SceneRenderer, SellingPointExpander, StudioBackend,
};
pub use studio::Studio;
pub use sync::{SyncOutcome, SyncTrigger, TranslationSyncController};
