use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use sceneforge_contracts::{
    EditablePoint, ImagePayload, Language, PointDraft, RenderOptions, VisualAnalysis,
};

use crate::dryrun::DryrunBackend;
use crate::gemini::GeminiBackend;

/// Everything the expansion service needs to write per-point prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionRequest {
    pub style_template: String,
    pub points: Vec<String>,
    pub analysis: VisualAnalysis,
    pub market: String,
    pub category: String,
    pub platform: String,
    pub competitor_context: Option<String>,
}

pub trait ProductAnalyzer: Send + Sync {
    fn analyze(&self, image: &ImagePayload, competitor_context: Option<&str>)
        -> Result<VisualAnalysis>;
}

pub trait PromptTranslator: Send + Sync {
    fn translate(&self, text: &str, target: Language) -> Result<String>;
}

/// Returns one draft per requested point, in request order.
pub trait SellingPointExpander: Send + Sync {
    fn expand(&self, request: &ExpansionRequest) -> Result<Vec<PointDraft>>;
}

pub trait SceneRenderer: Send + Sync {
    fn render(
        &self,
        image: &ImagePayload,
        point: &EditablePoint,
        options: RenderOptions,
    ) -> Result<ImagePayload>;
}

impl<T: PromptTranslator + ?Sized> PromptTranslator for Arc<T> {
    fn translate(&self, text: &str, target: Language) -> Result<String> {
        (**self).translate(text, target)
    }
}

impl<T: SceneRenderer + ?Sized> SceneRenderer for Arc<T> {
    fn render(
        &self,
        image: &ImagePayload,
        point: &EditablePoint,
        options: RenderOptions,
    ) -> Result<ImagePayload> {
        (**self).render(image, point, options)
    }
}

/// A named implementation of all four external capabilities.
pub trait StudioBackend:
    ProductAnalyzer + PromptTranslator + SellingPointExpander + SceneRenderer
{
    fn name(&self) -> &str;
}

#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn StudioBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: StudioBackend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.name().to_string(), Arc::new(backend));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StudioBackend>> {
        self.backends.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

pub fn default_backend_registry() -> BackendRegistry {
    let mut backends = BackendRegistry::new();
    backends.register(DryrunBackend::new());
    backends.register(GeminiBackend::from_env());
    backends
}
