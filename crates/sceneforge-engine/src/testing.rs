//! Scriptable backend and fixtures for exercising the studio without a network.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use image::{ImageFormat, Rgb, RgbImage};
use sceneforge_contracts::{
    EditablePoint, ImagePayload, Language, PointDraft, RenderOptions, VisualAnalysis,
};

use crate::dryrun::DryrunBackend;
use crate::services::{
    ExpansionRequest, ProductAnalyzer, PromptTranslator, SceneRenderer, SellingPointExpander,
    StudioBackend,
};

/// Encodes a solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut canvas = RgbImage::new(width, height);
    for pixel in canvas.pixels_mut() {
        *pixel = Rgb(rgb);
    }
    let mut out = Cursor::new(Vec::new());
    match canvas.write_to(&mut out, ImageFormat::Png) {
        Ok(()) => out.into_inner(),
        Err(_) => Vec::new(),
    }
}

/// Dryrun answers with injectable failures and call counters.
///
/// Every render call gets a distinct image, so a re-render is observable.
pub struct ScriptedBackend {
    inner: DryrunBackend,
    fail_analysis: bool,
    fail_translations: bool,
    fail_expansion: bool,
    drop_last_draft: bool,
    failing_renders: BTreeSet<usize>,
    render_gate: Mutex<Option<Receiver<()>>>,
    analyze_calls: AtomicUsize,
    translate_calls: AtomicUsize,
    render_calls: AtomicUsize,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Renders 32px (1K) or 64px (2K) images.
    pub fn new() -> Self {
        Self {
            inner: DryrunBackend::with_long_edge(32),
            fail_analysis: false,
            fail_translations: false,
            fail_expansion: false,
            drop_last_draft: false,
            failing_renders: BTreeSet::new(),
            render_gate: Mutex::new(None),
            analyze_calls: AtomicUsize::new(0),
            translate_calls: AtomicUsize::new(0),
            render_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_analysis(mut self) -> Self {
        self.fail_analysis = true;
        self
    }

    pub fn fail_translations(mut self) -> Self {
        self.fail_translations = true;
        self
    }

    pub fn fail_expansion(mut self) -> Self {
        self.fail_expansion = true;
        self
    }

    /// Answers expansion requests with one draft too few.
    pub fn short_expansion(mut self) -> Self {
        self.drop_last_draft = true;
        self
    }

    /// Fails the render calls at these zero-based call indices.
    pub fn fail_renders_at(mut self, calls: &[usize]) -> Self {
        self.failing_renders.extend(calls.iter().copied());
        self
    }

    /// Blocks every render until a message arrives on `gate`.
    pub fn with_render_gate(self, gate: Receiver<()>) -> Self {
        if let Ok(mut slot) = self.render_gate.lock() {
            *slot = Some(gate);
        }
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn render_calls(&self) -> usize {
        self.render_calls.load(Ordering::SeqCst)
    }

    fn wait_for_gate(&self) -> Result<()> {
        let slot = self
            .render_gate
            .lock()
            .map_err(|_| anyhow!("render gate poisoned"))?;
        if let Some(gate) = slot.as_ref() {
            gate.recv().map_err(|_| anyhow!("render gate closed"))?;
        }
        Ok(())
    }
}

impl StudioBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }
}

impl ProductAnalyzer for ScriptedBackend {
    fn analyze(
        &self,
        image: &ImagePayload,
        competitor_context: Option<&str>,
    ) -> Result<VisualAnalysis> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_analysis {
            bail!("analysis service unavailable");
        }
        self.inner.analyze(image, competitor_context)
    }
}

impl PromptTranslator for ScriptedBackend {
    fn translate(&self, text: &str, target: Language) -> Result<String> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_translations {
            bail!("translation service unavailable");
        }
        self.inner.translate(text, target)
    }
}

impl SellingPointExpander for ScriptedBackend {
    fn expand(&self, request: &ExpansionRequest) -> Result<Vec<PointDraft>> {
        if self.fail_expansion {
            bail!("expansion service unavailable");
        }
        let mut drafts = self.inner.expand(request)?;
        if self.drop_last_draft {
            drafts.pop();
        }
        Ok(drafts)
    }
}

impl SceneRenderer for ScriptedBackend {
    fn render(
        &self,
        image: &ImagePayload,
        point: &EditablePoint,
        options: RenderOptions,
    ) -> Result<ImagePayload> {
        let call = self.render_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_gate()?;
        if self.failing_renders.contains(&call) {
            bail!("render call {call} rejected");
        }
        let mut take = point.clone();
        take.remarks = format!("{} take {call}", take.remarks);
        self.inner.render(image, &take, options)
    }
}
