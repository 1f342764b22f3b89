use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use sceneforge_contracts::{
    EditablePoint, ImagePayload, ImageSize, Language, PointDraft, RenderOptions, VisualAnalysis,
};
use sha2::{Digest, Sha256};

use crate::services::{
    ExpansionRequest, ProductAnalyzer, PromptTranslator, SceneRenderer, SellingPointExpander,
    StudioBackend,
};

const DRYRUN_LONG_EDGE: u32 = 256;
const SLOGAN_MAX_WORDS: usize = 5;

/// Offline backend with deterministic answers.
///
/// Renders at `long_edge` pixels for 1K output and scales up for larger sizes.
#[derive(Debug, Clone)]
pub struct DryrunBackend {
    long_edge: u32,
}

impl Default for DryrunBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DryrunBackend {
    pub fn new() -> Self {
        Self {
            long_edge: DRYRUN_LONG_EDGE,
        }
    }

    pub fn with_long_edge(long_edge: u32) -> Self {
        Self {
            long_edge: long_edge.max(8),
        }
    }
}

impl StudioBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }
}

impl ProductAnalyzer for DryrunBackend {
    fn analyze(
        &self,
        image: &ImagePayload,
        competitor_context: Option<&str>,
    ) -> Result<VisualAnalysis> {
        let decoded = image::load_from_memory(&image.bytes)
            .context("dryrun analysis could not decode the source image")?
            .to_rgb8();
        let (r, g, b) = average_rgb(&decoded);
        let accessories = match competitor_context {
            Some(link) => format!("see competitor listing {link}"),
            None => "none".to_string(),
        };
        Ok(VisualAnalysis {
            subject: format!("product photo {}x{}", decoded.width(), decoded.height()),
            accessories,
            materials: format!("{} finish (#{})", color_name(r, g, b), hex::encode([r, g, b])),
        })
    }
}

impl PromptTranslator for DryrunBackend {
    fn translate(&self, text: &str, target: Language) -> Result<String> {
        let body = strip_language_tag(text.trim());
        Ok(match target {
            Language::En => format!("[en] {body}"),
            Language::Zh => format!("[zh] {body}"),
        })
    }
}

impl SellingPointExpander for DryrunBackend {
    fn expand(&self, request: &ExpansionRequest) -> Result<Vec<PointDraft>> {
        let subject = Some(request.analysis.subject.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or("the product");
        Ok(request
            .points
            .iter()
            .map(|point| PointDraft {
                slogan: point
                    .split_whitespace()
                    .take(SLOGAN_MAX_WORDS)
                    .collect::<Vec<_>>()
                    .join(" "),
                prompt_en: format!(
                    "{} Show {subject} highlighting: {point}.",
                    request.style_template
                ),
                prompt_zh: format!("场景：突出“{point}”，主体为{subject}。"),
            })
            .collect())
    }
}

impl SceneRenderer for DryrunBackend {
    fn render(
        &self,
        _image: &ImagePayload,
        point: &EditablePoint,
        options: RenderOptions,
    ) -> Result<ImagePayload> {
        let long_edge =
            self.long_edge * options.image_size.long_edge() / ImageSize::OneK.long_edge();
        let (width, height) = options.aspect_ratio.dimensions(long_edge);
        let (r, g, b) = color_from_prompt(&point.scene_instruction(), &point.slogan);
        let mut canvas = RgbImage::new(width, height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut out = Cursor::new(Vec::new());
        canvas
            .write_to(&mut out, ImageFormat::Png)
            .context("dryrun render encode failed")?;
        Ok(ImagePayload::new(out.into_inner(), "image/png"))
    }
}

fn strip_language_tag(text: &str) -> &str {
    text.strip_prefix("[en] ")
        .or_else(|| text.strip_prefix("[zh] "))
        .unwrap_or(text)
}

fn color_from_prompt(prompt: &str, slogan: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(slogan.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn average_rgb(image: &RgbImage) -> (u8, u8, u8) {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return (0, 0, 0);
    }
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
    }
    (
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    )
}

fn color_name(r: u8, g: u8, b: u8) -> &'static str {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max < 48 {
        return "black";
    }
    if min > 208 {
        return "white";
    }
    if max - min < 24 {
        return "grey";
    }
    if max == r {
        "red"
    } else if max == g {
        "green"
    } else {
        "blue"
    }
}
