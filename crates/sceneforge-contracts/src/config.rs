use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::{
    AspectRatio, ImageSize, RenderOptions, CATEGORIES, PLATFORMS, TARGET_MARKETS,
};

/// Generation settings shared by point expansion and rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudioConfig {
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
    pub style_id: String,
    pub selling_points: String,
    pub competitor_link: String,
    pub target_market: String,
    pub category: String,
    pub marketing_platform: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            image_size: ImageSize::default(),
            style_id: "minimalist".to_string(),
            selling_points: String::new(),
            competitor_link: String::new(),
            target_market: TARGET_MARKETS[0].to_string(),
            category: CATEGORIES[0].to_string(),
            marketing_platform: PLATFORMS[0].to_string(),
        }
    }
}

impl StudioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// The competitor link, when one was given.
    pub fn competitor_context(&self) -> Option<&str> {
        Some(self.competitor_link.trim()).filter(|value| !value.is_empty())
    }

    pub fn with_selling_points(mut self, text: impl Into<String>) -> Self {
        self.selling_points = text.into();
        self
    }

    /// Shape of every render started from these settings.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            aspect_ratio: self.aspect_ratio,
            image_size: self.image_size,
        }
    }
}
