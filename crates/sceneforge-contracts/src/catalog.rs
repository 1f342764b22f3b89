use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Classic,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 4] = [Self::Square, Self::Wide, Self::Tall, Self::Classic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Wide => "16:9",
            Self::Tall => "9:16",
            Self::Classic => "4:3",
        }
    }

    /// Pixel dimensions with `long_edge` on the longer side.
    pub fn dimensions(self, long_edge: u32) -> (u32, u32) {
        let (w, h) = match self {
            Self::Square => (1, 1),
            Self::Wide => (16, 9),
            Self::Tall => (9, 16),
            Self::Classic => (4, 3),
        };
        if w >= h {
            (long_edge, long_edge * h / w)
        } else {
            (long_edge * w / h, long_edge)
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| format!("unsupported aspect ratio '{normalized}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
        }
    }

    pub fn long_edge(self) -> u32 {
        match self {
            Self::OneK => 1024,
            Self::TwoK => 2048,
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::OneK),
            "2K" => Ok(Self::TwoK),
            other => Err(format!("unsupported image size '{other}'")),
        }
    }
}

/// Output shape of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleOption {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prompt_template: String,
}

pub const TARGET_MARKETS: &[&str] = &["欧美", "东南亚", "中东", "全球通用"];
pub const CATEGORIES: &[&str] = &[
    "厨房家居",
    "户外运动",
    "服装服饰",
    "3C电子产品",
    "书籍",
    "美容个护",
    "其他",
];
pub const PLATFORMS: &[&str] = &[
    "亚马逊",
    "TEMU",
    "Shein",
    "独立站",
    "速卖通",
    "TikTok",
    "Instagram/FB",
];

/// Scene styles in presentation order; the first one is the default.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: IndexMap<String, StyleOption>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self {
            styles: default_styles(),
        }
    }
}

impl StyleCatalog {
    pub fn get(&self, id: &str) -> Option<&StyleOption> {
        self.styles.get(id)
    }

    pub fn default_style(&self) -> Option<&StyleOption> {
        self.styles.values().next()
    }

    /// Looks up `id`, falling back to the default style.
    pub fn resolve(&self, id: &str) -> Option<&StyleOption> {
        self.get(id).or_else(|| self.default_style())
    }

    pub fn list(&self) -> impl Iterator<Item = &StyleOption> {
        self.styles.values()
    }
}

fn default_styles() -> IndexMap<String, StyleOption> {
    let mut map = IndexMap::new();

    let mut insert = |id: &str, name: &str, description: &str, prompt_template: &str| {
        map.insert(
            id.to_string(),
            StyleOption {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                prompt_template: prompt_template.to_string(),
            },
        );
    };

    insert(
        "minimalist",
        "极简北欧 (Nordic)",
        "明亮通透的现代家居，柔和自然光与原木质感。",
        "Place the product in a minimalist Scandinavian living room. Bright, airy atmosphere, soft shadows, light oak textures, and white walls. High-end interior design photography.",
    );
    insert(
        "nature",
        "户外自然 (Nature)",
        "新鲜的户外环境，绿植环绕与晨曦微光。",
        "The product is positioned on a flat natural stone surrounded by lush green moss and fern leaves. Soft morning sunlight filtering through trees with light fog. Cinematic forest lighting.",
    );
    insert(
        "luxury",
        "奢华精品 (Luxury)",
        "高端零售氛围，大理石台面与精致金属点缀。",
        "Product showcased in a high-end luxury boutique. Dark emerald marble surfaces, subtle gold accents, dramatic spotlighting, and reflective glass. Sophisticated and premium aesthetic.",
    );
    insert(
        "tech",
        "赛博科技 (Tech)",
        "现代电竞或科技办公桌面，冷色调灯光与极客感。",
        "A modern high-tech cyberpunk workstation. Dark carbon fiber desk, subtle cyan and magenta neon rim lighting in the background. Ultra-sharp focus, futuristic tech feel.",
    );
    insert(
        "studio",
        "经典影棚 (Studio)",
        "专业商业摄影棚，纯净背景与精准控光。",
        "Professional commercial studio shoot. Clean grey gradient background, three-point softbox lighting setup, high-gloss surface with soft realistic reflection. Ultra-sharp product focus.",
    );
    insert(
        "cafe",
        "复古咖啡 (Vintage Cafe)",
        "温馨惬意的午后氛围，木质桌面与复古格调。",
        "Product on a rustic dark wood cafe table. Warm indoor ambient lighting, blurred coffee shop background with rich bokeh, warm brown tones. Nostalgic and inviting mood.",
    );

    map
}
