use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{IdGenerator, PointId};

const POINT_DELIMITERS: &[char] = &['\n', ',', '，', ';', '；'];

/// Splits raw selling-point text on newlines, commas and semicolons (ASCII
/// and full-width). Fragments are trimmed; empty ones are dropped.
pub fn split_points(text: &str) -> Vec<String> {
    text.split(POINT_DELIMITERS)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    pub fn other(self) -> Self {
        match self {
            Self::Zh => Self::En,
            Self::En => Self::Zh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontSize {
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "medium")]
    Medium,
    #[default]
    #[serde(rename = "large")]
    Large,
    #[serde(rename = "extra large", alias = "extra-large")]
    ExtraLarge,
}

impl FontSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::ExtraLarge => "extra large",
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontColor {
    #[default]
    White,
    Black,
    Gold,
    Red,
    Cyan,
}

impl FontColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
            Self::Gold => "gold",
            Self::Red => "red",
            Self::Cyan => "cyan",
        }
    }
}

impl fmt::Display for FontColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the expansion service's answer, before identity is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDraft {
    pub slogan: String,
    #[serde(rename = "promptEn")]
    pub prompt_en: String,
    #[serde(rename = "promptZh")]
    pub prompt_zh: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditablePoint {
    pub id: PointId,
    pub slogan: String,
    pub prompt_zh: String,
    pub prompt_en: String,
    pub font_size: FontSize,
    pub font_color: FontColor,
    pub remarks: String,
}

impl EditablePoint {
    pub fn prompt(&self, language: Language) -> &str {
        match language {
            Language::Zh => &self.prompt_zh,
            Language::En => &self.prompt_en,
        }
    }

    /// The render instruction: the English prompt, plus the remarks when set.
    pub fn scene_instruction(&self) -> String {
        let remarks = self.remarks.trim();
        if remarks.is_empty() {
            return self.prompt_en.clone();
        }
        format!("{}. Additional details: {remarks}", self.prompt_en)
    }
}

/// A single-field edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointField {
    Slogan(String),
    Prompt(Language, String),
    FontSize(FontSize),
    FontColor(FontColor),
    Remarks(String),
}

impl PointField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slogan(_) => "slogan",
            Self::Prompt(Language::Zh, _) => "prompt_zh",
            Self::Prompt(Language::En, _) => "prompt_en",
            Self::FontSize(_) => "font_size",
            Self::FontColor(_) => "font_color",
            Self::Remarks(_) => "remarks",
        }
    }
}

/// Ordered editable points, replaced wholesale on each regeneration.
pub struct EditablePointStore {
    points: Vec<EditablePoint>,
    ids: Arc<dyn IdGenerator>,
}

impl EditablePointStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            points: Vec::new(),
            ids,
        }
    }

    /// Discards every current point and installs `drafts` in order with fresh
    /// ids and default render options.
    pub fn replace_all(&mut self, drafts: Vec<PointDraft>) -> &[EditablePoint] {
        self.points = drafts
            .into_iter()
            .map(|draft| EditablePoint {
                id: PointId::generate(self.ids.as_ref()),
                slogan: draft.slogan,
                prompt_zh: draft.prompt_zh,
                prompt_en: draft.prompt_en,
                font_size: FontSize::default(),
                font_color: FontColor::default(),
                remarks: String::new(),
            })
            .collect();
        &self.points
    }

    /// Mutates exactly one field. Returns false for unknown ids.
    pub fn update_field(&mut self, id: &PointId, field: PointField) -> bool {
        let Some(point) = self.points.iter_mut().find(|point| &point.id == id) else {
            return false;
        };
        tracing::debug!(point = %id, field = field.name(), "point field updated");
        match field {
            PointField::Slogan(value) => point.slogan = value,
            PointField::Prompt(Language::Zh, value) => point.prompt_zh = value,
            PointField::Prompt(Language::En, value) => point.prompt_en = value,
            PointField::FontSize(value) => point.font_size = value,
            PointField::FontColor(value) => point.font_color = value,
            PointField::Remarks(value) => point.remarks = value,
        }
        true
    }

    pub fn get(&self, id: &PointId) -> Option<&EditablePoint> {
        self.points.iter().find(|point| &point.id == id)
    }

    pub fn list(&self) -> &[EditablePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;

    fn draft(slogan: &str) -> PointDraft {
        PointDraft {
            slogan: slogan.to_string(),
            prompt_en: format!("{slogan} scene"),
            prompt_zh: format!("{slogan} 场景"),
        }
    }

    fn store() -> EditablePointStore {
        EditablePointStore::new(Arc::new(SequentialIds::new()))
    }

    #[test]
    fn split_points_drops_empty_fragments_and_keeps_order() {
        assert_eq!(split_points("A, B;;C\n  "), vec!["A", "B", "C"]);
        assert_eq!(
            split_points("防水，耐用；轻便\n\n  大容量 "),
            vec!["防水", "耐用", "轻便", "大容量"]
        );
        assert!(split_points(" \n ,;，； ").is_empty());
        assert!(split_points("").is_empty());
    }

    #[test]
    fn split_points_keeps_inner_whitespace() {
        assert_eq!(
            split_points("  keeps drinks cold ,fits cup holders"),
            vec!["keeps drinks cold", "fits cup holders"]
        );
    }

    #[test]
    fn replace_all_assigns_defaults_in_input_order() {
        let mut store = store();
        let points = store.replace_all(vec![draft("one"), draft("two")]).to_vec();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].slogan, "one");
        assert_eq!(points[1].slogan, "two");
        for point in &points {
            assert_eq!(point.font_size, FontSize::Large);
            assert_eq!(point.font_color, FontColor::White);
            assert!(point.remarks.is_empty());
        }
        assert_ne!(points[0].id, points[1].id);
    }

    #[test]
    fn replace_all_discards_previous_points() {
        let mut store = store();
        let first: Vec<PointId> = store
            .replace_all(vec![draft("a"), draft("b")])
            .iter()
            .map(|point| point.id.clone())
            .collect();
        store.update_field(&first[0], PointField::Remarks("edited".to_string()));

        store.replace_all(vec![draft("c")]);
        assert_eq!(store.len(), 1);
        for id in &first {
            assert!(store.get(id).is_none());
        }
        assert!(store.list().iter().all(|point| point.remarks.is_empty()));
    }

    #[test]
    fn update_field_touches_only_the_named_field() {
        let mut store = store();
        let id = store.replace_all(vec![draft("a")])[0].id.clone();
        let before = store.get(&id).cloned();

        assert!(store.update_field(&id, PointField::Prompt(Language::Zh, "新场景".to_string())));
        assert!(store.update_field(&id, PointField::FontColor(FontColor::Gold)));

        let after = store.get(&id).cloned();
        let (Some(before), Some(after)) = (before, after) else {
            panic!("point missing");
        };
        assert_eq!(after.prompt_zh, "新场景");
        assert_eq!(after.prompt_en, before.prompt_en);
        assert_eq!(after.font_color, FontColor::Gold);
        assert_eq!(after.slogan, before.slogan);
        assert!(!store.update_field(&PointId::from("pt-404"), PointField::Slogan("x".into())));
    }

    #[test]
    fn scene_instruction_appends_remarks_only_when_present() {
        let mut store = store();
        let id = store.replace_all(vec![draft("glow")])[0].id.clone();
        let instruction = store.get(&id).map(EditablePoint::scene_instruction);
        assert_eq!(instruction.as_deref(), Some("glow scene"));

        store.update_field(&id, PointField::Remarks("light from the left".to_string()));
        assert_eq!(
            store.get(&id).map(EditablePoint::scene_instruction).as_deref(),
            Some("glow scene. Additional details: light from the left")
        );
    }

    #[test]
    fn font_options_use_render_vocabulary() -> anyhow::Result<()> {
        assert_eq!(FontSize::ExtraLarge.to_string(), "extra large");
        assert_eq!(serde_json::to_string(&FontColor::Cyan)?, "\"cyan\"");
        let size: FontSize = serde_json::from_str("\"extra-large\"")?;
        assert_eq!(size, FontSize::ExtraLarge);
        let draft: PointDraft =
            serde_json::from_str(r#"{"slogan":"s","promptEn":"e","promptZh":"z"}"#)?;
        assert_eq!(draft.prompt_en, "e");
        Ok(())
    }
}
