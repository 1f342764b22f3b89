use serde::{Deserialize, Serialize};

/// Structured description of the product in the active image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisualAnalysis {
    pub subject: String,
    pub accessories: String,
    pub materials: String,
}

impl VisualAnalysis {
    /// Installed when the analysis service fails.
    pub fn fallback() -> Self {
        Self {
            subject: "未知产品".to_string(),
            accessories: "无".to_string(),
            materials: "通用材质".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subject.trim().is_empty()
            && self.accessories.trim().is_empty()
            && self.materials.trim().is_empty()
    }

    pub fn set(&mut self, field: AnalysisField, value: impl Into<String>) {
        let slot = match field {
            AnalysisField::Subject => &mut self.subject,
            AnalysisField::Accessories => &mut self.accessories,
            AnalysisField::Materials => &mut self.materials,
        };
        *slot = value.into();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisField {
    Subject,
    Accessories,
    Materials,
}
