use std::sync::Arc;

use sceneforge_contracts::{EditablePointStore, Language, PointField, PointId};

use crate::services::PromptTranslator;
use crate::util::error_chain_text;

/// What prompted a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The user pressed translate on a field.
    Explicit,
    /// Editing focus left a prompt field.
    Blur,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to translate, or the point is gone.
    Skipped,
    /// `target` now holds the translation of the source field.
    Updated { target: Language },
    /// The translation service failed; no field changed.
    Failed,
}

/// Keeps the two prompt languages of a point describing the same scene.
///
/// Only the field opposite the one the user edited is ever written.
#[derive(Clone)]
pub struct TranslationSyncController {
    translator: Arc<dyn PromptTranslator>,
}

impl TranslationSyncController {
    pub fn new(translator: Arc<dyn PromptTranslator>) -> Self {
        Self { translator }
    }

    pub fn sync_from(
        &self,
        store: &mut EditablePointStore,
        id: &PointId,
        source: Language,
    ) -> SyncOutcome {
        let Some(point) = store.get(id) else {
            return SyncOutcome::Skipped;
        };
        let text = point.prompt(source).to_string();
        if text.is_empty() {
            return SyncOutcome::Skipped;
        }

        let target = source.other();
        match self.translator.translate(&text, target) {
            Ok(translated) => {
                if store.update_field(id, PointField::Prompt(target, translated)) {
                    SyncOutcome::Updated { target }
                } else {
                    SyncOutcome::Skipped
                }
            }
            Err(err) => {
                tracing::warn!(
                    point = %id,
                    error = %error_chain_text(&err, 300),
                    "translation sync failed; prompts left as edited"
                );
                SyncOutcome::Failed
            }
        }
    }

    pub fn on_translate_requested(
        &self,
        store: &mut EditablePointStore,
        id: &PointId,
        source: Language,
    ) -> SyncOutcome {
        self.sync_from(store, id, source)
    }

    pub fn on_blur(
        &self,
        store: &mut EditablePointStore,
        id: &PointId,
        field: Language,
    ) -> SyncOutcome {
        self.sync_from(store, id, field)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use sceneforge_contracts::{PointDraft, SequentialIds};

    use super::*;
    use crate::testing::ScriptedBackend;

    #[derive(Default)]
    struct RecordingTranslator {
        seen: Mutex<Vec<String>>,
    }

    impl PromptTranslator for RecordingTranslator {
        fn translate(&self, text: &str, _target: Language) -> anyhow::Result<String> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(text.to_string());
            }
            Ok("translated".to_string())
        }
    }

    fn store_with(prompt_zh: &str, prompt_en: &str) -> (EditablePointStore, PointId) {
        let mut store = EditablePointStore::new(Arc::new(SequentialIds::new()));
        let id = store.replace_all(vec![PointDraft {
            slogan: "Cold".to_string(),
            prompt_en: prompt_en.to_string(),
            prompt_zh: prompt_zh.to_string(),
        }])[0]
            .id
            .clone();
        (store, id)
    }

    #[test]
    fn zh_edit_overwrites_only_english() {
        let backend = Arc::new(ScriptedBackend::new());
        let sync = TranslationSyncController::new(backend.clone());
        let (mut store, id) = store_with("冰块中的杯子", "old english");

        let outcome = sync.on_blur(&mut store, &id, Language::Zh);
        assert_eq!(outcome, SyncOutcome::Updated { target: Language::En });
        let point = store.get(&id).cloned();
        assert_eq!(point.as_ref().map(|p| p.prompt_en.as_str()), Some("[en] 冰块中的杯子"));
        assert_eq!(point.as_ref().map(|p| p.prompt_zh.as_str()), Some("冰块中的杯子"));
        assert_eq!(backend.translate_calls(), 1);
    }

    #[test]
    fn en_edit_overwrites_only_chinese() {
        let sync = TranslationSyncController::new(Arc::new(ScriptedBackend::new()));
        let (mut store, id) = store_with("旧", "mug on ice");

        let outcome = sync.on_translate_requested(&mut store, &id, Language::En);
        assert_eq!(outcome, SyncOutcome::Updated { target: Language::Zh });
        assert_eq!(store.get(&id).map(|p| p.prompt_zh.as_str()), Some("[zh] mug on ice"));
        assert_eq!(store.get(&id).map(|p| p.prompt_en.as_str()), Some("mug on ice"));
    }

    #[test]
    fn empty_source_is_a_noop_even_with_failing_service() {
        let backend = Arc::new(ScriptedBackend::new().fail_translations());
        let sync = TranslationSyncController::new(backend.clone());
        let (mut store, id) = store_with("", "keep me");

        assert_eq!(sync.sync_from(&mut store, &id, Language::Zh), SyncOutcome::Skipped);
        assert_eq!(store.get(&id).map(|p| p.prompt_en.as_str()), Some("keep me"));
        assert_eq!(backend.translate_calls(), 0);
    }

    #[test]
    fn source_text_is_sent_as_typed() {
        let translator = Arc::new(RecordingTranslator::default());
        let sync = TranslationSyncController::new(translator.clone());
        let (mut store, id) = store_with("  杯子 \n", "mug");

        let outcome = sync.on_blur(&mut store, &id, Language::Zh);
        assert_eq!(outcome, SyncOutcome::Updated { target: Language::En });
        assert_eq!(store.get(&id).map(|p| p.prompt_en.as_str()), Some("translated"));
        let seen = translator.seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec!["  杯子 \n".to_string()]);
    }

    #[test]
    fn service_failure_changes_nothing() {
        let backend = ScriptedBackend::new().fail_translations();
        let sync = TranslationSyncController::new(Arc::new(backend));
        let (mut store, id) = store_with("杯子", "mug");
        let before = store.get(&id).cloned();

        assert_eq!(sync.sync_from(&mut store, &id, Language::Zh), SyncOutcome::Failed);
        assert_eq!(store.get(&id).cloned(), before);
    }

    #[test]
    fn unknown_point_is_skipped() {
        let sync = TranslationSyncController::new(Arc::new(ScriptedBackend::new()));
        let (mut store, _) = store_with("杯子", "mug");
        assert_eq!(
            sync.sync_from(&mut store, &PointId::from("pt-404"), Language::En),
            SyncOutcome::Skipped
        );
    }
}
