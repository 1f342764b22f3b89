use std::sync::Arc;

use crate::ids::{IdGenerator, ImageId};
use crate::media::{decode_upload, SourceImage, UploadFile};

/// Hard cap on concurrently held source images.
pub const MAX_SOURCE_IMAGES: usize = 9;

/// What happened to one `upload` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub added: Vec<ImageId>,
    /// Files beyond the remaining capacity, dropped without decoding.
    pub clamped: usize,
    /// Files that failed to decode, with the reason.
    pub rejected: Vec<(String, String)>,
}

/// Owns the uploaded source images and the single active selection.
///
/// `active` is always `None` or the id of a held image.
pub struct ImageLibrary {
    images: Vec<SourceImage>,
    active: Option<ImageId>,
    ids: Arc<dyn IdGenerator>,
}

impl ImageLibrary {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            images: Vec::new(),
            active: None,
            ids,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_SOURCE_IMAGES.saturating_sub(self.images.len())
    }

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    pub fn get(&self, id: &ImageId) -> Option<&SourceImage> {
        self.images.iter().find(|image| &image.id == id)
    }

    pub fn active_id(&self) -> Option<&ImageId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&SourceImage> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// Accepts up to the remaining capacity, in order; the rest are ignored.
    ///
    /// Every accepted file is decoded before any of them becomes visible. A
    /// file that fails to decode is skipped without blocking the others.
    pub fn upload(&mut self, files: Vec<UploadFile>) -> UploadReport {
        let capacity = self.remaining_capacity();
        let clamped = files.len().saturating_sub(capacity);
        let mut report = UploadReport {
            clamped,
            ..UploadReport::default()
        };

        let mut decoded = Vec::new();
        for file in files.into_iter().take(capacity) {
            match decode_upload(&file) {
                Ok((payload, origin)) => decoded.push(SourceImage {
                    id: ImageId::generate(self.ids.as_ref()),
                    payload,
                    origin,
                }),
                Err(err) => {
                    tracing::warn!(
                        file = %file.name,
                        error = %format!("{err:#}"),
                        "upload decode failed"
                    );
                    report.rejected.push((file.name, format!("{err:#}")));
                }
            }
        }

        report.added = decoded.iter().map(|image| image.id.clone()).collect();
        if self.active.is_none() {
            self.active = report.added.first().cloned();
        }
        self.images.extend(decoded);
        if clamped > 0 {
            tracing::debug!(clamped, "upload clamped at capacity");
        }
        report
    }

    /// Swaps the payload of `id` in place. Returns false when `id` is gone or
    /// the file fails to decode; the library is untouched in both cases.
    pub fn replace(&mut self, id: &ImageId, file: UploadFile) -> bool {
        let Some(slot) = self.images.iter_mut().find(|image| &image.id == id) else {
            return false;
        };
        match decode_upload(&file) {
            Ok((payload, origin)) => {
                slot.payload = payload;
                slot.origin = origin;
                true
            }
            Err(err) => {
                tracing::warn!(image = %id, error = %format!("{err:#}"), "replace decode failed");
                false
            }
        }
    }

    /// Deletes `id`. If it was active, the first remaining image takes over.
    pub fn remove(&mut self, id: &ImageId) -> Option<SourceImage> {
        let idx = self.images.iter().position(|image| &image.id == id)?;
        let removed = self.images.remove(idx);
        if self.active.as_ref() == Some(id) {
            self.active = self.images.first().map(|image| image.id.clone());
        }
        Some(removed)
    }

    /// Unknown ids are ignored.
    pub fn set_active(&mut self, id: &ImageId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id.clone());
        true
    }
}
