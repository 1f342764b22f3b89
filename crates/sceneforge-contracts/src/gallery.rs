use chrono::{DateTime, Utc};

use crate::ids::{ImageId, PointId, ResultId};
use crate::media::ImagePayload;

/// One rendered output. Text fields are snapshots taken at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedResult {
    pub id: ResultId,
    pub output_image: ImagePayload,
    pub final_prompt_text: String,
    pub slogan: String,
    pub source_image_id: ImageId,
    /// Identity of the point that produced this result; the re-render join key.
    pub point_id: PointId,
    pub created_at: DateTime<Utc>,
}

/// The only mutable part of a stored result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPatch {
    pub output_image: ImagePayload,
    pub created_at: DateTime<Utc>,
}

/// Rendered outputs, newest batch first.
#[derive(Debug, Default)]
pub struct ResultGallery {
    results: Vec<GeneratedResult>,
}

impl ResultGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `results` as one block, keeping their relative order.
    /// Entries whose id is already present are dropped.
    pub fn append(&mut self, results: Vec<GeneratedResult>, at_front: bool) -> usize {
        let mut fresh = Vec::with_capacity(results.len());
        for result in results {
            let duplicate = self.get(&result.id).is_some()
                || fresh
                    .iter()
                    .any(|existing: &GeneratedResult| existing.id == result.id);
            if duplicate {
                tracing::warn!(result = %result.id, "dropping result with duplicate id");
                continue;
            }
            fresh.push(result);
        }
        let inserted = fresh.len();
        if at_front {
            fresh.append(&mut self.results);
            self.results = fresh;
        } else {
            self.results.extend(fresh);
        }
        inserted
    }

    pub fn update_in_place(&mut self, id: &ResultId, patch: ResultPatch) -> bool {
        let Some(result) = self.results.iter_mut().find(|result| &result.id == id) else {
            return false;
        };
        result.output_image = patch.output_image;
        result.created_at = patch.created_at;
        true
    }

    pub fn get(&self, id: &ResultId) -> Option<&GeneratedResult> {
        self.results.iter().find(|result| &result.id == id)
    }

    pub fn position(&self, id: &ResultId) -> Option<usize> {
        self.results.iter().position(|result| &result.id == id)
    }

    pub fn list(&self) -> &[GeneratedResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn result(id: &str) -> GeneratedResult {
        GeneratedResult {
            id: ResultId::from(id),
            output_image: ImagePayload::new(id.as_bytes().to_vec(), "image/png"),
            final_prompt_text: format!("{id} prompt"),
            slogan: format!("{id} slogan"),
            source_image_id: ImageId::from("img-1"),
            point_id: PointId::from("pt-1"),
            created_at: Utc::now(),
        }
    }

    fn ids(gallery: &ResultGallery) -> Vec<&str> {
        gallery.list().iter().map(|result| result.id.as_str()).collect()
    }

    #[test]
    fn newest_batch_goes_first_as_a_block() {
        let mut gallery = ResultGallery::new();
        gallery.append(vec![result("a"), result("b")], true);
        gallery.append(vec![result("c"), result("d")], true);
        assert_eq!(ids(&gallery), vec!["c", "d", "a", "b"]);

        gallery.append(vec![result("e")], false);
        assert_eq!(ids(&gallery), vec!["c", "d", "a", "b", "e"]);
    }

    #[test]
    fn append_keeps_ids_unique() {
        let mut gallery = ResultGallery::new();
        assert_eq!(gallery.append(vec![result("a"), result("a")], true), 1);
        assert_eq!(gallery.append(vec![result("a"), result("b")], true), 1);
        assert_eq!(ids(&gallery), vec!["b", "a"]);
    }

    #[test]
    fn update_in_place_only_touches_image_and_timestamp() {
        let mut gallery = ResultGallery::new();
        gallery.append(vec![result("a"), result("b")], true);
        let before = gallery.get(&ResultId::from("b")).cloned();
        let stamp = Utc::now() + Duration::seconds(5);

        let updated = gallery.update_in_place(
            &ResultId::from("b"),
            ResultPatch {
                output_image: ImagePayload::new(vec![1, 2, 3], "image/png"),
                created_at: stamp,
            },
        );
        assert!(updated);
        assert_eq!(gallery.position(&ResultId::from("b")), Some(1));

        let after = gallery.get(&ResultId::from("b")).cloned();
        let (Some(before), Some(after)) = (before, after) else {
            panic!("result missing");
        };
        assert_eq!(after.output_image.bytes, vec![1, 2, 3]);
        assert_eq!(after.created_at, stamp);
        assert_eq!(after.slogan, before.slogan);
        assert_eq!(after.final_prompt_text, before.final_prompt_text);
        assert!(!gallery.update_in_place(
            &ResultId::from("zz"),
            ResultPatch {
                output_image: ImagePayload::new(Vec::new(), "image/png"),
                created_at: stamp,
            },
        ));
    }
}
