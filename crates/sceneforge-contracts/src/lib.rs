//! Data model and I/O-free state for the product scene studio: source images,
//! editable selling points, rendered results, settings and the event log.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod events;
pub mod gallery;
pub mod ids;
pub mod library;
pub mod media;
pub mod points;
pub mod summary;

pub use analysis::{AnalysisField, VisualAnalysis};
pub use catalog::{AspectRatio, ImageSize, RenderOptions, StyleCatalog, StyleOption};
pub use config::StudioConfig;
pub use events::{now_utc_iso, EventLog, StudioEvent};
pub use gallery::{GeneratedResult, ResultGallery, ResultPatch};
pub use ids::{IdGenerator, ImageId, PointId, ResultId, SequentialIds, UuidIds};
pub use library::{ImageLibrary, UploadReport, MAX_SOURCE_IMAGES};
pub use media::{ImagePayload, SourceImage, UploadFile};
pub use points::{
    split_points, EditablePoint, EditablePointStore, FontColor, FontSize, Language, PointDraft,
    PointField,
};
pub use summary::{write_summary, SessionSummary};
