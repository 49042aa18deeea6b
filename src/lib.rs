//! Steel surface defect dataset preparation for YOLO training
//!
//! This library converts Pascal VOC style XML annotations into YOLO label
//! files and builds contrast-enhanced (CLAHE) image corpora, keeping image
//! and label file names paired.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod enhance;
pub mod error;
pub mod geometry;
pub mod io;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, CorpusConfig, ImageKind, Mode};
pub use conversion::{convert_record, parse_annotation, read_annotation, Conversion};
pub use dataset::CorpusBuilder;
pub use enhance::{EnhancerConfig, ImageEnhancer};
pub use error::{Error, Result};
pub use geometry::normalize_box;
pub use stats::{ItemOutcome, ProcessingStats};
pub use types::{AnnotationRecord, ClassVocabulary, NormalizedBox, ObjectBox};
