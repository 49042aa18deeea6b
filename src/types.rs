use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{Error, Result};

// Supported image formats
pub const IMG_FORMATS: &[&str] = &["bmp", "jpeg", "jpg", "png"];

// Class names of the NEU-DET surface defect database, in class-id order
pub const NEU_DET_CLASSES: &[&str] = &[
    "crazing",
    "inclusion",
    "patches",
    "pitted_surface",
    "rolled-in_scale",
    "scratches",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Ordered, closed list of class names. The position of a name is its class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    /// Build a vocabulary, rejecting empty lists and duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(Error::Configuration("empty class name in vocabulary".into()));
            }
            if !seen.insert(name.clone()) {
                return Err(Error::Configuration(format!(
                    "duplicate class name in vocabulary: {}",
                    name
                )));
            }
            ordered.push(name);
        }
        if ordered.is_empty() {
            return Err(Error::Configuration("class vocabulary is empty".into()));
        }
        Ok(Self { names: ordered })
    }

    pub fn neu_det() -> Self {
        Self {
            names: NEU_DET_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.id_of(name).is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// Pascal VOC style record, one per source image
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename = "annotation")]
pub struct AnnotationRecord {
    #[serde(default)]
    pub filename: Option<String>,
    pub size: ImageSize,
    #[serde(rename = "object", default)]
    pub objects: Vec<ObjectBox>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObjectBox {
    pub name: String,
    #[serde(rename = "bndbox")]
    pub bbox: BndBox,
}

/// Absolute pixel bounds as written in the annotation file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct BndBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Detector-ready box: class id plus center-form coordinates in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    /// One label line, without the trailing newline.
    pub fn to_label_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// A raw image together with the category derived from its parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedImage {
    pub path: PathBuf,
    pub category: String,
}

/// One source image of an annotated split and the annotation file it pairs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedImage {
    pub split: String,
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
}

/// Output unit: processed image and label file sharing a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub image_path: PathBuf,
    pub label_path: Option<PathBuf>,
}

// Struct to hold the paths to the output directories of one split
#[derive(Debug, Clone)]
pub struct SplitDirs {
    pub name: String,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_ids_follow_order() {
        let vocab = ClassVocabulary::new(["crazing", "scratches"]).unwrap();
        assert_eq!(vocab.id_of("crazing"), Some(0));
        assert_eq!(vocab.id_of("scratches"), Some(1));
        assert_eq!(vocab.id_of("patches"), None);
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_vocabulary_rejects_empty_and_duplicates() {
        assert!(matches!(
            ClassVocabulary::new(Vec::<String>::new()),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ClassVocabulary::new(["a", "b", "a"]),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ClassVocabulary::new(["a", " "]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_neu_det_vocabulary() {
        let vocab = ClassVocabulary::neu_det();
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.id_of("rolled-in_scale"), Some(4));
    }

    #[test]
    fn test_label_line_has_six_decimals() {
        let b = NormalizedBox {
            class_id: 3,
            x_center: 0.5,
            y_center: 0.25,
            width: 0.1,
            height: 1.0,
        };
        assert_eq!(b.to_label_line(), "3 0.500000 0.250000 0.100000 1.000000");
    }
}
