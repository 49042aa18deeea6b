use log::{debug, warn};
use std::path::Path;

use crate::error::{Error, Result};
use crate::geometry::normalize_box;
use crate::types::{AnnotationRecord, ClassVocabulary, NormalizedBox, ObjectBox};

/// Label lines of one record plus the objects that were left out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Conversion {
    pub boxes: Vec<NormalizedBox>,
    pub unknown_class: usize,
    pub invalid_geometry: usize,
}

impl Conversion {
    /// Label file contents, one newline-terminated line per retained box
    pub fn to_label_text(&self) -> String {
        let mut text = String::with_capacity(self.boxes.len() * 48);
        for b in &self.boxes {
            text.push_str(&b.to_label_line());
            text.push('\n');
        }
        text
    }
}

/// Read and parse a single annotation XML file.
pub fn read_annotation(path: &Path) -> Result<AnnotationRecord> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let xml = String::from_utf8(bytes).map_err(|e| Error::MalformedAnnotation {
        path: path.to_path_buf(),
        reason: format!("not UTF-8: {}", e),
    })?;
    parse_annotation(&xml, path)
}

/// Parse an annotation from an in-memory XML document.
pub fn parse_annotation(xml: &str, path: &Path) -> Result<AnnotationRecord> {
    serde_xml_rs::from_str(xml).map_err(|e| Error::MalformedAnnotation {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Convert a record to detector boxes.
///
/// Objects outside the vocabulary and objects with impossible bounds are
/// dropped one by one; the remaining boxes keep their source order.
pub fn convert_record(
    record: &AnnotationRecord,
    vocabulary: &ClassVocabulary,
    source: &Path,
) -> Conversion {
    let mut conversion = Conversion::default();

    for object in &record.objects {
        let class_id = match vocabulary.id_of(object.name.trim()) {
            Some(id) => id,
            None => {
                debug!(
                    "Skipping object of unknown class '{}' in {}",
                    object.name,
                    source.display()
                );
                conversion.unknown_class += 1;
                continue;
            }
        };

        match normalize_object(object, record) {
            Ok((x_center, y_center, width, height)) => conversion.boxes.push(NormalizedBox {
                class_id,
                x_center,
                y_center,
                width,
                height,
            }),
            Err(e) => {
                warn!("Skipping box in {}: {}", source.display(), e);
                conversion.invalid_geometry += 1;
            }
        }
    }

    conversion
}

fn normalize_object(object: &ObjectBox, record: &AnnotationRecord) -> Result<(f64, f64, f64, f64)> {
    let b = &object.bbox;
    normalize_box(
        b.xmin,
        b.xmax,
        b.ymin,
        b.ymax,
        record.size.width,
        record.size.height,
    )
}
