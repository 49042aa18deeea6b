use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ClassVocabulary, SplitDirs};
use crate::utils::create_output_directory;

/// Set up `<output>/<split>/{images,labels}` for every split.
pub fn setup_output_directories(output_dir: &Path, splits: &[String]) -> Result<Vec<SplitDirs>> {
    splits
        .iter()
        .map(|split| {
            let root = output_dir.join(split);
            Ok(SplitDirs {
                name: split.clone(),
                images_dir: create_output_directory(&root.join("images"))?,
                labels_dir: create_output_directory(&root.join("labels"))?,
            })
        })
        .collect()
}

/// Write a whole file, replacing any previous contents.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_output_directory(parent)?;
    }
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::io(path, e))
}

// Key used by the trainer's data.yaml for a split directory name
fn yaml_key(split: &str) -> Option<&'static str> {
    match split {
        "train" => Some("train"),
        "val" | "validation" => Some("val"),
        "test" => Some("test"),
        _ => None,
    }
}

/// Create the data.yaml file consumed by the YOLO trainer.
pub fn create_dataset_yaml(
    output_dir: &Path,
    splits: &[String],
    vocabulary: &ClassVocabulary,
) -> Result<PathBuf> {
    let dataset_yaml_path = output_dir.join("data.yaml");
    let absolute_path = fs::canonicalize(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let mut yaml_content = format!("path: {}\n", absolute_path.to_string_lossy());

    for split in splits {
        match yaml_key(split) {
            Some(key) => yaml_content.push_str(&format!("{}: {}/images\n", key, split)),
            None => log::warn!(
                "Split '{}' has no trainer key and is left out of data.yaml",
                split
            ),
        }
    }

    yaml_content.push_str(&format!("\nnc: {}\nnames:\n", vocabulary.len()));
    for (id, label) in vocabulary.names().iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, label));
    }

    write_file(&dataset_yaml_path, yaml_content.as_bytes())?;
    Ok(dataset_yaml_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_output_directories_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let splits = vec!["train".to_string(), "validation".to_string()];
        let first = setup_output_directories(dir.path(), &splits).unwrap();
        std::fs::write(first[0].labels_dir.join("keep.txt"), "x").unwrap();

        let second = setup_output_directories(dir.path(), &splits).unwrap();
        assert_eq!(second.len(), 2);
        assert!(second[1].images_dir.ends_with("validation/images"));
        assert!(second[0].labels_dir.join("keep.txt").exists());
    }

    #[test]
    fn test_create_dataset_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let splits = vec![
            "train".to_string(),
            "validation".to_string(),
            "holdout".to_string(),
        ];
        let vocab = ClassVocabulary::new(["crazing", "scratches"]).unwrap();

        let path = create_dataset_yaml(dir.path(), &splits, &vocab).unwrap();
        let yaml_content = std::fs::read_to_string(path).unwrap();

        assert!(yaml_content.contains("path:"));
        assert!(yaml_content.contains("train: train/images"));
        assert!(yaml_content.contains("val: validation/images"));
        assert!(!yaml_content.contains("holdout"));
        assert!(yaml_content.contains("nc: 2"));
        assert!(yaml_content.contains("    0: crazing\n    1: scratches\n"));
    }

    #[test]
    fn test_write_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_file(&path, b"first line\nsecond\n").unwrap();
        write_file(&path, b"x\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x\n");
    }
}
