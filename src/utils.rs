use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::get_image_extensions_set;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory and its parents if absent. Concurrent creation of the
/// same path is not an error.
pub fn create_output_directory(path: &Path) -> Result<PathBuf> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(_) if path.is_dir() => Ok(path.to_path_buf()),
        Err(e) => Err(Error::io(path, e)),
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// Recursively collect image files under `root`, sorted by path. Directories
/// named in `exclude` are not descended into.
pub fn find_images(root: &Path, exclude: &[&Path]) -> Vec<PathBuf> {
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()))
        .collect();

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .skip_hidden(false)
        .sort(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|entry| match entry {
                Ok(e) if e.file_type().is_dir() => {
                    let path = fs::canonicalize(e.path()).unwrap_or_else(|_| e.path());
                    !exclude.iter().any(|x| *x == path)
                }
                _ => true,
            });
        })
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image_file(&e.path()))
        .map(|e| e.path())
        .collect();
    images.sort();
    images
}

/// Output base name for a source file: its sanitized stem.
pub fn output_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let sanitized = sanitize_filename::sanitize(stem);
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// `<dir>/<stem>.<ext>`, keeping any dots inside the stem.
pub fn output_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, ext))
}
