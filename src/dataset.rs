use glob::glob;
use image::ImageFormat;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CorpusConfig, Mode};
use crate::conversion::{convert_record, read_annotation};
use crate::enhance::ImageEnhancer;
use crate::error::{Error, Result};
use crate::io::{create_dataset_yaml, setup_output_directories, write_file};
use crate::stats::{ItemOutcome, ProcessingStats};
use crate::types::{AnnotatedImage, CategorizedImage, CorpusEntry, SplitDirs};
use crate::utils::{
    create_output_directory, create_progress_bar, find_images, output_path, output_stem,
};

/// Drives one run of the pipeline: discovery, parallel per-item processing
/// and the run summary.
pub struct CorpusBuilder {
    config: CorpusConfig,
    enhancer: ImageEnhancer,
    pool: rayon::ThreadPool,
}

impl CorpusBuilder {
    pub fn new(config: CorpusConfig) -> Result<Self> {
        if !config.input_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "input directory does not exist: {}",
                config.input_dir.display()
            )));
        }
        if config.vocabulary.is_empty() {
            return Err(Error::Configuration("class vocabulary is empty".into()));
        }
        if config.mode == Mode::Labels && config.splits.is_empty() {
            return Err(Error::Configuration("no split names configured".into()));
        }
        let enhancer = ImageEnhancer::new(config.enhancer)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot start worker pool: {}", e)))?;

        Ok(Self {
            config,
            enhancer,
            pool,
        })
    }

    pub fn run(&self) -> Result<ProcessingStats> {
        let stats = match self.config.mode {
            Mode::Labels => self.build_labels()?,
            Mode::Features => self.build_features()?,
        };
        stats.print_summary();
        Ok(stats)
    }

    /// Convert every split's annotations and pair them with their images.
    pub fn build_labels(&self) -> Result<ProcessingStats> {
        let mut discovered = Vec::with_capacity(self.config.splits.len());
        for split in &self.config.splits {
            discovered.push(self.discover_split(split)?);
        }
        let total: usize = discovered.iter().map(|items| items.len()).sum();
        if total == 0 {
            return Err(Error::Configuration(format!(
                "no images found under {} for splits {:?}",
                self.config.input_dir.display(),
                self.config.splits
            )));
        }
        let annotated = discovered
            .iter()
            .flatten()
            .filter(|item| item.annotation_path.is_file())
            .count();
        if annotated == 0 {
            return Err(Error::Configuration(format!(
                "none of the {} images under {} has an annotation",
                total,
                self.config.input_dir.display()
            )));
        }
        info!(
            "Found {} images ({} annotated) in {} splits.",
            total,
            annotated,
            discovered.len()
        );

        let split_dirs = setup_output_directories(&self.config.output_dir, &self.config.splits)?;
        let mut stats = ProcessingStats::new();
        for (items, dirs) in discovered.iter().zip(&split_dirs) {
            let duplicates = duplicate_names(items.iter().map(|i| (&i.split, &i.image_path)));
            let pb = create_progress_bar(items.len() as u64, &dirs.name);
            let outcomes = self.run_items(items, &pb, |item| {
                if duplicates.contains(&item.image_path) {
                    return ItemOutcome::Skipped {
                        path: item.image_path.clone(),
                        reason: "duplicate output name".to_string(),
                    };
                }
                self.process_annotated(item, dirs)
            });
            pb.finish_with_message(format!("{} processing complete", dirs.name));

            let split_stats: ProcessingStats = outcomes.into_iter().collect();
            info!(
                "Split '{}': {} processed, {} skipped, {} failed",
                dirs.name, split_stats.processed, split_stats.skipped, split_stats.failed
            );
            stats.merge(split_stats);
        }

        if self.config.write_yaml {
            info!("Creating data.yaml file...");
            let path = create_dataset_yaml(
                &self.config.output_dir,
                &self.config.splits,
                &self.config.vocabulary,
            )?;
            info!("Wrote {}", path.display());
        }
        Ok(stats)
    }

    /// Enhance every image found under the category directories.
    pub fn build_features(&self) -> Result<ProcessingStats> {
        let images = find_images(&self.config.input_dir, &[self.config.output_dir.as_path()]);
        if images.is_empty() {
            return Err(Error::Configuration(format!(
                "no images found under {}",
                self.config.input_dir.display()
            )));
        }
        info!("Found {} images.", images.len());

        let items: Vec<CategorizedImage> = images
            .into_iter()
            .map(|path| {
                let category = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                CategorizedImage { path, category }
            })
            .collect();

        let duplicates = duplicate_names(items.iter().map(|i| (&i.category, &i.path)));
        let pb = create_progress_bar(items.len() as u64, "Features");
        let outcomes = self.run_items(&items, &pb, |item| {
            if duplicates.contains(&item.path) {
                return ItemOutcome::Skipped {
                    path: item.path.clone(),
                    reason: "duplicate output name".to_string(),
                };
            }
            self.process_categorized(item)
        });
        pb.finish_with_message("Feature processing complete");

        Ok(outcomes.into_iter().collect())
    }

    fn run_items<T, F>(&self, items: &[T], pb: &ProgressBar, f: F) -> Vec<ItemOutcome>
    where
        T: Sync,
        F: Fn(&T) -> ItemOutcome + Sync + Send,
    {
        self.pool.install(|| {
            items
                .par_iter()
                .map(|item| {
                    let outcome = f(item);
                    pb.inc(1);
                    outcome
                })
                .collect()
        })
    }

    /// List the images of one split and the annotation file each pairs with.
    pub fn discover_split(&self, split: &str) -> Result<Vec<AnnotatedImage>> {
        let split_dir = self.config.input_dir.join(split);
        let images_dir = split_dir.join("images");
        let annotations_dir = split_dir.join("annotations");
        if !images_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "split '{}' has no images directory at {}",
                split,
                images_dir.display()
            )));
        }
        if !annotations_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "split '{}' has no annotations directory at {}",
                split,
                annotations_dir.display()
            )));
        }

        let items: Vec<AnnotatedImage> = find_images(&images_dir, &[])
            .into_iter()
            .map(|image_path| {
                let mut name = image_path.file_stem().unwrap_or_default().to_os_string();
                name.push(".xml");
                let annotation_path = annotations_dir.join(name);
                AnnotatedImage {
                    split: split.to_string(),
                    image_path,
                    annotation_path,
                }
            })
            .collect();

        report_orphan_annotations(&annotations_dir, &items);
        Ok(items)
    }

    fn output_image(&self, src: &Path, dir: &Path, stem: &str) -> Result<(PathBuf, ImageFormat)> {
        match self.config.image_format {
            Some(kind) => Ok((output_path(dir, stem, kind.extension()), kind.format())),
            None => {
                let format = ImageFormat::from_path(src).map_err(|e| Error::Decode {
                    path: src.to_path_buf(),
                    reason: e.to_string(),
                })?;
                let ext = src
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok((output_path(dir, stem, &ext), format))
            }
        }
    }

    fn process_categorized(&self, item: &CategorizedImage) -> ItemOutcome {
        if !self.config.vocabulary.contains(&item.category) {
            return ItemOutcome::Skipped {
                path: item.path.clone(),
                reason: format!("unrecognized category '{}'", item.category),
            };
        }
        let stem = match output_stem(&item.path) {
            Some(stem) => stem,
            None => {
                return ItemOutcome::Skipped {
                    path: item.path.clone(),
                    reason: "unusable file name".to_string(),
                }
            }
        };

        let result = create_output_directory(&self.config.output_dir.join(&item.category))
            .and_then(|dir| self.output_image(&item.path, &dir, &stem))
            .and_then(|(dst, format)| {
                self.enhancer.enhance_file(&item.path, &dst, format)?;
                Ok(CorpusEntry {
                    image_path: dst,
                    label_path: None,
                })
            });

        match result {
            Ok(entry) => {
                debug!("Wrote {}", entry.image_path.display());
                ItemOutcome::Processed {
                    written_boxes: 0,
                    unknown_class: 0,
                    invalid_geometry: 0,
                }
            }
            Err(error) => ItemOutcome::Failed {
                path: item.path.clone(),
                error,
            },
        }
    }

    fn process_annotated(&self, item: &AnnotatedImage, dirs: &SplitDirs) -> ItemOutcome {
        if !item.annotation_path.is_file() {
            return ItemOutcome::Skipped {
                path: item.image_path.clone(),
                reason: "missing annotation".to_string(),
            };
        }
        let stem = match output_stem(&item.image_path) {
            Some(stem) => stem,
            None => {
                return ItemOutcome::Skipped {
                    path: item.image_path.clone(),
                    reason: "unusable file name".to_string(),
                }
            }
        };

        let record = match read_annotation(&item.annotation_path) {
            Ok(record) => record,
            Err(error) => {
                return ItemOutcome::Failed {
                    path: item.annotation_path.clone(),
                    error,
                }
            }
        };
        let conversion = convert_record(&record, &self.config.vocabulary, &item.annotation_path);

        match self.write_entry(item, dirs, &stem, &conversion.to_label_text()) {
            Ok(entry) => {
                if let Some(label) = &entry.label_path {
                    debug!(
                        "Wrote {} with {}",
                        entry.image_path.display(),
                        label.display()
                    );
                }
                ItemOutcome::Processed {
                    written_boxes: conversion.boxes.len(),
                    unknown_class: conversion.unknown_class,
                    invalid_geometry: conversion.invalid_geometry,
                }
            }
            Err(error) => ItemOutcome::Failed {
                path: item.image_path.clone(),
                error,
            },
        }
    }

    // Image first, then label, so a failed image never leaves a label behind.
    fn write_entry(
        &self,
        item: &AnnotatedImage,
        dirs: &SplitDirs,
        stem: &str,
        label_text: &str,
    ) -> Result<CorpusEntry> {
        let (image_dst, format) = self.output_image(&item.image_path, &dirs.images_dir, stem)?;
        if self.config.enhance_labeled_images {
            self.enhancer.enhance_file(&item.image_path, &image_dst, format)?;
        } else if self.config.image_format.is_some() {
            reencode(&item.image_path, &image_dst, format)?;
        } else {
            fs::copy(&item.image_path, &image_dst).map_err(|e| Error::io(&item.image_path, e))?;
        }

        let label_dst = output_path(&dirs.labels_dir, stem, "txt");
        if let Err(e) = write_file(&label_dst, label_text.as_bytes()) {
            let _ = fs::remove_file(&image_dst);
            return Err(e);
        }

        Ok(CorpusEntry {
            image_path: image_dst,
            label_path: Some(label_dst),
        })
    }
}

fn reencode(src: &Path, dst: &Path, format: ImageFormat) -> Result<()> {
    let bytes = fs::read(src).map_err(|e| Error::io(src, e))?;
    let image = crate::enhance::decode(&bytes, src)?;
    let mut buf = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buf, format).map_err(|e| Error::Encode {
        path: dst.to_path_buf(),
        reason: e.to_string(),
    })?;
    write_file(dst, buf.get_ref())
}

/// Paths whose (group, output stem) collides with an earlier path. The
/// first path in sorted order keeps the name.
fn duplicate_names<'a, I>(items: I) -> HashSet<PathBuf>
where
    I: Iterator<Item = (&'a String, &'a PathBuf)>,
{
    let mut seen: BTreeMap<(String, String), &PathBuf> = BTreeMap::new();
    let mut duplicates = HashSet::new();
    for (group, path) in items {
        let Some(stem) = output_stem(path) else { continue };
        if let Some(first) = seen.get(&(group.clone(), stem.clone())) {
            warn!(
                "{} has the same output name as {}",
                path.display(),
                first.display()
            );
            duplicates.insert(path.clone());
        } else {
            seen.insert((group.clone(), stem), path);
        }
    }
    duplicates
}

fn report_orphan_annotations(annotations_dir: &Path, items: &[AnnotatedImage]) {
    let pattern = format!(
        "{}/*.xml",
        glob::Pattern::escape(&annotations_dir.to_string_lossy())
    );
    let paired: HashSet<&Path> = items.iter().map(|i| i.annotation_path.as_path()).collect();
    let orphans = match glob(&pattern) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|path| !paired.contains(path.as_path()))
            .count(),
        Err(e) => {
            warn!("Cannot list annotations in {}: {}", annotations_dir.display(), e);
            return;
        }
    };
    if orphans > 0 {
        warn!(
            "{} annotation files in {} have no matching image",
            orphans,
            annotations_dir.display()
        );
    }
}
