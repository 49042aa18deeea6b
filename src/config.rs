use clap::{Parser, ValueEnum};
use image::ImageFormat;
use std::path::PathBuf;
use std::str::FromStr;

use crate::enhance::EnhancerConfig;
use crate::error::Result;
use crate::types::{ClassVocabulary, NEU_DET_CLASSES};

/// Command-line arguments for preparing a steel defect dataset for YOLO training.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Root of the raw dataset
    #[arg(short = 'i', long = "input_dir")]
    pub input_dir: PathBuf,

    /// Root of the processed dataset
    #[arg(short = 'o', long = "output_dir", default_value = "data/processed")]
    pub output_dir: PathBuf,

    /// Pipeline stage to run
    #[arg(long = "mode", value_enum, default_value = "labels")]
    pub mode: Mode,

    /// Split directories under the input root (labels mode)
    #[arg(long = "splits", value_delimiter = ',', default_values = ["train", "validation"])]
    pub splits: Vec<String>,

    /// Ordered class names; the position of a name is its class id
    #[arg(long = "classes", value_delimiter = ',', default_values_t = NEU_DET_CLASSES.iter().map(|s| s.to_string()).collect::<Vec<_>>())]
    pub classes: Vec<String>,

    /// Side length of the square output images
    #[arg(long = "img_size", default_value_t = 640, value_parser = validate_img_size)]
    pub img_size: u32,

    /// CLAHE clip limit
    #[arg(long = "clip_limit", default_value_t = 3.0, value_parser = validate_clip_limit)]
    pub clip_limit: f32,

    /// CLAHE tiles per axis
    #[arg(long = "tile_grid", default_value_t = 8, value_parser = validate_tile_grid)]
    pub tile_grid: u32,

    /// Container format of the written images; defaults to the input's format
    #[arg(long = "image_format", value_enum)]
    pub image_format: Option<ImageKind>,

    /// Enhance the paired images in labels mode instead of copying them
    #[arg(long = "enhance")]
    pub enhance: bool,

    /// Number of worker threads, 0 for one per core
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,

    /// Do not write data.yaml in labels mode
    #[arg(long = "no_yaml")]
    pub no_yaml: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Mode {
    /// Convert annotations and pair them with images per split
    Labels,
    /// Enhance images organised in category directories
    Features,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
}

impl ImageKind {
    pub fn format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::Bmp => ImageFormat::Bmp,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Bmp => "bmp",
        }
    }
}

/// Everything the corpus builder needs for one run.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: Mode,
    pub splits: Vec<String>,
    pub vocabulary: ClassVocabulary,
    pub enhancer: EnhancerConfig,
    pub image_format: Option<ImageKind>,
    pub enhance_labeled_images: bool,
    pub workers: usize,
    pub write_yaml: bool,
}

impl CorpusConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            mode,
            splits: vec!["train".to_string(), "validation".to_string()],
            vocabulary: ClassVocabulary::neu_det(),
            enhancer: EnhancerConfig::default(),
            image_format: None,
            enhance_labeled_images: false,
            workers: 0,
            write_yaml: true,
        }
    }
}

impl Args {
    pub fn to_corpus_config(&self) -> Result<CorpusConfig> {
        Ok(CorpusConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            mode: self.mode,
            splits: self
                .splits
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            vocabulary: ClassVocabulary::new(self.classes.iter().cloned())?,
            enhancer: EnhancerConfig {
                target_size: self.img_size,
                clip_limit: self.clip_limit,
                tile_grid: self.tile_grid,
            },
            image_format: self.image_format,
            enhance_labeled_images: self.enhance,
            workers: self.workers,
            write_yaml: !self.no_yaml,
        })
    }
}

fn validate_img_size(s: &str) -> Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if (1..=16384).contains(&val) => Ok(val),
        _ => Err("SIZE must be an integer between 1 and 16384".to_string()),
    }
}

fn validate_clip_limit(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if val.is_finite() && val > 0.0 => Ok(val),
        _ => Err("CLIP_LIMIT must be a positive number".to_string()),
    }
}

fn validate_tile_grid(s: &str) -> Result<u32, String> {
    match u32::from_str(s) {
        Ok(val) if (1..=256).contains(&val) => Ok(val),
        _ => Err("TILE_GRID must be an integer between 1 and 256".to_string()),
    }
}
