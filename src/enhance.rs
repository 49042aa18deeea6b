//! Contrast enhancement and resizing of raw defect images.
//!
//! The transform is grayscale conversion, then contrast-limited adaptive
//! histogram equalization (CLAHE) over a tile grid, then a resize to a square
//! target. All arithmetic is fixed and single-threaded per image, so the same
//! input and configuration always produce the same pixels.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};

const BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancerConfig {
    /// Side length of the square output image.
    pub target_size: u32,
    /// CLAHE clip limit, relative to a uniform histogram.
    pub clip_limit: f32,
    /// Number of CLAHE tiles along each axis.
    pub tile_grid: u32,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self {
            target_size: 640,
            clip_limit: 3.0,
            tile_grid: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageEnhancer {
    config: EnhancerConfig,
}

impl ImageEnhancer {
    pub fn new(config: EnhancerConfig) -> Result<Self> {
        if config.target_size == 0 {
            return Err(Error::Configuration("target size must be positive".into()));
        }
        if !(config.clip_limit.is_finite() && config.clip_limit > 0.0) {
            return Err(Error::Configuration("clip limit must be positive".into()));
        }
        if config.tile_grid == 0 {
            return Err(Error::Configuration("tile grid must be positive".into()));
        }
        Ok(Self { config })
    }

    pub fn enhance(&self, image: &DynamicImage) -> GrayImage {
        let gray = to_luma(&image.to_rgb8());
        let equalized = clahe(&gray, self.config.clip_limit, self.config.tile_grid);
        resize(&equalized, self.config.target_size, self.config.target_size)
    }

    /// Decode, enhance and encode an image file. `format` selects the
    /// container of the output.
    pub fn enhance_file(&self, src: &Path, dst: &Path, format: ImageFormat) -> Result<()> {
        let bytes = std::fs::read(src).map_err(|e| Error::io(src, e))?;
        let image = decode(&bytes, src)?;
        let enhanced = self.enhance(&image);
        let encoded = encode(&enhanced, format, dst)?;
        crate::io::write_file(dst, &encoded)
    }
}

/// Decode an image from memory, sniffing the container from its contents.
pub fn decode(bytes: &[u8], path: &Path) -> Result<DynamicImage> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::io(path, e))?
        .decode()
        .map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

pub fn encode(image: &GrayImage, format: ImageFormat, path: &Path) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, format)
        .map_err(|e| Error::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(buf.into_inner())
}

/// BT.601 luma in 14-bit fixed point.
pub fn to_luma(rgb: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    const ROUND: u32 = 1 << 13;

    let (w, h) = rgb.dimensions();
    let mut out = GrayImage::new(w, h);
    for (src, dst) in rgb.pixels().zip(out.pixels_mut()) {
        let [r, g, b] = src.0;
        let y = (r as u32 * R + g as u32 * G + b as u32 * B + ROUND) >> 14;
        *dst = Luma([y.min(255) as u8]);
    }
    out
}

// Mirror index without repeating the border pixel: -1 -> 1, n -> n - 2.
fn reflect_101(i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Contrast-limited adaptive histogram equalization.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let grid = grid.max(1) as usize;
    let (w, h) = (w as usize, h as usize);

    // pad up to a multiple of the grid for histogram purposes
    let tile_w = (w + grid - 1) / grid;
    let tile_h = (h + grid - 1) / grid;
    let tile_area = tile_w * tile_h;
    let src = image.as_raw();
    let pixel = |x: usize, y: usize| -> u8 {
        let sx = reflect_101(x as i64, w as i64);
        let sy = reflect_101(y as i64, h as i64);
        src[sy * w + sx]
    };

    let clip = ((clip_limit as f64 * tile_area as f64 / BINS as f64) as usize).max(1);
    let lut_scale = (BINS - 1) as f32 / tile_area as f32;

    let mut luts = vec![[0u8; BINS]; grid * grid];
    for ty in 0..grid {
        for tx in 0..grid {
            let mut hist = [0usize; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[pixel(x, y) as usize] += 1;
                }
            }
            clip_histogram(&mut hist, clip);

            let lut = &mut luts[ty * grid + tx];
            let mut sum = 0usize;
            for (bin, count) in hist.iter().enumerate() {
                sum += count;
                lut[bin] = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let last = grid as i64 - 1;
    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let (ty1, ty2) = (ty1.max(0) as usize, (ty1 + 1).min(last) as usize);
        for x in 0..w {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let (tx1, tx2) = (tx1.max(0) as usize, (tx1 + 1).min(last) as usize);

            let v = src[y * w + x] as usize;
            let top = luts[ty1 * grid + tx1][v] as f32 * (1.0 - xa)
                + luts[ty1 * grid + tx2][v] as f32 * xa;
            let bottom = luts[ty2 * grid + tx1][v] as f32 * (1.0 - xa)
                + luts[ty2 * grid + tx2][v] as f32 * xa;
            let value = top * (1.0 - ya) + bottom * ya;
            out.put_pixel(x as u32, y as u32, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut excess = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let batch = excess / BINS;
    let mut residual = excess - batch * BINS;
    for count in hist.iter_mut() {
        *count += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            hist[bin] += 1;
            residual -= 1;
            bin += step;
        }
    }
}

/// Area-averaging weights along one axis with `dst_len <= src_len`: for
/// every output index, the source taps and their coverage.
fn area_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|i| {
            let start = i as f64 * scale;
            let end = start + scale;
            let mut taps = Vec::new();
            let mut s = start.floor() as usize;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min((s + 1) as f64);
                if hi > lo {
                    taps.push((s, ((hi - lo) / scale) as f32));
                }
                s += 1;
            }
            taps
        })
        .collect()
}

// Separable area average; both target sides must be no larger than the source.
fn area_resize(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (sw, sh) = (image.width() as usize, image.height() as usize);
    let dw = width as usize;
    let src = image.as_raw();
    let xw = area_weights(sw, dw);
    let yw = area_weights(sh, height as usize);

    // horizontal pass into an f32 buffer of dw x sh
    let mut tmp = vec![0f32; dw * sh];
    for y in 0..sh {
        let row = &src[y * sw..(y + 1) * sw];
        for (x, taps) in xw.iter().enumerate() {
            tmp[y * dw + x] = taps.iter().map(|&(s, wt)| row[s] as f32 * wt).sum();
        }
    }

    let mut out = GrayImage::new(width, height);
    for (y, taps) in yw.iter().enumerate() {
        for x in 0..dw {
            let v: f32 = taps.iter().map(|&(s, wt)| tmp[s * dw + x] * wt).sum();
            out.put_pixel(x as u32, y as u32, Luma([v.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Resize a grayscale image: area averaging along a shrinking axis,
/// bilinear (`FilterType::Triangle`) along a growing one.
pub fn resize(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (sw, sh) = image.dimensions();
    if sw == 0 || sh == 0 || width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }
    if (sw, sh) == (width, height) {
        return image.clone();
    }

    let (aw, ah) = (width.min(sw), height.min(sh));
    let shrunk = if (aw, ah) != (sw, sh) {
        area_resize(image, aw, ah)
    } else {
        image.clone()
    };
    if (aw, ah) == (width, height) {
        shrunk
    } else {
        imageops::resize(&shrunk, width, height, FilterType::Triangle)
    }
}
