//! Responsive image variants: decode, resize per variant, re-encode.
//!
//! Each raster source (png, jpg, webp) yields one output per configured
//! variant (by default `@1x` at half width and `@2x` at full width). The
//! configured quality applies to jpeg; webp is re-encoded lossless. A
//! `.jpeg` extension is normalized to `.jpg` on output. Anything else under
//! the image tree is copied byte-for-byte into every variant directory so
//! all image artifacts live under the variant subdirs.

use super::{FileTransform, OutputFile, TransformError};
use crate::config::{ImageVariant, ImagesConfig};
use crate::pipeline::discovery::glob_base;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageOutputFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub struct ImageTransform {
    base: PathBuf,
    dest: PathBuf,
    quality: u8,
    variants: Vec<ImageVariant>,
}

impl ImageTransform {
    pub fn new(config: &ImagesConfig) -> Self {
        let base = config.sources.first().map(|p| glob_base(p)).unwrap_or_default();
        Self {
            base,
            dest: config.dest.clone(),
            quality: config.quality,
            variants: config.variants.clone(),
        }
    }

    fn err(&self, source: &Path, e: impl std::fmt::Display) -> TransformError {
        TransformError::Image { path: source.to_path_buf(), message: e.to_string() }
    }

    fn encode(
        &self,
        img: &DynamicImage,
        ext: &str,
        source: &Path,
    ) -> Result<Vec<u8>, TransformError> {
        let mut buf = Vec::new();
        match ext {
            "jpg" | "jpeg" => {
                // JPEG has no alpha channel
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                    .map_err(|e| self.err(source, e))?;
            }
            "webp" => {
                let rgba = img.to_rgba8();
                WebPEncoder::new_lossless(&mut buf)
                    .encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
                    .map_err(|e| self.err(source, e))?;
            }
            _ => {
                img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
                    .map_err(|e| self.err(source, e))?;
            }
        }
        Ok(buf)
    }
}

impl FileTransform for ImageTransform {
    fn transform(&self, root: &Path, source: &Path) -> Result<Vec<OutputFile>, TransformError> {
        let rel = source.strip_prefix(&self.base).unwrap_or(source);
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "webp") {
            // Non-raster assets under the image tree pass through untouched,
            // one copy per variant directory
            let bytes = std::fs::read(root.join(source))?;
            return Ok(self
                .variants
                .iter()
                .map(|v| {
                    OutputFile::new(self.dest.join(&v.subdir).join(rel), bytes.clone())
                })
                .collect());
        }

        let img = image::open(root.join(source)).map_err(|e| self.err(source, e))?;
        let out_rel = if ext == "jpeg" { rel.with_extension("jpg") } else { rel.to_path_buf() };

        let mut outputs = Vec::with_capacity(self.variants.len());
        for variant in &self.variants {
            let scaled = if variant.width_percent >= 100 {
                img.clone()
            } else {
                let w = (img.width() * variant.width_percent / 100).max(1);
                let h = (img.height() * variant.width_percent / 100).max(1);
                img.resize(w, h, FilterType::Lanczos3)
            };
            let bytes = self.encode(&scaled, ext.as_str(), source)?;
            outputs.push(OutputFile::new(
                self.dest.join(&variant.subdir).join(&out_rel),
                bytes,
            ));
        }
        Ok(outputs)
    }
}
