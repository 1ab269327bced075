//! I/O helpers for grayscale frames and JSON.
//!
//! - `read_page` / `read_frames`: decode one page or every page of a TIFF
//!   (8/16-bit integer or 32-bit float grayscale) or a PNG into `ImageF32`.
//! - `count_pages`, `frame_dimensions`: cheap header probes.
//! - `write_frame`, `write_tiff_pages`: encode back into a sample format.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::ImageF32;
use crate::error::ImageError;
use image::{DynamicImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;

/// On-disk sample type of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    U16,
    F32,
}

impl SampleFormat {
    /// Inclusive range a rescaled sample is clipped to.
    pub fn valid_range(self) -> (f32, f32) {
        match self {
            SampleFormat::U8 => (0.0, u8::MAX as f32),
            SampleFormat::U16 => (0.0, u16::MAX as f32),
            SampleFormat::F32 => (f32::MIN, f32::MAX),
        }
    }
}

/// A decoded frame together with the format it was stored in.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: ImageF32,
    pub format: SampleFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Container {
    Tiff,
    Png,
}

fn container_of(path: &Path) -> Option<Container> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "tif" | "tiff" => Some(Container::Tiff),
        "png" => Some(Container::Png),
        _ => None,
    }
}

/// Whether `path` has an extension this module can decode.
pub fn is_frame_file(path: &Path) -> bool {
    container_of(path).is_some()
}

fn require_container(path: &Path) -> Result<Container, ImageError> {
    container_of(path).ok_or_else(|| ImageError::Unsupported {
        path: path.to_path_buf(),
        layout: "unknown file extension".to_string(),
    })
}

fn open_tiff(path: &Path) -> Result<Decoder<BufReader<File>>, ImageError> {
    let file = File::open(path).map_err(|e| ImageError::io(path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| decode_error(path, e))
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> ImageError {
    ImageError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn encode_error(path: &Path, err: impl std::fmt::Display) -> ImageError {
    ImageError::Encode {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Number of pages stored in `path` (always 1 for PNG).
pub fn count_pages(path: &Path) -> Result<usize, ImageError> {
    match require_container(path)? {
        Container::Png => Ok(1),
        Container::Tiff => {
            let mut decoder = open_tiff(path)?;
            let mut pages = 1;
            while decoder.more_images() {
                decoder.next_image().map_err(|e| decode_error(path, e))?;
                pages += 1;
            }
            Ok(pages)
        }
    }
}

/// `(width, height)` of the first page without decoding pixel data.
pub fn frame_dimensions(path: &Path) -> Result<(usize, usize), ImageError> {
    let (w, h) = match require_container(path)? {
        Container::Tiff => open_tiff(path)?
            .dimensions()
            .map_err(|e| decode_error(path, e))?,
        Container::Png => image::image_dimensions(path).map_err(|e| decode_error(path, e))?,
    };
    Ok((w as usize, h as usize))
}

/// Decode page `page` of `path`.
pub fn read_page(path: &Path, page: usize) -> Result<Frame, ImageError> {
    match require_container(path)? {
        Container::Tiff => {
            let mut decoder = open_tiff(path)?;
            if page > 0 {
                decoder
                    .seek_to_image(page)
                    .map_err(|e| decode_error(path, e))?;
            }
            decode_current(&mut decoder, path)
        }
        Container::Png => {
            if page != 0 {
                return Err(ImageError::IndexOutOfRange { index: page, len: 1 });
            }
            read_png(path)
        }
    }
}

/// Decode every page of `path` in file order.
pub fn read_frames(path: &Path) -> Result<Vec<Frame>, ImageError> {
    match require_container(path)? {
        Container::Png => Ok(vec![read_png(path)?]),
        Container::Tiff => {
            let mut decoder = open_tiff(path)?;
            let mut frames = vec![decode_current(&mut decoder, path)?];
            while decoder.more_images() {
                decoder.next_image().map_err(|e| decode_error(path, e))?;
                frames.push(decode_current(&mut decoder, path)?);
            }
            Ok(frames)
        }
    }
}

fn decode_current<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Frame, ImageError> {
    let (w, h) = decoder.dimensions().map_err(|e| decode_error(path, e))?;
    let color = decoder.colortype().map_err(|e| decode_error(path, e))?;
    if !matches!(color, ColorType::Gray(_)) {
        return Err(ImageError::Unsupported {
            path: path.to_path_buf(),
            layout: format!("{color:?}"),
        });
    }
    let (data, format) = match decoder.read_image().map_err(|e| decode_error(path, e))? {
        DecodingResult::U8(d) => (d.into_iter().map(f32::from).collect(), SampleFormat::U8),
        DecodingResult::U16(d) => (d.into_iter().map(f32::from).collect(), SampleFormat::U16),
        DecodingResult::F32(d) => (d, SampleFormat::F32),
        DecodingResult::F64(d) => (d.into_iter().map(|v| v as f32).collect(), SampleFormat::F32),
        _ => {
            return Err(ImageError::Unsupported {
                path: path.to_path_buf(),
                layout: format!("{color:?} with integer samples wider than 16 bits"),
            })
        }
    };
    let image = ImageF32::from_vec(w as usize, h as usize, data)?;
    Ok(Frame { image, format })
}

fn read_png(path: &Path) -> Result<Frame, ImageError> {
    let img = image::open(path).map_err(|e| decode_error(path, e))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (data, format) = match img {
        DynamicImage::ImageLuma8(buf) => (
            buf.into_raw().into_iter().map(f32::from).collect(),
            SampleFormat::U8,
        ),
        other => (
            other.into_luma16().into_raw().into_iter().map(f32::from).collect(),
            SampleFormat::U16,
        ),
    };
    let image = ImageF32::from_vec(w, h, data)?;
    Ok(Frame { image, format })
}

/// Write one frame; the container follows the extension of `path`.
pub fn write_frame(path: &Path, image: &ImageF32, format: SampleFormat) -> Result<(), ImageError> {
    match require_container(path)? {
        Container::Tiff => write_tiff_pages(path, std::slice::from_ref(image), format),
        Container::Png => write_png(path, image, format),
    }
}

/// Write `pages` into one (multi-page) TIFF container.
pub fn write_tiff_pages(
    path: &Path,
    pages: &[ImageF32],
    format: SampleFormat,
) -> Result<(), ImageError> {
    ensure_parent_dir(path)?;
    let file = File::create(path).map_err(|e| ImageError::io(path, e))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| encode_error(path, e))?;
    for page in pages {
        let (w, h) = (page.w as u32, page.h as u32);
        let written = match format {
            SampleFormat::U8 => {
                encoder.write_image::<colortype::Gray8>(w, h, &quantize_u8(&page.data))
            }
            SampleFormat::U16 => {
                encoder.write_image::<colortype::Gray16>(w, h, &quantize_u16(&page.data))
            }
            SampleFormat::F32 => encoder.write_image::<colortype::Gray32Float>(w, h, &page.data),
        };
        written.map_err(|e| encode_error(path, e))?;
    }
    Ok(())
}

fn write_png(path: &Path, image: &ImageF32, format: SampleFormat) -> Result<(), ImageError> {
    ensure_parent_dir(path)?;
    let (w, h) = (image.w as u32, image.h as u32);
    let dynamic = match format {
        SampleFormat::U8 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, quantize_u8(&image.data))
            .map(DynamicImage::ImageLuma8),
        SampleFormat::U16 => {
            ImageBuffer::<Luma<u16>, _>::from_raw(w, h, quantize_u16(&image.data))
                .map(DynamicImage::ImageLuma16)
        }
        SampleFormat::F32 => {
            return Err(ImageError::Unsupported {
                path: path.to_path_buf(),
                layout: "32-bit float samples in PNG".to_string(),
            })
        }
    };
    dynamic
        .ok_or_else(|| encode_error(path, "failed to create image buffer"))?
        .save(path)
        .map_err(|e| encode_error(path, e))
}

fn quantize_u8(data: &[f32]) -> Vec<u8> {
    data.iter()
        .map(|&v| v.round().clamp(0.0, u8::MAX as f32) as u8)
        .collect()
}

fn quantize_u16(data: &[f32]) -> Vec<u16> {
    data.iter()
        .map(|&v| v.round().clamp(0.0, u16::MAX as f32) as u16)
        .collect()
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ImageError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| encode_error(path, e))?;
    fs::write(path, json).map_err(|e| ImageError::io(path, e))
}

/// `create_dir_all` on the parent; an existing directory counts as success,
/// including one created concurrently by another worker.
pub fn ensure_parent_dir(path: &Path) -> Result<(), ImageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ImageError::io(parent, e))?;
        }
    }
    Ok(())
}
