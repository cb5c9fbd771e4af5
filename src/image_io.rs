use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, ImageFormat, RgbImage};

use crate::errors::{Result, SegmentationError};
use crate::image_utils::BinaryMask;

/// Extensions picked up when scanning an input directory
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Represents an input image with its metadata
pub struct InputImage {
    pub image: RgbImage,
    pub path: PathBuf,
    pub filename: String,
}

/// Get all supported image files from a directory (recursively)
pub fn get_image_files_in_dir<P: AsRef<Path>>(dir_path: P) -> Result<Vec<PathBuf>> {
    let dir_path = dir_path.as_ref();

    if !dir_path.exists() {
        return Err(SegmentationError::InvalidPath(dir_path.to_path_buf()));
    }

    if !dir_path.is_dir() {
        return Err(SegmentationError::Config(format!(
            "{} is not a directory", dir_path.display()
        )));
    }

    let mut files = Vec::new();
    find_image_files_recursive(dir_path, &mut files)?;
    files.sort();

    Ok(files)
}

fn find_image_files_recursive(dir_path: &Path, result: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir_path)? {
        let path = entry?.path();

        if path.is_dir() {
            find_image_files_recursive(&path, result)?;
        } else if path.is_file() && has_image_extension(&path) {
            result.push(path);
        }
    }

    Ok(())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Load an image from disk as RGB, dropping any alpha channel
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<InputImage> {
    let path = path.as_ref();

    let filename = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SegmentationError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let bytes = fs::read(path)?;
    let image = decode_image(&bytes)?;

    Ok(InputImage {
        image,
        path: path.to_path_buf(),
        filename,
    })
}

/// Save an RGB image as PNG
pub fn save_image<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)
        .map_err(|e| SegmentationError::Encode(e.to_string()))
}

/// Save a mask as a single-channel PNG
pub fn save_mask<P: AsRef<Path>>(mask: &BinaryMask, path: P) -> Result<()> {
    mask.to_gray()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| SegmentationError::Encode(e.to_string()))
}

/// Extract the raw bytes from an image payload.
///
/// Accepts `data:image/<fmt>;base64,<payload>` or a bare base64 string.
pub fn parse_data_uri(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(SegmentationError::Input("image payload is empty".to_string()));
    }

    let encoded = if let Some(rest) = payload.strip_prefix("data:") {
        let (header, data) = rest.split_once(',').ok_or_else(|| {
            SegmentationError::Input("data URI has no ',' separator".to_string())
        })?;
        let (mime, encoding) = header.split_once(';').ok_or_else(|| {
            SegmentationError::Input("data URI must declare base64 encoding".to_string())
        })?;
        if !mime.starts_with("image/") || mime.len() <= "image/".len() {
            return Err(SegmentationError::Input(format!(
                "unsupported media type '{}'", mime
            )));
        }
        if encoding != "base64" {
            return Err(SegmentationError::Input(format!(
                "unsupported data URI encoding '{}'", encoding
            )));
        }
        data
    } else {
        payload
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| SegmentationError::Input(format!("invalid base64 payload: {}", e)))?;

    if bytes.is_empty() {
        return Err(SegmentationError::Input("image payload decodes to zero bytes".to_string()));
    }

    Ok(bytes)
}

/// Decode PNG/JPEG/... bytes into an RGB raster
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| SegmentationError::Decode(e.to_string()))?;
    let rgb = image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(SegmentationError::Decode("image has zero area".to_string()));
    }
    Ok(rgb)
}

fn encode_png(raw: &[u8], width: u32, height: u32, color: ColorType) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(raw, width, height, color)
        .map_err(|e| SegmentationError::Encode(e.to_string()))?;
    Ok(buffer)
}

fn to_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Encode a mask as a single-channel PNG data URI
pub fn mask_to_data_uri(mask: &BinaryMask) -> Result<String> {
    let png = encode_png(mask.as_raw(), mask.width(), mask.height(), ColorType::L8)?;
    Ok(to_data_uri(&png))
}

/// Encode an RGB image as a 3-channel PNG data URI
pub fn rgb_to_data_uri(image: &RgbImage) -> Result<String> {
    let png = encode_png(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)?;
    Ok(to_data_uri(&png))
}

/// Decode a PNG data URI back into a greyscale raster
pub fn data_uri_to_gray(uri: &str) -> Result<GrayImage> {
    let bytes = parse_data_uri(uri)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| SegmentationError::Decode(e.to_string()))?;
    Ok(image.to_luma8())
}
