//! Legacy texture conversion.
//!
//! Zone archives carry uncompressed bitmaps and block-compressed surfaces,
//! frequently with misleading file extensions, so the real format is
//! sniffed from the header bytes. Everything is converted to PNG for the
//! outputs. Conversion is a pure leaf step with no effect on geometry;
//! a texture that cannot be decoded becomes a gray placeholder and a
//! warning, never a fatal error.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::warn;

/// Side length of the placeholder written for undecodable textures.
const PLACEHOLDER_SIZE: u32 = 64;

/// One converted texture, ready for embedding or writing to disk.
pub struct ConvertedTexture {
    /// Source filename with its extension swapped for `.png`, lowercased
    /// like archive names.
    pub name: String,
    pub data: Vec<u8>,
    /// Whether decoding failed and a placeholder was substituted.
    pub fallback: bool,
}

/// The PNG name a source texture converts to.
pub fn png_name(source: &str) -> String {
    let lower = source.to_ascii_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.png"),
        None => format!("{lower}.png"),
    }
}

/// Convert one legacy texture to PNG.
///
/// `masked` applies the cutout convention of masked materials: in 8-bit
/// palettized bitmaps the first palette entry is the transparency key.
/// `resample` scales the image up to power-of-two dimensions.
pub fn to_png(source: &str, data: &[u8], masked: bool, resample: bool) -> ConvertedTexture {
    match decode(data, masked) {
        Ok(mut image) => {
            if resample {
                image = resample_pow2(image);
            }
            match encode_png(&image) {
                Ok(png) => ConvertedTexture {
                    name: png_name(source),
                    data: png,
                    fallback: false,
                },
                Err(err) => placeholder(source, &err),
            }
        }
        Err(err) => placeholder(source, &err),
    }
}

fn decode(data: &[u8], masked: bool) -> Result<RgbaImage, String> {
    let format = sniff(data);
    let image = match format {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    }
    .map_err(|e| e.to_string())?;
    let mut rgba = image.to_rgba8();

    if masked {
        if let Some(key) = palette_key(data) {
            for pixel in rgba.pixels_mut() {
                if pixel.0[..3] == key {
                    *pixel = Rgba([0, 0, 0, 0]);
                }
            }
        }
    }
    Ok(rgba)
}

/// Identify the container from its header bytes; extensions lie.
fn sniff(data: &[u8]) -> Option<ImageFormat> {
    if data.starts_with(b"BM") {
        Some(ImageFormat::Bmp)
    } else if data.starts_with(b"DDS ") {
        Some(ImageFormat::Dds)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        Some(ImageFormat::Jpeg)
    } else if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(ImageFormat::Png)
    } else {
        None
    }
}

/// The transparency key of an 8-bit palettized bitmap: palette entry 0,
/// stored BGRx right after the 40-byte info header.
fn palette_key(data: &[u8]) -> Option<[u8; 3]> {
    if !data.starts_with(b"BM") || data.len() < 58 {
        return None;
    }
    let header_size = u32::from_le_bytes(data[14..18].try_into().ok()?) as usize;
    let bpp = u16::from_le_bytes(data[28..30].try_into().ok()?);
    if bpp != 8 {
        return None;
    }
    let palette = data.get(14 + header_size..14 + header_size + 4)?;
    Some([palette[2], palette[1], palette[0]])
}

fn resample_pow2(image: RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (tw, th) = (w.next_power_of_two(), h.next_power_of_two());
    if (tw, th) == (w, h) {
        return image;
    }
    image::imageops::resize(&image, tw, th, image::imageops::FilterType::Triangle)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(out.into_inner())
}

fn placeholder(source: &str, reason: &str) -> ConvertedTexture {
    warn!("texture {source:?} could not be converted ({reason}), substituting a placeholder");
    let gray = RgbaImage::from_pixel(
        PLACEHOLDER_SIZE,
        PLACEHOLDER_SIZE,
        Rgba([128, 128, 128, 255]),
    );
    let data = encode_png(&gray).expect("encoding a constant image cannot fail");
    ConvertedTexture {
        name: png_name(source),
        data,
        fallback: true,
    }
}
