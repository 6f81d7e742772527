//! Overlay image decoding
//!
//! PNG and JPEG are the two embeddable containers, recognised with
//! `image::guess_format`. PNG pixels are decoded and re-compressed with Flate
//! (alpha becomes a soft mask). JPEG data is embedded as-is behind
//! `/DCTDecode` once its header has been read.

use crate::error::{ComposeError, Result};
use ::image::codecs::jpeg::JpegDecoder;
use ::image::ImageDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

/// Containers that can be embedded in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedFormat {
    Png,
    Jpeg,
}

/// Identify the image container from its magic bytes.
///
/// Returns the container name for formats that cannot be embedded.
pub fn detect_format(bytes: &[u8]) -> std::result::Result<EmbedFormat, String> {
    use ::image::ImageFormat;

    match ::image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(EmbedFormat::Png),
        Ok(ImageFormat::Jpeg) => Ok(EmbedFormat::Jpeg),
        Ok(ImageFormat::Gif) => Err("GIF".to_string()),
        Ok(ImageFormat::WebP) => Err("WebP".to_string()),
        Ok(ImageFormat::Bmp) => Err("BMP".to_string()),
        Ok(ImageFormat::Tiff) => Err("TIFF".to_string()),
        Ok(other) => Err(other
            .extensions_str()
            .first()
            .map_or_else(|| format!("{:?}", other), |ext| ext.to_ascii_uppercase())),
        Err(_) => Err("unknown".to_string()),
    }
}

/// An image ready to be written as an image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub filter: &'static str,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha channel.
    pub alpha: Option<Vec<u8>>,
}

impl EmbeddedImage {
    /// Decode overlay image bytes for output page `page` (1-based, used in errors).
    pub fn decode(bytes: &[u8], page: usize) -> Result<Self> {
        match detect_format(bytes) {
            Ok(EmbedFormat::Png) => decode_png(bytes, page),
            Ok(EmbedFormat::Jpeg) => decode_jpeg(bytes, page),
            Err(format) => Err(ComposeError::UnsupportedOverlayFormat { page, format }),
        }
    }

    /// Write the image (and its soft mask) into `doc`.
    pub fn add_to(&self, doc: &mut Document) -> ObjectId {
        let smask_id = self.alpha.as_ref().map(|alpha| {
            let dict = image_dict(self.width, self.height, "DeviceGray", "FlateDecode");
            doc.add_object(Stream::new(dict, alpha.clone()).with_compression(false))
        });

        let mut dict = image_dict(self.width, self.height, self.color_space, self.filter);
        if let Some(id) = smask_id {
            dict.set("SMask", Object::Reference(id));
        }
        doc.add_object(Stream::new(dict, self.data.clone()).with_compression(false))
    }
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    dict
}

fn corrupt(page: usize, format: &str, reason: impl std::fmt::Display) -> ComposeError {
    ComposeError::InvalidOverlay(format!(
        "page {}: could not decode {} image: {}",
        page, format, reason
    ))
}

fn decode_png(bytes: &[u8], page: usize) -> Result<EmbeddedImage> {
    let mut decoder = png::Decoder::new(bytes);
    // Palette and sub-byte depths expand to 8-bit; 16-bit is stripped
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| corrupt(page, "PNG", e))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| corrupt(page, "PNG", e))?;
    let pixels = &buf[..frame.buffer_size()];

    let (channels, has_alpha, color_space) = match frame.color_type {
        png::ColorType::Grayscale => (1, false, "DeviceGray"),
        png::ColorType::GrayscaleAlpha => (2, true, "DeviceGray"),
        png::ColorType::Rgb => (3, false, "DeviceRGB"),
        png::ColorType::Rgba => (4, true, "DeviceRGB"),
        png::ColorType::Indexed => {
            return Err(corrupt(page, "PNG", "palette was not expanded"));
        }
    };
    if frame.bit_depth != png::BitDepth::Eight {
        return Err(corrupt(page, "PNG", "unexpected bit depth"));
    }

    let color_channels = if has_alpha { channels - 1 } else { channels };
    let pixel_count = (frame.width as usize) * (frame.height as usize);
    let mut color = Vec::with_capacity(pixel_count * color_channels);
    let mut alpha = has_alpha.then(|| Vec::with_capacity(pixel_count));

    for px in pixels.chunks_exact(channels) {
        color.extend_from_slice(&px[..color_channels]);
        if let Some(alpha) = alpha.as_mut() {
            alpha.push(px[channels - 1]);
        }
    }

    // A fully opaque alpha channel needs no mask
    let alpha = alpha.filter(|a| a.iter().any(|&v| v != 0xFF));

    Ok(EmbeddedImage {
        width: frame.width,
        height: frame.height,
        color_space,
        filter: "FlateDecode",
        data: zlib(&color).map_err(|e| corrupt(page, "PNG", e))?,
        alpha: alpha
            .map(|a| zlib(&a))
            .transpose()
            .map_err(|e| corrupt(page, "PNG", e))?,
    })
}

fn zlib(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// JPEG data is embedded untouched; only the header is read.
fn decode_jpeg(bytes: &[u8], page: usize) -> Result<EmbeddedImage> {
    let decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(|e| corrupt(page, "JPEG", e))?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(corrupt(page, "JPEG", "zero-sized frame"));
    }

    let color_space = match decoder.original_color_type().channel_count() {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => return Err(corrupt(page, "JPEG", format!("{} color components", n))),
    };

    Ok(EmbeddedImage {
        width,
        height,
        color_space,
        filter: "DCTDecode",
        data: bytes.to_vec(),
        alpha: None,
    })
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let data: Vec<u8> = (0..width * height).flat_map(|_| rgba).collect();
        writer.write_image_data(&data).unwrap();
    }
    out
}

#[cfg(test)]
pub(crate) fn encode_test_jpeg(width: u32, height: u32, gray: bool) -> Vec<u8> {
    use ::image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

    let image = if gray {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([90])))
    } else {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 30])))
    };
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}
