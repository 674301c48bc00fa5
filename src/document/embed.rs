use crate::capture::CaptureError;
use crate::models::ImageRecord;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::ImageDecoder;
use lopdf::{dictionary, Stream};
use std::io::{Cursor, Write};

/// An image ready to be added to a PDF as an XObject
pub struct EmbeddedImage {
    pub width: u32,
    pub height: u32,
    pub stream: Stream,
    /// Alpha channel, to be referenced from the image's `SMask` entry
    pub smask: Option<Stream>,
}

/// Convert a captured record into PDF image streams.
///
/// Gray and RGB JPEGs are embedded untouched. Everything else, CMYK JPEGs
/// included, is decoded and stored as deflated RGB.
pub fn image_xobject(record: &ImageRecord) -> Result<EmbeddedImage, CaptureError> {
    if record.is_jpeg() {
        match jpeg_passthrough(record) {
            Ok(embedded) => return Ok(embedded),
            Err(e) => log::debug!("{} is not a plain JPEG ({}), re-encoding", record.source_url, e),
        }
    }
    decoded_xobject(record)
}

fn jpeg_passthrough(record: &ImageRecord) -> Result<EmbeddedImage, String> {
    let decoder = JpegDecoder::new(Cursor::new(record.bytes.as_slice())).map_err(|e| e.to_string())?;
    let (width, height) = decoder.dimensions();

    // The decoder reports CMYK scans as RGB, so the frame header decides
    let color_space = match jpeg_components(&record.bytes) {
        Some(1) => "DeviceGray",
        Some(3) => "DeviceRGB",
        Some(n) => return Err(format!("{} colour components", n)),
        None => return Err("no frame header".to_string()),
    };

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        record.bytes.clone(),
    );

    Ok(EmbeddedImage {
        width,
        height,
        stream,
        smask: None,
    })
}

fn decoded_xobject(record: &ImageRecord) -> Result<EmbeddedImage, CaptureError> {
    let encode_err = |reason: String| CaptureError::Encode {
        url: record.source_url.clone(),
        reason,
    };

    let image = image::load_from_memory(&record.bytes).map_err(|e| encode_err(e.to_string()))?;
    let (width, height) = (image.width(), image.height());

    let (rgb, alpha) = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }
        // Fully opaque masks only add weight
        let alpha = if alpha.iter().all(|&a| a == u8::MAX) { None } else { Some(alpha) };
        (rgb, alpha)
    } else {
        (image.to_rgb8().into_raw(), None)
    };

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&rgb).map_err(|e| encode_err(e.to_string()))?,
    );

    let smask = match alpha {
        Some(alpha) => Some(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha).map_err(|e| encode_err(e.to_string()))?,
        )),
        None => None,
    };

    Ok(EmbeddedImage {
        width,
        height,
        stream,
        smask,
    })
}

/// Component count from the first SOF segment of a JPEG stream
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        match marker {
            // Fill bytes and standalone markers carry no length
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            _ => {}
        }
        let length = usize::from(u16::from_be_bytes([*bytes.get(pos + 2)?, *bytes.get(pos + 3)?]));
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            // length(2) precision(1) height(2) width(2) components(1)
            return bytes.get(pos + 9).copied();
        }
        pos += 2 + length;
    }
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
