// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization for scanned PDFs.
//
// Scanned rent rolls carry each page as one embedded image. We decode the
// largest image XObject on the page and scale it to the page's MediaBox at
// the requested DPI, capped at `MAX_ENHANCE_PIXELS`. Vector content is not
// rendered.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use lopdf::Stream;
use rentroll_core::error::{RentrollError, Result};
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;
use crate::pdf::reader::{PdfReader, object_to_f64};
use crate::scan::enhance::MAX_ENHANCE_PIXELS;

impl PdfReader {
    /// Rasterize page `index` at `dpi`.
    #[instrument(skip(self))]
    pub fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage> {
        let images = self.page_images(index)?;
        let largest = images
            .into_iter()
            .map(|stream| (image_area(stream), stream))
            .max_by_key(|(area, _)| *area)
            .map(|(_, stream)| stream)
            .ok_or_else(|| {
                RentrollError::ImageError(format!("page {} has no raster image", index))
            })?;

        let decoded = self.decode_image(largest)?;
        let (width_pt, height_pt) = self.media_box(index)?;
        let (target_w, target_h) = raster_size(width_pt, height_pt, dpi, MAX_ENHANCE_PIXELS);

        debug!(
            source_w = decoded.width(),
            source_h = decoded.height(),
            target_w,
            target_h,
            "Scaling page image"
        );

        Ok(ImageProcessor::from_dynamic(decoded)
            .resize_exact(target_w, target_h)
            .into_dynamic())
    }

    /// Decode one image XObject into pixels.
    pub(crate) fn decode_image(&self, stream: &Stream) -> Result<DynamicImage> {
        let filters = filter_names(self, stream)?;
        if filters.iter().any(|f| f == "JPXDecode" || f == "CCITTFaxDecode" || f == "JBIG2Decode") {
            return Err(RentrollError::ImageError(format!(
                "unsupported image filter {:?}",
                filters
            )));
        }
        if filters.last().map(String::as_str) == Some("DCTDecode") {
            let jpeg = if filters.len() > 1 {
                decompress(stream)?
            } else {
                stream.content.clone()
            };
            return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).map_err(
                |err| RentrollError::ImageError(format!("JPEG image decode failed: {}", err)),
            );
        }

        let width = dict_u32(self, stream, b"Width")?;
        let height = dict_u32(self, stream, b"Height")?;
        let is_mask = stream
            .dict
            .get(b"ImageMask")
            .map(|v| matches!(v, lopdf::Object::Boolean(true)))
            .unwrap_or(false);
        let bits = if is_mask {
            1
        } else {
            dict_u32(self, stream, b"BitsPerComponent").unwrap_or(8)
        };
        let components = if is_mask { 1 } else { color_components(self, stream)? };
        let data = if filters.is_empty() {
            stream.content.clone()
        } else {
            decompress(stream)?
        };

        match (bits, components) {
            (8, 1) => {
                let raw = take_exact(data, width as usize * height as usize)?;
                GrayImage::from_raw(width, height, raw)
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| RentrollError::ImageError("gray buffer mismatch".into()))
            }
            (8, 3) => {
                let raw = take_exact(data, width as usize * height as usize * 3)?;
                RgbImage::from_raw(width, height, raw)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| RentrollError::ImageError("RGB buffer mismatch".into()))
            }
            (8, 4) => {
                let raw = take_exact(data, width as usize * height as usize * 4)?;
                Ok(DynamicImage::ImageRgb8(cmyk_to_rgb(width, height, &raw)))
            }
            (1, 1) => Ok(DynamicImage::ImageLuma8(unpack_bilevel(
                width,
                height,
                &data,
                decode_inverted(self, stream),
            )?)),
            (bits, components) => Err(RentrollError::ImageError(format!(
                "unsupported image layout: {} bits x {} components",
                bits, components
            ))),
        }
    }
}

/// Pixel size of a `width_pt` x `height_pt` page at `dpi`, scaled down
/// uniformly when it would exceed `max_pixels`.
fn raster_size(width_pt: f64, height_pt: f64, dpi: u32, max_pixels: u64) -> (u32, u32) {
    let mut width = (width_pt.abs() * dpi as f64 / 72.0).max(1.0);
    let mut height = (height_pt.abs() * dpi as f64 / 72.0).max(1.0);
    let pixels = width * height;
    if pixels > max_pixels as f64 {
        let scale = (max_pixels as f64 / pixels).sqrt();
        width *= scale;
        height *= scale;
    }
    (
        (width.floor() as u32).max(1),
        (height.floor() as u32).max(1),
    )
}

fn image_area(stream: &Stream) -> i64 {
    let dim = |key: &[u8]| stream.dict.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
    dim(b"Width") * dim(b"Height")
}

fn filter_names(reader: &PdfReader, stream: &Stream) -> Result<Vec<String>> {
    let Ok(filter) = stream.dict.get(b"Filter") else {
        return Ok(Vec::new());
    };
    let name = |obj: &lopdf::Object| -> Result<String> {
        reader
            .resolve(obj)?
            .as_name()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .map_err(|err| RentrollError::PdfError(format!("bad /Filter entry: {}", err)))
    };
    match reader.resolve(filter)? {
        lopdf::Object::Array(items) => items.iter().map(name).collect(),
        other => Ok(vec![name(other)?]),
    }
}

fn decompress(stream: &Stream) -> Result<Vec<u8>> {
    stream
        .decompressed_content()
        .map_err(|err| {
            RentrollError::ImageError(format!("image stream decompression failed: {}", err))
        })
}

fn dict_u32(reader: &PdfReader, stream: &Stream, key: &[u8]) -> Result<u32> {
    let value = stream.dict.get(key).map_err(|_| {
        RentrollError::ImageError(format!("image missing /{}", String::from_utf8_lossy(key)))
    })?;
    let number = object_to_f64(reader.resolve(value)?)?;
    if number < 1.0 {
        return Err(RentrollError::ImageError(format!(
            "image /{} must be positive",
            String::from_utf8_lossy(key)
        )));
    }
    Ok(number as u32)
}

/// Component count for the colour spaces scanners actually emit.
fn color_components(reader: &PdfReader, stream: &Stream) -> Result<u32> {
    let Ok(space) = stream.dict.get(b"ColorSpace") else {
        return Ok(1);
    };
    match reader.resolve(space)? {
        lopdf::Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(3),
            b"DeviceCMYK" | b"CMYK" => Ok(4),
            other => Err(RentrollError::ImageError(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        lopdf::Object::Array(items) => {
            let family = items
                .first()
                .and_then(|f| f.as_name().ok())
                .unwrap_or_default();
            if family != b"ICCBased" {
                return Err(RentrollError::ImageError(format!(
                    "unsupported colour space family {}",
                    String::from_utf8_lossy(family)
                )));
            }
            let profile = items
                .get(1)
                .ok_or_else(|| RentrollError::ImageError("ICCBased without profile".into()))?;
            let n = reader
                .resolve(profile)?
                .as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"N").ok())
                .and_then(|n| n.as_i64().ok())
                .unwrap_or(3);
            Ok(n as u32)
        }
        other => Err(RentrollError::ImageError(format!(
            "unexpected /ColorSpace {:?}",
            other
        ))),
    }
}

fn take_exact(mut data: Vec<u8>, expected: usize) -> Result<Vec<u8>> {
    if data.len() < expected {
        return Err(RentrollError::ImageError(format!(
            "image data truncated: {} of {} bytes",
            data.len(),
            expected
        )));
    }
    data.truncate(expected);
    Ok(data)
}

fn cmyk_to_rgb(width: u32, height: u32, raw: &[u8]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let i = (y as usize * width as usize + x as usize) * 4;
        let k = raw[i + 3] as f32 / 255.0;
        let channel = |c: u8| (255.0 * (1.0 - c as f32 / 255.0) * (1.0 - k)).round() as u8;
        Rgb([channel(raw[i]), channel(raw[i + 1]), channel(raw[i + 2])])
    })
}

/// Whether `/Decode` swaps the sample range, e.g. `[1 0]`.
fn decode_inverted(reader: &PdfReader, stream: &Stream) -> bool {
    let Ok(decode) = stream.dict.get(b"Decode") else {
        return false;
    };
    let Ok(lopdf::Object::Array(range)) = reader.resolve(decode) else {
        return false;
    };
    match (range.first(), range.get(1)) {
        (Some(low), Some(high)) => match (object_to_f64(low), object_to_f64(high)) {
            (Ok(low), Ok(high)) => low > high,
            _ => false,
        },
        _ => false,
    }
}

/// Expand 1-bit rows (padded to a byte) to 8-bit luma.
///
/// Under the default decode a set bit is white for both DeviceGray images
/// and stencil masks (0 paints, 1 leaves the page blank); `inverted` applies
/// a `[1 0]` decode array.
fn unpack_bilevel(width: u32, height: u32, data: &[u8], inverted: bool) -> Result<GrayImage> {
    let stride = (width as usize).div_ceil(8);
    if data.len() < stride * height as usize {
        return Err(RentrollError::ImageError(format!(
            "bilevel image truncated: {} of {} bytes",
            data.len(),
            stride * height as usize
        )));
    }
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * stride + x as usize / 8];
        let bit = (byte >> (7 - (x % 8))) & 1 == 1;
        let white = bit != inverted;
        Luma([if white { 255 } else { 0 }])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::PdfBuilder;

    #[test]
    fn renders_gray_page_at_requested_dpi() {
        let bytes = PdfBuilder::new().gray_image_page(10, 13, 180).build();
        let reader = PdfReader::from_bytes(&bytes).unwrap();

        let page = reader.render_page(0, 72).unwrap();
        assert_eq!((page.width(), page.height()), (612, 792));

        let page = reader.render_page(0, 144).unwrap();
        assert_eq!((page.width(), page.height()), (1224, 1584));
        assert_eq!(page.to_luma8().get_pixel(600, 700).0[0], 180);
    }

    #[test]
    fn text_only_page_cannot_be_rasterized() {
        let bytes = PdfBuilder::new().text_page(&["just text"]).build();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert!(matches!(
            reader.render_page(0, 150),
            Err(RentrollError::ImageError(_))
        ));
    }

    #[test]
    fn unpacks_bilevel_rows() {
        // 10 px wide => 2 bytes per row.
        let data = [0b1010_0000, 0b0100_0000, 0xFF, 0xC0];
        let gray = unpack_bilevel(10, 2, &data, false).unwrap();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
        assert_eq!(gray.get_pixel(9, 0).0[0], 255);
        assert_eq!(gray.get_pixel(5, 1).0[0], 255);

        let inverted = unpack_bilevel(10, 2, &data, true).unwrap();
        assert_eq!(inverted.get_pixel(0, 0).0[0], 0);
        assert_eq!(inverted.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn decode_array_controls_bilevel_polarity() {
        let bytes = PdfBuilder::new().text_page(&["x"]).build();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let mask = |decode: Option<Vec<lopdf::Object>>| {
            let mut dict = lopdf::dictionary! { "ImageMask" => true };
            if let Some(decode) = decode {
                dict.set("Decode", decode);
            }
            Stream::new(dict, Vec::new())
        };

        assert!(!decode_inverted(&reader, &mask(None)));
        assert!(!decode_inverted(&reader, &mask(Some(vec![0.into(), 1.into()]))));
        assert!(decode_inverted(&reader, &mask(Some(vec![1.into(), 0.into()]))));
    }

    #[test]
    fn oversized_pages_are_capped_before_scaling() {
        assert_eq!(raster_size(612.0, 792.0, 144, MAX_ENHANCE_PIXELS), (1224, 1584));

        let (w, h) = raster_size(14_400.0, 14_400.0, 300, MAX_ENHANCE_PIXELS);
        assert!(w as u64 * h as u64 <= MAX_ENHANCE_PIXELS);
        assert_eq!(w, h);

        let bytes = PdfBuilder::new()
            .page_size(14_400, 7_200)
            .gray_image_page(20, 10, 90)
            .build();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let page = reader.render_page(0, 300).unwrap();
        assert!(page.width() as u64 * page.height() as u64 <= MAX_ENHANCE_PIXELS);
        assert_eq!(page.width(), 2 * page.height());
    }

    #[test]
    fn cmyk_black_and_white() {
        let raw = [0, 0, 0, 0, 0, 0, 0, 255];
        let rgb = cmyk_to_rgb(2, 1, &raw);
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn truncated_data_is_rejected() {
        assert!(take_exact(vec![0; 3], 4).is_err());
        assert_eq!(take_exact(vec![1; 6], 4).unwrap().len(), 4);
    }
}
