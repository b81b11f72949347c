//! Image XObjects: JPEG passthrough and PNG with soft masks

use crate::{PdfError, Result};
use image::{ColorType, DynamicImage, ImageDecoder, ImageReader};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::{Cursor, Write};

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::ImageError(err.to_string())
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Encoded image formats accepted for embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Detect the format from the leading magic bytes
    pub fn sniff(data: &[u8]) -> Result<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Ok(ImageFormat::Jpeg)
        } else if data.starts_with(&PNG_SIGNATURE) {
            Ok(ImageFormat::Png)
        } else {
            Err(PdfError::ImageError("Unknown image format".to_string()))
        }
    }
}

/// How an image is fitted into the target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageScaleMode {
    /// Exactly the target box
    #[default]
    Stretch,
    /// Target width, height from the aspect ratio
    FitWidth,
    /// Target height, width from the aspect ratio
    FitHeight,
    /// Largest size inside the box with the aspect ratio kept
    FitBox,
}

/// Displayed (width, height) in points for an image of the given pixel size
///
/// `FitBox` takes the smaller of the two axis ratios, so the image fills
/// the box on one axis and fits within it on the other.
pub fn calculate_scaled_dimensions(
    original_width: u32,
    original_height: u32,
    target_width: f64,
    target_height: f64,
    mode: ImageScaleMode,
) -> (f64, f64) {
    if original_width == 0 || original_height == 0 {
        return (0.0, 0.0);
    }

    let (w, h) = (original_width as f64, original_height as f64);
    let scale = match mode {
        ImageScaleMode::Stretch => return (target_width, target_height),
        ImageScaleMode::FitWidth => target_width / w,
        ImageScaleMode::FitHeight => target_height / h,
        ImageScaleMode::FitBox => (target_width / w).min(target_height / h),
    };

    (w * scale, h * scale)
}

/// Pixel dimensions of an encoded JPEG or PNG, read from its header
pub fn image_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    match ImageFormat::sniff(data)? {
        ImageFormat::Jpeg => jpeg_frame(data).map(|frame| (frame.width, frame.height)),
        ImageFormat::Png => png_dimensions(data),
    }
}

/// Fields of a JPEG start-of-frame segment
#[derive(Debug, Clone, Copy)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
}

/// Walk the JPEG segments up to the first start-of-frame marker
fn jpeg_frame(data: &[u8]) -> Result<JpegFrame> {
    let mut pos = 2;

    while pos + 10 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        // C4 (DHT), C8 (JPG) and CC (DAC) share the range but are not frames
        let is_frame = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let segment = &data[pos + 5..pos + 10];
            return Ok(JpegFrame {
                height: u16::from_be_bytes([segment[0], segment[1]]) as u32,
                width: u16::from_be_bytes([segment[2], segment[3]]) as u32,
                components: segment[4],
            });
        }

        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 {
            break;
        }
        pos += 2 + length;
    }

    Err(PdfError::ImageError("JPEG frame header not found".to_string()))
}

/// Adobe APP14 segment, whose CMYK samples are written inverted
fn has_adobe_marker(data: &[u8]) -> bool {
    data.windows(9)
        .any(|w| w[0] == 0xFF && w[1] == 0xEE && &w[4..9] == b"Adobe")
}

/// Width and height from the IHDR chunk, which must come first
fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < 24 || &data[12..16] != b"IHDR" {
        return Err(PdfError::ImageError("PNG header not found".to_string()));
    }

    let read = |at: usize| u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
    Ok((read(16), read(20)))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Separate interleaved pixels into color samples and an alpha plane
fn split_alpha(pixels: &[u8], channels: usize) -> (Vec<u8>, Vec<u8>) {
    let color_channels = channels - 1;
    let count = pixels.len() / channels;
    let mut color = Vec::with_capacity(count * color_channels);
    let mut alpha = Vec::with_capacity(count);

    for pixel in pixels.chunks_exact(channels) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }

    (color, alpha)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
}

impl ColorSpace {
    fn name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
        }
    }

    fn components(self) -> usize {
        match self {
            ColorSpace::DeviceGray => 1,
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceCmyk => 4,
        }
    }
}

/// Stream filter of the sample data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// JPEG bytes as-is
    Dct,
    /// Zlib-compressed 8-bit samples
    Flate,
}

impl ImageEncoding {
    fn filter(self) -> &'static str {
        match self {
            ImageEncoding::Dct => "DCTDecode",
            ImageEncoding::Flate => "FlateDecode",
        }
    }
}

/// An image ready to be written as a PDF XObject
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub encoding: ImageEncoding,
    /// Sample data, already in `encoding`
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha plane, written as an /SMask
    pub alpha: Option<Vec<u8>>,
    /// Samples are stored inverted (Adobe CMYK JPEGs)
    pub inverted: bool,
}

impl ImageXObject {
    /// Embed a JPEG without re-encoding
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let frame = jpeg_frame(data)?;

        let color_space = match frame.components {
            1 => ColorSpace::DeviceGray,
            3 => ColorSpace::DeviceRgb,
            4 => ColorSpace::DeviceCmyk,
            n => {
                return Err(PdfError::ImageError(format!(
                    "Unsupported JPEG with {n} components"
                )))
            }
        };

        Ok(Self {
            width: frame.width,
            height: frame.height,
            color_space,
            encoding: ImageEncoding::Dct,
            data: data.to_vec(),
            alpha: None,
            inverted: color_space == ColorSpace::DeviceCmyk && has_adobe_marker(data),
        })
    }

    /// Decode a PNG to 8-bit samples
    ///
    /// Transparency is kept as a separate alpha plane unless every pixel
    /// is opaque.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        if ImageFormat::sniff(data)? != ImageFormat::Png {
            return Err(PdfError::ImageError("Not a PNG image".to_string()));
        }

        let decoder = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_decoder()?;
        let (width, height) = decoder.dimensions();
        let color_type = decoder.color_type();
        let image = DynamicImage::from_decoder(decoder)?;

        let (samples, alpha, color_space) = match color_type {
            ColorType::L8 | ColorType::L16 => {
                (image.to_luma8().into_raw(), None, ColorSpace::DeviceGray)
            }
            ColorType::La8 | ColorType::La16 => {
                let (gray, alpha) = split_alpha(image.to_luma_alpha8().as_raw(), 2);
                (gray, Some(alpha), ColorSpace::DeviceGray)
            }
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => {
                let (rgb, alpha) = split_alpha(image.to_rgba8().as_raw(), 4);
                (rgb, Some(alpha), ColorSpace::DeviceRgb)
            }
            _ => (image.to_rgb8().into_raw(), None, ColorSpace::DeviceRgb),
        };

        let alpha = alpha.filter(|plane| plane.iter().any(|&a| a != u8::MAX));

        Ok(Self {
            width,
            height,
            color_space,
            encoding: ImageEncoding::Flate,
            data: deflate(&samples)?,
            alpha: alpha.as_deref().map(deflate).transpose()?,
            inverted: false,
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match ImageFormat::sniff(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    fn dictionary(&self, color_space: ColorSpace, encoding: ImageEncoding) -> Dictionary {
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => color_space.name(),
            "BitsPerComponent" => 8i64,
            "Filter" => encoding.filter(),
        }
    }

    /// The image stream, without its /SMask reference
    pub fn to_pdf_stream(&self) -> Stream {
        let mut dict = self.dictionary(self.color_space, self.encoding);
        if self.inverted {
            let decode = [1, 0].repeat(self.color_space.components());
            dict.set(
                "Decode",
                decode.into_iter().map(Object::Integer).collect::<Vec<_>>(),
            );
        }
        Stream::new(dict, self.data.clone())
    }

    /// Gray soft-mask stream for the alpha plane, if any
    pub fn to_smask_stream(&self) -> Option<Stream> {
        let alpha = self.alpha.as_ref()?;
        Some(Stream::new(
            self.dictionary(ColorSpace::DeviceGray, ImageEncoding::Flate),
            alpha.clone(),
        ))
    }

    /// Add the image (and its mask) to `doc`, returning the image's id
    pub fn embed(&self, doc: &mut Document) -> ObjectId {
        let mut stream = self.to_pdf_stream();
        if let Some(smask) = self.to_smask_stream() {
            let smask_id = doc.add_object(smask);
            stream.dict.set("SMask", Object::Reference(smask_id));
        }
        doc.add_object(stream)
    }
}

/// Content operators drawing an image XObject
///
/// `y` is the bottom edge in PDF coordinates.
pub fn generate_image_operators(
    image_name: &str,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> Vec<u8> {
    format!("q\n{width} 0 0 {height} {x} {y} cm\n/{image_name} Do\nQ\n").into_bytes()
}
