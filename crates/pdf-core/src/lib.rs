//! PDF Core - Low-level PDF stamping
//!
//! This crate provides functionality for:
//! - Opening template PDFs and saving them deterministically
//! - Built-in Helvetica fonts and embedded TrueType fonts
//! - Measuring, wrapping and auto-shrinking text
//! - Inserting text, lines and images (JPEG, PNG with transparency)
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Align, PdfDocument, StandardFont};
//!
//! let mut doc = PdfDocument::open_from_bytes(&template_bytes)?;
//! doc.add_standard_font("body", StandardFont::Helvetica)?;
//! doc.set_font("body", 12.0)?;
//! doc.insert_text("Hello, World!", 1, 100.0, 700.0, Align::Left)?;
//! let bytes = doc.to_bytes()?;
//! ```

mod document;
mod font;
mod image;
mod standard;
mod text;

pub use document::{Color, PdfDocument, A4_HEIGHT, A4_WIDTH};
pub use font::{FontData, PdfFont, TextMeasure};
pub use image::{calculate_scaled_dimensions, image_dimensions, ImageScaleMode};
pub use standard::{latin_base, StandardFont};
pub use text::{fit_block, generate_text_operators, wrap_text, FittedBlock, TextRenderContext};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Font already exists: {0}")]
    FontAlreadyExists(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Axis-aligned rectangle in top-origin page coordinates (points)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal center
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Bottom edge (top-origin, so larger than `y`)
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Right edge
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}
