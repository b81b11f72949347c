//! Certificate Engine - per-recipient certificate generation
//!
//! This crate provides:
//! - The typed generation request and page layout configuration
//! - Text placement with wrapping and auto-shrink on a PDF template
//! - Signature placement and signature background removal
//! - Sequential batch generation with progress and cancellation
//!
//! # Example
//!
//! ```ignore
//! use certificate::{BatchGenerator, CertificateRenderer, DocumentTemplate, GenerationRequest};
//!
//! let template = DocumentTemplate::from_bytes(&template_bytes)?;
//! let renderer = CertificateRenderer::new();
//! let requests: Vec<GenerationRequest> = recipients
//!     .into_iter()
//!     .map(|recipient| course.for_recipient(recipient))
//!     .collect();
//!
//! let report = BatchGenerator::new(&renderer, Some(&template))
//!     .on_progress(|current, total| println!("{current}/{total}"))
//!     .generate_all(&requests)?;
//! ```

mod background;
mod batch;
pub mod layout;
mod renderer;
mod schema;

pub use background::{remove_background, BackgroundRemoval};
pub use batch::{BatchFailure, BatchGenerator, BatchReport, GeneratedDocument};
pub use layout::{place_signature, plan_signature_rows, SignatureRows};
pub use renderer::{
    CertificateRenderer, DocumentTemplate, FontRole, RenderWarning, RenderedDocument,
};
pub use schema::*;

use thiserror::Error;

/// Errors that can occur during certificate generation
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to load template: {0}")]
    TemplateLoad(String),

    #[error("Template has {found} pages, {required} required")]
    InsufficientPages { required: usize, found: usize },

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Every document of a non-empty batch failed
    #[error("Batch failed: none of {} documents could be produced", .0.len())]
    BatchFailed(Vec<BatchFailure>),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for certificate operations
pub type Result<T> = std::result::Result<T, CertificateError>;
