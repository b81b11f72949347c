//! Generation request and page layout types
//!
//! Everything here deserializes from camelCase JSON. Missing options take
//! their defaults at deserialization time, so the renderer never falls
//! back to literals of its own.

use crate::{CertificateError, Result};
use pdf_core::Rect;
use serde::{Deserialize, Serialize};

/// The person a certificate is issued to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub name: String,
    /// Document number, registration or similar
    #[serde(default)]
    pub identifier: Option<String>,
}

impl Recipient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }
}

/// A labeled course detail, printed as `Label: value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseField {
    pub label: String,
    pub value: String,
}

impl CourseField {
    pub fn new(label: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub name: String,
    #[serde(default)]
    pub credential: Option<String>,
}

/// A person signing off the certificate technically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalApprover {
    pub name: String,
    #[serde(default)]
    pub credential: Option<String>,
    /// Encoded signature image (PNG or JPEG)
    #[serde(default)]
    pub signature_image: Option<Vec<u8>>,
}

/// Font size per field in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FontSizes {
    pub recipient_name: f32,
    pub identifier: f32,
    pub course_field: f32,
    pub compliance: f32,
    pub content: f32,
    pub notes: f32,
    pub instructor: f32,
    pub signature_name: f32,
    pub signature_caption: f32,
    /// Floor for auto-shrinking
    pub min_size: f32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            recipient_name: 22.0,
            identifier: 12.0,
            course_field: 11.0,
            compliance: 11.0,
            content: 10.0,
            notes: 10.0,
            instructor: 10.0,
            signature_name: 9.0,
            signature_caption: 8.0,
            min_size: 8.0,
        }
    }
}

impl FontSizes {
    fn entries(&self) -> [(&'static str, f32); 10] {
        [
            ("recipientName", self.recipient_name),
            ("identifier", self.identifier),
            ("courseField", self.course_field),
            ("compliance", self.compliance),
            ("content", self.content),
            ("notes", self.notes),
            ("instructor", self.instructor),
            ("signatureName", self.signature_name),
            ("signatureCaption", self.signature_caption),
            ("minSize", self.min_size),
        ]
    }
}

/// Bounding box for signature images, in points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignatureBox {
    pub width: f64,
    pub height: f64,
    /// Extra downward shift of the placed image
    pub vertical_offset: f64,
}

impl Default for SignatureBox {
    fn default() -> Self {
        Self {
            width: 120.0,
            height: 40.0,
            vertical_offset: 0.0,
        }
    }
}

/// Everything needed to render one certificate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationRequest {
    pub recipient: Recipient,
    pub course_fields: Vec<CourseField>,
    pub compliance_text: String,
    pub content_text: String,
    pub notes_text: Option<String>,
    pub instructors: Vec<Instructor>,
    pub technical_approvers: Vec<TechnicalApprover>,
    pub font_sizes: FontSizes,
    pub signature_box: SignatureBox,
    pub include_notes_page: bool,
}

impl GenerationRequest {
    /// Parse a request from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Copy of this request addressed to `recipient`
    ///
    /// Course data, people and options are shared by every recipient of a
    /// batch; each copy is independent.
    pub fn for_recipient(&self, recipient: Recipient) -> Self {
        Self {
            recipient,
            ..self.clone()
        }
    }

    /// Number of template pages this request writes to
    pub fn required_pages(&self) -> usize {
        if self.include_notes_page {
            3
        } else {
            2
        }
    }

    /// Check preconditions before rendering
    pub fn validate(&self) -> Result<()> {
        if self.recipient.name.trim().is_empty() {
            return Err(CertificateError::Validation(
                "recipient name is empty".to_string(),
            ));
        }

        for (field, size) in self.font_sizes.entries() {
            if !size.is_finite() || size <= 0.0 {
                return Err(CertificateError::Validation(format!(
                    "font size '{field}' must be positive, got {size}"
                )));
            }
        }

        let sig = &self.signature_box;
        if !(sig.width > 0.0 && sig.height > 0.0) || !sig.vertical_offset.is_finite() {
            return Err(CertificateError::Validation(format!(
                "invalid signature box {}x{} (offset {})",
                sig.width, sig.height, sig.vertical_offset
            )));
        }

        Ok(())
    }
}

/// A rectangular region in top-origin page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Fixed text printed around the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Labels {
    pub identifier: String,
    pub instructors_heading: String,
    pub recipient_caption: String,
    /// Caption for approvers without a credential
    pub approver_caption: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            identifier: "ID".to_string(),
            instructors_heading: "Instructors".to_string(),
            recipient_caption: "Participant".to_string(),
            approver_caption: "Technical Approver".to_string(),
        }
    }
}

/// Coordinates of every region on the template pages
///
/// The defaults match the shipped A4 template. A layout for another
/// template can be loaded with [`PageLayout::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageLayout {
    // Page 1
    pub recipient_name: Region,
    pub identifier: Region,
    pub course_fields: Region,
    pub compliance: Region,

    // Page 2
    pub content: Region,
    pub instructors: Region,
    /// First signature row; `height` is the space above the signature line
    pub signatures: Region,
    /// Minimum horizontal gap between signature slots
    pub signature_gap: f64,
    /// Distance between the tops of consecutive signature rows
    pub signature_row_spacing: f64,
    /// Gap between the signature image area and the line
    pub signature_line_offset: f64,
    pub signature_line_width: f64,

    // Page 3
    pub notes: Region,

    /// Extra space between wrapped lines
    pub line_gap: f64,
    pub labels: Labels,
}

impl Default for PageLayout {
    fn default() -> Self {
        let width = pdf_core::A4_WIDTH - 120.0;
        Self {
            recipient_name: Region::new(60.0, 250.0, width, 30.0),
            identifier: Region::new(60.0, 290.0, width, 18.0),
            course_fields: Region::new(60.0, 330.0, width, 160.0),
            compliance: Region::new(60.0, 510.0, width, 220.0),
            content: Region::new(60.0, 80.0, width, 380.0),
            instructors: Region::new(60.0, 480.0, width, 100.0),
            signatures: Region::new(60.0, 610.0, width, 40.0),
            signature_gap: 20.0,
            signature_row_spacing: 100.0,
            signature_line_offset: 4.0,
            signature_line_width: 0.5,
            notes: Region::new(60.0, 80.0, width, 680.0),
            line_gap: 2.0,
            labels: Labels::default(),
        }
    }
}

impl PageLayout {
    /// Parse and validate a layout from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let layout: PageLayout = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        let regions = [
            ("recipientName", self.recipient_name),
            ("identifier", self.identifier),
            ("courseFields", self.course_fields),
            ("compliance", self.compliance),
            ("content", self.content),
            ("instructors", self.instructors),
            ("signatures", self.signatures),
            ("notes", self.notes),
        ];

        for (name, region) in regions {
            if !(region.width > 0.0 && region.height > 0.0) {
                return Err(CertificateError::Config(format!(
                    "region '{name}' must have a positive size"
                )));
            }
        }

        if self.signature_gap < 0.0 || self.line_gap < 0.0 {
            return Err(CertificateError::Config(
                "gaps must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
