//! Certificate rendering

use crate::background::{decode_rgba, encode_png, BackgroundRemoval};
use crate::layout::{fit_single_line, place_signature, plan_signature_rows};
use crate::schema::{FontSizes, GenerationRequest, PageLayout, SignatureBox};
use crate::{CertificateError, Result};
use log::{debug, warn};
use pdf_core::{
    fit_block, image_dimensions, wrap_text, Align, Color, FontData, PdfDocument, PdfFont, Rect,
    StandardFont, A4_HEIGHT, A4_WIDTH,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Horizontal margin of the placeholder page
const PLACEHOLDER_MARGIN: f64 = 40.0;

/// A parsed template PDF
///
/// Loaded once per run; every render works on its own copy.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    document: lopdf::Document,
    page_count: usize,
}

impl DocumentTemplate {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = lopdf::Document::load_mem(data)
            .map_err(|e| CertificateError::TemplateLoad(e.to_string()))?;

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(CertificateError::TemplateLoad(
                "template has no pages".to_string(),
            ));
        }

        Ok(Self {
            document,
            page_count,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    fn instantiate(&self) -> PdfDocument {
        PdfDocument::from_document(self.document.clone())
    }
}

/// Which of the two faces a piece of text uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    Regular,
    Bold,
}

impl FontRole {
    /// Name the font is registered under in each document
    fn resource_name(&self) -> &'static str {
        match self {
            FontRole::Regular => "regular",
            FontRole::Bold => "bold",
        }
    }
}

impl FromStr for FontRole {
    type Err = CertificateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(FontRole::Regular),
            "bold" => Ok(FontRole::Bold),
            other => Err(CertificateError::Config(format!(
                "unknown font role '{other}' (expected 'regular' or 'bold')"
            ))),
        }
    }
}

/// A non-fatal problem encountered while rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderWarning {
    /// The template could not be used; a placeholder was produced
    TemplateUnavailable { reason: String },
    /// A signature image could not be decoded and was left out
    SignatureSkipped { approver: String, reason: String },
    /// Text did not fit its region even at the minimum size
    #[serde(rename_all = "camelCase")]
    LayoutOverflow { region: String, dropped_lines: usize },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::TemplateUnavailable { reason } => {
                write!(f, "template unavailable: {reason}")
            }
            RenderWarning::SignatureSkipped { approver, reason } => {
                write!(f, "signature of '{approver}' skipped: {reason}")
            }
            RenderWarning::LayoutOverflow {
                region,
                dropped_lines,
            } => write!(
                f,
                "text overflows region '{region}', {dropped_lines} line(s) clipped"
            ),
        }
    }
}

/// One finished certificate
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub warnings: Vec<RenderWarning>,
}

/// Stamps generation requests onto a template
///
/// Holds only configuration: the page layout, the two fonts and the
/// optional signature cleanup. Rendering never mutates it.
#[derive(Debug, Clone)]
pub struct CertificateRenderer {
    layout: PageLayout,
    regular: PdfFont,
    bold: PdfFont,
    signature_cleanup: Option<BackgroundRemoval>,
}

impl Default for CertificateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateRenderer {
    /// Renderer with the default layout and the built-in Helvetica faces
    pub fn new() -> Self {
        Self::with_layout(PageLayout::default())
    }

    pub fn with_layout(layout: PageLayout) -> Self {
        Self {
            layout,
            regular: PdfFont::Standard(StandardFont::Helvetica),
            bold: PdfFont::Standard(StandardFont::HelveticaBold),
            signature_cleanup: None,
        }
    }

    /// Use a TrueType font for one role
    pub fn with_font(mut self, role: FontRole, ttf_data: &[u8]) -> Result<Self> {
        self.load_font(role, ttf_data)?;
        Ok(self)
    }

    /// Remove signature backgrounds before placing them
    pub fn with_signature_cleanup(mut self, removal: BackgroundRemoval) -> Self {
        self.signature_cleanup = Some(removal);
        self
    }

    pub fn set_signature_cleanup(&mut self, removal: Option<BackgroundRemoval>) {
        self.signature_cleanup = removal;
    }

    pub fn load_font(&mut self, role: FontRole, ttf_data: &[u8]) -> Result<()> {
        let font = PdfFont::Embedded(FontData::from_ttf(role.resource_name(), ttf_data)?);
        match role {
            FontRole::Regular => self.regular = font,
            FontRole::Bold => self.bold = font,
        }
        Ok(())
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: PageLayout) {
        self.layout = layout;
    }

    fn font(&self, role: FontRole) -> &PdfFont {
        match role {
            FontRole::Regular => &self.regular,
            FontRole::Bold => &self.bold,
        }
    }

    /// Render one certificate
    ///
    /// `template` is `None` when the template could not be loaded; the
    /// result is then a placeholder page with the recipient's name.
    pub fn render(
        &self,
        template: Option<&DocumentTemplate>,
        request: &GenerationRequest,
    ) -> Result<RenderedDocument> {
        request.validate()?;

        let Some(template) = template else {
            warn!(
                "template unavailable, rendering placeholder for '{}'",
                request.recipient.name
            );
            let mut placeholder = self.render_placeholder(request)?;
            placeholder
                .warnings
                .push(RenderWarning::TemplateUnavailable {
                    reason: "template not loaded".to_string(),
                });
            return Ok(placeholder);
        };

        let required = request.required_pages();
        if template.page_count() < required {
            return Err(CertificateError::InsufficientPages {
                required,
                found: template.page_count(),
            });
        }

        let mut doc = template.instantiate();
        doc.register_font(FontRole::Regular.resource_name(), self.regular.clone())?;
        doc.register_font(FontRole::Bold.resource_name(), self.bold.clone())?;

        let mut warnings = Vec::new();
        {
            let mut writer = PageWriter {
                renderer: self,
                doc: &mut doc,
                warnings: &mut warnings,
                sizes: request.font_sizes,
            };
            writer.front_page(request)?;
            writer.content_page(request)?;
            if request.include_notes_page {
                writer.notes_page(request)?;
            }
        }

        let bytes = doc.to_bytes()?;
        debug!(
            "rendered certificate for '{}' ({} bytes, {} warnings)",
            request.recipient.name,
            bytes.len(),
            warnings.len()
        );

        Ok(RenderedDocument { bytes, warnings })
    }

    /// Single A4 page with the recipient's name centered in Helvetica
    pub fn render_placeholder(&self, request: &GenerationRequest) -> Result<RenderedDocument> {
        request.validate()?;

        let font = StandardFont::Helvetica;
        let name = request.recipient.name.trim();

        let mut doc = PdfDocument::blank();
        doc.add_standard_font("placeholder", font)?;
        let page = doc.add_blank_page()?;

        let (size, _) = fit_single_line(
            name,
            &font,
            request.font_sizes.recipient_name,
            A4_WIDTH - 2.0 * PLACEHOLDER_MARGIN,
            request.font_sizes.min_size,
        );
        doc.set_font("placeholder", size)?;
        doc.insert_text(name, page, A4_WIDTH / 2.0, A4_HEIGHT / 2.0, Align::Center)?;

        Ok(RenderedDocument {
            bytes: doc.to_bytes()?,
            warnings: Vec::new(),
        })
    }

    /// Decode a signature into a PNG ready for embedding
    fn prepare_signature(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let mut rgba = decode_rgba(image_bytes)?;
        if let Some(removal) = &self.signature_cleanup {
            removal.apply_to(&mut rgba);
        }
        encode_png(rgba)
    }
}

/// Writes one request's content into a document
struct PageWriter<'a> {
    renderer: &'a CertificateRenderer,
    doc: &'a mut PdfDocument,
    warnings: &'a mut Vec<RenderWarning>,
    sizes: FontSizes,
}

impl PageWriter<'_> {
    fn layout(&self) -> &PageLayout {
        &self.renderer.layout
    }

    fn line_height(&self, size: f32) -> f64 {
        size as f64 + self.layout().line_gap
    }

    /// Page 1: name, identifier, course details and compliance text
    fn front_page(&mut self, request: &GenerationRequest) -> Result<()> {
        let renderer = self.renderer;
        let layout = &renderer.layout;

        self.single_line(
            1,
            "recipientName",
            request.recipient.name.trim(),
            FontRole::Bold,
            self.sizes.recipient_name,
            layout.recipient_name.rect(),
            Align::Center,
        )?;

        if let Some(identifier) = request
            .recipient
            .identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            let text = format!("{}: {}", layout.labels.identifier, identifier);
            self.single_line(
                1,
                "identifier",
                &text,
                FontRole::Regular,
                self.sizes.identifier,
                layout.identifier.rect(),
                Align::Center,
            )?;
        }

        let fields: Vec<String> = request
            .course_fields
            .iter()
            .map(|field| format!("{}: {}", field.label, field.value))
            .collect();
        self.wrapped_block(
            1,
            "courseFields",
            &fields,
            FontRole::Regular,
            self.sizes.course_field,
            layout.course_fields.rect(),
        )?;

        self.wrapped_block(
            1,
            "compliance",
            std::slice::from_ref(&request.compliance_text),
            FontRole::Regular,
            self.sizes.compliance,
            layout.compliance.rect(),
        )
    }

    /// Page 2: course content, instructors and signatures
    fn content_page(&mut self, request: &GenerationRequest) -> Result<()> {
        let renderer = self.renderer;
        let layout = &renderer.layout;

        self.fitted_block(
            2,
            "content",
            &request.content_text,
            self.sizes.content,
            layout.content.rect(),
        )?;

        if !request.instructors.is_empty() {
            let size = self.sizes.instructor;
            let region = layout.instructors.rect();
            let heading_height = self.line_height(size);

            self.single_line(
                2,
                "instructors",
                &layout.labels.instructors_heading,
                FontRole::Bold,
                size,
                Rect::new(region.x, region.y, region.width, heading_height),
                Align::Left,
            )?;

            let entries: Vec<String> = request
                .instructors
                .iter()
                .map(|instructor| match instructor.credential.as_deref() {
                    Some(credential) if !credential.trim().is_empty() => {
                        format!("{} — {}", instructor.name, credential)
                    }
                    _ => instructor.name.clone(),
                })
                .collect();
            self.wrapped_block(
                2,
                "instructors",
                &entries,
                FontRole::Regular,
                size,
                Rect::new(
                    region.x,
                    region.y + heading_height,
                    region.width,
                    (region.height - heading_height).max(0.0),
                ),
            )?;
        }

        self.signature_area(request)
    }

    /// Page 3: notes
    fn notes_page(&mut self, request: &GenerationRequest) -> Result<()> {
        let notes = request.notes_text.as_deref().unwrap_or_default();
        self.fitted_block(
            3,
            "notes",
            notes,
            self.sizes.notes,
            self.renderer.layout.notes.rect(),
        )
    }

    fn signature_area(&mut self, request: &GenerationRequest) -> Result<()> {
        let renderer = self.renderer;
        let layout = &renderer.layout;
        let approvers = &request.technical_approvers;

        let rows = plan_signature_rows(
            approvers.len(),
            layout.signatures.rect(),
            layout.signature_gap,
            layout.signature_row_spacing,
        );

        for (approver, slot) in approvers.iter().zip(&rows.approvers) {
            if let Some(image) = &approver.signature_image {
                self.signature_image(2, &approver.name, image, *slot, request.signature_box)?;
            }

            let caption = approver
                .credential
                .as_deref()
                .filter(|credential| !credential.trim().is_empty())
                .unwrap_or(layout.labels.approver_caption.as_str());
            self.signature_line(2, *slot, &approver.name, caption)?;
        }

        self.signature_line(
            2,
            rows.recipient,
            request.recipient.name.trim(),
            &layout.labels.recipient_caption,
        )
    }

    /// Draw a signature image just above the slot's line
    ///
    /// An image that cannot be decoded is skipped with a warning.
    fn signature_image(
        &mut self,
        page: usize,
        approver: &str,
        image: &[u8],
        slot: Rect,
        signature_box: SignatureBox,
    ) -> Result<()> {
        let png = match self.renderer.prepare_signature(image) {
            Ok(png) => png,
            Err(e) => {
                warn!("skipping signature of '{approver}': {e}");
                self.warnings.push(RenderWarning::SignatureSkipped {
                    approver: approver.to_string(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let anchor = Rect::new(
            slot.x,
            slot.bottom() - signature_box.height,
            slot.width,
            signature_box.height,
        );
        let placed = place_signature(
            image_dimensions(&png)?,
            signature_box.width.min(slot.width),
            signature_box.height,
            anchor,
            signature_box.vertical_offset,
        );
        debug!(
            "signature of '{approver}' at ({:.1}, {:.1}) {:.1}x{:.1}",
            placed.x, placed.y, placed.width, placed.height
        );

        self.doc.insert_image(
            &png,
            page,
            placed.x,
            placed.y,
            placed.width,
            placed.height,
        )?;
        Ok(())
    }

    /// Signature line with the signer's name and caption underneath
    fn signature_line(&mut self, page: usize, slot: Rect, name: &str, caption: &str) -> Result<()> {
        let renderer = self.renderer;
        let layout = &renderer.layout;
        let line_y = slot.bottom() + layout.signature_line_offset;

        self.doc.draw_line(
            page,
            slot.x,
            line_y,
            slot.right(),
            line_y,
            layout.signature_line_width,
            Color::black(),
        )?;

        let name_region = Rect::new(
            slot.x,
            line_y + layout.line_gap,
            slot.width,
            self.line_height(self.sizes.signature_name),
        );
        self.single_line(
            page,
            "signatureName",
            name,
            FontRole::Bold,
            self.sizes.signature_name,
            name_region,
            Align::Center,
        )?;

        let caption_region = Rect::new(
            slot.x,
            name_region.bottom(),
            slot.width,
            self.line_height(self.sizes.signature_caption),
        );
        self.single_line(
            page,
            "signatureCaption",
            caption,
            FontRole::Regular,
            self.sizes.signature_caption,
            caption_region,
            Align::Center,
        )
    }

    /// One line shrunk to the region width, wrapped at the floor size if
    /// it still does not fit
    #[allow(clippy::too_many_arguments)]
    fn single_line(
        &mut self,
        page: usize,
        region_name: &str,
        text: &str,
        role: FontRole,
        size: f32,
        region: Rect,
        align: Align,
    ) -> Result<()> {
        let renderer = self.renderer;
        let (fitted, fits) = fit_single_line(
            text,
            renderer.font(role),
            size,
            region.width,
            self.sizes.min_size,
        );

        if fitted < size {
            debug!("{region_name}: shrunk from {size}pt to {fitted}pt");
        }

        if fits {
            let line = [text.to_string()];
            return self.draw_lines(page, role, fitted, &line, region, align);
        }

        let lines = wrap_text(text, renderer.font(role), fitted, region.width);
        let lines = self.clip(region_name, lines, self.line_height(fitted), region);
        self.draw_lines(page, role, fitted, &lines, region, align)
    }

    /// Paragraphs wrapped at a fixed size, clipped to the region
    fn wrapped_block(
        &mut self,
        page: usize,
        region_name: &str,
        paragraphs: &[String],
        role: FontRole,
        size: f32,
        region: Rect,
    ) -> Result<()> {
        let renderer = self.renderer;
        let lines: Vec<String> = paragraphs
            .iter()
            .flat_map(|paragraph| wrap_text(paragraph, renderer.font(role), size, region.width))
            .collect();

        let lines = self.clip(region_name, lines, self.line_height(size), region);
        self.draw_lines(page, role, size, &lines, region, Align::Left)
    }

    /// Text auto-shrunk to fit the region, clipped past the floor size
    fn fitted_block(
        &mut self,
        page: usize,
        region_name: &str,
        text: &str,
        size: f32,
        region: Rect,
    ) -> Result<()> {
        let block = fit_block(
            text,
            self.renderer.font(FontRole::Regular),
            size,
            region.width,
            region.height,
            self.sizes.min_size,
            self.layout().line_gap,
        );

        if block.font_size < size {
            debug!(
                "{region_name}: shrunk from {size}pt to {}pt ({} lines)",
                block.font_size,
                block.lines.len()
            );
        }

        let lines = self.clip(region_name, block.lines, block.line_height, region);
        self.draw_lines(
            page,
            FontRole::Regular,
            block.font_size,
            &lines,
            region,
            Align::Left,
        )
    }

    /// Drop the lines that do not fit the region height
    fn clip(
        &mut self,
        region_name: &str,
        mut lines: Vec<String>,
        line_height: f64,
        region: Rect,
    ) -> Vec<String> {
        let visible = if line_height > 0.0 {
            ((region.height / line_height).floor().max(0.0) as usize).min(lines.len())
        } else {
            lines.len()
        };

        if visible < lines.len() {
            let dropped_lines = lines.len() - visible;
            warn!("text overflows region '{region_name}', clipping {dropped_lines} line(s)");
            self.warnings.push(RenderWarning::LayoutOverflow {
                region: region_name.to_string(),
                dropped_lines,
            });
            lines.truncate(visible);
        }

        lines
    }

    /// Draw lines top-down; the first baseline sits one font size below the top
    fn draw_lines(
        &mut self,
        page: usize,
        role: FontRole,
        size: f32,
        lines: &[String],
        region: Rect,
        align: Align,
    ) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        self.doc.set_font(role.resource_name(), size)?;

        let x = match align {
            Align::Left => region.x,
            Align::Center => region.center_x(),
            Align::Right => region.right(),
        };
        let line_height = self.line_height(size);

        let mut baseline = region.y + size as f64;
        for line in lines {
            self.doc.insert_text(line, page, x, baseline, align)?;
            baseline += line_height;
        }

        Ok(())
    }
}
