//! PDF Document wrapper

use crate::font::{PdfFont, TextMeasure};
use crate::image::{
    calculate_scaled_dimensions, generate_image_operators, ImageScaleMode, ImageXObject,
};
use crate::text::{generate_text_operators, TextRenderContext};
use crate::{Align, FontData, PdfError, Result, StandardFont};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// A4 width in points
pub const A4_WIDTH: f64 = 595.28;
/// A4 height in points
pub const A4_HEIGHT: f64 = 841.89;

/// RGB Color (values 0.0 - 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    /// Create a new RGB color (values 0.0 - 1.0)
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn black() -> Self {
        Self::rgb(0.0, 0.0, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// An image embedded once and shared by every page that draws it
#[derive(Debug, Clone, Copy)]
struct EmbeddedImage {
    object_id: ObjectId,
    width: u32,
    height: u32,
}

/// PDF Document wrapper providing high-level stamping operations
///
/// All maps are ordered so that identical call sequences serialize to
/// identical bytes.
pub struct PdfDocument {
    /// The underlying lopdf document
    inner: Document,
    /// Registered fonts by name
    fonts: BTreeMap<String, PdfFont>,
    /// Current font name
    current_font: Option<String>,
    /// Current font size
    current_font_size: f32,
    /// Current text color
    current_text_color: Color,
    /// Embedded fonts (font name -> PDF object ID)
    embedded_fonts: BTreeMap<String, ObjectId>,
    /// Page font resources (page number -> font name -> resource name)
    page_font_resources: BTreeMap<usize, BTreeMap<String, String>>,
    next_font_resource: u32,
    /// Embedded images (data hash -> image)
    embedded_images: BTreeMap<u64, EmbeddedImage>,
    /// Page image resources (page number -> resource name -> object ID)
    page_image_resources: BTreeMap<usize, BTreeMap<String, ObjectId>>,
    next_image_resource: u32,
    /// Buffered content operators per page (page number -> operators)
    page_content_buffer: BTreeMap<usize, Vec<u8>>,
}

impl PdfDocument {
    /// Open a PDF document from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Open a PDF document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(data).map_err(|e| PdfError::OpenError(e.to_string()))?;
        Ok(Self::from_document(inner))
    }

    /// Wrap an already parsed lopdf document
    pub fn from_document(inner: Document) -> Self {
        Self {
            inner,
            fonts: BTreeMap::new(),
            current_font: None,
            current_font_size: 12.0,
            current_text_color: Color::default(),
            embedded_fonts: BTreeMap::new(),
            page_font_resources: BTreeMap::new(),
            next_font_resource: 1,
            embedded_images: BTreeMap::new(),
            page_image_resources: BTreeMap::new(),
            next_image_resource: 1,
            page_content_buffer: BTreeMap::new(),
        }
    }

    /// Create an empty document with no pages
    ///
    /// Use [`PdfDocument::add_blank_page`] to add A4 pages.
    pub fn blank() -> Self {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(Vec::new())),
            ("Count", Object::Integer(0)),
        ]));

        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));

        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self::from_document(doc)
    }

    /// Get the number of pages in the document
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Register one of the built-in standard fonts
    pub fn add_standard_font(&mut self, name: &str, font: StandardFont) -> Result<()> {
        self.register_font(name, PdfFont::Standard(font))
    }

    /// Add a TrueType font to the document
    ///
    /// # Arguments
    /// * `name` - Font identifier (used in set_font)
    /// * `ttf_data` - TrueType font file bytes
    pub fn add_font(&mut self, name: &str, ttf_data: &[u8]) -> Result<()> {
        let font_data = FontData::from_ttf(name, ttf_data)?;
        self.register_font(name, PdfFont::Embedded(font_data))
    }

    /// Register an already parsed font under `name`
    pub fn register_font(&mut self, name: &str, font: PdfFont) -> Result<()> {
        if self.fonts.contains_key(name) {
            return Err(PdfError::FontAlreadyExists(name.to_string()));
        }

        let font = match font {
            PdfFont::Embedded(mut data) => {
                // The document tracks its own glyph usage
                data.name = name.to_string();
                data.used_chars.clear();
                PdfFont::Embedded(data)
            }
            standard => standard,
        };

        self.fonts.insert(name.to_string(), font);
        Ok(())
    }

    /// Set the current font and size
    pub fn set_font(&mut self, name: &str, size: f32) -> Result<()> {
        if !self.fonts.contains_key(name) {
            return Err(PdfError::FontNotFound(name.to_string()));
        }

        self.current_font = Some(name.to_string());
        self.current_font_size = size;

        Ok(())
    }

    /// Set only the font size (keeps current font)
    pub fn set_font_size(&mut self, size: f32) -> Result<()> {
        if self.current_font.is_none() {
            return Err(PdfError::FontNotFound("No font set".to_string()));
        }

        self.current_font_size = size;
        Ok(())
    }

    /// Set the text color
    pub fn set_text_color(&mut self, color: Color) {
        self.current_text_color = color;
    }

    /// Look up a registered font
    pub fn font(&self, name: &str) -> Result<&PdfFont> {
        self.fonts
            .get(name)
            .ok_or_else(|| PdfError::FontNotFound(name.to_string()))
    }

    fn current_font_name(&self) -> Result<String> {
        self.current_font
            .clone()
            .ok_or_else(|| PdfError::FontNotFound("No font set".to_string()))
    }

    /// Width of `text` in the current font and size
    pub fn get_text_width(&self, text: &str) -> Result<f64> {
        let name = self.current_font_name()?;
        let font = self.font(&name)?;
        Ok(font.text_width(text, self.current_font_size))
    }

    /// Insert text at a specific position
    ///
    /// # Arguments
    /// * `text` - Text to insert
    /// * `page` - Page number (1-indexed)
    /// * `x` - X coordinate in points
    /// * `y` - Baseline Y coordinate in points (from top)
    /// * `align` - Alignment of the text around `x`
    pub fn insert_text(
        &mut self,
        text: &str,
        page: usize,
        x: f64,
        y: f64,
        align: Align,
    ) -> Result<()> {
        self.check_page(page)?;

        if text.is_empty() {
            return Ok(());
        }

        let font_name = self.current_font_name()?;
        let font_size = self.current_font_size;

        let (encoded, text_width) = {
            let font = self
                .fonts
                .get_mut(&font_name)
                .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))?;
            if let PdfFont::Embedded(data) = font {
                data.add_chars(text);
            }
            (font.encode_text(text), font.text_width(text, font_size))
        };

        let font_resource_name = self.get_or_create_font_ref(&font_name, page);

        // Convert Y coordinate from top-origin to PDF bottom-origin
        let (_, page_height) = self.page_size(page)?;
        let pdf_y = page_height - y;

        let ctx = TextRenderContext {
            font_name: font_resource_name,
            font_size,
            text_width,
            color: self.current_text_color,
        };

        let operators = generate_text_operators(&encoded, x, pdf_y, align, &ctx);
        self.buffer_content(page, &operators);

        Ok(())
    }

    /// Draw a straight line between two top-origin points
    #[allow(clippy::too_many_arguments)]
    pub fn draw_line(
        &mut self,
        page: usize,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        line_width: f64,
        color: Color,
    ) -> Result<()> {
        self.check_page(page)?;

        let (_, page_height) = self.page_size(page)?;
        let operators = format!(
            "q\n{} {} {} RG\n{line_width} w\n{x1} {} m\n{x2} {} l\nS\nQ\n",
            color.r,
            color.g,
            color.b,
            page_height - y1,
            page_height - y2,
        );
        self.buffer_content(page, operators.as_bytes());

        Ok(())
    }

    /// Insert an image stretched to the given box
    ///
    /// # Arguments
    /// * `data` - Image file bytes (JPEG or PNG)
    /// * `page` - Page number (1-indexed)
    /// * `x` - X coordinate in points
    /// * `y` - Y coordinate of the top edge in points (from top)
    pub fn insert_image(
        &mut self,
        data: &[u8],
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        self.insert_image_scaled(data, page, x, y, width, height, ImageScaleMode::Stretch)?;
        Ok(())
    }

    /// Insert an image with scaling mode
    ///
    /// Returns the actual drawn (width, height).
    #[allow(clippy::too_many_arguments)]
    pub fn insert_image_scaled(
        &mut self,
        data: &[u8],
        page: usize,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        mode: ImageScaleMode,
    ) -> Result<(f64, f64)> {
        self.check_page(page)?;

        let (image_resource_name, orig_width, orig_height) =
            self.get_or_create_image_ref(data, page)?;

        let (actual_width, actual_height) =
            calculate_scaled_dimensions(orig_width, orig_height, width, height, mode);

        let (_, page_height) = self.page_size(page)?;
        let pdf_y = page_height - y - actual_height;

        let operators =
            generate_image_operators(&image_resource_name, x, pdf_y, actual_width, actual_height);
        self.buffer_content(page, &operators);

        Ok((actual_width, actual_height))
    }

    /// Save the document to a file
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.finalize()?;
        self.inner
            .save(path)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Save the document to bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.finalize()?;

        let mut buffer = Vec::new();
        self.inner
            .save_to(&mut buffer)
            .map_err(|e| PdfError::SaveError(e.to_string()))?;

        Ok(buffer)
    }

    /// Write fonts, resources and buffered content into the lopdf document
    fn finalize(&mut self) -> Result<()> {
        self.embed_fonts()?;
        self.finalize_page_resources()?;
        self.flush_content_buffers()
    }

    /// Embed every font referenced by a page
    fn embed_fonts(&mut self) -> Result<()> {
        let mut font_names: Vec<String> = self
            .page_font_resources
            .values()
            .flat_map(|fonts| fonts.keys().cloned())
            .collect();
        font_names.sort();
        font_names.dedup();

        for font_name in font_names {
            if !self.embedded_fonts.contains_key(&font_name) {
                let id = self.embed_font_object(&font_name)?;
                self.embedded_fonts.insert(font_name, id);
            }
        }

        Ok(())
    }

    /// Embed a single font object into the PDF
    fn embed_font_object(&mut self, font_name: &str) -> Result<ObjectId> {
        let font = self.font(font_name)?.clone();

        let font_data = match font {
            PdfFont::Standard(standard) => {
                return Ok(self.inner.add_object(standard.to_pdf_dictionary()));
            }
            PdfFont::Embedded(data) => data,
        };

        log::debug!(
            "embedding font '{}' ({} characters used)",
            font_name,
            font_data.used_chars.len()
        );
        font_data.embed(&mut self.inner)
    }

    /// Get or create a font resource name for a specific page
    ///
    /// Returns the resource name (e.g., "CF1") for use in content streams.
    fn get_or_create_font_ref(&mut self, font_name: &str, page: usize) -> String {
        let page_resources = self.page_font_resources.entry(page).or_default();

        if let Some(resource_name) = page_resources.get(font_name) {
            return resource_name.clone();
        }

        // Prefixed to stay clear of the template's own resource names
        let resource_name = format!("CF{}", self.next_font_resource);
        self.next_font_resource += 1;

        page_resources.insert(font_name.to_string(), resource_name.clone());

        resource_name
    }

    /// Get or create an image reference for a specific page
    ///
    /// Returns the resource name (e.g., "CIm1") and original pixel dimensions.
    /// Images are deduplicated by hash of their data.
    fn get_or_create_image_ref(&mut self, data: &[u8], page: usize) -> Result<(String, u32, u32)> {
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        let data_hash = hasher.finish();

        let image = match self.embedded_images.get(&data_hash) {
            Some(image) => *image,
            None => {
                let xobject = ImageXObject::from_bytes(data)?;
                log::debug!(
                    "embedding {}x{} image (alpha: {})",
                    xobject.width,
                    xobject.height,
                    xobject.alpha.is_some()
                );

                let image = EmbeddedImage {
                    object_id: xobject.embed(&mut self.inner),
                    width: xobject.width,
                    height: xobject.height,
                };
                self.embedded_images.insert(data_hash, image);
                image
            }
        };

        let page_resources = self.page_image_resources.entry(page).or_default();

        if let Some((name, _)) = page_resources
            .iter()
            .find(|(_, id)| **id == image.object_id)
        {
            return Ok((name.clone(), image.width, image.height));
        }

        let resource_name = format!("CIm{}", self.next_image_resource);
        self.next_image_resource += 1;
        page_resources.insert(resource_name.clone(), image.object_id);

        Ok((resource_name, image.width, image.height))
    }

    /// Add font and image references to each page's Resources dictionary
    fn finalize_page_resources(&mut self) -> Result<()> {
        let mut pages: Vec<usize> = self
            .page_font_resources
            .keys()
            .chain(self.page_image_resources.keys())
            .copied()
            .collect();
        pages.sort_unstable();
        pages.dedup();

        for page in pages {
            let fonts: Vec<(String, ObjectId)> = self
                .page_font_resources
                .get(&page)
                .map(|fonts| {
                    fonts
                        .iter()
                        .map(|(font_name, resource_name)| {
                            self.embedded_fonts
                                .get(font_name)
                                .map(|id| (resource_name.clone(), *id))
                                .ok_or_else(|| PdfError::FontNotFound(font_name.clone()))
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();

            let images: Vec<(String, ObjectId)> = self
                .page_image_resources
                .get(&page)
                .map(|images| images.iter().map(|(n, id)| (n.clone(), *id)).collect())
                .unwrap_or_default();

            self.add_page_resources(page, &fonts, &images)?;
        }

        Ok(())
    }

    /// Merge font and XObject entries into a page's Resources
    ///
    /// Resources may be inline, indirect or inherited from the page tree; the
    /// merged dictionary is written inline on the page itself.
    fn add_page_resources(
        &mut self,
        page: usize,
        fonts: &[(String, ObjectId)],
        images: &[(String, ObjectId)],
    ) -> Result<()> {
        let page_id = self.page_id(page)?;

        let mut resources = self.inherited_dict(page_id, b"Resources")?;
        let mut font_dict = self.resolve_dict(resources.get(b"Font").ok());
        let mut xobject_dict = self.resolve_dict(resources.get(b"XObject").ok());

        for (resource_name, id) in fonts {
            font_dict.set(resource_name.as_bytes(), Object::Reference(*id));
        }
        for (resource_name, id) in images {
            xobject_dict.set(resource_name.as_bytes(), Object::Reference(*id));
        }

        if !fonts.is_empty() {
            resources.set("Font", Object::Dictionary(font_dict));
        }
        if !images.is_empty() {
            resources.set("XObject", Object::Dictionary(xobject_dict));
        }

        let mut page_dict = self.page_dict(page_id)?;
        page_dict.set("Resources", Object::Dictionary(resources));
        self.inner.objects.insert(page_id, page_dict.into());

        Ok(())
    }

    /// Dereference an optional object into an owned dictionary
    fn resolve_dict(&self, object: Option<&Object>) -> Dictionary {
        match object {
            Some(Object::Dictionary(dict)) => dict.clone(),
            Some(Object::Reference(id)) => self
                .inner
                .get_object(*id)
                .ok()
                .and_then(|obj| obj.as_dict().ok())
                .cloned()
                .unwrap_or_default(),
            _ => Dictionary::new(),
        }
    }

    /// Look up a dictionary entry on the page, following the Parent chain
    fn inherited_dict(&self, page_id: ObjectId, key: &[u8]) -> Result<Dictionary> {
        let mut current_id = page_id;

        // Page trees are shallow; 10 levels is a safety limit
        for _ in 0..10 {
            let dict = self.page_dict(current_id)?;
            if let Ok(value) = dict.get(key) {
                return Ok(self.resolve_dict(Some(value)));
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        Ok(Dictionary::new())
    }

    fn page_dict(&self, id: ObjectId) -> Result<Dictionary> {
        self.inner
            .get_object(id)?
            .as_dict()
            .cloned()
            .map_err(|_| PdfError::ParseError("Page object is not a dictionary".to_string()))
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        let pages = self.inner.get_pages();
        pages
            .get(&(page as u32))
            .copied()
            .ok_or(PdfError::InvalidPage(page, pages.len()))
    }

    fn check_page(&self, page: usize) -> Result<()> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PdfError::InvalidPage(page, page_count));
        }
        Ok(())
    }

    /// Get a reference to the underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.inner
    }

    /// Page (width, height) in points
    ///
    /// Reads the MediaBox (or CropBox), following the Parent chain.
    /// Falls back to A4 when no box is present.
    pub fn page_size(&self, page: usize) -> Result<(f64, f64)> {
        let mut current_id = self.page_id(page)?;

        for _ in 0..10 {
            let dict = self.page_dict(current_id)?;

            if let Ok(media_box) = dict.get(b"MediaBox").or_else(|_| dict.get(b"CropBox")) {
                let media_box_array = match media_box {
                    Object::Array(arr) => arr.clone(),
                    Object::Reference(ref_id) => self
                        .inner
                        .get_object(*ref_id)?
                        .as_array()
                        .map_err(|_| {
                            PdfError::ParseError("MediaBox reference is not an array".to_string())
                        })?
                        .clone(),
                    _ => return Err(PdfError::ParseError("MediaBox is not an array".to_string())),
                };
                return extract_size_from_media_box(&media_box_array);
            }

            match dict.get(b"Parent") {
                Ok(Object::Reference(parent_id)) => current_id = *parent_id,
                _ => break,
            }
        }

        Ok((A4_WIDTH, A4_HEIGHT))
    }

    /// Buffer content operators for a page (written at save time)
    fn buffer_content(&mut self, page: usize, content: &[u8]) {
        self.page_content_buffer
            .entry(page)
            .or_default()
            .extend_from_slice(content);
    }

    /// Flush all buffered content to page streams
    fn flush_content_buffers(&mut self) -> Result<()> {
        let buffers = std::mem::take(&mut self.page_content_buffer);

        for (page, content) in buffers {
            if !content.is_empty() {
                self.append_to_content_stream(page, &content)?;
            }
        }

        Ok(())
    }

    /// Append content to a page's content stream
    ///
    /// The template's existing streams are kept as they are (compressed or
    /// not) and wrapped in a `q`/`Q` pair, so their graphics state cannot
    /// leak into the stamped content.
    fn append_to_content_stream(&mut self, page: usize, content: &[u8]) -> Result<()> {
        let page_id = self.page_id(page)?;
        let mut page_dict = self.page_dict(page_id)?;

        let existing: Vec<Object> = match page_dict.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Stream(stream)) => {
                let id = self.inner.add_object(stream.clone());
                vec![Object::Reference(id)]
            }
            _ => Vec::new(),
        };

        let mut contents = Vec::with_capacity(existing.len() + 2);
        if !existing.is_empty() {
            let save_id = self
                .inner
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(save_id));
            contents.extend(existing);
        }

        let mut stamped = Vec::with_capacity(content.len() + 3);
        if contents.len() > 1 {
            stamped.extend_from_slice(b"\nQ\n");
        }
        stamped.extend_from_slice(content);
        let stamped_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), stamped));
        contents.push(Object::Reference(stamped_id));

        page_dict.set("Contents", Object::Array(contents));
        self.inner.objects.insert(page_id, page_dict.into());

        Ok(())
    }

    /// Add a blank A4 page to the end of the document
    ///
    /// # Returns
    /// New page number (1-indexed)
    pub fn add_blank_page(&mut self) -> Result<usize> {
        let page_count = self.page_count();
        let pages_id = self.pages_root_id()?;

        let contents_id = self
            .inner
            .add_object(Stream::new(Dictionary::new(), Vec::new()));

        let page_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(A4_WIDTH as f32),
                    Object::Real(A4_HEIGHT as f32),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(contents_id)),
        ]);
        let new_page_id = self.inner.add_object(page_dict);

        let mut pages_dict = self.page_dict(pages_id)?;
        let mut kids = pages_dict
            .get(b"Kids")
            .and_then(|kids| kids.as_array())
            .map_err(|_| PdfError::ParseError("Pages object missing Kids array".to_string()))?
            .clone();
        kids.push(Object::Reference(new_page_id));
        let count = pages_dict
            .get(b"Count")
            .and_then(|count| count.as_i64())
            .map_err(|_| PdfError::ParseError("Pages object missing Count".to_string()))?;

        pages_dict.set("Kids", Object::Array(kids));
        pages_dict.set("Count", Object::Integer(count + 1));
        self.inner.objects.insert(pages_id, pages_dict.into());

        Ok(page_count + 1)
    }

    /// Object id of the root Pages node
    fn pages_root_id(&self) -> Result<ObjectId> {
        let catalog_id = self
            .inner
            .trailer
            .get(b"Root")
            .and_then(|root| root.as_reference())
            .map_err(|_| PdfError::ParseError("Document trailer missing Root entry".to_string()))?;

        self.inner
            .get_object(catalog_id)?
            .as_dict()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(|pages| pages.as_reference())
            .map_err(|_| PdfError::ParseError("Catalog missing Pages entry".to_string()))
    }
}

/// Extract (width, height) from a MediaBox array
fn extract_size_from_media_box(media_box: &[Object]) -> Result<(f64, f64)> {
    if media_box.len() < 4 {
        return Err(PdfError::ParseError("Invalid MediaBox format".to_string()));
    }

    let number = |index: usize| -> Result<f64> {
        let value = &media_box[index];
        value
            .as_f32()
            .map(|v| v as f64)
            .ok()
            .or_else(|| value.as_i64().ok().map(|v| v as f64))
            .ok_or_else(|| PdfError::ParseError(format!("Invalid MediaBox entry {index}")))
    };

    Ok((number(2)? - number(0)?, number(3)? - number(1)?))
}
