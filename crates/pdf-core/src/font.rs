//! Fonts: text measurement and TrueType embedding

use crate::standard::StandardFont;
use crate::{PdfError, Result};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::io::Write as _;

/// Anything that can measure a run of text
///
/// Wrapping and auto-shrinking work against this trait so they can be
/// exercised with the built-in fonts, embedded fonts or a test double.
pub trait TextMeasure {
    /// Width of `text` in points at `font_size`
    fn text_width(&self, text: &str, font_size: f32) -> f64;
}

impl TextMeasure for StandardFont {
    fn text_width(&self, text: &str, font_size: f32) -> f64 {
        self.text_width_points(text, font_size) as f64
    }
}

impl TextMeasure for FontData {
    fn text_width(&self, text: &str, font_size: f32) -> f64 {
        self.text_width_points(text, font_size) as f64
    }
}

/// A font registered in a document
#[derive(Debug, Clone)]
pub enum PdfFont {
    /// One of the standard 14 fonts, referenced by name only
    Standard(StandardFont),
    /// A TrueType font embedded as Type0 / Identity-H
    Embedded(FontData),
}

impl PdfFont {
    /// Encode text for a `Tj` operator in this font's encoding
    pub fn encode_text(&self, text: &str) -> String {
        match self {
            PdfFont::Standard(font) => font.encode_text_literal(text),
            PdfFont::Embedded(font) => font.encode_text_hex(text),
        }
    }
}

impl TextMeasure for PdfFont {
    fn text_width(&self, text: &str, font_size: f32) -> f64 {
        match self {
            PdfFont::Standard(font) => font.text_width(text, font_size),
            PdfFont::Embedded(font) => font.text_width(text, font_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Glyph {
    id: u16,
    advance: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VerticalMetrics {
    units_per_em: u16,
    ascender: i16,
    descender: i16,
}

impl Default for VerticalMetrics {
    fn default() -> Self {
        Self {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
        }
    }
}

/// A parsed TrueType font
///
/// The glyph table is read once when the font is loaded, so the data can
/// be cloned into every document without reparsing.
#[derive(Debug, Clone)]
pub struct FontData {
    /// Name used as the PDF BaseFont
    pub name: String,
    /// Raw TTF data, embedded as FontFile2
    pub ttf_data: Vec<u8>,
    /// Characters drawn so far; drives /W and ToUnicode
    pub used_chars: BTreeSet<char>,
    metrics: VerticalMetrics,
    glyphs: BTreeMap<char, Glyph>,
    /// Advance of glyph 0, drawn for every unmapped character
    notdef_advance: u16,
}

impl FontData {
    /// Parse TTF bytes
    pub fn from_ttf(name: &str, ttf_data: &[u8]) -> Result<Self> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| PdfError::FontParseError(format!("{e:?}")))?;

        let mut glyphs = BTreeMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code_point| {
                    let (Some(c), Some(id)) =
                        (char::from_u32(code_point), subtable.glyph_index(code_point))
                    else {
                        return;
                    };
                    let advance = face.glyph_hor_advance(id).unwrap_or(0);
                    glyphs.entry(c).or_insert(Glyph { id: id.0, advance });
                });
            }
        }

        let notdef_advance = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .unwrap_or_else(|| face.units_per_em());

        log::debug!("parsed font '{}': {} mapped characters", name, glyphs.len());

        Ok(Self {
            name: name.to_string(),
            ttf_data: ttf_data.to_vec(),
            used_chars: BTreeSet::new(),
            metrics: VerticalMetrics {
                units_per_em: face.units_per_em(),
                ascender: face.ascender(),
                descender: face.descender(),
            },
            glyphs,
            notdef_advance,
        })
    }

    /// Record characters that will appear in the document
    pub fn add_chars(&mut self, text: &str) {
        self.used_chars.extend(text.chars());
    }

    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.glyphs.get(&c).map(|glyph| glyph.id)
    }

    /// Glyph drawn for `c`, .notdef when the font does not map it
    fn glyph(&self, c: char) -> Glyph {
        self.glyphs.get(&c).copied().unwrap_or(Glyph {
            id: 0,
            advance: self.notdef_advance,
        })
    }

    /// The font maps `c` to a real glyph (not .notdef)
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).is_some_and(|id| id != 0)
    }

    pub fn units_per_em(&self) -> u16 {
        self.metrics.units_per_em
    }

    /// Advance widths of `text` in font units
    ///
    /// Unmapped characters are measured as the .notdef glyph they render as.
    pub fn text_width_units(&self, text: &str) -> u32 {
        text.chars().map(|c| self.glyph(c).advance as u32).sum()
    }

    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        self.text_width_units(text) as f32 / self.units_per_em() as f32 * font_size
    }

    /// Glyph ids as a hex string for `Tj` under Identity-H
    pub fn encode_text_hex(&self, text: &str) -> String {
        let mut hex = String::with_capacity(text.len() * 4 + 2);
        hex.push('<');
        for c in text.chars() {
            let _ = write!(hex, "{:04X}", self.glyph(c).id);
        }
        hex.push('>');
        hex
    }

    /// Write the Type0 font and its descendants into `doc`
    ///
    /// Returns the id of the Type0 dictionary to reference from page
    /// resources.
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        let base_font = Object::Name(self.name.clone().into_bytes());
        let VerticalMetrics {
            units_per_em,
            ascender,
            descender,
        } = self.metrics;

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&self.ttf_data)?;
        let font_file_id = doc.add_object(Stream::new(
            dictionary! {
                "Length1" => self.ttf_data.len() as i64,
                "Filter" => "FlateDecode",
            },
            encoder.finish()?,
        ));

        // Bounding box approximated from the vertical metrics
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => 4i64,
            "FontBBox" => vec![
                Object::Integer(0),
                Object::Integer(descender as i64),
                Object::Integer(units_per_em as i64),
                Object::Integer(ascender as i64),
            ],
            "ItalicAngle" => 0i64,
            "Ascent" => ascender as i64,
            "Descent" => descender as i64,
            "CapHeight" => ascender as i64,
            "StemV" => 80i64,
            "FontFile2" => font_file_id,
        });

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0i64,
            },
            "CIDToGIDMap" => "Identity",
            "W" => self.widths(),
            "DW" => 1000i64,
            "FontDescriptor" => descriptor_id,
        });

        let tounicode_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "CMap" },
            self.tounicode_cmap().into_bytes(),
        ));

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => tounicode_id,
        }))
    }

    /// /W array for the used glyphs, in 1000 units per em
    ///
    /// Runs of consecutive glyph ids share one entry: `first [w1 w2 ...]`.
    fn widths(&self) -> Vec<Object> {
        let scale = 1000.0 / self.units_per_em() as f64;
        let used: BTreeMap<u16, i64> = self
            .used_chars
            .iter()
            .map(|&c| self.glyph(c))
            .map(|glyph| (glyph.id, (glyph.advance as f64 * scale).round() as i64))
            .collect();

        let mut runs: Vec<(u16, Vec<Object>)> = Vec::new();
        for (id, width) in used {
            match runs.last_mut() {
                Some((first, widths)) if *first as usize + widths.len() == id as usize => {
                    widths.push(width.into())
                }
                _ => runs.push((id, vec![width.into()])),
            }
        }

        runs.into_iter()
            .flat_map(|(first, widths)| [Object::Integer(first as i64), Object::Array(widths)])
            .collect()
    }

    /// ToUnicode CMap mapping glyph ids back to the used characters
    fn tounicode_cmap(&self) -> String {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n\
             <0000> <FFFF>\n\
             endcodespacerange\n",
        );

        // .notdef carries no text
        let chars: Vec<char> = self
            .used_chars
            .iter()
            .copied()
            .filter(|&c| self.has_glyph(c))
            .collect();

        // At most 100 entries per bfchar block
        for block in chars.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", block.len());
            for &c in block {
                let mut units = [0u16; 2];
                let _ = write!(cmap, "<{:04X}> <", self.glyph(c).id);
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(cmap, "{unit:04X}");
                }
                cmap.push_str(">\n");
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str(
            "endcmap\n\
             CMapName currentdict /CMap defineresource pop\n\
             end\n\
             end\n",
        );
        cmap
    }
}
