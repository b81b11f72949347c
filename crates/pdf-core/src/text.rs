//! Text rendering and layout utilities

use crate::document::Color;
use crate::font::TextMeasure;
use crate::Align;

/// Context for rendering text
pub struct TextRenderContext {
    /// PDF font resource name (e.g., "F1")
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Text width in points (for alignment)
    pub text_width: f64,
    /// Text color (RGB)
    pub color: Color,
}

/// Generate PDF operators for text insertion
///
/// Creates the PDF text operators (BT, Tf, Td, Tj, ET) to render text
/// at a specific position with alignment support.
///
/// # Arguments
/// * `encoded_text` - Text already encoded for the font, e.g. `(Ana)` or `<00410042>`
/// * `x` - X coordinate in points (PDF coordinates, from left)
/// * `y` - Y coordinate in points (PDF coordinates, from bottom)
/// * `align` - Text alignment
/// * `ctx` - Text rendering context
pub fn generate_text_operators(
    encoded_text: &str,
    x: f64,
    y: f64,
    align: Align,
    ctx: &TextRenderContext,
) -> Vec<u8> {
    let mut ops = String::new();

    let x_offset = match align {
        Align::Left => 0.0,
        Align::Center => -ctx.text_width / 2.0,
        Align::Right => -ctx.text_width,
    };

    let final_x = x + x_offset;

    ops.push_str("BT\n");
    ops.push_str(&format!(
        "{} {} {} rg\n",
        ctx.color.r, ctx.color.g, ctx.color.b
    ));
    ops.push_str(&format!("/{} {} Tf\n", ctx.font_name, ctx.font_size));
    ops.push_str(&format!("{final_x} {y} Td\n"));
    ops.push_str(&format!("{encoded_text} Tj\n"));
    ops.push_str("ET\n");

    ops.into_bytes()
}

/// Greedy word wrap against measured widths
///
/// Words are the whitespace-separated tokens of `text`. A word joins the
/// current line while `current + " " + word` measures at most `max_width`;
/// otherwise the line is flushed. A word wider than `max_width` sits alone
/// on its line and is never split. Empty text yields no lines.
pub fn wrap_text<M: TextMeasure + ?Sized>(
    text: &str,
    font: &M,
    font_size: f32,
    max_width: f64,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line.push_str(word);
            continue;
        }

        let candidate = format!("{current_line} {word}");
        if font.text_width(&candidate, font_size) <= max_width {
            current_line = candidate;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

/// Outcome of fitting a text block into a region
#[derive(Debug, Clone, PartialEq)]
pub struct FittedBlock {
    /// Wrapped lines at the final size
    pub lines: Vec<String>,
    /// Final font size in points
    pub font_size: f32,
    /// Line advance (font size + line gap)
    pub line_height: f64,
    /// The block is still taller than the region at the floor size
    pub overflow: bool,
}

impl FittedBlock {
    /// Total block height
    pub fn height(&self) -> f64 {
        self.lines.len() as f64 * self.line_height
    }

    /// Number of lines that fit within `max_height`
    pub fn visible_lines(&self, max_height: f64) -> usize {
        if self.line_height <= 0.0 {
            return self.lines.len();
        }
        ((max_height / self.line_height).floor().max(0.0) as usize).min(self.lines.len())
    }
}

/// Wrap text and shrink the font until the block fits a region
///
/// Starting at `initial_size`, the text is wrapped and its height
/// (`lines × (size + line_gap)`) compared with `max_height`. While it is
/// too tall the size drops by one point. The loop stops at `min_size`
/// even if the block still overflows; `overflow` reports that case.
pub fn fit_block<M: TextMeasure + ?Sized>(
    text: &str,
    font: &M,
    initial_size: f32,
    max_width: f64,
    max_height: f64,
    min_size: f32,
    line_gap: f64,
) -> FittedBlock {
    let mut size = initial_size;

    loop {
        let lines = wrap_text(text, font, size, max_width);
        let line_height = size as f64 + line_gap;
        let height = lines.len() as f64 * line_height;

        if height <= max_height || size <= min_size {
            return FittedBlock {
                lines,
                font_size: size,
                line_height,
                overflow: height > max_height,
            };
        }

        size -= 1.0;
    }
}
