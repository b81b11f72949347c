//! Built-in standard Type1 fonts
//!
//! The two Helvetica faces every PDF viewer ships with. Widths come from the
//! Adobe AFM files (units per 1000 em); text is written with WinAnsiEncoding,
//! so no font program is embedded.

use lopdf::{Dictionary, Object};

/// Helvetica advance widths for codes 32..=126
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Helvetica-Bold advance widths for codes 32..=126
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 48-63
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 80-95
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 96-111
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 112-126
];

/// Standard 14 font faces supported for stamping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// PostScript name used as /BaseFont
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    fn ascii_widths(&self) -> &'static [u16; 95] {
        match self {
            StandardFont::Helvetica => &HELVETICA_WIDTHS,
            StandardFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        }
    }

    /// Advance width of a character in 1/1000 em
    pub fn char_width(&self, c: char) -> u16 {
        if let Some(width) = self.ascii_width(c) {
            return width;
        }

        match c {
            // Accented i uses the dotless i, which is wider than `i` in the regular face
            'í' | 'ì' | 'î' | 'ï' => 278,
            '\u{a0}' => 278,
            '°' => 400,
            'ª' => 370,
            'º' => 365,
            '§' => 556,
            '·' => 278,
            '´' => 333,
            '–' => 556,
            '—' => 1000,
            '‘' | '’' | '‚' => self.quote_width(),
            '“' | '”' | '„' => self.double_quote_width(),
            '•' => 350,
            '…' => 1000,
            '€' => 556,
            _ => match latin_base(c) {
                Some(base) => self.ascii_width(base).unwrap_or(556),
                None => 556,
            },
        }
    }

    fn ascii_width(&self, c: char) -> Option<u16> {
        let code = c as u32;
        if (32..=126).contains(&code) {
            Some(self.ascii_widths()[(code - 32) as usize])
        } else {
            None
        }
    }

    fn quote_width(&self) -> u16 {
        match self {
            StandardFont::Helvetica => 222,
            StandardFont::HelveticaBold => 278,
        }
    }

    fn double_quote_width(&self) -> u16 {
        match self {
            StandardFont::Helvetica => 333,
            StandardFont::HelveticaBold => 500,
        }
    }

    /// Text width in points at the given font size
    pub fn text_width_points(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Encode text as a PDF literal string in WinAnsiEncoding
    ///
    /// Characters outside the encoding are replaced by `?`.
    pub fn encode_text_literal(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len() + 2);
        result.push('(');
        for c in text.chars() {
            let code = win_ansi_code(c).unwrap_or(b'?');
            match code {
                b'(' | b')' | b'\\' => {
                    result.push('\\');
                    result.push(code as char);
                }
                32..=126 => result.push(code as char),
                _ => result.push_str(&format!("\\{code:03o}")),
            }
        }
        result.push(')');
        result
    }

    /// Font dictionary for the page resources
    pub fn to_pdf_dictionary(&self) -> Dictionary {
        Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            (
                "BaseFont",
                Object::Name(self.base_font().as_bytes().to_vec()),
            ),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ])
    }
}

/// Map a character to its WinAnsiEncoding byte
pub fn win_ansi_code(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        32..=126 | 0xA0..=0xFF => Some(code as u8),
        _ => match c {
            '€' => Some(0x80),
            '‚' => Some(0x82),
            '„' => Some(0x84),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            _ => None,
        },
    }
}

/// Base letter of a Latin-1 accented character
///
/// Accented glyphs in the Helvetica AFM share the base letter's advance.
pub fn latin_base(c: char) -> Option<char> {
    let base = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'Ç' => 'C',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'Ñ' => 'N',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'Ý' => 'Y',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_widths() {
        assert_eq!(StandardFont::Helvetica.char_width(' '), 278);
        assert_eq!(StandardFont::Helvetica.char_width('M'), 833);
        assert_eq!(StandardFont::Helvetica.char_width('i'), 222);
        assert_eq!(StandardFont::HelveticaBold.char_width('i'), 278);
        assert_eq!(StandardFont::HelveticaBold.char_width('~'), 584);
    }

    #[test]
    fn test_accented_widths_follow_base_letter() {
        let font = StandardFont::Helvetica;
        assert_eq!(font.char_width('ã'), font.char_width('a'));
        assert_eq!(font.char_width('Ç'), font.char_width('C'));
        assert_eq!(font.char_width('í'), 278);
    }

    #[test]
    fn test_text_width_points() {
        // "Hi" = 722 + 222 = 944 units
        let width = StandardFont::Helvetica.text_width_points("Hi", 10.0);
        assert!((width - 9.44).abs() < 1e-4);
    }

    #[test]
    fn test_encode_literal_escapes() {
        let encoded = StandardFont::Helvetica.encode_text_literal("a(b)\\c");
        assert_eq!(encoded, "(a\\(b\\)\\\\c)");
    }

    #[test]
    fn test_encode_literal_latin1_octal() {
        // ã = 0xE3 = octal 343
        let encoded = StandardFont::Helvetica.encode_text_literal("São");
        assert_eq!(encoded, "(S\\343o)");
    }

    #[test]
    fn test_encode_literal_unknown_char() {
        let encoded = StandardFont::Helvetica.encode_text_literal("a✓b");
        assert_eq!(encoded, "(a?b)");
    }

    #[test]
    fn test_win_ansi_special_range() {
        assert_eq!(win_ansi_code('€'), Some(0x80));
        assert_eq!(win_ansi_code('—'), Some(0x97));
        assert_eq!(win_ansi_code('é'), Some(0xE9));
        assert_eq!(win_ansi_code('\n'), None);
    }

    #[test]
    fn test_pdf_dictionary() {
        let dict = StandardFont::HelveticaBold.to_pdf_dictionary();
        assert_eq!(dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Type1");
        assert_eq!(
            dict.get(b"BaseFont").unwrap().as_name().unwrap(),
            b"Helvetica-Bold"
        );
    }
}
