//! Integration tests for pdf-core
//!
//! These tests verify end-to-end functionality with real PDF operations.

use lopdf::dictionary;
use pdf_core::{Align, Color, ImageScaleMode, PdfDocument, PdfError, StandardFont};
use pretty_assertions::assert_eq;

/// Create a minimal valid PDF with A4 pages for testing
fn create_test_pdf_with_pages(page_count: usize) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");

    // Create pages dictionary
    let pages_id = doc.add_object(lopdf::Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Count" => page_count as i32,
        "Kids" => vec![], // Will be updated below
    }));

    let mut page_ids = Vec::new();
    for _ in 0..page_count {
        // Existing content that changes the graphics state without restoring it
        let contents_id = doc.add_object(lopdf::Object::Stream(lopdf::Stream::new(
            dictionary! {},
            b"1 0 0 1 10 10 cm 0.5 g".to_vec(),
        )));

        let page_id = doc.add_object(lopdf::Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => contents_id,
        }));
        page_ids.push(page_id);
    }

    // MediaBox and Resources are inherited from the Pages node
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let mut pages_dict = doc.get_object(pages_id).unwrap().as_dict().unwrap().clone();
    pages_dict.set(
        "Kids",
        lopdf::Object::Array(page_ids.into_iter().map(|id| id.into()).collect()),
    );
    pages_dict.set(
        "MediaBox",
        vec![0.into(), 0.into(), 595.28.into(), 841.89.into()],
    );
    pages_dict.set(
        "Resources",
        dictionary! { "Font" => dictionary! { "F1" => font_id } },
    );
    doc.objects.insert(pages_id, pages_dict.into());

    let catalog_id = doc.add_object(lopdf::Object::Dictionary(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    }));
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn create_test_pdf() -> Vec<u8> {
    create_test_pdf_with_pages(1)
}

/// A system TrueType font, when one is installed
fn system_font_data() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
    ]
    .iter()
    .find_map(|path| std::fs::read(path).ok())
}

/// Create a minimal JPEG image for testing
fn create_test_jpeg() -> Vec<u8> {
    // Minimal JPEG with SOI, SOF0, and EOI markers
    vec![
        0xFF, 0xD8, // SOI marker
        0xFF, 0xC0, // SOF0 marker (baseline DCT)
        0x00, 0x11, // Length (17 bytes)
        0x08, // Precision (8 bits)
        0x00, 0x10, // Height (16 pixels)
        0x00, 0x20, // Width (32 pixels)
        0x03, // Number of components (RGB)
        0x01, 0x22, 0x00, // Component 1
        0x02, 0x11, 0x01, // Component 2
        0x03, 0x11, 0x01, // Component 3
        0xFF, 0xD9, // EOI marker
    ]
}

/// Create a 40x20 PNG with a transparent left half
fn create_test_png() -> Vec<u8> {
    use image::{ImageBuffer, Rgba};

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(40, 20, |x, _| {
        if x < 20 {
            Rgba([255, 255, 255, 0])
        } else {
            Rgba([0, 0, 128, 255])
        }
    });
    let mut buffer = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut buffer),
        image::ImageFormat::Png,
    )
    .expect("Failed to create PNG");
    buffer
}

/// Decoded content of a page in a saved PDF
fn page_content(pdf: &[u8], page: u32) -> String {
    let doc = lopdf::Document::load_mem(pdf).expect("Failed to parse PDF");
    let page_id = doc.get_pages()[&page];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Numeric operands of every `op` line in a content stream
fn operands(content: &str, op: &str) -> Vec<Vec<f64>> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_suffix(op))
        .map(|args| {
            args.split_whitespace()
                .filter_map(|arg| arg.parse().ok())
                .collect()
        })
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn helvetica_doc(pdf: &[u8]) -> PdfDocument {
    let mut doc = PdfDocument::open_from_bytes(pdf).expect("Failed to open PDF");
    doc.add_standard_font("regular", StandardFont::Helvetica)
        .expect("Failed to add font");
    doc.set_font("regular", 12.0).expect("Failed to set font");
    doc
}

#[test]
fn test_open_save_roundtrip() {
    let pdf_data = create_test_pdf();

    let mut doc = PdfDocument::open_from_bytes(&pdf_data).expect("Failed to open PDF");
    assert_eq!(doc.page_count(), 1);

    let saved_data = doc.to_bytes().expect("Failed to save PDF");

    let doc2 = PdfDocument::open_from_bytes(&saved_data).expect("Failed to re-open PDF");
    assert_eq!(doc2.page_count(), 1);
}

#[test]
fn test_open_garbage_fails() {
    let result = PdfDocument::open_from_bytes(b"not a pdf at all");
    assert!(matches!(result, Err(PdfError::OpenError(_))));
}

#[test]
fn test_inherited_media_box() {
    let doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    let (width, height) = doc.page_size(1).unwrap();
    assert!((width - 595.28).abs() < 0.01);
    assert!((height - 841.89).abs() < 0.01);
}

#[test]
fn test_insert_text_standard_font() {
    let mut doc = helvetica_doc(&create_test_pdf());

    doc.insert_text("Maria Santos", 1, 100.0, 141.89, Align::Left)
        .expect("Failed to insert text");

    let saved_data = doc.to_bytes().expect("Failed to save PDF");
    let content = page_content(&saved_data, 1);

    assert!(content.contains("(Maria Santos) Tj"));
    // y = 841.89 - 141.89
    let td = &operands(&content, " Td")[0];
    assert!(close(td[0], 100.0) && close(td[1], 700.0), "{td:?}");
    assert!(content.contains("/CF1 12 Tf"));
}

#[test]
fn test_existing_content_is_isolated() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.insert_text("Stamp", 1, 50.0, 50.0, Align::Left).unwrap();

    let saved_data = doc.to_bytes().unwrap();
    let content = page_content(&saved_data, 1);

    let save = content.find("q").unwrap();
    let template = content.find("0.5 g").unwrap();
    let restore = content.find("Q").unwrap();
    let stamp = content.find("(Stamp) Tj").unwrap();
    assert!(save < template && template < restore && restore < stamp);
}

#[test]
fn test_template_resources_preserved() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.insert_text("Ana", 1, 50.0, 50.0, Align::Left).unwrap();
    let saved_data = doc.to_bytes().unwrap();

    let parsed = lopdf::Document::load_mem(&saved_data).unwrap();
    let page_id = parsed.get_pages()[&1];
    let page = parsed.get_object(page_id).unwrap().as_dict().unwrap();
    let fonts = page
        .get(b"Resources")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Font")
        .unwrap()
        .as_dict()
        .unwrap();

    assert!(fonts.has(b"F1"));
    assert!(fonts.has(b"CF1"));
}

#[test]
fn test_insert_text_alignment() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.set_font("regular", 10.0).unwrap();

    // "Hi" = 944 units -> 9.44pt at 10pt
    doc.insert_text("Hi", 1, 100.0, 0.0, Align::Center).unwrap();
    doc.insert_text("Hi", 1, 100.0, 0.0, Align::Right).unwrap();

    let content = page_content(&doc.to_bytes().unwrap(), 1);
    let td = operands(&content, " Td");
    assert_eq!(td.len(), 2);
    assert!(close(td[0][0], 95.28) && close(td[0][1], 841.89), "{td:?}");
    assert!(close(td[1][0], 90.56), "{td:?}");
}

#[test]
fn test_insert_text_color() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.set_text_color(Color::rgb(1.0, 0.0, 0.0));
    doc.insert_text("Red", 1, 10.0, 10.0, Align::Left).unwrap();

    let content = page_content(&doc.to_bytes().unwrap(), 1);
    assert!(content.contains("1 0 0 rg"));
}

#[test]
fn test_standard_fonts_share_one_object_per_face() {
    let mut doc = helvetica_doc(&create_test_pdf_with_pages(2));
    doc.add_standard_font("bold", StandardFont::HelveticaBold)
        .unwrap();

    doc.insert_text("Page 1", 1, 100.0, 100.0, Align::Left).unwrap();
    doc.insert_text("Page 2", 2, 100.0, 100.0, Align::Left).unwrap();
    doc.set_font("bold", 14.0).unwrap();
    doc.insert_text("Bold", 1, 100.0, 120.0, Align::Left).unwrap();

    let saved_data = doc.to_bytes().unwrap();
    let parsed = lopdf::Document::load_mem(&saved_data).unwrap();
    let helvetica_objects = parsed
        .objects
        .values()
        .filter_map(|obj| obj.as_dict().ok())
        .filter(|dict| {
            dict.get(b"BaseFont")
                .and_then(|name| name.as_name())
                .map(|name| name == b"Helvetica")
                .unwrap_or(false)
        })
        .count();
    assert_eq!(helvetica_objects, 1);

    assert!(page_content(&saved_data, 2).contains("(Page 2) Tj"));
}

#[test]
fn test_identical_operations_produce_identical_bytes() {
    let pdf_data = create_test_pdf_with_pages(2);
    let png = create_test_png();

    let render = || {
        let mut doc = helvetica_doc(&pdf_data);
        doc.add_standard_font("bold", StandardFont::HelveticaBold)
            .unwrap();
        doc.insert_text("Maria Santos", 1, 100.0, 100.0, Align::Center)
            .unwrap();
        doc.set_font("bold", 9.0).unwrap();
        doc.insert_text("Approver", 2, 100.0, 100.0, Align::Left)
            .unwrap();
        doc.insert_image(&png, 2, 10.0, 10.0, 40.0, 20.0).unwrap();
        doc.draw_line(2, 10.0, 40.0, 130.0, 40.0, 0.5, Color::black())
            .unwrap();
        doc.to_bytes().unwrap()
    };

    assert_eq!(render(), render());
}

#[test]
fn test_insert_image_jpeg() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    doc.insert_image(&create_test_jpeg(), 1, 100.0, 700.0, 50.0, 50.0)
        .expect("Failed to insert JPEG image");

    let saved_data = doc.to_bytes().expect("Failed to save PDF");
    assert!(page_content(&saved_data, 1).contains("/CIm1 Do"));
}

#[test]
fn test_insert_image_stretches_to_box() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    // 32x16 JPEG drawn into a 50x60 box ignores the aspect ratio
    doc.insert_image(&create_test_jpeg(), 1, 100.0, 100.0, 50.0, 60.0)
        .unwrap();

    let saved_data = doc.to_bytes().unwrap();
    assert!(page_content(&saved_data, 1).contains("50 0 0 60 100 "));
}

#[test]
fn test_insert_image_fit_box_preserves_aspect() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();

    // 32x16 JPEG into a 120x40 box -> limited by height
    let (width, height) = doc
        .insert_image_scaled(
            &create_test_jpeg(),
            1,
            0.0,
            0.0,
            120.0,
            40.0,
            ImageScaleMode::FitBox,
        )
        .unwrap();
    assert_eq!((width, height), (80.0, 40.0));
}

#[test]
fn test_insert_png_with_alpha_adds_smask() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    doc.insert_image(&create_test_png(), 1, 10.0, 10.0, 40.0, 20.0)
        .unwrap();

    let saved_data = doc.to_bytes().unwrap();
    let parsed = lopdf::Document::load_mem(&saved_data).unwrap();
    let with_mask = parsed
        .objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| stream.dict.has(b"SMask"))
        .count();
    assert_eq!(with_mask, 1);
}

#[test]
fn test_same_image_embedded_once() {
    let png = create_test_png();
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf_with_pages(2)).unwrap();
    doc.insert_image(&png, 1, 10.0, 10.0, 40.0, 20.0).unwrap();
    doc.insert_image(&png, 1, 60.0, 10.0, 40.0, 20.0).unwrap();
    doc.insert_image(&png, 2, 10.0, 10.0, 40.0, 20.0).unwrap();

    let saved_data = doc.to_bytes().unwrap();
    let parsed = lopdf::Document::load_mem(&saved_data).unwrap();
    let images = parsed
        .objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| stream.dict.has(b"SMask"))
        .count();
    assert_eq!(images, 1);

    let content = page_content(&saved_data, 1);
    assert_eq!(content.matches("/CIm1 Do").count(), 2);
}

#[test]
fn test_invalid_image_data() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    let result = doc.insert_image(b"GIF89a not supported", 1, 0.0, 0.0, 10.0, 10.0);
    assert!(matches!(result, Err(PdfError::ImageError(_))));
}

#[test]
fn test_draw_line() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    doc.draw_line(1, 10.0, 41.89, 110.0, 41.89, 0.5, Color::black())
        .unwrap();

    let content = page_content(&doc.to_bytes().unwrap(), 1);
    let start = &operands(&content, " m")[0];
    let end = &operands(&content, " l")[0];
    assert!(close(start[0], 10.0) && close(start[1], 800.0), "{start:?}");
    assert!(close(end[0], 110.0) && close(end[1], 800.0), "{end:?}");
    assert!(content.contains("0.5 w"));
}

#[test]
fn test_blank_document_with_pages() {
    let mut doc = PdfDocument::blank();
    doc.add_standard_font("regular", StandardFont::Helvetica)
        .unwrap();
    doc.set_font("regular", 22.0).unwrap();
    for _ in 0..3 {
        doc.add_blank_page().unwrap();
    }
    doc.insert_text("Maria Santos", 1, 297.64, 200.0, Align::Center)
        .unwrap();

    let saved_data = doc.to_bytes().unwrap();
    assert!(contains(&saved_data, b"Maria Santos"));

    let reopened = PdfDocument::open_from_bytes(&saved_data).unwrap();
    assert_eq!(reopened.page_count(), 3);
}

#[test]
fn test_latin1_text_standard_font() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.insert_text("João Conceição", 1, 10.0, 10.0, Align::Left)
        .unwrap();

    let content = page_content(&doc.to_bytes().unwrap(), 1);
    // ã = \343, ç = \347
    assert!(content.contains("(Jo\\343o Concei\\347\\343o) Tj"));
}

#[test]
fn test_embedded_truetype_font() {
    let Some(font_data) = system_font_data() else {
        return;
    };

    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    doc.add_font("body", &font_data).expect("Failed to add font");
    doc.set_font("body", 12.0).unwrap();
    doc.insert_text("Instrutora Ana", 1, 100.0, 100.0, Align::Left)
        .unwrap();

    let saved_data = doc.to_bytes().unwrap();
    let parsed = lopdf::Document::load_mem(&saved_data).unwrap();
    let type0 = parsed
        .objects
        .values()
        .filter_map(|obj| obj.as_dict().ok())
        .find(|dict| {
            dict.get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .map(|subtype| subtype == b"Type0")
                .unwrap_or(false)
        })
        .expect("Type0 font missing");

    assert!(type0.has(b"DescendantFonts"));
    assert!(type0.has(b"ToUnicode"));
}

#[test]
fn test_invalid_page_number() {
    let mut doc = helvetica_doc(&create_test_pdf());

    let result = doc.insert_text("Test", 999, 100.0, 700.0, Align::Left);
    match result {
        Err(PdfError::InvalidPage(page, total)) => {
            assert_eq!(page, 999);
            assert_eq!(total, 1);
        }
        other => panic!("Expected InvalidPage error, got {other:?}"),
    }

    assert!(doc.draw_line(0, 0.0, 0.0, 1.0, 1.0, 1.0, Color::black()).is_err());
}

#[test]
fn test_text_without_font() {
    let mut doc = PdfDocument::open_from_bytes(&create_test_pdf()).unwrap();
    let result = doc.insert_text("Test", 1, 100.0, 700.0, Align::Left);
    assert!(matches!(result, Err(PdfError::FontNotFound(_))));
}

#[test]
fn test_empty_text_is_noop() {
    let mut doc = helvetica_doc(&create_test_pdf());
    doc.insert_text("", 1, 100.0, 700.0, Align::Left).unwrap();

    let content = page_content(&doc.to_bytes().unwrap(), 1);
    assert!(!content.contains("Tj"));
}
