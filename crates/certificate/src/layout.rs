//! Signature placement and single-line fitting

use pdf_core::{Rect, TextMeasure};

/// Place a signature image inside an anchor rectangle
///
/// The image keeps its aspect ratio: it is scaled to `max_width`, and if
/// that makes it taller than `max_height` it is scaled to `max_height`
/// instead. The result is centered in `anchor` and then moved down by
/// `vertical_offset`.
pub fn place_signature(
    image_size: (u32, u32),
    max_width: f64,
    max_height: f64,
    anchor: Rect,
    vertical_offset: f64,
) -> Rect {
    let (image_width, image_height) = image_size;
    if image_width == 0 || image_height == 0 {
        return Rect::new(anchor.center_x(), anchor.y + anchor.height / 2.0, 0.0, 0.0);
    }

    let aspect = image_height as f64 / image_width as f64;

    let mut width = max_width;
    let mut height = width * aspect;
    if height > max_height {
        height = max_height;
        width = height / aspect;
    }

    Rect::new(
        anchor.x + (anchor.width - width) / 2.0,
        anchor.y + (anchor.height - height) / 2.0 + vertical_offset,
        width,
        height,
    )
}

/// Slots for the signature area
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRows {
    /// One slot per approver, left to right
    pub approvers: Vec<Rect>,
    /// The recipient's own slot
    pub recipient: Rect,
}

/// Divide a row into `count` equal slots separated by `gap`
///
/// Slots and gaps add up to the row width. When the gaps alone would not
/// fit, they shrink so the slots still tile the row.
fn split_row(row: Rect, count: usize, gap: f64) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }

    let gaps = (count - 1) as f64;
    let gap = if gaps > 0.0 {
        gap.min(row.width / gaps).max(0.0)
    } else {
        0.0
    };
    let slot_width = (row.width - gap * gaps) / count as f64;

    (0..count)
        .map(|i| {
            Rect::new(
                row.x + i as f64 * (slot_width + gap),
                row.y,
                slot_width,
                row.height,
            )
        })
        .collect()
}

/// Lay out the approvers' signatures and the recipient's signature
///
/// With zero or one approver the recipient shares the first row (one or
/// two slots). With more approvers, they fill the first row and the
/// recipient moves to a second row `row_spacing` below, using a slot of
/// the same width centered on the row.
pub fn plan_signature_rows(
    approver_count: usize,
    row: Rect,
    gap: f64,
    row_spacing: f64,
) -> SignatureRows {
    if approver_count <= 1 {
        let mut slots = split_row(row, approver_count + 1, gap);
        let recipient = slots.pop().unwrap_or(row);
        return SignatureRows {
            approvers: slots,
            recipient,
        };
    }

    let approvers = split_row(row, approver_count, gap);
    let slot_width = approvers.first().map(|slot| slot.width).unwrap_or(row.width);
    let recipient = Rect::new(
        row.center_x() - slot_width / 2.0,
        row.y + row_spacing,
        slot_width,
        row.height,
    );

    log::debug!(
        "{} approver slots of {:.1}pt, recipient on second row",
        approver_count,
        slot_width
    );

    SignatureRows {
        approvers,
        recipient,
    }
}

/// Largest size (in 1pt steps, not below `min_size`) at which `text` fits
/// on one line of `max_width`
///
/// Returns the size and whether the text actually fits at it.
pub fn fit_single_line<M: TextMeasure + ?Sized>(
    text: &str,
    font: &M,
    initial_size: f32,
    max_width: f64,
    min_size: f32,
) -> (f32, bool) {
    let mut size = initial_size;

    loop {
        let fits = font.text_width(text, size) <= max_width;
        if fits || size <= min_size {
            return (size, fits);
        }
        size -= 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Monospace;

    impl TextMeasure for Monospace {
        fn text_width(&self, text: &str, font_size: f32) -> f64 {
            text.chars().count() as f64 * font_size as f64
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_place_signature_width_limited() {
        // 400x100 into 120x40: width wins, height 30
        let anchor = Rect::new(0.0, 0.0, 200.0, 40.0);
        let rect = place_signature((400, 100), 120.0, 40.0, anchor, 0.0);
        assert_eq!(rect, Rect::new(40.0, 5.0, 120.0, 30.0));
    }

    #[test]
    fn test_place_signature_height_limited() {
        // 100x100 into 120x40: rescaled to height 40
        let anchor = Rect::new(10.0, 100.0, 120.0, 40.0);
        let rect = place_signature((100, 100), 120.0, 40.0, anchor, 0.0);
        assert_eq!(rect, Rect::new(50.0, 100.0, 40.0, 40.0));
    }

    #[test]
    fn test_place_signature_vertical_offset_moves_down() {
        let anchor = Rect::new(0.0, 100.0, 120.0, 40.0);
        let base = place_signature((300, 100), 120.0, 40.0, anchor, 0.0);
        let shifted = place_signature((300, 100), 120.0, 40.0, anchor, 6.0);
        assert_close(shifted.y - base.y, 6.0);
        assert_eq!(shifted.x, base.x);
    }

    #[test]
    fn test_place_signature_preserves_aspect_ratio() {
        let anchor = Rect::new(0.0, 0.0, 150.0, 60.0);
        for (w, h) in [(1, 1), (640, 480), (37, 500), (1000, 3), (123, 77)] {
            for (max_w, max_h) in [(120.0, 40.0), (10.0, 300.0), (55.5, 55.5)] {
                let rect = place_signature((w, h), max_w, max_h, anchor, 0.0);
                let expected = w as f64 / h as f64;
                assert!(
                    ((rect.width / rect.height) - expected).abs() < 1e-9 * expected.max(1.0),
                    "{w}x{h} in {max_w}x{max_h}"
                );
                assert!(rect.width <= max_w + 1e-9 && rect.height <= max_h + 1e-9);
            }
        }
    }

    #[test]
    fn test_place_signature_empty_image() {
        let rect = place_signature((0, 10), 120.0, 40.0, Rect::new(0.0, 0.0, 100.0, 40.0), 0.0);
        assert_eq!(rect.width, 0.0);
        assert_eq!(rect.height, 0.0);
    }

    #[test]
    fn test_rows_without_approvers() {
        let row = Rect::new(60.0, 600.0, 400.0, 40.0);
        let rows = plan_signature_rows(0, row, 20.0, 100.0);
        assert!(rows.approvers.is_empty());
        assert_eq!(rows.recipient, row);
    }

    #[test]
    fn test_rows_single_approver_shares_row() {
        let row = Rect::new(60.0, 600.0, 420.0, 40.0);
        let rows = plan_signature_rows(1, row, 20.0, 100.0);
        assert_eq!(rows.approvers, vec![Rect::new(60.0, 600.0, 200.0, 40.0)]);
        assert_eq!(rows.recipient, Rect::new(280.0, 600.0, 200.0, 40.0));
    }

    #[test]
    fn test_rows_three_approvers() {
        let row = Rect::new(60.0, 600.0, 475.0, 40.0);
        let rows = plan_signature_rows(3, row, 20.0, 100.0);

        assert_eq!(rows.approvers.len(), 3);
        for slot in &rows.approvers {
            assert_close(slot.width, 145.0);
            assert_eq!(slot.y, 600.0);
        }

        // Equal spacing, slots plus gaps span the row
        let gap_1 = rows.approvers[1].x - rows.approvers[0].right();
        let gap_2 = rows.approvers[2].x - rows.approvers[1].right();
        assert_close(gap_1, 20.0);
        assert_close(gap_2, 20.0);
        assert_close(rows.approvers[0].x, row.x);
        assert_close(rows.approvers[2].right(), row.right());

        // Recipient on its own row below
        assert_eq!(rows.recipient.y, 700.0);
        assert_close(rows.recipient.center_x(), row.center_x());
    }

    #[test]
    fn test_rows_gap_larger_than_row() {
        // Gaps shrink so the slots still tile the row
        let row = Rect::new(0.0, 0.0, 30.0, 10.0);
        let rows = plan_signature_rows(4, row, 50.0, 20.0);
        assert_close(rows.approvers[0].x, 0.0);
        assert_close(rows.approvers[3].right(), 30.0);
        assert!(rows.approvers.iter().all(|slot| slot.width >= 0.0));
    }

    #[test]
    fn test_fit_single_line() {
        // "abcdef" = 6 chars; at size 10 = 60pt
        assert_eq!(fit_single_line("abcdef", &Monospace, 10.0, 60.0, 8.0), (10.0, true));
        assert_eq!(fit_single_line("abcdef", &Monospace, 10.0, 54.0, 8.0), (9.0, true));
        assert_eq!(fit_single_line("abcdef", &Monospace, 10.0, 20.0, 8.0), (8.0, false));
    }
}
