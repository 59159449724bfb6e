//! Invoice layout engine
//!
//! Consumes a structured invoice record graph and drives the page canvas
//! to emit a fully paginated PDF. Rows are never split across pages: the
//! engine measures each row first, asks the canvas for space, and only
//! then draws.

use crate::canvas::{ColumnCaption, ContinuationHeader, Font, PageCanvas};
use crate::constants::*;
use crate::error::{DocError, Result};
use crate::text::wrap;
use chrono::NaiveDate;
use tracing::{debug, instrument};

/// Invoice lifecycle status. `Paid` is the terminal state and adds the
/// right-aligned badge plus payment details to the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Sent => "Sent",
            InvoiceStatus::Paid => "Paid",
        }
    }
}

/// How and when a paid invoice was settled
#[derive(Debug, Clone)]
pub struct PaymentInfo {
    pub method: String,
    pub paid_on: NaiveDate,
}

/// Client or organization display block. `name` is whichever of the two
/// fills the slot; the engine does not distinguish them.
#[derive(Debug, Clone, Default)]
pub struct BillTo {
    pub name: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Animal identity shown in section sub-headings and the summary line
#[derive(Debug, Clone)]
pub struct AnimalInfo {
    pub name: String,
    pub species: String,
}

/// One billed procedure
#[derive(Debug, Clone)]
pub struct LineItem {
    pub procedure: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl LineItem {
    /// Line total, rounded to cents at computation time so repeated
    /// renders are idempotent
    pub fn total(&self) -> f64 {
        round_cents(self.quantity * self.unit_price)
    }
}

/// A group of line items billed against one animal
#[derive(Debug, Clone)]
pub struct AnimalSection {
    pub animal: AnimalInfo,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
}

/// The full invoice record graph handed over by the data layer
#[derive(Debug, Clone)]
pub struct Invoice {
    pub clinic_name: String,
    pub number: String,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
    pub status: InvoiceStatus,
    pub payment: Option<PaymentInfo>,
    pub bill_to: BillTo,
    pub sections: Vec<AnimalSection>,
    pub subtotal: f64,
    pub total: f64,
}

/// Round a monetary value to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a monetary value as drawn on the invoice
pub fn fmt_money(value: f64) -> String {
    format!("${:.2}", round_cents(value))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Render an invoice to a paginated PDF byte buffer
#[instrument(skip(invoice), fields(number = %invoice.number, sections = invoice.sections.len()))]
pub fn render_invoice(invoice: &Invoice) -> Result<Vec<u8>> {
    let mut canvas = PageCanvas::new()?;

    draw_header(&mut canvas, invoice);
    draw_client_block(&mut canvas, invoice);
    draw_animal_summary(&mut canvas, invoice);

    let header = item_table_header(&invoice.number);
    canvas.draw_column_captions(&header.captions);
    canvas.set_continuation_header(header);

    for section in &invoice.sections {
        draw_section(&mut canvas, section)?;
    }

    draw_totals(&mut canvas, invoice);
    draw_footer(&mut canvas);

    debug!(pages = canvas.page_count(), "invoice laid out");
    canvas.finish()
}

fn item_table_header(number: &str) -> ContinuationHeader {
    ContinuationHeader {
        title: format!("Invoice {number} (continued)"),
        captions: vec![
            ColumnCaption::left("Procedure", COL_PROCEDURE_X),
            ColumnCaption::left("Description", COL_DESCRIPTION_X),
            ColumnCaption::right("Qty", COL_QTY_RIGHT),
            ColumnCaption::right("Unit Price", COL_UNIT_PRICE_RIGHT),
            ColumnCaption::right("Total", COL_TOTAL_RIGHT),
        ],
    }
}

fn draw_header(canvas: &mut PageCanvas, invoice: &Invoice) {
    let top = canvas.y();

    canvas.draw_text(
        SIDE_MARGIN,
        top - TITLE_FONT_SIZE,
        Font::Bold,
        TITLE_FONT_SIZE,
        &invoice.clinic_name,
    );
    canvas.draw_text(
        SIDE_MARGIN,
        top - 40.0,
        Font::Regular,
        HEADING_FONT_SIZE,
        &format!("Invoice {}", invoice.number),
    );
    canvas.draw_text(
        SIDE_MARGIN,
        top - 56.0,
        Font::Regular,
        BODY_FONT_SIZE,
        &format!(
            "Issued: {}    Due: {}",
            fmt_date(invoice.issued_on),
            fmt_date(invoice.due_on)
        ),
    );
    canvas.draw_text(
        SIDE_MARGIN,
        top - 70.0,
        Font::Regular,
        BODY_FONT_SIZE,
        &format!("Status: {}", invoice.status.label()),
    );

    if invoice.status == InvoiceStatus::Paid {
        canvas.draw_text_right(COL_TOTAL_RIGHT, top - 18.0, Font::Bold, 14.0, "PAID");
        if let Some(payment) = &invoice.payment {
            canvas.draw_text_right(
                COL_TOTAL_RIGHT,
                top - 34.0,
                Font::Regular,
                BODY_FONT_SIZE,
                &payment.method,
            );
            canvas.draw_text_right(
                COL_TOTAL_RIGHT,
                top - 46.0,
                Font::Regular,
                BODY_FONT_SIZE,
                &fmt_date(payment.paid_on),
            );
        }
    }

    canvas.advance(84.0);
}

/// Draw one address line and advance the cursor
fn address_line(canvas: &mut PageCanvas, font: Font, text: &str) {
    canvas.draw_text(SIDE_MARGIN, canvas.y() - 11.0, font, BODY_FONT_SIZE, text);
    canvas.advance(13.0);
}

fn draw_client_block(canvas: &mut PageCanvas, invoice: &Invoice) {
    let bill_to = &invoice.bill_to;
    address_line(canvas, Font::Bold, &bill_to.name);

    if let Some(street) = &bill_to.street {
        address_line(canvas, Font::Regular, street);
    }

    let locality: Vec<&str> = [&bill_to.city, &bill_to.state, &bill_to.postal_code]
        .into_iter()
        .filter_map(|part| part.as_deref())
        .collect();
    if !locality.is_empty() {
        address_line(canvas, Font::Regular, &locality.join(", "));
    }

    if let Some(country) = &bill_to.country {
        if country != DEFAULT_COUNTRY {
            address_line(canvas, Font::Regular, country);
        }
    }

    canvas.advance(8.0);
}

fn draw_animal_summary(canvas: &mut PageCanvas, invoice: &Invoice) {
    let summary = invoice
        .sections
        .iter()
        .map(|s| format!("{} ({})", s.animal.name, s.animal.species))
        .collect::<Vec<_>>()
        .join(", ");
    address_line(canvas, Font::Regular, &format!("Patients: {summary}"));
    canvas.advance(8.0);
}

fn draw_animal_heading(canvas: &mut PageCanvas, animal: &AnimalInfo) {
    canvas.draw_text(
        SIDE_MARGIN,
        canvas.y() - 12.0,
        Font::Bold,
        BODY_FONT_SIZE,
        &format!("{} ({})", animal.name, animal.species),
    );
    canvas.advance(17.0);
}

fn draw_section(canvas: &mut PageCanvas, section: &AnimalSection) -> Result<()> {
    canvas.ensure_space(MIN_ROW_HEIGHT + 17.0);
    draw_animal_heading(canvas, &section.animal);

    for item in &section.items {
        // Empty procedure/description still produce a (blank) row;
        // filtering is an upstream concern
        let procedure_lines = wrap(&item.procedure, PROCEDURE_WRAP_CHARS);
        let description_lines = wrap(&item.description, DESCRIPTION_WRAP_CHARS);
        let line_count = procedure_lines.len().max(description_lines.len());
        let row_height = MIN_ROW_HEIGHT.max(line_count as f32 * ROW_LINE_HEIGHT + ROW_PADDING);

        if canvas.ensure_space(row_height) {
            // ensure_space already redrew the column header; the animal
            // identifier continues as a sub-heading
            draw_animal_heading(canvas, &section.animal);
        }
        // Rows are never split, so a row taller than an empty page body
        // has nowhere to go
        if row_height > canvas.remaining_height() {
            return Err(DocError::Layout(format!(
                "line item row of {row_height}pt exceeds the page body"
            )));
        }

        let top = canvas.y();
        for (i, line) in procedure_lines.iter().enumerate() {
            canvas.draw_text(
                COL_PROCEDURE_X,
                top - 12.0 - i as f32 * ROW_LINE_HEIGHT,
                Font::Regular,
                BODY_FONT_SIZE,
                line,
            );
        }
        for (i, line) in description_lines.iter().enumerate() {
            canvas.draw_text(
                COL_DESCRIPTION_X,
                top - 12.0 - i as f32 * ROW_LINE_HEIGHT,
                Font::Regular,
                BODY_FONT_SIZE,
                line,
            );
        }
        canvas.draw_text_right(
            COL_QTY_RIGHT,
            top - 12.0,
            Font::Regular,
            BODY_FONT_SIZE,
            &format!("{}", item.quantity),
        );
        canvas.draw_text_right(
            COL_UNIT_PRICE_RIGHT,
            top - 12.0,
            Font::Regular,
            BODY_FONT_SIZE,
            &fmt_money(item.unit_price),
        );
        canvas.draw_text_right(
            COL_TOTAL_RIGHT,
            top - 12.0,
            Font::Regular,
            BODY_FONT_SIZE,
            &fmt_money(item.total()),
        );

        canvas.advance(row_height);
    }

    canvas.ensure_space(18.0);
    canvas.draw_text_right(
        COL_TOTAL_RIGHT,
        canvas.y() - 11.0,
        Font::Regular,
        BODY_FONT_SIZE,
        &format!("Subtotal for {}: {}", section.animal.name, fmt_money(section.subtotal)),
    );
    canvas.advance(20.0);
    Ok(())
}

fn draw_totals(canvas: &mut PageCanvas, invoice: &Invoice) {
    canvas.ensure_space(TOTALS_BLOCK_HEIGHT);
    let top = canvas.y();

    canvas.draw_rule(COL_QTY_X, COL_TOTAL_RIGHT, top - 6.0, 0.8);
    canvas.draw_text(
        COL_QTY_X,
        top - 20.0,
        Font::Regular,
        BODY_FONT_SIZE,
        "Subtotal",
    );
    canvas.draw_text_right(
        COL_TOTAL_RIGHT,
        top - 20.0,
        Font::Regular,
        BODY_FONT_SIZE,
        &fmt_money(invoice.subtotal),
    );
    canvas.draw_rule(COL_QTY_X, COL_TOTAL_RIGHT, top - 28.0, 0.8);
    canvas.draw_text(
        COL_QTY_X,
        top - 44.0,
        Font::Bold,
        HEADING_FONT_SIZE,
        "Total",
    );
    canvas.draw_text_right(
        COL_TOTAL_RIGHT,
        top - 44.0,
        Font::Bold,
        HEADING_FONT_SIZE,
        &fmt_money(invoice.total),
    );
    canvas.advance(54.0);
}

fn draw_footer(canvas: &mut PageCanvas) {
    canvas.draw_text(
        SIDE_MARGIN,
        BOTTOM_MARGIN + 10.0,
        Font::Regular,
        BODY_FONT_SIZE,
        "Thank you for trusting us with your pet's care.",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Document;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn single_item_invoice() -> Invoice {
        Invoice {
            clinic_name: "Cedar Hollow Veterinary".to_string(),
            number: "INV-1042".to_string(),
            issued_on: date(2026, 3, 5),
            due_on: date(2026, 4, 4),
            status: InvoiceStatus::Sent,
            payment: None,
            bill_to: BillTo {
                name: "Dana Whitfield".to_string(),
                street: Some("18 Alder Lane".to_string()),
                city: Some("Portland".to_string()),
                state: Some("OR".to_string()),
                postal_code: Some("97209".to_string()),
                country: None,
            },
            sections: vec![AnimalSection {
                animal: AnimalInfo {
                    name: "Bella".to_string(),
                    species: "Canine".to_string(),
                },
                items: vec![LineItem {
                    procedure: "Surgery".to_string(),
                    description: "Spay surgery".to_string(),
                    quantity: 1.0,
                    unit_price: 140.0,
                }],
                subtotal: 140.0,
            }],
            subtotal: 140.0,
            total: 140.0,
        }
    }

    fn page_text(bytes: &[u8]) -> String {
        let doc = Document::load_mem(bytes).unwrap();
        let mut out = String::new();
        for (_, page_id) in doc.get_pages() {
            let content = doc.get_page_content(page_id).unwrap();
            out.push_str(&String::from_utf8_lossy(&content));
        }
        out
    }

    #[test]
    fn test_single_item_invoice_one_page() {
        let bytes = render_invoice(&single_item_invoice()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let text = page_text(&bytes);
        assert!(text.contains("Spay surgery"));
        // Subtotal and total both drawn as $140.00 (plus the line row
        // and the per-animal subtotal)
        assert!(text.matches("$140.00").count() >= 2);
    }

    #[test]
    fn test_render_is_deterministic() {
        let invoice = single_item_invoice();
        let first = render_invoice(&invoice).unwrap();
        let second = render_invoice(&invoice).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_long_invoice_paginates_with_headers() {
        crate::init_test_logging();
        let mut invoice = single_item_invoice();
        let long_description = "Comprehensive follow-up examination including \
            wound inspection, suture integrity check, temperature reading, and \
            at-home aftercare instructions reviewed with the owner"
            .to_string();
        let items: Vec<LineItem> = (0..20)
            .map(|i| LineItem {
                procedure: format!("Procedure {i}"),
                description: long_description.clone(),
                quantity: 1.0,
                unit_price: 45.0,
            })
            .collect();
        invoice.sections = vec![
            AnimalSection {
                animal: AnimalInfo {
                    name: "Bella".to_string(),
                    species: "Canine".to_string(),
                },
                items: items.clone(),
                subtotal: 900.0,
            },
            AnimalSection {
                animal: AnimalInfo {
                    name: "Max".to_string(),
                    species: "Feline".to_string(),
                },
                items,
                subtotal: 900.0,
            },
        ];
        invoice.subtotal = 1800.0;
        invoice.total = 1800.0;

        let bytes = render_invoice(&invoice).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert!(pages.len() >= 2, "expected pagination, got {} page(s)", pages.len());

        // Column header re-rendered on every page after the first
        for (&num, &page_id) in pages.iter().skip(1) {
            let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).to_string();
            // parens are escaped inside PDF string literals, so match the
            // bare word
            assert!(
                content.contains("continued"),
                "page {num} missing continuation title"
            );
            assert!(content.contains("Procedure"), "page {num} missing column header");
        }
    }

    #[test]
    fn test_row_height_formula() {
        // 120-char description wraps to >= 4 lines at a 30-char budget
        let description = "x".repeat(29).to_string() + " " + &"y z".repeat(40);
        let lines = wrap(&description, DESCRIPTION_WRAP_CHARS);
        let expected = MIN_ROW_HEIGHT.max(lines.len() as f32 * ROW_LINE_HEIGHT + ROW_PADDING);
        assert!(expected > MIN_ROW_HEIGHT);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(3.0 * 46.664), 139.99);
        assert_eq!(round_cents(140.0), 140.0);
        assert_eq!(fmt_money(1.005 * 100.0), "$100.50");
    }

    #[test]
    fn test_paid_invoice_shows_badge() {
        let mut invoice = single_item_invoice();
        invoice.status = InvoiceStatus::Paid;
        invoice.payment = Some(PaymentInfo {
            method: "Visa ending 4242".to_string(),
            paid_on: date(2026, 3, 9),
        });
        let text = page_text(&render_invoice(&invoice).unwrap());
        assert!(text.contains("PAID"));
        assert!(text.contains("Visa ending 4242"));
    }

    #[test]
    fn test_oversized_row_is_a_layout_error() {
        let mut invoice = single_item_invoice();
        // 60 forced lines make one unsplittable row taller than a page
        invoice.sections[0].items[0].description = "line\n".repeat(60);
        let err = render_invoice(&invoice).unwrap_err();
        assert!(matches!(err, DocError::Layout(_)));
    }

    #[test]
    fn test_empty_line_item_still_renders_row() {
        let mut invoice = single_item_invoice();
        invoice.sections[0].items.push(LineItem {
            procedure: String::new(),
            description: String::new(),
            quantity: 0.0,
            unit_price: 0.0,
        });
        let bytes = render_invoice(&invoice).unwrap();
        let text = page_text(&bytes);
        // The blank row still draws its zero total
        assert!(text.contains("$0.00"));
    }
}
