//! Blank intake form template
//!
//! Emits one fixed page with four titled sections, each static label paired
//! with a named, empty widget. The dotted names are the only contract the
//! prober and writer rely on; nothing here records widget types for them.

use crate::canvas::{Font, PageCanvas, Rect};
use crate::constants::*;
use crate::error::Result;
use tracing::instrument;

const LABEL_X: f32 = 60.0;
const FIELD_X: f32 = 180.0;
const FIELD_W: f32 = 320.0;
const FIELD_H: f32 = 16.0;

/// Build the blank veterinary intake form and serialize it to bytes
#[instrument]
pub fn build_intake_form() -> Result<Vec<u8>> {
    let mut canvas = PageCanvas::new()?;

    canvas.draw_text(
        SIDE_MARGIN,
        canvas.y() - TITLE_FONT_SIZE,
        Font::Bold,
        TITLE_FONT_SIZE,
        "Veterinary Intake Form",
    );
    canvas.advance(36.0);

    patient_section(&mut canvas);
    history_section(&mut canvas)?;
    medications_section(&mut canvas);
    authorization_section(&mut canvas)?;

    canvas.finish()
}

fn section_title(canvas: &mut PageCanvas, title: &str) {
    canvas.draw_text(
        SIDE_MARGIN,
        canvas.y() - 14.0,
        Font::Bold,
        HEADING_FONT_SIZE + 1.0,
        title,
    );
    let rule_y = canvas.y() - 19.0;
    canvas.draw_rule(SIDE_MARGIN, PAGE_WIDTH - SIDE_MARGIN, rule_y, 0.8);
    canvas.advance(28.0);
}

/// Draw a label and a boxed text widget on one line, advancing the cursor
fn labeled_text_field(canvas: &mut PageCanvas, label: &str, name: &str) {
    let baseline = canvas.y() - 12.0;
    canvas.draw_text(LABEL_X, baseline, Font::Regular, BODY_FONT_SIZE, label);
    let rect = Rect::new(FIELD_X, baseline - 4.0, FIELD_W, FIELD_H);
    canvas.draw_rect_stroke(rect, 0.5);
    canvas.add_text_field(name, rect, "", false);
    canvas.advance(24.0);
}

fn labeled_checkbox(canvas: &mut PageCanvas, label: &str, name: &str) -> Result<()> {
    let baseline = canvas.y() - 12.0;
    let rect = Rect::new(LABEL_X, baseline - 3.0, 12.0, 12.0);
    canvas.draw_rect_stroke(rect, 0.5);
    canvas.add_checkbox(name, rect, false)?;
    canvas.draw_text(LABEL_X + 20.0, baseline, Font::Regular, BODY_FONT_SIZE, label);
    canvas.advance(20.0);
    Ok(())
}

fn patient_section(canvas: &mut PageCanvas) {
    section_title(canvas, "Patient Information");
    labeled_text_field(canvas, "Patient name", "patient.name");
    labeled_text_field(canvas, "Species", "patient.species");
    labeled_text_field(canvas, "Breed", "patient.breed");
    labeled_text_field(canvas, "Age", "patient.age");
    labeled_text_field(canvas, "Owner", "patient.owner");
    canvas.advance(8.0);
}

fn history_section(canvas: &mut PageCanvas) -> Result<()> {
    section_title(canvas, "Medical History");
    labeled_checkbox(canvas, "Vaccinations up to date", "history.vaccinated")?;
    labeled_checkbox(canvas, "Dewormed within 12 months", "history.dewormed")?;
    labeled_checkbox(canvas, "Prior surgeries", "history.prior_surgery")?;

    // Yes/No exclusive pair for known allergies
    let baseline = canvas.y() - 12.0;
    canvas.draw_text(LABEL_X, baseline, Font::Regular, BODY_FONT_SIZE, "Known allergies");
    let yes_rect = Rect::new(FIELD_X, baseline - 3.0, 12.0, 12.0);
    let no_rect = Rect::new(FIELD_X + 60.0, baseline - 3.0, 12.0, 12.0);
    canvas.draw_rect_stroke(yes_rect, 0.5);
    canvas.draw_rect_stroke(no_rect, 0.5);
    canvas.draw_text(FIELD_X + 16.0, baseline, Font::Regular, BODY_FONT_SIZE, "Yes");
    canvas.draw_text(FIELD_X + 76.0, baseline, Font::Regular, BODY_FONT_SIZE, "No");
    canvas.add_choice_group(
        "history.allergies",
        &[("Yes", yes_rect), ("No", no_rect)],
        None,
    )?;
    canvas.advance(28.0);
    Ok(())
}

fn medications_section(canvas: &mut PageCanvas) {
    section_title(canvas, "Current Medications");

    let baseline = canvas.y() - 12.0;
    canvas.draw_text(LABEL_X, baseline, Font::Regular, BODY_FONT_SIZE, "Medications");
    let notes_rect = Rect::new(FIELD_X, baseline - 36.0, FIELD_W, 48.0);
    canvas.draw_rect_stroke(notes_rect, 0.5);
    canvas.add_text_field("medications.current", notes_rect, "", true);
    canvas.advance(56.0);

    let baseline = canvas.y() - 12.0;
    canvas.draw_text(LABEL_X, baseline, Font::Regular, BODY_FONT_SIZE, "Route");
    let route_rect = Rect::new(FIELD_X, baseline - 28.0, 140.0, 40.0);
    canvas.draw_rect_stroke(route_rect, 0.5);
    canvas.add_list_box(
        "medications.route",
        route_rect,
        &["Oral", "Topical", "Injectable"],
        &[],
    );
    canvas.advance(56.0);
}

fn authorization_section(canvas: &mut PageCanvas) -> Result<()> {
    section_title(canvas, "Authorization");
    labeled_checkbox(
        canvas,
        "I consent to the treatment described above",
        "auth.consent",
    )?;
    labeled_text_field(canvas, "Owner signature", "auth.signature");
    labeled_text_field(canvas, "Date", "auth.date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldKind, FieldValue};
    use crate::probe::probe;

    #[test]
    fn test_template_builds_single_page() {
        let bytes = build_intake_form().unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_template_widgets_probe_back() {
        let bytes = build_intake_form().unwrap();
        let fields = probe(&bytes).unwrap();

        assert_eq!(fields["patient.name"].kind, FieldKind::Text);
        assert_eq!(fields["patient.name"].value, FieldValue::Text(String::new()));
        assert_eq!(fields["history.vaccinated"].kind, FieldKind::Checkbox);
        assert_eq!(fields["history.vaccinated"].value, FieldValue::Checked(false));
        assert_eq!(fields["history.allergies"].kind, FieldKind::ChoiceGroup);
        assert_eq!(
            fields["history.allergies"].value,
            FieldValue::Choice(String::new())
        );
        assert!(fields["history.allergies"].options.contains(&"Yes".to_string()));
        assert!(fields["history.allergies"].options.contains(&"No".to_string()));
        assert_eq!(fields["medications.route"].kind, FieldKind::ListBox);
        assert_eq!(
            fields["medications.route"].value,
            FieldValue::Selection(Vec::new())
        );
        assert_eq!(fields["medications.route"].options.len(), 3);
    }

    #[test]
    fn test_template_name_set_is_stable() {
        let first: Vec<String> = probe(&build_intake_form().unwrap())
            .unwrap()
            .into_keys()
            .collect();
        let second: Vec<String> = probe(&build_intake_form().unwrap())
            .unwrap()
            .into_keys()
            .collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 14);
    }
}
