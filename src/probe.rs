//! Form field prober
//!
//! Treats an arbitrary document's widgets as a typed key-value store.
//! Kinds are discovered per widget by attempting the accessors in a fixed
//! priority order — text, checkbox, exclusive-choice, single-select list —
//! and taking the first that succeeds. The order is a contract: it keeps
//! output deterministic for formats whose type system is ambiguous
//! between kinds.

use crate::error::{FieldError, Result};
use crate::fields::{
    FieldKind, FieldValue, ProbedField, enumerate_fields, load_document, try_checkbox,
    try_choice_group, try_list, try_text,
};
use lopdf::{Document, ObjectId};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Probe a document buffer into a uniform map of widget name to
/// (kind, value). A failure on one widget degrades that entry to the
/// error kind and never aborts the rest.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn probe(bytes: &[u8]) -> Result<BTreeMap<String, ProbedField>> {
    let doc = load_document(bytes)?;
    probe_document(&doc)
}

/// Probe an already-loaded document (shared with the flatten path)
pub(crate) fn probe_document(doc: &Document) -> Result<BTreeMap<String, ProbedField>> {
    let mut map = BTreeMap::new();
    for (name, id) in enumerate_fields(doc) {
        let probed = match probe_field(doc, id) {
            Ok(probed) => probed,
            Err(err) => {
                debug!(%name, %err, "widget probe failed; degraded to error entry");
                ProbedField::error()
            }
        };
        map.insert(name, probed);
    }
    debug!(widgets = map.len(), "probe complete");
    Ok(map)
}

fn probe_field(doc: &Document, id: ObjectId) -> std::result::Result<ProbedField, FieldError> {
    let dict = doc
        .get_dictionary(id)
        .map_err(|e| FieldError::Malformed(e.to_string()))?;

    match try_text(doc, dict) {
        Ok(value) => {
            return Ok(ProbedField {
                kind: FieldKind::Text,
                value,
                options: Vec::new(),
            });
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_checkbox(doc, dict) {
        Ok((checked, _)) => {
            return Ok(ProbedField {
                kind: FieldKind::Checkbox,
                value: FieldValue::Checked(checked),
                options: Vec::new(),
            });
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_choice_group(doc, dict) {
        Ok((selected, options)) => {
            return Ok(ProbedField {
                kind: FieldKind::ChoiceGroup,
                value: FieldValue::Choice(selected),
                options,
            });
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_list(doc, dict) {
        Ok((selected, options)) => Ok(ProbedField {
            kind: FieldKind::ListBox,
            value: FieldValue::Selection(selected),
            options,
        }),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{PageCanvas, Rect};

    fn two_widget_doc(text_first: bool) -> Vec<u8> {
        let mut canvas = PageCanvas::new().unwrap();
        if text_first {
            canvas.add_text_field("notes", Rect::new(60.0, 700.0, 200.0, 16.0), "", false);
            canvas
                .add_checkbox("fasted", Rect::new(60.0, 660.0, 12.0, 12.0), true)
                .unwrap();
        } else {
            canvas
                .add_checkbox("fasted", Rect::new(60.0, 660.0, 12.0, 12.0), true)
                .unwrap();
            canvas.add_text_field("notes", Rect::new(60.0, 700.0, 200.0, 16.0), "", false);
        }
        canvas.finish().unwrap()
    }

    #[test]
    fn test_probe_kinds_independent_of_declaration_order() {
        crate::init_test_logging();
        for text_first in [true, false] {
            let map = probe(&two_widget_doc(text_first)).unwrap();
            assert_eq!(map.len(), 2);
            assert_eq!(map["notes"].kind, FieldKind::Text);
            assert_eq!(map["fasted"].kind, FieldKind::Checkbox);
            assert_eq!(map["fasted"].value, FieldValue::Checked(true));
        }
    }

    #[test]
    fn test_probe_reads_current_values() {
        let mut canvas = PageCanvas::new().unwrap();
        canvas.add_text_field(
            "patient.name",
            Rect::new(60.0, 700.0, 200.0, 16.0),
            "Bella",
            false,
        );
        canvas.add_list_box(
            "route",
            Rect::new(60.0, 600.0, 140.0, 40.0),
            &["Oral", "Topical"],
            &["Oral"],
        );
        canvas
            .add_choice_group(
                "allergies",
                &[
                    ("Yes", Rect::new(60.0, 560.0, 12.0, 12.0)),
                    ("No", Rect::new(120.0, 560.0, 12.0, 12.0)),
                ],
                Some("No"),
            )
            .unwrap();
        let map = probe(&canvas.finish().unwrap()).unwrap();

        assert_eq!(
            map["patient.name"].value,
            FieldValue::Text("Bella".to_string())
        );
        assert_eq!(
            map["route"].value,
            FieldValue::Selection(vec!["Oral".to_string()])
        );
        assert_eq!(map["allergies"].value, FieldValue::Choice("No".to_string()));
        assert_eq!(
            map["allergies"].options,
            vec!["Yes".to_string(), "No".to_string()]
        );
    }

    #[test]
    fn test_hierarchical_fields_probe_under_qualified_names() {
        let map = probe(&crate::fields::hierarchical_form_doc()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map["owner.first"].value,
            FieldValue::Text("Dana".to_string())
        );
        assert_eq!(
            map["owner.last"].value,
            FieldValue::Text("Whitfield".to_string())
        );
        assert!(!map.contains_key("owner"));
    }

    #[test]
    fn test_document_without_form_probes_empty() {
        let canvas = PageCanvas::new().unwrap();
        let map = probe(&canvas.finish().unwrap()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_malformed_buffer_is_format_error() {
        let err = probe(b"not a pdf").unwrap_err();
        assert!(matches!(err, crate::error::DocError::Format(_)));
    }
}
