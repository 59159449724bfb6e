//! Form field writer and flatten utility
//!
//! Writing runs the same priority-ordered capability attempts as probing,
//! applying values instead of reading them. A supplied name with no
//! matching widget, or a value whose shape no accessor accepts, is
//! silently skipped: callers may hand over a superset of names harvested
//! from several templates, so partial application is the intended
//! behavior.

use crate::error::{FieldError, Result};
use crate::fields::{
    FieldValue, ProbedField, decode_text, enumerate_fields, kid_ids, load_document, on_states,
    resolve, try_checkbox, try_choice_group, try_list, try_text,
};
use crate::probe::probe_document;
use lopdf::{
    Dictionary, Document, Object, ObjectId,
    content::{Content, Operation},
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// What a successful capability attempt decided to write
enum WritePlan {
    Text(String),
    Toggle(String),
    Choice {
        state: String,
        /// kid widget and whether it owns the selected state
        kids: Vec<(ObjectId, bool)>,
    },
    List(Vec<String>),
}

/// Apply values to a document's widgets by name and return the new
/// bytes. Unknown names and shape mismatches are skipped, never raised.
#[instrument(skip(bytes, values), fields(supplied = values.len()))]
pub fn fill(bytes: &[u8], values: &BTreeMap<String, FieldValue>) -> Result<Vec<u8>> {
    let mut doc = load_document(bytes)?;
    let by_name: BTreeMap<String, ObjectId> = enumerate_fields(&doc).into_iter().collect();

    for (name, value) in values {
        let Some(&id) = by_name.get(name) else {
            debug!(%name, "no widget for supplied name; skipped");
            continue;
        };
        match plan_write(&doc, id, value) {
            Ok(plan) => {
                if let Err(err) = apply_write(&mut doc, id, plan) {
                    debug!(%name, %err, "write failed; skipped");
                }
            }
            Err(err) => debug!(%name, %err, "value not applicable; skipped"),
        }
    }

    set_need_appearances(&mut doc);
    save(doc)
}

/// Run the probing priority order against the widget and pair the first
/// compatible kind with the supplied value's shape.
fn plan_write(
    doc: &Document,
    id: ObjectId,
    value: &FieldValue,
) -> std::result::Result<WritePlan, FieldError> {
    let dict = doc
        .get_dictionary(id)
        .map_err(|e| FieldError::Malformed(e.to_string()))?;

    match try_text(doc, dict) {
        Ok(_) => {
            return match value {
                FieldValue::Text(text) => Ok(WritePlan::Text(text.clone())),
                _ => Err(FieldError::ValueShape),
            };
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_checkbox(doc, dict) {
        Ok((_, on_state)) => {
            return match value {
                FieldValue::Checked(true) => Ok(WritePlan::Toggle(on_state)),
                FieldValue::Checked(false) => Ok(WritePlan::Toggle("Off".to_string())),
                _ => Err(FieldError::ValueShape),
            };
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_choice_group(doc, dict) {
        Ok((_, options)) => {
            return match value {
                FieldValue::Choice(selected)
                    if selected.is_empty() || options.contains(selected) =>
                {
                    let state = if selected.is_empty() {
                        "Off".to_string()
                    } else {
                        selected.clone()
                    };
                    let kids = kid_ids(doc, dict)
                        .into_iter()
                        .map(|kid| {
                            let owns = doc
                                .get_dictionary(kid)
                                .map(|k| on_states(doc, k).contains(&state))
                                .unwrap_or(false);
                            (kid, owns)
                        })
                        .collect();
                    Ok(WritePlan::Choice { state, kids })
                }
                _ => Err(FieldError::ValueShape),
            };
        }
        Err(FieldError::Incompatible) => {}
        Err(err) => return Err(err),
    }

    match try_list(doc, dict) {
        Ok((_, options)) => match value {
            FieldValue::Selection(selected)
                if selected.iter().all(|s| options.contains(s)) =>
            {
                Ok(WritePlan::List(selected.clone()))
            }
            _ => Err(FieldError::ValueShape),
        },
        Err(err) => Err(err),
    }
}

fn field_mut(
    doc: &mut Document,
    id: ObjectId,
) -> std::result::Result<&mut Dictionary, FieldError> {
    doc.get_object_mut(id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| FieldError::Malformed(e.to_string()))
}

fn apply_write(
    doc: &mut Document,
    id: ObjectId,
    plan: WritePlan,
) -> std::result::Result<(), FieldError> {
    match plan {
        WritePlan::Text(text) => {
            let dict = field_mut(doc, id)?;
            dict.set("V", Object::string_literal(text));
            // stale appearance would shadow the new value
            dict.remove(b"AP");
        }
        WritePlan::Toggle(state) => {
            let dict = field_mut(doc, id)?;
            dict.set("V", Object::Name(state.clone().into_bytes()));
            dict.set("AS", Object::Name(state.into_bytes()));
        }
        WritePlan::Choice { state, kids } => {
            let parent = field_mut(doc, id)?;
            parent.set("V", Object::Name(state.clone().into_bytes()));
            for (kid, owns) in kids {
                let kid_state = if owns { state.as_str() } else { "Off" };
                let kid_dict = field_mut(doc, kid)?;
                kid_dict.set("AS", Object::Name(kid_state.as_bytes().to_vec()));
            }
        }
        WritePlan::List(selected) => {
            let dict = field_mut(doc, id)?;
            match selected.as_slice() {
                [] => {
                    dict.remove(b"V");
                }
                [single] => dict.set("V", Object::string_literal(single.as_str())),
                many => dict.set(
                    "V",
                    Object::Array(
                        many.iter()
                            .map(|s| Object::string_literal(s.as_str()))
                            .collect(),
                    ),
                ),
            }
            dict.remove(b"AP");
        }
    }
    Ok(())
}

/// Ask viewers to regenerate widget appearances for the new values
fn set_need_appearances(doc: &mut Document) {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| root.as_reference().ok());
    let Some(catalog_id) = catalog_id else { return };

    let acro_ref = doc
        .get_dictionary(catalog_id)
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|acro| acro.as_reference().ok());

    if let Some(acro_id) = acro_ref {
        if let Ok(acro) = doc.get_object_mut(acro_id).and_then(|o| o.as_dict_mut()) {
            acro.set("NeedAppearances", true);
        }
    } else if let Ok(catalog) = doc.get_object_mut(catalog_id).and_then(|o| o.as_dict_mut()) {
        // AcroForm written inline in the catalog
        if let Ok(Object::Dictionary(acro)) = catalog.get_mut(b"AcroForm") {
            acro.set("NeedAppearances", true);
        }
    }
}

fn save(mut doc: Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Bake current widget values into static page content and strip the
/// interactive form from the document.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn flatten(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut doc = load_document(bytes)?;
    let probed = probe_document(&doc)?;

    for (_, page_id) in doc.get_pages() {
        let annots: Vec<Object> = {
            let Ok(page) = doc.get_dictionary(page_id) else {
                continue;
            };
            let Ok(existing) = page.get(b"Annots") else {
                continue;
            };
            match resolve(&doc, existing) {
                Object::Array(items) => items.clone(),
                _ => continue,
            }
        };

        let mut keep = Vec::new();
        let mut baked = Vec::new();
        for annot in annots {
            let widget = annot
                .as_reference()
                .ok()
                .and_then(|id| doc.get_dictionary(id).ok())
                .filter(|dict| is_widget(&doc, dict));
            match widget {
                Some(dict) => baked.extend(bake_widget(&doc, dict, &probed)),
                None => keep.push(annot),
            }
        }

        if !baked.is_empty() {
            let content = Content { operations: baked }.encode()?;
            doc.add_page_contents(page_id, content)?;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(|o| o.as_dict_mut()) {
            if keep.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", Object::Array(keep));
            }
        }
    }

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| root.as_reference().ok());
    if let Some(catalog_id) = catalog_id {
        if let Ok(catalog) = doc.get_object_mut(catalog_id).and_then(|o| o.as_dict_mut()) {
            catalog.remove(b"AcroForm");
        }
    }

    save(doc)
}

fn is_widget(doc: &Document, dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .ok()
        .map(|s| resolve(doc, s))
        .and_then(|s| match s {
            Object::Name(name) => Some(name.as_slice() == b"Widget"),
            _ => None,
        })
        .unwrap_or(false)
}

/// Fully-qualified name of the field a widget annotation belongs to:
/// its own `/T` plus any named ancestors, dot-joined, matching what the
/// prober emits for hierarchical forms
fn widget_field_name(doc: &Document, dict: &Dictionary) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = Some(dict);
    let mut depth = 0;
    while let Some(d) = current {
        if depth > 16 {
            break;
        }
        if let Some(name) = d.get(b"T").ok().and_then(|t| decode_text(resolve(doc, t)).ok()) {
            parts.push(name);
        }
        current = d
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
        depth += 1;
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("."))
}

fn widget_rect(doc: &Document, dict: &Dictionary) -> Option<[f32; 4]> {
    let array = dict.get(b"Rect").ok().map(|r| resolve(doc, r))?;
    let array = array.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (i, entry) in array.iter().enumerate() {
        rect[i] = match resolve(doc, entry) {
            Object::Integer(v) => *v as f32,
            Object::Real(v) => *v as f32,
            _ => return None,
        };
    }
    Some(rect)
}

fn bake_widget(
    doc: &Document,
    dict: &Dictionary,
    probed: &BTreeMap<String, ProbedField>,
) -> Vec<Operation> {
    let Some(name) = widget_field_name(doc, dict) else {
        return Vec::new();
    };
    let Some(field) = probed.get(&name) else {
        return Vec::new();
    };
    let Some(rect) = widget_rect(doc, dict) else {
        return Vec::new();
    };

    match &field.value {
        FieldValue::Text(text) if !text.is_empty() => text_ops(rect, text),
        FieldValue::Checked(true) => cross_ops(rect),
        FieldValue::Choice(state) if !state.is_empty() => {
            // only the widget owning the selected state gets the mark
            if on_states(doc, dict).contains(state) {
                cross_ops(rect)
            } else {
                Vec::new()
            }
        }
        FieldValue::Selection(selected) if !selected.is_empty() => {
            text_ops(rect, &selected.join(", "))
        }
        _ => Vec::new(),
    }
}

fn text_ops(rect: [f32; 4], text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(b"Helv".to_vec()), 9.0f32.into()],
        ),
        Operation::new("Td", vec![(rect[0] + 2.0).into(), (rect[1] + 3.0).into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

fn cross_ops(rect: [f32; 4]) -> Vec<Operation> {
    let [x1, y1, x2, y2] = rect;
    let inset = 2.0;
    vec![
        Operation::new("q", vec![]),
        Operation::new("w", vec![1.2f32.into()]),
        Operation::new("m", vec![(x1 + inset).into(), (y1 + inset).into()]),
        Operation::new("l", vec![(x2 - inset).into(), (y2 - inset).into()]),
        Operation::new("S", vec![]),
        Operation::new("m", vec![(x1 + inset).into(), (y2 - inset).into()]),
        Operation::new("l", vec![(x2 - inset).into(), (y1 + inset).into()]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use crate::probe::probe;
    use crate::template::build_intake_form;

    fn values(entries: Vec<(&str, FieldValue)>) -> BTreeMap<String, FieldValue> {
        entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn test_fill_round_trip_every_kind() {
        crate::init_test_logging();
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![
                ("patient.name", FieldValue::Text("hello".to_string())),
                ("history.vaccinated", FieldValue::Checked(true)),
                ("history.allergies", FieldValue::Choice("Yes".to_string())),
                (
                    "medications.route",
                    FieldValue::Selection(vec!["Oral".to_string()]),
                ),
            ]),
        )
        .unwrap();

        let map = probe(&filled).unwrap();
        assert_eq!(map["patient.name"].value, FieldValue::Text("hello".to_string()));
        assert_eq!(map["history.vaccinated"].value, FieldValue::Checked(true));
        assert_eq!(
            map["history.allergies"].value,
            FieldValue::Choice("Yes".to_string())
        );
        assert_eq!(
            map["medications.route"].value,
            FieldValue::Selection(vec!["Oral".to_string()])
        );
    }

    #[test]
    fn test_fill_unknown_name_is_skipped() {
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![
                ("no.such.widget", FieldValue::Text("x".to_string())),
                ("patient.owner", FieldValue::Text("Dana Whitfield".to_string())),
            ]),
        )
        .unwrap();

        let map = probe(&filled).unwrap();
        assert!(!map.contains_key("no.such.widget"));
        assert_eq!(
            map["patient.owner"].value,
            FieldValue::Text("Dana Whitfield".to_string())
        );
    }

    #[test]
    fn test_fill_shape_mismatch_is_skipped() {
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![
                // checkbox given a string: skipped, widget untouched
                ("history.vaccinated", FieldValue::Text("yes".to_string())),
                // choice outside the declared options: skipped
                ("history.allergies", FieldValue::Choice("Maybe".to_string())),
            ]),
        )
        .unwrap();

        let map = probe(&filled).unwrap();
        assert_eq!(map["history.vaccinated"].value, FieldValue::Checked(false));
        assert_eq!(
            map["history.allergies"].value,
            FieldValue::Choice(String::new())
        );
    }

    #[test]
    fn test_fill_reaches_hierarchical_fields() {
        let bytes = crate::fields::hierarchical_form_doc();
        let filled = fill(
            &bytes,
            &values(vec![("owner.first", FieldValue::Text("Joan".to_string()))]),
        )
        .unwrap();
        let map = probe(&filled).unwrap();
        assert_eq!(map["owner.first"].value, FieldValue::Text("Joan".to_string()));
        assert_eq!(
            map["owner.last"].value,
            FieldValue::Text("Whitfield".to_string())
        );
    }

    #[test]
    fn test_name_set_survives_fill_round_trip() {
        let blank = build_intake_form().unwrap();
        let before: Vec<String> = probe(&blank).unwrap().into_keys().collect();
        let filled = fill(
            &blank,
            &values(vec![(
                "patient.name",
                FieldValue::Text("Bella".to_string()),
            )]),
        )
        .unwrap();
        let after: Vec<String> = probe(&filled).unwrap().into_keys().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_choice_clears_with_empty_selection() {
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![("history.allergies", FieldValue::Choice("No".to_string()))]),
        )
        .unwrap();
        let cleared = fill(
            &filled,
            &values(vec![(
                "history.allergies",
                FieldValue::Choice(String::new()),
            )]),
        )
        .unwrap();
        let map = probe(&cleared).unwrap();
        assert_eq!(
            map["history.allergies"].value,
            FieldValue::Choice(String::new())
        );
    }

    #[test]
    fn test_flatten_strips_widgets_and_bakes_values() {
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![
                ("patient.name", FieldValue::Text("Bella".to_string())),
                ("auth.consent", FieldValue::Checked(true)),
            ]),
        )
        .unwrap();
        let flat = flatten(&filled).unwrap();

        let map = probe(&flat).unwrap();
        assert!(map.is_empty(), "flattened document still has widgets");

        let doc = Document::load_mem(&flat).unwrap();
        let mut content = String::new();
        for (_, page_id) in doc.get_pages() {
            content.push_str(&String::from_utf8_lossy(
                &doc.get_page_content(page_id).unwrap(),
            ));
        }
        assert!(content.contains("Bella"));
    }

    #[test]
    fn test_probe_after_fill_keeps_kinds() {
        let blank = build_intake_form().unwrap();
        let filled = fill(
            &blank,
            &values(vec![("auth.date", FieldValue::Text("2026-08-25".to_string()))]),
        )
        .unwrap();
        let map = probe(&filled).unwrap();
        assert_eq!(map["auth.date"].kind, FieldKind::Text);
        assert_eq!(map["medications.route"].kind, FieldKind::ListBox);
    }
}
