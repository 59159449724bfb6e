//! Widget model and capability accessors
//!
//! A widget's kind is never taken from stored metadata, even when the
//! format exposes a tag: malformed and legacy documents carry inconsistent
//! tags. Each accessor attempts a kind-specific operation against the
//! widget dictionary and fails with `FieldError::Incompatible` when the
//! dictionary does not support it. The prober and writer run the same
//! accessors in the same fixed priority order: text, checkbox,
//! exclusive-choice, single-select list.

use crate::error::{DocError, FieldError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Discovered widget kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    ChoiceGroup,
    ListBox,
    /// Catch-all for widgets no accessor could read
    Error,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::ChoiceGroup => "choice",
            FieldKind::ListBox => "list",
            FieldKind::Error => "error",
        }
    }
}

/// A widget's current value, shaped by its kind
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Checked(bool),
    /// Selected option of an exclusive-choice group; empty when none is
    Choice(String),
    /// Selected options of a single-select list
    Selection(Vec<String>),
}

/// One entry of the uniform name -> (kind, value) map
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedField {
    pub kind: FieldKind,
    pub value: FieldValue,
    /// Declared options, for the choice kinds; empty otherwise
    pub options: Vec<String>,
}

impl ProbedField {
    pub(crate) fn error() -> Self {
        Self {
            kind: FieldKind::Error,
            value: FieldValue::Text(String::new()),
            options: Vec::new(),
        }
    }
}

/// Load a document from an untrusted byte buffer
pub(crate) fn load_document(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| DocError::Format(e.to_string()))
}

/// Follow reference chains to the concrete object
pub(crate) fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    let mut depth = 0;
    while let Object::Reference(id) = obj {
        if depth > 16 {
            break;
        }
        match doc.get_object(*id) {
            Ok(next) => obj = next,
            Err(_) => break,
        }
        depth += 1;
    }
    obj
}

/// Decode a PDF text string (UTF-16BE with BOM, or a byte string)
pub(crate) fn decode_text(obj: &Object) -> std::result::Result<String, FieldError> {
    match obj {
        Object::String(bytes, _) => {
            if bytes.starts_with(&[0xFE, 0xFF]) {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(String::from_utf16_lossy(&utf16))
            } else {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
        _ => Err(FieldError::Malformed("expected a string value".to_string())),
    }
}

fn name_of(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Terminal named fields of the document's interactive form, in
/// declaration order. Non-terminal fields (those whose kids carry their
/// own names) are descended into and their terminals emitted under
/// fully-qualified dotted names. Widgets without a name anywhere in
/// their chain are unreachable by callers and skipped.
pub(crate) fn enumerate_fields(doc: &Document) -> Vec<(String, ObjectId)> {
    let mut out = Vec::new();

    let fields = doc
        .trailer
        .get(b"Root")
        .ok()
        .map(|root| resolve(doc, root))
        .and_then(|catalog| catalog.as_dict().ok())
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .map(|acro| resolve(doc, acro))
        .and_then(|acro| acro.as_dict().ok())
        .and_then(|acro| acro.get(b"Fields").ok())
        .map(|fields| resolve(doc, fields))
        .and_then(|fields| fields.as_array().ok());

    let Some(fields) = fields else {
        return out;
    };

    for entry in fields {
        let Ok(id) = entry.as_reference() else {
            continue;
        };
        collect_terminal_fields(doc, id, None, 0, &mut out);
    }
    out
}

/// Walk one field subtree. A field is terminal when none of its kids is
/// itself a named field: unnamed kids are plain widget annotations (a
/// choice group's buttons), so the field keeps its own identity.
fn collect_terminal_fields(
    doc: &Document,
    id: ObjectId,
    prefix: Option<&str>,
    depth: usize,
    out: &mut Vec<(String, ObjectId)>,
) {
    if depth > 16 {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };
    let Some(name) = dict
        .get(b"T")
        .ok()
        .map(|t| resolve(doc, t))
        .and_then(|t| decode_text(t).ok())
    else {
        return;
    };
    let qualified = match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name,
    };

    let named_kids: Vec<ObjectId> = kid_ids(doc, dict)
        .into_iter()
        .filter(|&kid| {
            doc.get_dictionary(kid)
                .map(|k| k.has(b"T"))
                .unwrap_or(false)
        })
        .collect();
    if named_kids.is_empty() {
        out.push((qualified, id));
        return;
    }
    for kid in named_kids {
        collect_terminal_fields(doc, kid, Some(&qualified), depth + 1, out);
    }
}

/// True when the widget's normal appearance is a dictionary of named
/// states rather than a single stream. State-driven appearance is the
/// defining capability of on/off widgets.
pub(crate) fn has_state_dict(doc: &Document, dict: &Dictionary) -> bool {
    dict.get(b"AP")
        .ok()
        .map(|ap| resolve(doc, ap))
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .map(|n| resolve(doc, n))
        .map(|n| n.as_dict().is_ok())
        .unwrap_or(false)
}

/// The widget's on states: normal-appearance state names other than Off
pub(crate) fn on_states(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(normal) = dict
        .get(b"AP")
        .ok()
        .map(|ap| resolve(doc, ap))
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .map(|n| resolve(doc, n))
        .and_then(|n| n.as_dict().ok())
    else {
        return Vec::new();
    };
    normal
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
        .filter(|state| state != "Off")
        .collect()
}

/// Child widget ids, for fields that delegate appearance to kids
pub(crate) fn kid_ids(doc: &Document, dict: &Dictionary) -> Vec<ObjectId> {
    dict.get(b"Kids")
        .ok()
        .map(|kids| resolve(doc, kids))
        .and_then(|kids| kids.as_array().ok())
        .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default()
}

/// True when at least one kid carries a state-driven appearance
fn has_state_kids(doc: &Document, dict: &Dictionary) -> bool {
    kid_ids(doc, dict)
        .iter()
        .filter_map(|&id| doc.get_dictionary(id).ok())
        .any(|kid| has_state_dict(doc, kid))
}

/// Attempt the text operation: read the value as a string. Fails for
/// widgets with declared options or state-driven appearances.
pub(crate) fn try_text(
    doc: &Document,
    dict: &Dictionary,
) -> std::result::Result<FieldValue, FieldError> {
    if dict.has(b"Opt") || has_state_dict(doc, dict) || has_state_kids(doc, dict) {
        return Err(FieldError::Incompatible);
    }
    match dict.get(b"V") {
        Ok(value) => match resolve(doc, value) {
            obj @ Object::String(..) => Ok(FieldValue::Text(decode_text(obj)?)),
            Object::Name(_) => Err(FieldError::Incompatible),
            _ => Err(FieldError::Malformed("unreadable text value".to_string())),
        },
        Err(_) => Ok(FieldValue::Text(String::new())),
    }
}

/// Attempt the checkbox operation: read the widget's own appearance
/// state. Fails for widgets with options or kids.
pub(crate) fn try_checkbox(
    doc: &Document,
    dict: &Dictionary,
) -> std::result::Result<(bool, String), FieldError> {
    if dict.has(b"Opt") || dict.has(b"Kids") {
        return Err(FieldError::Incompatible);
    }
    if !has_state_dict(doc, dict) {
        return Err(FieldError::Incompatible);
    }
    let on = on_states(doc, dict)
        .into_iter()
        .next()
        .ok_or_else(|| FieldError::Malformed("widget has no on state".to_string()))?;

    let current = dict
        .get(b"V")
        .or_else(|_| dict.get(b"AS"))
        .ok()
        .map(|v| resolve(doc, v))
        .and_then(name_of);
    let checked = current.map(|state| state != "Off").unwrap_or(false);
    Ok((checked, on))
}

/// Attempt the exclusive-choice operation: collect the on states of the
/// kid widgets and read the parent's selection. Fails without
/// state-bearing kids.
pub(crate) fn try_choice_group(
    doc: &Document,
    dict: &Dictionary,
) -> std::result::Result<(String, Vec<String>), FieldError> {
    let kids = kid_ids(doc, dict);
    if kids.is_empty() {
        return Err(FieldError::Incompatible);
    }
    let mut options = Vec::new();
    for id in kids {
        let Ok(kid) = doc.get_dictionary(id) else {
            continue;
        };
        for state in on_states(doc, kid) {
            if !options.contains(&state) {
                options.push(state);
            }
        }
    }
    if options.is_empty() {
        return Err(FieldError::Incompatible);
    }

    let selected = dict
        .get(b"V")
        .ok()
        .map(|v| resolve(doc, v))
        .and_then(name_of)
        .filter(|state| state != "Off")
        .unwrap_or_default();
    Ok((selected, options))
}

/// Attempt the list operation: read the declared option array and the
/// current selection. Fails without options.
pub(crate) fn try_list(
    doc: &Document,
    dict: &Dictionary,
) -> std::result::Result<(Vec<String>, Vec<String>), FieldError> {
    let Some(opt) = dict
        .get(b"Opt")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
    else {
        return Err(FieldError::Incompatible);
    };

    let mut options = Vec::with_capacity(opt.len());
    for entry in opt {
        match resolve(doc, entry) {
            obj @ Object::String(..) => options.push(decode_text(obj)?),
            Object::Array(pair) => {
                // [export, display] pair; the export value is what /V holds
                let export = pair
                    .first()
                    .map(|e| resolve(doc, e))
                    .ok_or_else(|| FieldError::Malformed("empty option pair".to_string()))?;
                options.push(decode_text(export)?);
            }
            _ => return Err(FieldError::Malformed("unreadable option entry".to_string())),
        }
    }

    let selected = match dict.get(b"V").map(|v| resolve(doc, v)) {
        Ok(obj @ Object::String(..)) => vec![decode_text(obj)?],
        Ok(Object::Array(values)) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                out.push(decode_text(resolve(doc, value))?);
            }
            out
        }
        Ok(_) => return Err(FieldError::Malformed("unreadable selection".to_string())),
        Err(_) => Vec::new(),
    };
    Ok((selected, options))
}

/// Document with a non-terminal `owner` field holding two named text
/// kids, the standard hierarchical layout of foreign forms.
#[cfg(test)]
pub(crate) fn hierarchical_form_doc() -> Vec<u8> {
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.5");
    let parent_id = doc.new_object_id();
    let first_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("first"),
        "V" => Object::string_literal("Dana"),
        "Rect" => Object::Array(vec![60.into(), 700.into(), 260.into(), 716.into()]),
        "Parent" => parent_id,
    });
    let last_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal("last"),
        "V" => Object::string_literal("Whitfield"),
        "Rect" => Object::Array(vec![60.into(), 660.into(), 260.into(), 676.into()]),
        "Parent" => parent_id,
    });
    doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("owner"),
            "Kids" => Object::Array(vec![first_id.into(), last_id.into()]),
        }),
    );

    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
        "Annots" => Object::Array(vec![first_id.into(), last_id.into()]),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(vec![page_id.into()]),
            "Count" => 1i64,
        }),
    );
    let acroform_id = doc.add_object(dictionary! {
        "Fields" => Object::Array(vec![parent_id.into()]),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize fixture");
    bytes
}
