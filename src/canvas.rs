//! Page canvas over a growing lopdf document
//!
//! Hides "do I have room, and if not, make room" from the layout engines.
//! The canvas owns the shared font objects, the per-page operation lists,
//! the AcroForm field list, and the cursor. `ensure_space` is the only
//! place that allocates pages and redraws the continuation header, so
//! header formatting stays in one place.

use crate::constants::*;
use crate::error::Result;
use lopdf::{
    Document, Object, ObjectId, Stream,
    content::{Content, Operation},
    dictionary,
};
use tracing::{debug, trace};

/// Fonts embedded once per document and shared by every page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Horizontal anchor for a column caption
#[derive(Debug, Clone, Copy)]
pub enum Anchor {
    Left(f32),
    Right(f32),
}

/// One caption of the running column header
#[derive(Debug, Clone)]
pub struct ColumnCaption {
    pub label: String,
    pub anchor: Anchor,
}

impl ColumnCaption {
    pub fn left(label: &str, x: f32) -> Self {
        Self {
            label: label.to_string(),
            anchor: Anchor::Left(x),
        }
    }

    pub fn right(label: &str, right_edge: f32) -> Self {
        Self {
            label: label.to_string(),
            anchor: Anchor::Right(right_edge),
        }
    }
}

/// Header redrawn at the top of every overflow page
#[derive(Debug, Clone)]
pub struct ContinuationHeader {
    pub title: String,
    pub captions: Vec<ColumnCaption>,
}

/// Widget rectangle in page coordinates (bottom-left origin)
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    fn to_object(self) -> Object {
        Object::Array(vec![
            self.x.into(),
            self.y.into(),
            (self.x + self.w).into(),
            (self.y + self.h).into(),
        ])
    }
}

/// A page under construction: draw operations plus widget annotations
struct PageDraft {
    ops: Vec<Operation>,
    annots: Vec<Object>,
}

impl PageDraft {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            annots: Vec::new(),
        }
    }
}

/// Estimated width of a text run, by character count.
/// An approximation, adequate for the fixed font/size pairs used here.
pub fn text_width_estimate(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * CHAR_WIDTH_RATIO
}

/// Canvas over an in-progress document. Created fresh per render call,
/// consumed by `finish`.
pub struct PageCanvas {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    helv_id: ObjectId,
    zadb_id: ObjectId,
    done: Vec<PageDraft>,
    current: PageDraft,
    y: f32,
    fields: Vec<Object>,
    header: Option<ContinuationHeader>,
}

impl PageCanvas {
    /// Create a canvas with one blank page and the shared font resources
    pub fn new() -> Result<Self> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let zadb_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ZapfDingbats",
        });

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
                "Helv" => regular_id,
                "ZaDb" => zadb_id,
            },
        });

        Ok(Self {
            doc,
            pages_id,
            resources_id,
            helv_id: regular_id,
            zadb_id,
            done: Vec::new(),
            current: PageDraft::new(),
            y: PAGE_HEIGHT - TOP_MARGIN,
            fields: Vec::new(),
            header: None,
        })
    }

    /// Current vertical cursor position (baseline origin for the next block)
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Move the cursor down
    pub fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }

    /// Vertical space left on the current page
    pub fn remaining_height(&self) -> f32 {
        self.y - BOTTOM_MARGIN
    }

    /// Pages allocated so far (always at least one)
    pub fn page_count(&self) -> usize {
        self.done.len() + 1
    }

    /// Register the header redrawn on every page allocated after this call
    pub fn set_continuation_header(&mut self, header: ContinuationHeader) {
        self.header = Some(header);
    }

    /// Allocate a new page if less than `min_height` remains. Returns true
    /// when a page break happened, so callers can redraw their own
    /// sub-headings; the continuation header itself is drawn here and must
    /// not be duplicated by the caller.
    pub fn ensure_space(&mut self, min_height: f32) -> bool {
        if self.remaining_height() >= min_height {
            return false;
        }

        debug!(
            remaining = self.remaining_height(),
            needed = min_height,
            "allocating overflow page"
        );
        self.done.push(std::mem::replace(&mut self.current, PageDraft::new()));
        self.y = PAGE_HEIGHT - TOP_MARGIN;

        if let Some(header) = self.header.clone() {
            self.draw_text(
                SIDE_MARGIN,
                self.y - HEADING_FONT_SIZE,
                Font::Bold,
                HEADING_FONT_SIZE,
                &header.title,
            );
            self.advance(HEADING_FONT_SIZE + 14.0);
            self.draw_column_captions(&header.captions);
        }
        true
    }

    /// Draw one row of column captions with a rule beneath, advancing
    /// the cursor past it. Used for the first table header and for every
    /// continuation header.
    pub fn draw_column_captions(&mut self, captions: &[ColumnCaption]) {
        let baseline = self.y - 12.0;
        for caption in captions {
            match caption.anchor {
                Anchor::Left(x) => {
                    self.draw_text(x, baseline, Font::Bold, BODY_FONT_SIZE, &caption.label)
                }
                Anchor::Right(right) => self.draw_text_right(
                    right,
                    baseline,
                    Font::Bold,
                    BODY_FONT_SIZE,
                    &caption.label,
                ),
            }
        }
        let rule_y = baseline - 4.0;
        self.draw_rule(SIDE_MARGIN, PAGE_WIDTH - SIDE_MARGIN, rule_y, 0.8);
        self.y = rule_y - 4.0;
    }

    /// Draw a text run at an absolute position on the current page
    pub fn draw_text(&mut self, x: f32, y: f32, font: Font, size: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        let ops = &mut self.current.ops;
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(font.resource_name().as_bytes().to_vec()),
                size.into(),
            ],
        ));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Draw a text run so its estimated right edge lands on `right_edge`
    pub fn draw_text_right(&mut self, right_edge: f32, y: f32, font: Font, size: f32, text: &str) {
        let x = right_edge - text_width_estimate(text, size);
        self.draw_text(x, y, font, size, text);
    }

    /// Draw a horizontal rule
    pub fn draw_rule(&mut self, x1: f32, x2: f32, y: f32, line_width: f32) {
        let ops = &mut self.current.ops;
        ops.push(Operation::new("w", vec![line_width.into()]));
        ops.push(Operation::new("m", vec![x1.into(), y.into()]));
        ops.push(Operation::new("l", vec![x2.into(), y.into()]));
        ops.push(Operation::new("S", vec![]));
    }

    /// Draw a stroked rectangle outline
    pub fn draw_rect_stroke(&mut self, rect: Rect, line_width: f32) {
        let ops = &mut self.current.ops;
        ops.push(Operation::new("w", vec![line_width.into()]));
        ops.push(Operation::new(
            "re",
            vec![
                rect.x.into(),
                rect.y.into(),
                rect.w.into(),
                rect.h.into(),
            ],
        ));
        ops.push(Operation::new("S", vec![]));
    }

    /// Add a text widget to the current page
    pub fn add_text_field(&mut self, name: &str, rect: Rect, value: &str, multiline: bool) {
        let mut field = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(name),
            "Rect" => rect.to_object(),
            "F" => 4i64,
            "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
            "V" => Object::string_literal(value),
        };
        if multiline {
            field.set("Ff", 4096i64);
        }
        let field_id = self.doc.add_object(field);
        self.register_field(field_id);
        trace!(name, "added text field");
    }

    /// Add a checkbox widget to the current page. The on state is `/Yes`.
    pub fn add_checkbox(&mut self, name: &str, rect: Rect, checked: bool) -> Result<()> {
        let (on_id, off_id) = self.appearance_pair(rect.w, rect.h)?;
        let state = if checked { "Yes" } else { "Off" };
        let field_id = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Btn",
            "T" => Object::string_literal(name),
            "Rect" => rect.to_object(),
            "F" => 4i64,
            "V" => state,
            "AS" => state,
            "AP" => dictionary! {
                "N" => dictionary! {
                    "Yes" => on_id,
                    "Off" => off_id,
                },
            },
        });
        self.register_field(field_id);
        trace!(name, checked, "added checkbox");
        Ok(())
    }

    /// Add an exclusive-choice group: one parent field, one widget per
    /// option, at most one option selected at a time.
    pub fn add_choice_group(
        &mut self,
        name: &str,
        options: &[(&str, Rect)],
        selected: Option<&str>,
    ) -> Result<()> {
        let parent_id = self.doc.new_object_id();
        let mut kid_refs = Vec::with_capacity(options.len());

        for (option, rect) in options {
            let (on_id, off_id) = self.appearance_pair(rect.w, rect.h)?;
            let state = if selected == Some(*option) { *option } else { "Off" };
            let kid_id = self.doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Widget",
                "Rect" => rect.to_object(),
                "F" => 4i64,
                "Parent" => parent_id,
                "AS" => state_name(state),
                "AP" => dictionary! {
                    "N" => dictionary! {
                        *option => on_id,
                        "Off" => off_id,
                    },
                },
            });
            kid_refs.push(Object::Reference(kid_id));
            self.current.annots.push(Object::Reference(kid_id));
        }

        let value = selected.unwrap_or("Off");
        self.doc.objects.insert(
            parent_id,
            Object::Dictionary(dictionary! {
                "FT" => "Btn",
                "Ff" => 49152i64,
                "T" => Object::string_literal(name),
                "V" => state_name(value),
                "Kids" => Object::Array(kid_refs),
            }),
        );
        self.fields.push(Object::Reference(parent_id));
        trace!(name, "added exclusive-choice group");
        Ok(())
    }

    /// Add a single-select list box widget to the current page
    pub fn add_list_box(&mut self, name: &str, rect: Rect, options: &[&str], selected: &[&str]) {
        let opt_array: Vec<Object> = options
            .iter()
            .map(|o| Object::string_literal(*o))
            .collect();
        let mut field = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Ch",
            "T" => Object::string_literal(name),
            "Rect" => rect.to_object(),
            "F" => 4i64,
            "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
            "Opt" => Object::Array(opt_array),
        };
        match selected {
            [] => {}
            [single] => field.set("V", Object::string_literal(*single)),
            many => field.set(
                "V",
                Object::Array(many.iter().map(|s| Object::string_literal(*s)).collect()),
            ),
        }
        let field_id = self.doc.add_object(field);
        self.register_field(field_id);
        trace!(name, "added list box");
    }

    fn register_field(&mut self, field_id: ObjectId) {
        self.current.annots.push(Object::Reference(field_id));
        self.fields.push(Object::Reference(field_id));
    }

    /// Build a pair of form XObject appearance streams: an X mark for the
    /// on state, an empty stream for off.
    fn appearance_pair(&mut self, w: f32, h: f32) -> Result<(ObjectId, ObjectId)> {
        let inset = 2.0f32;
        let on_content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("w", vec![1.2f32.into()]),
                Operation::new("m", vec![inset.into(), inset.into()]),
                Operation::new("l", vec![(w - inset).into(), (h - inset).into()]),
                Operation::new("S", vec![]),
                Operation::new("m", vec![inset.into(), (h - inset).into()]),
                Operation::new("l", vec![(w - inset).into(), inset.into()]),
                Operation::new("S", vec![]),
                Operation::new("Q", vec![]),
            ],
        }
        .encode()?;

        let bbox = Object::Array(vec![0.into(), 0.into(), w.into(), h.into()]);
        let on_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => bbox.clone(),
            },
            on_content,
        ));
        let off_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => bbox,
            },
            Vec::new(),
        ));
        Ok((on_id, off_id))
    }

    /// Assemble the page tree and catalog and serialize to bytes
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.done.push(self.current);

        let mut kids = Vec::with_capacity(self.done.len());
        for draft in self.done {
            let content = Content {
                operations: draft.ops,
            }
            .encode()?;
            let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "MediaBox" => Object::Array(vec![
                    0.into(),
                    0.into(),
                    PAGE_WIDTH.into(),
                    PAGE_HEIGHT.into(),
                ]),
                "Contents" => content_id,
                "Resources" => self.resources_id,
            };
            if !draft.annots.is_empty() {
                page.set("Annots", Object::Array(draft.annots));
            }
            kids.push(Object::Reference(self.doc.add_object(page)));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(kids),
                "Count" => count,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if !self.fields.is_empty() {
            let acroform_id = self.doc.add_object(dictionary! {
                "Fields" => Object::Array(self.fields),
                "NeedAppearances" => true,
                "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
                "DR" => dictionary! {
                    "Font" => dictionary! {
                        "Helv" => self.helv_id,
                        "ZaDb" => self.zadb_id,
                    },
                },
            });
            catalog.set("AcroForm", Object::Reference(acroform_id));
        }
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        debug!(bytes = buffer.len(), "serialized document");
        Ok(buffer)
    }
}

/// PDF name object for an appearance state
fn state_name(state: &str) -> Object {
    Object::Name(state.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_starts_with_one_page() {
        let canvas = PageCanvas::new().unwrap();
        assert_eq!(canvas.page_count(), 1);
        assert!(canvas.remaining_height() > 0.0);
    }

    #[test]
    fn test_ensure_space_allocates_page() {
        let mut canvas = PageCanvas::new().unwrap();
        let broke = canvas.ensure_space(canvas.remaining_height() + 1.0);
        assert!(broke);
        assert_eq!(canvas.page_count(), 2);
        assert!(!canvas.ensure_space(10.0));
    }

    #[test]
    fn test_finish_produces_loadable_pdf() {
        let mut canvas = PageCanvas::new().unwrap();
        canvas.draw_text(60.0, 700.0, Font::Regular, 9.0, "hello");
        let bytes = canvas.finish().unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_width_estimate_scales_with_length() {
        let short = text_width_estimate("ab", 10.0);
        let long = text_width_estimate("abcd", 10.0);
        assert!((long - short * 2.0).abs() < f32::EPSILON);
    }
}
