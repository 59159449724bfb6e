//! Page geometry and layout constants

/// A4 page width in points
pub const PAGE_WIDTH: f32 = 595.28;

/// A4 page height in points
pub const PAGE_HEIGHT: f32 = 841.89;

/// Left/right page margin in points
pub const SIDE_MARGIN: f32 = 50.0;

/// Top margin: first baseline sits this far below the page top
pub const TOP_MARGIN: f32 = 50.0;

/// Bottom margin: content never descends below this
pub const BOTTOM_MARGIN: f32 = 50.0;

/// Average character width as a fraction of font size.
/// Alignment offsets are character-count estimates, not glyph metrics.
pub const CHAR_WIDTH_RATIO: f32 = 0.5;

/// Line-item column grid (left edges), in points
pub const COL_PROCEDURE_X: f32 = 60.0;
pub const COL_DESCRIPTION_X: f32 = 180.0;
pub const COL_QTY_X: f32 = 360.0;

/// Right edges for right-aligned numeric columns
pub const COL_QTY_RIGHT: f32 = 400.0;
pub const COL_UNIT_PRICE_RIGHT: f32 = 490.0;
pub const COL_TOTAL_RIGHT: f32 = PAGE_WIDTH - SIDE_MARGIN;

/// Character budget for wrapped procedure text
pub const PROCEDURE_WRAP_CHARS: usize = 20;

/// Character budget for wrapped description text
pub const DESCRIPTION_WRAP_CHARS: usize = 30;

/// Vertical space per wrapped text line in a table row
pub const ROW_LINE_HEIGHT: f32 = 14.0;

/// Minimum line-item row height in points
pub const MIN_ROW_HEIGHT: f32 = 25.0;

/// Vertical padding added to a row beyond its text lines
pub const ROW_PADDING: f32 = 10.0;

/// Space reserved for the totals block before it is drawn
pub const TOTALS_BLOCK_HEIGHT: f32 = 90.0;

/// Marker appended to all but the last chunk of a hard-split word
pub const CONTINUATION_MARKER: char = '-';

/// Country omitted from rendered addresses
pub const DEFAULT_COUNTRY: &str = "United States";

/// Body font size for invoice content
pub const BODY_FONT_SIZE: f32 = 9.0;

/// Font size for section headings and the table header
pub const HEADING_FONT_SIZE: f32 = 11.0;

/// Font size for the brand line
pub const TITLE_FONT_SIZE: f32 = 18.0;
