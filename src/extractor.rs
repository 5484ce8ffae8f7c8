//! Positioned text extraction from PDF using lopdf
//!
//! Walks each page's content stream, tracking the graphics and text state,
//! and emits one [`TextItem`] per shown string. Table location and page text
//! are both built from these items.

use crate::ReportError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// Average glyph advance as a fraction of the font size, used to estimate
/// item widths when glyph metrics are not read.
const AVG_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Line advance used by `T*` and `'`, as a multiple of the font size
const LINE_ADVANCE_RATIO: f32 = 1.2;

/// A text item with position information
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Estimated width of the text
    pub width: f32,
    /// Rendered font size
    pub font_size: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

impl TextItem {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// A line of text (grouped text items)
#[derive(Debug, Clone)]
pub struct TextLine {
    pub items: Vec<TextItem>,
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Load a PDF document from a file
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document, ReportError> {
    let doc = Document::load(path)?;
    check_document(doc)
}

/// Load a PDF document from a memory buffer
pub fn load_document_mem(buffer: &[u8]) -> Result<Document, ReportError> {
    let doc = Document::load_mem(buffer)?;
    check_document(doc)
}

fn check_document(doc: Document) -> Result<Document, ReportError> {
    if doc.is_encrypted() {
        return Err(ReportError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(ReportError::InvalidStructure);
    }
    Ok(doc)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Graphics and text state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn next_line(&mut self) {
        self.line_matrix[5] -= self.font_size * LINE_ADVANCE_RATIO;
        self.text_matrix = self.line_matrix;
    }

    /// Build an item for `text` at the current text position
    fn item(&self, text: String, page: u32) -> Option<TextItem> {
        if text.trim().is_empty() {
            return None;
        }
        let rendered_size = effective_font_size(self.font_size, &self.text_matrix);
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let width = text.chars().count() as f32 * rendered_size * AVG_CHAR_WIDTH_RATIO;
        Some(TextItem {
            text,
            x: combined[4],
            y: combined[5],
            width,
            font_size: rendered_size,
            page,
        })
    }
}

/// Extract positioned text items from a single page
pub fn extract_page_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextItem>, ReportError> {
    use lopdf::content::Content;

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| ReportError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| ReportError::Parse(e.to_string()))?;

    let mut items = Vec::new();
    let mut state = TextState::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    state.ctm = multiply_matrices(&new_matrix, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    state.line_matrix[4] += tx;
                    state.line_matrix[5] += ty;
                    state.text_matrix = state.line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        state.text_matrix[i] = get_number(operand).unwrap_or(IDENTITY[i]);
                    }
                    state.line_matrix = state.text_matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" => {
                if state.in_text_block && !op.operands.is_empty() {
                    let text = extract_text_from_operand(&op.operands[0], doc, &fonts, &state.font);
                    if let Some(item) = text.and_then(|t| state.item(t, page_num)) {
                        items.push(item);
                    }
                }
            }
            "TJ" => {
                if state.in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let combined: String = array
                            .iter()
                            .filter_map(|obj| {
                                extract_text_from_operand(obj, doc, &fonts, &state.font)
                            })
                            .collect();
                        if let Some(item) = state.item(combined, page_num) {
                            items.push(item);
                        }
                    }
                }
            }
            "'" => {
                state.next_line();
                if !op.operands.is_empty() {
                    let text = extract_text_from_operand(&op.operands[0], doc, &fonts, &state.font);
                    if let Some(item) = text.and_then(|t| state.item(t, page_num)) {
                        items.push(item);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, text_matrix: &[f32; 6]) -> f32 {
    let scale_x = (text_matrix[0].powi(2) + text_matrix[1].powi(2)).sqrt();
    let scale_y = (text_matrix[2].powi(2) + text_matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // Fallback: UTF-16BE with BOM, then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Group the items of one page into lines.
///
/// Preserves PDF stream order (which is typically reading order) and only
/// merges consecutive items sitting on the same baseline.
pub fn group_into_lines(items: &[TextItem]) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let y_tolerance = 3.0;

    for item in items {
        match lines.last_mut() {
            Some(last) if last.page == item.page && (last.y - item.y).abs() < y_tolerance => {
                last.items.push(item.clone());
            }
            _ => lines.push(TextLine {
                items: vec![item.clone()],
                y: item.y,
                page: item.page,
            }),
        }
    }

    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}

/// Plain text of a page, one line per text line
pub fn page_text(items: &[TextItem]) -> String {
    group_into_lines(items)
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            y,
            width: text.len() as f32 * 5.0,
            font_size: 10.0,
            page: 1,
        }
    }

    #[test]
    fn test_group_into_lines() {
        let items = vec![
            item("World", 160.0, 700.0),
            item("Hello", 100.0, 700.5),
            item("Next line", 100.0, 680.0),
        ];

        let lines = group_into_lines(&items);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello World");
        assert_eq!(lines[1].text(), "Next line");
    }

    #[test]
    fn test_page_text_joins_lines() {
        let items = vec![
            item("2. RECORD", 50.0, 760.0),
            item("TAMPERING", 110.0, 760.0),
            item("Fish", 50.0, 700.0),
        ];
        assert_eq!(page_text(&items), "2. RECORD TAMPERING\nFish");
    }

    #[test]
    fn test_effective_font_size_scales_with_matrix() {
        let scaled = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        assert!((effective_font_size(9.0, &scaled) - 18.0).abs() < 0.001);
        assert!((effective_font_size(9.0, &IDENTITY) - 9.0).abs() < 0.001);
    }

    #[test]
    fn test_multiply_translation() {
        let translate = [1.0, 0.0, 0.0, 1.0, 10.0, 20.0];
        let shift = [1.0, 0.0, 0.0, 1.0, 5.0, 5.0];
        let combined = multiply_matrices(&translate, &shift);
        assert_eq!(combined[4], 15.0);
        assert_eq!(combined[5], 25.0);
    }

    #[test]
    fn test_latin1_fallback() {
        let doc = Document::new();
        let fonts = BTreeMap::new();
        let obj = Object::string_literal("Fish");
        let text = extract_text_from_operand(&obj, &doc, &fonts, "F1");
        assert_eq!(text.as_deref(), Some("Fish"));
        assert_eq!(
            extract_text_from_operand(&Object::Integer(3), &doc, &fonts, "F1"),
            None
        );
    }
}
