//! Page sources
//!
//! The extraction driver only needs, per page, the page text and the raw
//! grids located on it. [`PdfPageSource`] produces both from a PDF; tests and
//! other callers can hand in prepared pages directly.

use crate::extractor::{
    extract_page_items, group_into_lines, load_document, load_document_mem, page_text, TextItem,
    TextLine,
};
use crate::section::{classify_page, SectionVerdict};
use crate::tables::{locate_grids, Grid, TableDetectionConfig};
use crate::ReportError;
use lopdf::{Document, ObjectId};
use std::path::Path;

/// Text and candidate grids of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub number: u32,
    pub text: String,
    /// Grids in top-to-bottom order
    pub grids: Vec<Grid>,
    /// Baseline of the section heading line, when the page has one and its
    /// position is known
    pub heading_y: Option<f32>,
}

/// Anything that can yield pages in document order
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Content of the page at `index` (0-indexed).
    ///
    /// An error here only affects that page; the driver skips it.
    fn page(&self, index: usize) -> Result<PageContent, ReportError>;
}

impl PageSource for [PageContent] {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page(&self, index: usize) -> Result<PageContent, ReportError> {
        self.get(index).cloned().ok_or(ReportError::InvalidStructure)
    }
}

impl PageSource for Vec<PageContent> {
    fn page_count(&self) -> usize {
        self.as_slice().page_count()
    }

    fn page(&self, index: usize) -> Result<PageContent, ReportError> {
        self.as_slice().page(index)
    }
}

/// Pages read from a loaded PDF document
pub struct PdfPageSource {
    doc: Document,
    pages: Vec<(u32, ObjectId)>,
    detection: TableDetectionConfig,
}

impl PdfPageSource {
    /// Open a PDF file
    pub fn open<P: AsRef<Path>>(path: P, detection: &TableDetectionConfig) -> Result<Self, ReportError> {
        Ok(Self::new(load_document(path)?, detection))
    }

    /// Read a PDF held in memory
    pub fn from_bytes(buffer: &[u8], detection: &TableDetectionConfig) -> Result<Self, ReportError> {
        Ok(Self::new(load_document_mem(buffer)?, detection))
    }

    fn new(doc: Document, detection: &TableDetectionConfig) -> Self {
        let pages = doc.get_pages().into_iter().collect();
        Self {
            doc,
            pages,
            detection: detection.clone(),
        }
    }

    /// Positioned text items of the page at `index`
    pub fn page_items(&self, index: usize) -> Result<Vec<TextItem>, ReportError> {
        let &(number, page_id) = self.pages.get(index).ok_or(ReportError::InvalidStructure)?;
        extract_page_items(&self.doc, page_id, number)
    }
}

impl PageSource for PdfPageSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<PageContent, ReportError> {
        let items = self.page_items(index)?;
        let text = page_text(&items);
        let heading_y = heading_line_y(&text, &group_into_lines(&items));

        Ok(PageContent {
            number: self.pages[index].0,
            text,
            grids: locate_grids(&items, &self.detection),
            heading_y,
        })
    }
}

/// Baseline of the last line announcing the page's section heading
fn heading_line_y(text: &str, lines: &[TextLine]) -> Option<f32> {
    let verdict = classify_page(text);
    if verdict == SectionVerdict::Unchanged {
        return None;
    }
    lines
        .iter()
        .rev()
        .find(|line| classify_page(&line.text()) == verdict)
        .map(|line| line.y)
}
