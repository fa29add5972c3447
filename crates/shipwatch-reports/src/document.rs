//! PDF report rendering.
//!
//! The report is laid out first as a `DocumentLayout`, then drawn with the
//! PDF base-14 Helvetica fonts, so no font files are embedded and the
//! output only depends on the layout.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};
use crate::input::ReportJob;

/// Title printed at the top of the document.
pub const DOCUMENT_TITLE: &str = "DETECTION REPORT";

/// Detections listed in the document table.
pub const MAX_TABLE_ROWS: usize = 15;

/// Fixed table column widths in points.
pub const COLUMN_WIDTHS: [f32; 4] = [36.0, 108.0, 108.0, 129.6];

pub const TABLE_HEADER: [&str; 4] = ["ID", "Class", "Confidence (%)", "Coordinates"];

// A4 in points
const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN_X: f32 = 72.0;
const MARGIN_Y: f32 = 20.0;

const TITLE_SIZE: f32 = 20.0;
const BODY_SIZE: f32 = 11.0;
const BODY_LEADING: f32 = 13.2;
const TABLE_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 18.0;
const CELL_PADDING: f32 = 3.0;

const BLACK: [f32; 3] = [0.0, 0.0, 0.0];
const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
const HEADER_FILL: [f32; 3] = [0.118, 0.251, 0.686];
const STRIPE_FILL: [f32; 3] = [0.827, 0.827, 0.827];
const RULE_GREY: f32 = 0.5;

/// Everything the document shows, before any drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub title: String,
    /// `(label, value)` lines below the title
    pub metadata: Vec<(String, String)>,
    /// Absent when the result has no detections
    pub table: Option<DetectionTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTable {
    pub header: [String; 4],
    pub rows: Vec<[String; 4]>,
}

impl DetectionTable {
    /// Rows drawn, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }
}

impl DocumentLayout {
    pub fn from_job(job: &ReportJob) -> Self {
        let result = &job.result;

        let mut metadata = vec![
            ("Date/Time".to_string(), job.timestamp()),
            (
                "Processing Time".to_string(),
                result.processing_time_display(),
            ),
            ("Detections".to_string(), result.detection_count().to_string()),
        ];

        if let Some(stats) = result.video_stats() {
            metadata.extend([
                (
                    "Frames Processed".to_string(),
                    stats.frames_processed.to_string(),
                ),
                (
                    "Frames With Detections".to_string(),
                    stats.frames_with_detections.to_string(),
                ),
                (
                    "Max Detections Per Frame".to_string(),
                    stats.max_detections_per_frame.to_string(),
                ),
                (
                    "Avg Detections Per Frame".to_string(),
                    format!("{:.2}", stats.avg_detections_per_frame),
                ),
            ]);
        }

        let table = (!result.detections.is_empty()).then(|| DetectionTable {
            header: TABLE_HEADER.map(String::from),
            rows: result
                .detections
                .iter()
                .take(MAX_TABLE_ROWS)
                .enumerate()
                .map(|(i, det)| {
                    let [x1, y1, x2, y2] = det.truncated_bbox();
                    [
                        (i + 1).to_string(),
                        det.class_label.clone(),
                        det.confidence_percent(),
                        format!("({},{},{},{})", x1, y1, x2, y2),
                    ]
                })
                .collect(),
        });

        Self {
            title: DOCUMENT_TITLE.to_string(),
            metadata,
            table,
        }
    }
}

/// Draw the layout and serialize it as an uncompressed PDF.
pub fn render(layout: &DocumentLayout) -> ReportResult<Vec<u8>> {
    let pages = draw(layout);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            PAGE_WIDTH.into(),
            PAGE_HEIGHT.into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| ReportError::document(e.to_string()))?;

    info!(pages = page_count, bytes = buf.len(), "PDF generated");
    Ok(buf)
}

fn draw(layout: &DocumentLayout) -> Vec<Vec<Operation>> {
    let mut page = PageWriter::new();

    // Title
    let title_width = text_width(Font::Bold, TITLE_SIZE, &layout.title);
    page.ensure_space(TITLE_SIZE * 1.2);
    let baseline = page.cursor - TITLE_SIZE;
    page.text(
        Font::Bold,
        TITLE_SIZE,
        BLACK,
        (PAGE_WIDTH - title_width) / 2.0,
        baseline,
        &layout.title,
    );
    page.cursor -= TITLE_SIZE * 1.2 + 12.0 + 14.4;

    // Metadata block
    for (label, value) in &layout.metadata {
        page.ensure_space(BODY_LEADING);
        let baseline = page.cursor - BODY_SIZE;
        let label = format!("{}: ", label);
        page.text(Font::Bold, BODY_SIZE, BLACK, MARGIN_X, baseline, &label);
        let offset = text_width(Font::Bold, BODY_SIZE, &label);
        page.text(Font::Regular, BODY_SIZE, BLACK, MARGIN_X + offset, baseline, value);
        page.cursor -= BODY_LEADING + 6.0;
    }
    page.cursor -= 21.6;

    if let Some(table) = &layout.table {
        page.ensure_space(BODY_LEADING + 7.2 + ROW_HEIGHT * 2.0);
        let baseline = page.cursor - BODY_SIZE;
        page.text(Font::Bold, BODY_SIZE, BLACK, MARGIN_X, baseline, "DETECTIONS:");
        page.cursor -= BODY_LEADING + 6.0 + 7.2;

        draw_table(&mut page, table);
    }

    debug!(
        metadata_lines = layout.metadata.len(),
        table_rows = layout.table.as_ref().map_or(0, DetectionTable::row_count),
        "Document laid out"
    );

    page.finish()
}

/// Draw the table, repeating the header row at the top of every page it spans.
fn draw_table(page: &mut PageWriter, table: &DetectionTable) {
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    let x0 = MARGIN_X + (PAGE_WIDTH - 2.0 * MARGIN_X - table_width) / 2.0;

    page.ensure_space(ROW_HEIGHT * 2.0);
    draw_header_row(page, x0, table_width, &table.header);

    for (i, cells) in table.rows.iter().enumerate() {
        if !page.fits(ROW_HEIGHT) {
            page.line(x0, page.cursor, x0 + table_width, page.cursor, 1.0, 0.0);
            page.new_page();
            draw_header_row(page, x0, table_width, &table.header);
        }

        // data rows alternate white and grey, starting with white
        let fill = (i % 2 == 1).then_some(STRIPE_FILL);
        draw_row(page, x0, table_width, cells, Font::Regular, BLACK, fill);
    }

    page.line(x0, page.cursor, x0 + table_width, page.cursor, 1.0, 0.0);
}

fn draw_header_row(page: &mut PageWriter, x0: f32, table_width: f32, header: &[String; 4]) {
    let top = page.cursor;
    draw_row(page, x0, table_width, header, Font::Bold, WHITE, Some(HEADER_FILL));
    page.line(x0, top, x0 + table_width, top, 1.0, 0.0);
}

fn draw_row(
    page: &mut PageWriter,
    x0: f32,
    table_width: f32,
    cells: &[String; 4],
    font: Font,
    color: [f32; 3],
    fill: Option<[f32; 3]>,
) {
    let top = page.cursor;
    let bottom = top - ROW_HEIGHT;

    if let Some(fill) = fill {
        page.fill_rect(x0, bottom, table_width, ROW_HEIGHT, fill);
    }

    let baseline = bottom + (ROW_HEIGHT - TABLE_SIZE * 0.7) / 2.0;
    let mut x = x0;
    for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
        let text = fit_text(font, TABLE_SIZE, cell, width - 2.0 * CELL_PADDING);
        let w = text_width(font, TABLE_SIZE, &text);
        page.text(font, TABLE_SIZE, color, x + (width - w) / 2.0, baseline, &text);
        x += width;
    }

    page.line(x0, top, x0, bottom, 0.5, RULE_GREY);
    page.line(x0 + table_width, top, x0 + table_width, bottom, 0.5, RULE_GREY);

    page.cursor = bottom;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> Object {
        match self {
            Font::Regular => Object::Name(b"F1".to_vec()),
            Font::Bold => Object::Name(b"F2".to_vec()),
        }
    }
}

/// Accumulates drawing operations, breaking pages when space runs out.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    cursor: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            cursor: PAGE_HEIGHT - MARGIN_Y,
        }
    }

    fn fits(&self, height: f32) -> bool {
        self.cursor - height >= MARGIN_Y
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.cursor = PAGE_HEIGHT - MARGIN_Y;
    }

    fn ensure_space(&mut self, height: f32) {
        if !self.fits(height) && !self.ops.is_empty() {
            self.new_page();
        }
    }

    fn text(&mut self, font: Font, size: f32, color: [f32; 3], x: f32, baseline: f32, text: &str) {
        let [r, g, b] = color;
        self.ops.extend([
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource(), size.into()]),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new("Tj", vec![Object::string_literal(encode_text(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: [f32; 3]) {
        let [r, g, b] = color;
        self.ops.extend([
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("f", vec![]),
        ]);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, gray: f32) {
        self.ops.extend([
            Operation::new("w", vec![width.into()]),
            Operation::new("G", vec![gray.into()]),
            Operation::new("m", vec![x1.into(), y1.into()]),
            Operation::new("l", vec![x2.into(), y2.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(self.ops);
        }
        self.pages
    }
}

/// Printable ASCII passes through; anything else becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' })
        .collect()
}

/// Drop trailing characters until `text` fits in `max_width`.
fn fit_text(font: Font, size: f32, text: &str, max_width: f32) -> String {
    let mut fitted = text.to_string();
    while !fitted.is_empty() && text_width(font, size, &fitted) > max_width {
        fitted.pop();
    }
    fitted
}

fn text_width(font: Font, size: f32, text: &str) -> f32 {
    let table = match font {
        Font::Regular => &HELVETICA_WIDTHS,
        Font::Bold => &HELVETICA_BOLD_WIDTHS,
    };
    let units: u32 = encode_text(text)
        .iter()
        .map(|&b| u32::from(table[usize::from(b - b' ')]))
        .sum();
    units as f32 * size / 1000.0
}

// Glyph advances for ' '..='~' in 1/1000 em (Adobe AFM metrics)
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
