//! XLSX report rendering.

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{
    Color, DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook,
};
use tracing::info;

use crate::error::{ReportError, ReportResult};
use crate::input::ReportJob;

pub const SHEET_NAME: &str = "Results";
pub const SHEET_TITLE: &str = "Detection Report";

pub const INFO_HEADER: [&str; 2] = ["Parameter", "Value"];
pub const DETECTION_HEADER: [&str; 7] = ["#", "Class", "Confidence(%)", "X1", "Y1", "X2", "Y2"];

/// Column widths for A through G.
pub const COLUMN_WIDTHS: [f64; 7] = [15.0, 15.0, 15.0, 12.0, 12.0, 12.0, 12.0];

const HEADER_FILL: u32 = 0x1E40AF;

// Zero-based rows
const TITLE_ROW: u32 = 0;
const INFO_HEADER_ROW: u32 = 2;
const INFO_FIRST_ROW: u32 = 3;

/// One detection line of the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetDetectionRow {
    pub sequence: u64,
    pub class_label: String,
    pub confidence_percent: String,
    pub bbox: [i64; 4],
}

/// Cell content of the sheet, before any formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub title: String,
    /// Also stamped as the workbook creation time
    pub generated_at: NaiveDateTime,
    /// `(parameter, value)` rows starting at `INFO_FIRST_ROW`
    pub info_rows: Vec<(String, String)>,
    /// Every detection, uncapped
    pub detections: Vec<SheetDetectionRow>,
}

impl SheetLayout {
    pub fn from_job(job: &ReportJob) -> Self {
        let result = &job.result;

        let mut info_rows = vec![
            ("Date/Time".to_string(), job.timestamp()),
            (
                "Processing Time".to_string(),
                result.processing_time_display(),
            ),
            (
                "Detections Found".to_string(),
                result.detection_count().to_string(),
            ),
        ];

        if let Some(stats) = result.video_stats() {
            info_rows.push(("Frames Processed".to_string(), stats.frames_processed.to_string()));
            info_rows.push((
                "Frames With Detections".to_string(),
                stats.frames_with_detections.to_string(),
            ));
            info_rows.push((
                "Max Detections Per Frame".to_string(),
                stats.max_detections_per_frame.to_string(),
            ));
            info_rows.push((
                "Avg Detections Per Frame".to_string(),
                format!("{:.2}", stats.avg_detections_per_frame),
            ));
        }

        let detections = result
            .detections
            .iter()
            .enumerate()
            .map(|(i, det)| SheetDetectionRow {
                sequence: i as u64 + 1,
                class_label: det.class_label.clone(),
                confidence_percent: det.confidence_percent(),
                bbox: det.truncated_bbox(),
            })
            .collect();

        Self {
            title: SHEET_TITLE.to_string(),
            generated_at: job.generated_at,
            info_rows,
            detections,
        }
    }

    /// Zero-based row of the detection header, two rows below the info block.
    pub fn detection_header_row(&self) -> Option<u32> {
        if self.detections.is_empty() {
            return None;
        }
        Some(INFO_FIRST_ROW + self.info_rows.len() as u32 + 1)
    }
}

/// `generated_at` as an Excel date, for the document properties.
fn creation_time(at: &NaiveDateTime) -> ReportResult<ExcelDateTime> {
    let year = u16::try_from(at.year())
        .map_err(|_| ReportError::spreadsheet(format!("year {} out of range", at.year())))?;
    let date = ExcelDateTime::from_ymd(year, at.month() as u8, at.day() as u8)?
        .and_hms(at.hour() as u16, at.minute() as u8, at.second())?;
    Ok(date)
}

/// Write the layout into a single-sheet workbook.
pub fn render(layout: &SheetLayout) -> ReportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    // Otherwise the workbook carries the wall-clock save time
    let properties = DocProperties::new().set_creation_datetime(&creation_time(&layout.generated_at)?);
    workbook.set_properties(&properties);

    let title_format = Format::new()
        .set_bold()
        .set_font_size(16)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let header_format = Format::new()
        .set_bold()
        .set_font_size(12)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL));
    let table_header_format = header_format
        .clone()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);
    let bordered = Format::new().set_border(FormatBorder::Thin);
    let cell_format = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);

    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        worksheet.merge_range(TITLE_ROW, 0, TITLE_ROW, 3, &layout.title, &title_format)?;

        for (col, label) in INFO_HEADER.iter().enumerate() {
            worksheet.write_string_with_format(INFO_HEADER_ROW, col as u16, *label, &header_format)?;
        }

        for (offset, (param, value)) in layout.info_rows.iter().enumerate() {
            let row = INFO_FIRST_ROW + offset as u32;
            worksheet.write_string_with_format(row, 0, param, &bordered)?;
            worksheet.write_string_with_format(row, 1, value, &bordered)?;
        }

        if let Some(header_row) = layout.detection_header_row() {
            for (col, label) in DETECTION_HEADER.iter().enumerate() {
                worksheet.write_string_with_format(
                    header_row,
                    col as u16,
                    *label,
                    &table_header_format,
                )?;
            }

            for (offset, det) in layout.detections.iter().enumerate() {
                let row = header_row + 1 + offset as u32;
                worksheet.write_number_with_format(row, 0, det.sequence as f64, &cell_format)?;
                worksheet.write_string_with_format(row, 1, &det.class_label, &cell_format)?;
                worksheet.write_string_with_format(row, 2, &det.confidence_percent, &cell_format)?;
                for (i, coord) in det.bbox.iter().enumerate() {
                    worksheet.write_number_with_format(
                        row,
                        3 + i as u16,
                        *coord as f64,
                        &cell_format,
                    )?;
                }
            }
        }

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }
    }

    let buf = workbook.save_to_buffer()?;

    info!(
        detections = layout.detections.len(),
        bytes = buf.len(),
        "Spreadsheet generated"
    );
    Ok(buf)
}
