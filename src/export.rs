use std::io::Cursor;
use std::path::{Path, PathBuf};

use printpdf::{IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{debug, info};
use ttf_parser::Face;

use crate::config::ExportConfig;
use crate::error::{ReportError, ReportResult};
use crate::models::ReportRecord;

pub const PDF_MIME: &str = "application/pdf";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const PT_TO_MM: f32 = 0.352_778;
const LAYER_NAME: &str = "Layer 1";
const SHEET_NAME: &str = "Sheet1";
const TABLE_HEADER: [&str; 2] = ["timestamp", "report"];

/// Renders single-report PDFs with an embedded TrueType font.
#[derive(Debug, Clone)]
pub struct DocumentExporter {
    font_path: PathBuf,
    font_size: f32,
}

impl DocumentExporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            font_path: config.font_path.clone(),
            font_size: config.font_size,
        }
    }

    pub fn font_path(&self) -> &Path {
        &self.font_path
    }

    pub fn render_single_report_document(
        &self,
        student_name: &str,
        body: &str,
    ) -> ReportResult<Vec<u8>> {
        let font_bytes = std::fs::read(&self.font_path).map_err(|e| {
            ReportError::render(format!(
                "cannot read font {}: {e}",
                self.font_path.display()
            ))
        })?;
        render_pdf(&font_bytes, self.font_size, student_name, body)
    }
}

fn render_pdf(
    font_bytes: &[u8],
    font_size: f32,
    student_name: &str,
    body: &str,
) -> ReportResult<Vec<u8>> {
    let metrics = FontMetrics::parse(font_bytes)?;
    let title = format!("Activity Report: {student_name}");
    let body = normalize_text(body);
    metrics.check_coverage(&title)?;
    metrics.check_coverage(&body)?;

    let text_width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    let measure = |text: &str| metrics.width_mm(text, font_size);
    let title_lines = wrap_text(&title, text_width, measure);
    let body_lines = wrap_text(&body, text_width, measure);

    let (doc, page, layer) = PdfDocument::new(
        title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );
    let font = doc
        .add_external_font(Cursor::new(font_bytes))
        .map_err(|e| ReportError::render(format!("cannot embed font: {e}")))?;

    let mut cursor = PageCursor {
        doc: &doc,
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
        line_height: font_size / 12.0 * 10.0,
        pages: 1,
    };

    for line in &title_lines {
        let x = ((PAGE_WIDTH_MM - measure(line)) / 2.0).max(MARGIN_MM);
        cursor.write_line(line, x, font_size, &font);
    }
    for line in &body_lines {
        cursor.write_line(line, MARGIN_MM, font_size, &font);
    }

    let pages = cursor.pages;
    let bytes = doc
        .save_to_bytes()
        .map_err(|e| ReportError::render(format!("cannot write PDF: {e}")))?;
    info!(pages, bytes = bytes.len(), "report PDF rendered");
    Ok(bytes)
}

struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    line_height: f32,
    pages: usize,
}

impl PageCursor<'_> {
    fn write_line(&mut self, text: &str, x: f32, font_size: f32, font: &IndirectFontRef) {
        if self.y - self.line_height < MARGIN_MM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME);
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
            self.pages += 1;
        }
        self.y -= self.line_height;
        if !text.is_empty() {
            let baseline = self.y + self.line_height * 0.3;
            self.layer
                .use_text(text, font_size, Mm(x), Mm(baseline), font);
        }
    }
}

struct FontMetrics<'a> {
    face: Face<'a>,
}

impl<'a> FontMetrics<'a> {
    fn parse(bytes: &'a [u8]) -> ReportResult<Self> {
        let face = Face::parse(bytes, 0)
            .map_err(|e| ReportError::render(format!("unusable font: {e}")))?;
        Ok(Self { face })
    }

    fn check_coverage(&self, text: &str) -> ReportResult<()> {
        match text
            .chars()
            .find(|c| !c.is_whitespace() && self.face.glyph_index(*c).is_none())
        {
            Some(missing) => Err(ReportError::render(format!(
                "font has no glyph for {missing:?} (U+{:04X})",
                missing as u32
            ))),
            None => Ok(()),
        }
    }

    fn width_mm(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .filter_map(|c| self.face.glyph_index(c))
            .filter_map(|glyph| self.face.glyph_hor_advance(glyph))
            .map(u32::from)
            .sum();
        units as f32 / f32::from(self.face.units_per_em()) * font_size * PT_TO_MM
    }
}

fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', " ")
}

/// Greedy line breaking: breaks at spaces where possible and inside a word
/// only when the word alone is wider than `max_width`. Each `\n` starts a
/// new line; blank source lines are kept as empty lines.
fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }

            for ch in word.chars() {
                let mut piece = current.clone();
                piece.push(ch);
                if measure(&piece) > max_width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                current.push(ch);
            }
        }

        lines.push(current);
    }

    lines
}

/// Header row followed by one `(timestamp, report)` row per record.
pub fn report_table_rows(rows: &[ReportRecord]) -> Vec<[&str; 2]> {
    std::iter::once(TABLE_HEADER)
        .chain(
            rows.iter()
                .map(|record| [record.timestamp.as_str(), record.body.as_str()]),
        )
        .collect()
}

pub fn render_report_table_document(rows: &[ReportRecord]) -> ReportResult<Vec<u8>> {
    let table = report_table_rows(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME).map_err(xlsx_error)?;
    worksheet.set_column_width(0, 20).map_err(xlsx_error)?;
    worksheet.set_column_width(1, 100).map_err(xlsx_error)?;

    let cell_format = Format::new().set_text_wrap();
    for (row, cells) in table.iter().enumerate() {
        let row = u32::try_from(row).map_err(|_| ReportError::render("too many rows"))?;
        for (col, value) in cells.iter().enumerate() {
            let col = col as u16;
            // an empty string writes nothing, so empty text gets a formatted blank cell
            if value.is_empty() {
                worksheet
                    .write_blank(row, col, &cell_format)
                    .map_err(xlsx_error)?;
            } else {
                worksheet
                    .write_string_with_format(row, col, *value, &cell_format)
                    .map_err(xlsx_error)?;
            }
        }
    }

    let bytes = workbook.save_to_buffer().map_err(xlsx_error)?;
    debug!(rows = table.len(), bytes = bytes.len(), "report table rendered");
    Ok(bytes)
}

fn xlsx_error(err: XlsxError) -> ReportError {
    ReportError::render(format!("spreadsheet error: {err}"))
}

pub fn single_report_file_name(student_name: &str, report_label: &str, timestamp: &str) -> String {
    sanitize_file_name(&format!("{student_name}_{report_label}_{timestamp}.pdf"))
}

pub fn report_table_file_name(student_name: &str, report_label: &str) -> String {
    sanitize_file_name(&format!("{student_name}_all_{report_label}.xlsx"))
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}
