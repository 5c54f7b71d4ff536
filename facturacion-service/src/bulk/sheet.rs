//! Spreadsheet decoding: uploaded bytes into positional rows.
//!
//! Workbooks (`.xlsx`, `.xls`, `.ods`) are read with calamine from their first
//! worksheet; `.csv` uploads with the csv crate. The first row is the header and
//! is never returned.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell rendered as trimmed text, `None` when empty. Whole numbers drop the
    /// fractional part so numeric invoice numbers read as `1001`, not `1001.0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Text(e.to_string()),
        }
    }
}

/// A data row as read from the sheet, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based sheet row number; the header is row 1.
    pub fila: u32,
    pub celdas: Vec<Cell>,
}

impl RawRow {
    pub fn new(fila: u32, celdas: Vec<Cell>) -> Self {
        Self { fila, celdas }
    }

    pub fn cell(&self, index: usize) -> &Cell {
        self.celdas.get(index).unwrap_or(&Cell::Empty)
    }

    /// Rows with no cells or an empty first cell are trailing filler, not data.
    pub fn is_blank(&self) -> bool {
        self.celdas.first().map(Cell::is_empty).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Formato de archivo no soportado, se esperaba .xlsx, .xls, .ods o .csv")]
    UnsupportedFormat,

    #[error("No se pudo leer el archivo: {0}")]
    Unreadable(String),

    #[error("El archivo no contiene hojas")]
    NoWorksheet,

    #[error("El archivo excede el máximo de {limit} filas de datos")]
    TooManyRows { limit: usize },
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub bytes: &'a [u8],
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

impl<'a> Upload<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            file_name: None,
            content_type: None,
        }
    }

    pub fn with_file_name(mut self, file_name: Option<&'a str>) -> Self {
        self.file_name = file_name;
        self
    }

    pub fn with_content_type(mut self, content_type: Option<&'a str>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Workbooks are recognized by content, CSV by name or declared type.
    pub fn format(&self) -> Option<SheetFormat> {
        if self.bytes.starts_with(ZIP_MAGIC) || self.bytes.starts_with(OLE_MAGIC) {
            return Some(SheetFormat::Workbook);
        }

        let csv_name = self
            .file_name
            .map(|n| n.to_lowercase().ends_with(".csv"))
            .unwrap_or(false);
        let csv_type = self
            .content_type
            .map(|t| t.to_lowercase().starts_with("text/csv"))
            .unwrap_or(false);

        (csv_name || csv_type).then_some(SheetFormat::Csv)
    }
}

/// Decodes the upload into data rows (header excluded). `max_rows` bounds the
/// number of non-blank data rows.
pub fn read_rows(upload: &Upload<'_>, max_rows: usize) -> Result<Vec<RawRow>, SheetError> {
    let rows = match upload.format().ok_or(SheetError::UnsupportedFormat)? {
        SheetFormat::Workbook => read_workbook(upload.bytes)?,
        SheetFormat::Csv => read_csv(upload.bytes)?,
    };

    if rows.iter().filter(|r| !r.is_blank()).count() > max_rows {
        return Err(SheetError::TooManyRows { limit: max_rows });
    }

    Ok(rows)
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<RawRow>, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)?
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let (start_row, start_col) = match range.start() {
        Some(start) => start,
        None => return Ok(Vec::new()),
    };

    // The range begins at the first non-empty cell, so sheet row 1 may lie
    // outside it when the header is blank.
    let rows = range
        .rows()
        .enumerate()
        .map(|(index, cells)| (start_row + index as u32, cells))
        .filter(|(sheet_row, _)| *sheet_row > 0)
        .map(|(sheet_row, cells)| {
            let mut celdas = vec![Cell::Empty; start_col as usize];
            celdas.extend(cells.iter().map(Cell::from));
            RawRow::new(sheet_row + 1, celdas)
        })
        .collect();

    Ok(rows)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<RawRow>, SheetError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| SheetError::Unreadable(e.to_string()))?;
        if index == 0 {
            continue;
        }
        // The reader drops empty lines, so the record index is not the line.
        let fila = record
            .position()
            .map(|p| p.line() as u32)
            .unwrap_or(index as u32 + 1);
        let celdas = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(RawRow::new(fila, celdas));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    const CSV: &str = "paqueteria,numero,cliente,rfc,credito,fecha_creacion,fecha_vencimiento,total\n\
                       DHL,F-1,Cliente Uno,AAA010101AA1,30 días,2024-01-15,,\"1,500.00\"\n\
                       ,,,,,,,\n\
                       Estafeta,F-2,Cliente Dos,BBB010101BB2,,15/01/2024,,200\n";

    fn csv_upload(body: &str) -> Upload<'_> {
        Upload::new(body.as_bytes()).with_file_name(Some("facturas.csv"))
    }

    #[test]
    fn csv_rows_are_numbered_from_the_header() {
        let rows = read_rows(&csv_upload(CSV), 100).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].fila, 2);
        assert_eq!(rows[0].cell(7), &Cell::Text("1,500.00".to_string()));
        assert!(rows[1].is_blank());
        assert_eq!(rows[2].fila, 4);
        assert_eq!(rows[2].cell(42), &Cell::Empty);
    }

    #[test]
    fn csv_detected_by_content_type() {
        let upload = Upload::new(CSV.as_bytes()).with_content_type(Some("text/csv; charset=utf-8"));
        assert_eq!(upload.format(), Some(SheetFormat::Csv));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let body = format!("\u{feff}{}", CSV);
        let rows = read_rows(&csv_upload(&body), 100).unwrap();
        assert_eq!(rows[0].cell(0), &Cell::Text("DHL".to_string()));
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let upload = Upload::new(b"%PDF-1.7 not a sheet").with_file_name(Some("factura.pdf"));
        assert!(matches!(
            read_rows(&upload, 100),
            Err(SheetError::UnsupportedFormat)
        ));
    }

    #[test]
    fn corrupt_workbook_is_unreadable() {
        let mut bytes = ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"truncated archive");
        let upload = Upload::new(&bytes).with_file_name(Some("facturas.xlsx"));
        assert!(matches!(
            read_rows(&upload, 100),
            Err(SheetError::Unreadable(_))
        ));
    }

    #[test]
    fn row_limit_counts_only_data_rows() {
        assert!(read_rows(&csv_upload(CSV), 2).is_ok());
        assert!(matches!(
            read_rows(&csv_upload(CSV), 1),
            Err(SheetError::TooManyRows { limit: 1 })
        ));
    }

    #[test]
    fn csv_rows_keep_source_line_after_empty_line() {
        let body = "paqueteria,numero\nDHL,F-1\n\nDHL,F-2\n";
        let rows = read_rows(&csv_upload(body), 100).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fila, 2);
        assert_eq!(rows[1].fila, 4);
        assert_eq!(rows[1].cell(1), &Cell::Text("F-2".to_string()));
    }

    fn date_format() -> Format {
        Format::new().set_num_format("yyyy-mm-dd")
    }

    fn workbook_upload(bytes: &[u8]) -> Upload<'_> {
        Upload::new(bytes).with_file_name(Some("facturas.xlsx"))
    }

    #[test]
    fn workbook_rows_carry_sheet_numbers_and_serial_dates() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, title) in ["Paquetería", "Número", "Cliente", "RFC", "Crédito", "Creación", "Vencimiento", "Total"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *title).unwrap();
        }
        sheet.write_string(1, 0, "DHL").unwrap();
        sheet.write_number(1, 1, 1001.0).unwrap();
        sheet.write_string(1, 2, "Cliente Uno").unwrap();
        sheet.write_string(1, 3, "AAA010101AA1").unwrap();
        let creada = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
        sheet.write_datetime_with_format(1, 5, &creada, &date_format()).unwrap();
        sheet.write_number(1, 7, 1500.5).unwrap();
        sheet.write_string(3, 0, "Estafeta").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = read_rows(&workbook_upload(&bytes), 100).unwrap();

        let data: Vec<&RawRow> = rows.iter().filter(|r| !r.is_blank()).collect();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].fila, 2);
        assert_eq!(data[0].cell(1).as_text().as_deref(), Some("1001"));
        assert_eq!(data[0].cell(5), &Cell::Number(45306.0));
        assert_eq!(data[0].cell(7), &Cell::Number(1500.5));
        assert_eq!(data[1].fila, 4);
    }

    #[test]
    fn workbook_with_blank_header_keeps_first_data_row() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(1, 0, "DHL").unwrap();
        sheet.write_string(1, 1, "F-1").unwrap();
        sheet.write_string(2, 0, "Estafeta").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = read_rows(&workbook_upload(&bytes), 100).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fila, 2);
        assert_eq!(rows[0].cell(1), &Cell::Text("F-1".to_string()));
        assert_eq!(rows[1].fila, 3);
    }

    #[test]
    fn workbook_columns_are_padded_to_sheet_position() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 1, "Número").unwrap();
        sheet.write_string(1, 1, "F-1").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = read_rows(&workbook_upload(&bytes), 100).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fila, 2);
        assert_eq!(rows[0].cell(0), &Cell::Empty);
        assert_eq!(rows[0].cell(1), &Cell::Text("F-1".to_string()));
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Cell::Number(1001.0).as_text().as_deref(), Some("1001"));
        assert_eq!(Cell::Number(12.5).as_text().as_deref(), Some("12.5"));
        assert_eq!(Cell::Text("  ".to_string()).as_text(), None);
    }
}
