//! Row validation for bulk invoice uploads.

use crate::bulk::sheet::{read_rows, Cell, RawRow, SheetError, Upload};
use crate::dtos::{money_amount, not_blank, rfc_length, RFC_MIN_LENGTH};
use crate::ledger::{self, Payments};
use crate::models::{InvoiceStatus, NewInvoice};
use chrono::{Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use validator::Validate;

/// Positional columns of the upload template.
pub mod columns {
    pub const PAQUETERIA: usize = 0;
    pub const NUMERO_COMPROBANTE: usize = 1;
    pub const CLIENTE: usize = 2;
    pub const RFC: usize = 3;
    pub const CREDITO: usize = 4;
    pub const FECHA_CREACION: usize = 5;
    pub const FECHA_VENCIMIENTO: usize = 6;
    pub const TOTAL: usize = 7;
}

/// Spreadsheet serial dates count days from this epoch (1900 date system).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const MAX_SERIAL_DAY: f64 = 2_958_465.0;
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding on one field of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub fila: u32,
    pub campo: String,
    pub valor: String,
    pub error: String,
    pub severidad: Severity,
}

impl FieldError {
    fn error(fila: u32, campo: &str, valor: &str, error: impl Into<String>) -> Self {
        Self {
            fila,
            campo: campo.to_string(),
            valor: valor.to_string(),
            error: error.into(),
            severidad: Severity::Error,
        }
    }

    fn warning(fila: u32, campo: &str, valor: &str, error: impl Into<String>) -> Self {
        Self {
            severidad: Severity::Warning,
            ..Self::error(fila, campo, valor, error)
        }
    }

    pub fn is_error(&self) -> bool {
        self.severidad == Severity::Error
    }
}

/// A row that passed validation, ready for user approval and commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CandidateInvoice {
    /// Source sheet row, when the candidate came from an upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fila: Option<u32>,
    #[validate(custom(function = "not_blank"))]
    pub numero_comprobante: String,
    #[validate(custom(function = "not_blank"))]
    pub paqueteria: String,
    #[validate(custom(function = "not_blank"))]
    pub cliente: String,
    #[validate(custom(function = "rfc_length"))]
    pub rfc: String,
    #[serde(default)]
    pub credito: Option<String>,
    pub fecha_creacion: NaiveDate,
    #[serde(default)]
    pub fecha_vencimiento: Option<NaiveDate>,
    #[validate(custom(function = "money_amount"))]
    pub total: Decimal,
    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago1: Decimal,
    #[serde(default)]
    pub fecha_pago1: Option<NaiveDate>,
    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago2: Decimal,
    #[serde(default)]
    pub fecha_pago2: Option<NaiveDate>,
    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub pago3: Decimal,
    #[serde(default)]
    pub fecha_pago3: Option<NaiveDate>,
    #[serde(default)]
    #[validate(custom(function = "money_amount"))]
    pub nc: Decimal,
    #[serde(default)]
    pub por_cobrar: Decimal,
    #[serde(default)]
    pub estatus: InvoiceStatus,
}

impl CandidateInvoice {
    /// Re-derives `por_cobrar` and `estatus` from the money fields.
    pub fn reconcile(&mut self) {
        let settlement = ledger::reconcile(
            self.total,
            &Payments::new(self.pago1, self.pago2, self.pago3, self.nc),
        );
        self.por_cobrar = settlement.por_cobrar;
        self.estatus = settlement.estatus;
    }

    pub fn to_new_invoice(&self) -> NewInvoice {
        NewInvoice {
            numero_comprobante: self.numero_comprobante.trim().to_string(),
            paqueteria: self.paqueteria.trim().to_string(),
            cliente: self.cliente.trim().to_string(),
            rfc: self.rfc.trim().to_string(),
            credito: self.credito.clone(),
            fecha_creacion: self.fecha_creacion,
            fecha_vencimiento: self.fecha_vencimiento,
            total: self.total,
            pago1: self.pago1,
            fecha_pago1: self.fecha_pago1,
            pago2: self.pago2,
            fecha_pago2: self.fecha_pago2,
            pago3: self.pago3,
            fecha_pago3: self.fecha_pago3,
            nc: self.nc,
        }
    }
}

/// Report returned to the client for an uploaded file. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub total_lineas: usize,
    pub lineas_correctas: usize,
    pub lineas_con_errores: usize,
    pub lineas_con_advertencias: usize,
    pub errores: Vec<FieldError>,
    pub datos_correctos: Vec<CandidateInvoice>,
    pub datos_con_errores: Vec<RawRow>,
}

impl ValidationResult {
    /// Result for a file that could not be read as a spreadsheet at all.
    pub fn malformed(reason: &SheetError) -> Self {
        Self {
            errores: vec![FieldError::error(1, "archivo", "", reason.to_string())],
            ..Self::default()
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.total_lineas == 0 && self.errores.iter().any(|e| e.campo == "archivo")
    }
}

/// Outcome of validating one row: a candidate (possibly with warnings) or the
/// list of findings that kept it out.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Valid {
        candidate: CandidateInvoice,
        warnings: Vec<FieldError>,
    },
    Invalid(Vec<FieldError>),
}

fn raw_value(cell: &Cell) -> String {
    cell.as_text().unwrap_or_default()
}

fn required(
    row: &RawRow,
    column: usize,
    campo: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    let value = row.cell(column).as_text();
    if value.is_none() {
        errors.push(FieldError::error(row.fila, campo, "", message));
    }
    value
}

/// Parses a money cell: numbers as-is, text with thousands separators removed.
/// The result is rounded to centavos.
pub fn parse_amount(cell: &Cell) -> Option<Decimal> {
    let value = match cell {
        Cell::Number(n) => Decimal::try_from(*n).ok()?,
        Cell::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .ok()?
        }
        Cell::Empty | Cell::Bool(_) => return None,
    };
    let mut value =
        value.round_dp_with_strategy(ledger::MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(ledger::MONEY_SCALE);
    Some(value)
}

/// Parses a date cell: spreadsheet serial numbers or `YYYY-MM-DD`,
/// `DD/MM/YYYY` and `DD-MM-YYYY` text (a trailing time part is ignored).
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(serial) if *serial >= 1.0 && *serial <= MAX_SERIAL_DAY => {
            let (y, m, d) = SERIAL_EPOCH;
            NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
        }
        Cell::Text(s) => {
            let s = s.trim();
            let date_part = s.split([' ', 'T']).next().unwrap_or(s);
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        }
        _ => None,
    }
}

/// Validates a single data row. Checks run in column order of importance:
/// paquetería, número, cliente, RFC, total, fecha de creación.
pub fn validate_row(row: &RawRow) -> RowOutcome {
    use columns::*;

    let fila = row.fila;
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let paqueteria = required(row, PAQUETERIA, "paqueteria", "La paquetería es requerida", &mut errors);
    let numero = required(
        row,
        NUMERO_COMPROBANTE,
        "numero_comprobante",
        "El número de comprobante es requerido",
        &mut errors,
    );
    let cliente = required(row, CLIENTE, "cliente", "El cliente es requerido", &mut errors);

    let rfc = required(row, RFC, "rfc", "El RFC es requerido", &mut errors).and_then(|rfc| {
        if rfc.chars().count() < RFC_MIN_LENGTH {
            errors.push(FieldError::error(
                fila,
                "rfc",
                &rfc,
                format!("El RFC debe tener al menos {} caracteres", RFC_MIN_LENGTH),
            ));
            None
        } else {
            Some(rfc)
        }
    });

    let total_cell = row.cell(TOTAL);
    let total = if total_cell.is_empty() {
        errors.push(FieldError::error(fila, "total", "", "El total es requerido"));
        None
    } else {
        match parse_amount(total_cell) {
            Some(total) if total < Decimal::ZERO => {
                errors.push(FieldError::error(
                    fila,
                    "total",
                    &raw_value(total_cell),
                    "El total no puede ser negativo",
                ));
                None
            }
            Some(total) => Some(total),
            None => {
                errors.push(FieldError::error(
                    fila,
                    "total",
                    &raw_value(total_cell),
                    "El total debe ser un número válido",
                ));
                None
            }
        }
    };

    let creacion_cell = row.cell(FECHA_CREACION);
    let fecha_creacion = if creacion_cell.is_empty() {
        errors.push(FieldError::error(
            fila,
            "fecha_creacion",
            "",
            "La fecha de creación es requerida",
        ));
        None
    } else {
        let parsed = parse_date(creacion_cell);
        if parsed.is_none() {
            errors.push(FieldError::error(
                fila,
                "fecha_creacion",
                &raw_value(creacion_cell),
                "La fecha de creación no es válida",
            ));
        }
        parsed
    };

    let vencimiento_cell = row.cell(FECHA_VENCIMIENTO);
    let fecha_vencimiento = if vencimiento_cell.is_empty() {
        None
    } else {
        let parsed = parse_date(vencimiento_cell);
        match (parsed, fecha_creacion) {
            (None, _) => warnings.push(FieldError::warning(
                fila,
                "fecha_vencimiento",
                &raw_value(vencimiento_cell),
                "La fecha de vencimiento no es válida y será ignorada",
            )),
            (Some(vence), Some(creada)) if vence < creada => warnings.push(FieldError::warning(
                fila,
                "fecha_vencimiento",
                &raw_value(vencimiento_cell),
                "La fecha de vencimiento es anterior a la fecha de creación",
            )),
            _ => {}
        }
        parsed
    };

    match (paqueteria, numero, cliente, rfc, total, fecha_creacion) {
        (Some(paqueteria), Some(numero), Some(cliente), Some(rfc), Some(total), Some(fecha_creacion))
            if errors.is_empty() =>
        {
            let mut candidate = CandidateInvoice {
                fila: Some(fila),
                numero_comprobante: numero,
                paqueteria,
                cliente,
                rfc,
                credito: row.cell(CREDITO).as_text(),
                fecha_creacion,
                fecha_vencimiento,
                total,
                pago1: Decimal::ZERO,
                fecha_pago1: None,
                pago2: Decimal::ZERO,
                fecha_pago2: None,
                pago3: Decimal::ZERO,
                fecha_pago3: None,
                nc: Decimal::ZERO,
                por_cobrar: Decimal::ZERO,
                estatus: InvoiceStatus::Pendiente,
            };
            candidate.reconcile();
            RowOutcome::Valid {
                candidate,
                warnings,
            }
        }
        _ => {
            errors.extend(warnings);
            RowOutcome::Invalid(errors)
        }
    }
}

/// Validates every admitted row in source order. Blank rows are skipped
/// without being counted.
pub fn validate_rows(rows: &[RawRow]) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut seen: HashMap<String, u32> = HashMap::new();

    for row in rows.iter().filter(|r| !r.is_blank()) {
        result.total_lineas += 1;

        match validate_row(row) {
            RowOutcome::Valid {
                candidate,
                mut warnings,
            } => {
                if let Some(first) = seen.get(&candidate.numero_comprobante) {
                    warnings.push(FieldError::warning(
                        row.fila,
                        "numero_comprobante",
                        &candidate.numero_comprobante,
                        format!(
                            "El número de comprobante se repite en la fila {}",
                            first
                        ),
                    ));
                } else {
                    seen.insert(candidate.numero_comprobante.clone(), row.fila);
                }

                result.lineas_correctas += 1;
                if !warnings.is_empty() {
                    result.lineas_con_advertencias += 1;
                }
                result.errores.extend(warnings);
                result.datos_correctos.push(candidate);
            }
            RowOutcome::Invalid(findings) => {
                result.lineas_con_errores += 1;
                if findings.iter().any(|f| !f.is_error()) {
                    result.lineas_con_advertencias += 1;
                }
                result.errores.extend(findings);
                result.datos_con_errores.push(row.clone());
            }
        }
    }

    result
}

/// Reads and validates an uploaded file. Unreadable files yield a degenerate
/// result rather than an error.
pub fn validate_bulk_file(upload: &Upload<'_>, max_rows: usize) -> ValidationResult {
    match read_rows(upload, max_rows) {
        Ok(rows) => validate_rows(&rows),
        Err(e) => {
            tracing::warn!(error = %e, file_name = ?upload.file_name, "Rejected bulk upload");
            ValidationResult::malformed(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn text(s: &str) -> Cell {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    fn row(fila: u32, cells: [&str; 8]) -> RawRow {
        RawRow::new(fila, cells.iter().map(|c| text(c)).collect())
    }

    fn good_row(fila: u32, numero: &str) -> RawRow {
        row(
            fila,
            [
                "Estafeta",
                numero,
                "Logística del Bajío",
                "LBA150320KL9",
                "30 días",
                "2024-02-01",
                "2024-03-02",
                "12,345.60",
            ],
        )
    }

    #[test]
    fn short_rfc_on_second_row_is_reported_on_fila_three() {
        let mut second = good_row(3, "F-2");
        second.celdas[columns::RFC] = text("ABC010203X");
        let rows = vec![good_row(2, "F-1"), second, good_row(4, "F-3")];

        let result = validate_rows(&rows);

        assert_eq!(result.total_lineas, 3);
        assert_eq!(result.lineas_correctas, 2);
        assert_eq!(result.lineas_con_errores, 1);
        assert_eq!(result.errores.len(), 1);
        assert_eq!(result.errores[0].fila, 3);
        assert_eq!(result.errores[0].campo, "rfc");
        assert_eq!(result.errores[0].valor, "ABC010203X");
        assert_eq!(result.datos_con_errores[0].fila, 3);
    }

    #[test]
    fn valid_row_becomes_reconciled_candidate() {
        let outcome = validate_row(&good_row(2, "F-1"));
        let RowOutcome::Valid { candidate, warnings } = outcome else {
            panic!("expected a valid row");
        };

        assert!(warnings.is_empty());
        assert_eq!(candidate.fila, Some(2));
        assert_eq!(candidate.total, d("12345.60"));
        assert_eq!(candidate.por_cobrar, d("12345.60"));
        assert_eq!(candidate.estatus, InvoiceStatus::Pendiente);
        assert_eq!(candidate.pago1, Decimal::ZERO);
        assert_eq!(candidate.credito.as_deref(), Some("30 días"));
        assert_eq!(
            candidate.fecha_vencimiento,
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn zero_total_is_imported_as_paid() {
        let mut r = good_row(2, "F-1");
        r.celdas[columns::TOTAL] = Cell::Number(0.0);
        let RowOutcome::Valid { candidate, .. } = validate_row(&r) else {
            panic!("expected a valid row");
        };
        assert_eq!(candidate.estatus, InvoiceStatus::Pagada);
    }

    #[test]
    fn errors_follow_check_order() {
        let r = row(7, ["x", "", "", "SHORT", "", "abc", "", "-5"]);
        let RowOutcome::Invalid(findings) = validate_row(&r) else {
            panic!("expected an invalid row");
        };

        let campos: Vec<_> = findings.iter().map(|f| f.campo.as_str()).collect();
        assert_eq!(
            campos,
            vec!["numero_comprobante", "cliente", "rfc", "total", "fecha_creacion"]
        );
        assert!(findings.iter().all(|f| f.fila == 7 && f.is_error()));
        assert_eq!(findings[3].error, "El total no puede ser negativo");
    }

    #[test]
    fn unparseable_total_is_an_error() {
        let mut r = good_row(2, "F-1");
        r.celdas[columns::TOTAL] = text("mil pesos");
        let RowOutcome::Invalid(findings) = validate_row(&r) else {
            panic!("expected an invalid row");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].campo, "total");
        assert_eq!(findings[0].valor, "mil pesos");
    }

    #[test]
    fn blank_rows_are_not_counted() {
        let rows = vec![
            good_row(2, "F-1"),
            RawRow::new(3, vec![]),
            row(4, ["", "F-9", "Cliente", "", "", "", "", ""]),
            good_row(5, "F-2"),
        ];

        let result = validate_rows(&rows);

        assert_eq!(result.total_lineas, 2);
        assert_eq!(result.lineas_correctas, 2);
        assert!(result.errores.is_empty());
    }

    #[test]
    fn partition_is_complete() {
        let mut bad = good_row(3, "F-2");
        bad.celdas[columns::CLIENTE] = Cell::Empty;
        bad.celdas[columns::FECHA_CREACION] = Cell::Empty;
        let rows = vec![good_row(2, "F-1"), bad, good_row(4, "F-3"), good_row(5, "F-4")];

        let result = validate_rows(&rows);

        assert_eq!(
            result.lineas_correctas + result.lineas_con_errores,
            result.total_lineas
        );
        assert_eq!(result.datos_correctos.len(), result.lineas_correctas);
        assert_eq!(result.datos_con_errores.len(), result.lineas_con_errores);
        assert_eq!(result.errores.len(), 2);
        for candidate in &result.datos_correctos {
            assert!(!result
                .errores
                .iter()
                .any(|e| e.is_error() && Some(e.fila) == candidate.fila));
        }
    }

    #[test]
    fn warnings_do_not_block_a_row() {
        let mut r = good_row(2, "F-1");
        r.celdas[columns::FECHA_VENCIMIENTO] = text("2023-12-31");
        let mut unparseable = good_row(3, "F-2");
        unparseable.celdas[columns::FECHA_VENCIMIENTO] = text("pronto");

        let result = validate_rows(&[r, unparseable]);

        assert_eq!(result.lineas_correctas, 2);
        assert_eq!(result.lineas_con_advertencias, 2);
        assert!(result.errores.iter().all(|e| e.severidad == Severity::Warning));
        assert_eq!(result.datos_correctos[1].fecha_vencimiento, None);
    }

    #[test]
    fn repeated_numero_is_flagged_on_later_row() {
        let result = validate_rows(&[good_row(2, "F-1"), good_row(3, "F-1")]);

        assert_eq!(result.lineas_correctas, 2);
        assert_eq!(result.errores.len(), 1);
        assert_eq!(result.errores[0].fila, 3);
        assert_eq!(result.errores[0].severidad, Severity::Warning);
        assert_eq!(
            result.errores[0].error,
            "El número de comprobante se repite en la fila 2"
        );
    }

    #[test]
    fn numeric_cells_are_accepted() {
        let r = RawRow::new(
            2,
            vec![
                text("DHL"),
                Cell::Number(1001.0),
                text("Cliente"),
                text("CLI900101AB3"),
                Cell::Empty,
                Cell::Number(45352.0),
                Cell::Empty,
                Cell::Number(1999.999),
            ],
        );
        let RowOutcome::Valid { candidate, .. } = validate_row(&r) else {
            panic!("expected a valid row");
        };
        assert_eq!(candidate.numero_comprobante, "1001");
        assert_eq!(candidate.fecha_creacion, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(candidate.total, d("2000.00"));
        assert_eq!(candidate.credito, None);
    }

    #[test]
    fn dates_accept_local_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date(&text("2024-01-15")), expected);
        assert_eq!(parse_date(&text("15/01/2024")), expected);
        assert_eq!(parse_date(&text("15-01-2024")), expected);
        assert_eq!(parse_date(&text("2024-01-15 00:00:00")), expected);
        assert_eq!(parse_date(&text("2024-01-15T00:00:00")), expected);
        assert_eq!(parse_date(&text("enero")), None);
    }

    #[test]
    fn unsupported_file_yields_single_archivo_error() {
        let upload = Upload::new(b"\x00\x01garbage").with_file_name(Some("facturas.bin"));
        let result = validate_bulk_file(&upload, 100);

        assert!(result.is_malformed());
        assert_eq!(result.total_lineas, 0);
        assert_eq!(result.errores.len(), 1);
        assert_eq!(result.errores[0].fila, 1);
        assert_eq!(result.errores[0].campo, "archivo");
        assert!(result.datos_correctos.is_empty());
        assert!(result.datos_con_errores.is_empty());
    }

    #[test]
    fn result_serializes_with_client_field_names() {
        let result = validate_rows(&[good_row(2, "F-1")]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["totalLineas"], 1);
        assert_eq!(json["lineasCorrectas"], 1);
        assert_eq!(json["lineasConErrores"], 0);
        assert_eq!(json["datosCorrectos"][0]["estatus"], "Pendiente");
        assert_eq!(json["datosCorrectos"][0]["numero_comprobante"], "F-1");
    }

    #[test]
    fn candidate_revalidation_rejects_tampered_rows() {
        let RowOutcome::Valid { mut candidate, .. } = validate_row(&good_row(2, "F-1")) else {
            panic!("expected a valid row");
        };
        assert!(candidate.validate().is_ok());

        candidate.pago1 = d("-1");
        candidate.rfc = "SHORT".to_string();
        candidate.cliente = "   ".to_string();
        let errors = candidate.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("pago1"));
        assert!(fields.contains_key("rfc"));
        assert!(fields.contains_key("cliente"));
    }

    #[test]
    fn candidate_rfc_is_measured_after_trimming() {
        let RowOutcome::Valid { mut candidate, .. } = validate_row(&good_row(2, "F-1")) else {
            panic!("expected a valid row");
        };

        candidate.rfc = "   ABC1234   ".to_string();
        candidate.total = d("100.004");
        let errors = candidate.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("rfc"));
        assert!(fields.contains_key("total"));
    }

    #[test]
    fn parsed_amounts_carry_centavos() {
        assert_eq!(parse_amount(&Cell::Number(1500.5)).unwrap().to_string(), "1500.50");
        assert_eq!(parse_amount(&text("100.004")).unwrap().to_string(), "100.00");
    }
}
