//! Import of records written by the earlier free-text schema, where returns
//! were a `tipo` of their own and the outcome lived in `resultadoRetiro`.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use super::domain::{clean_optional, Barcode, Empresa, Estado, RecipientName, StampField, Tipo};
use super::store::{PackageWrite, Stamp};

#[derive(Debug)]
pub enum LegacyImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Row { line: u64, reason: String },
}

impl std::fmt::Display for LegacyImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegacyImportError::Io(err) => write!(f, "failed to read legacy export: {}", err),
            LegacyImportError::Csv(err) => write!(f, "invalid legacy CSV data: {}", err),
            LegacyImportError::Row { line, reason } => {
                write!(f, "legacy row at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for LegacyImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LegacyImportError::Io(err) => Some(err),
            LegacyImportError::Csv(err) => Some(err),
            LegacyImportError::Row { .. } => None,
        }
    }
}

impl From<std::io::Error> for LegacyImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LegacyImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LegacyTipo {
    Entrega,
    Envio,
    Devolucion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultadoRetiro {
    Cliente,
    Transportista,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRow {
    barcode: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    nombre: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    empresa: Option<String>,
    tipo: LegacyTipo,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    estante: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    resultado_retiro: Option<String>,
    fecha_ingreso: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    fecha_salida: Option<String>,
}

pub struct LegacyImporter;

impl LegacyImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<PackageWrite>, LegacyImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Converts every row; the first bad row aborts the import.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<PackageWrite>, LegacyImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut writes = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            // Line the record starts on; quoted fields may span several.
            let line = record.position().map_or(0, |position| position.line());
            let row: LegacyRow = record.deserialize(Some(&headers))?;
            writes.push(convert(row).map_err(|reason| LegacyImportError::Row { line, reason })?);
        }

        Ok(writes)
    }
}

fn convert(row: LegacyRow) -> Result<PackageWrite, String> {
    let barcode = clean_optional(Some(row.barcode.as_str())).ok_or("missing barcode")?;
    let empresa = match row.empresa.as_deref() {
        None => Empresa::default(),
        Some(raw) if raw.eq_ignore_ascii_case("seur") => Empresa::Seur,
        Some(other) => return Err(format!("unknown empresa '{other}'")),
    };
    let resultado = match row.resultado_retiro.as_deref() {
        None => None,
        Some(raw) if raw.eq_ignore_ascii_case("null") => None,
        Some(raw) => Some(parse_resultado(raw)?),
    };
    let fecha_ingreso =
        parse_instant(&row.fecha_ingreso).ok_or_else(|| bad_date(&row.fecha_ingreso))?;
    let fecha_salida = match row.fecha_salida.as_deref() {
        None => None,
        Some(raw) => Some(parse_instant(raw).ok_or_else(|| bad_date(raw))?),
    };
    let salida = || {
        fecha_salida
            .map(Stamp::At)
            .ok_or_else(|| "finished package without fechaSalida".to_string())
    };

    let (tipo, estado, stamps) = match (row.tipo, resultado) {
        (LegacyTipo::Entrega, None) => (Tipo::Entrega, Estado::EnDeposito, Vec::new()),
        (LegacyTipo::Envio, None) => (Tipo::Envio, Estado::EnDeposito, Vec::new()),
        (LegacyTipo::Entrega, Some(ResultadoRetiro::Cliente))
        | (LegacyTipo::Devolucion, Some(ResultadoRetiro::Cliente)) => (
            Tipo::Entrega,
            Estado::Entregado,
            vec![(StampField::EntregadoAt, salida()?)],
        ),
        (LegacyTipo::Entrega, Some(ResultadoRetiro::Transportista)) => (
            Tipo::Entrega,
            Estado::Devuelto,
            vec![
                (StampField::DevueltoAt, salida()?),
                (StampField::FechaSalida, salida()?),
            ],
        ),
        (LegacyTipo::Envio, Some(_)) => (
            Tipo::Envio,
            Estado::Entregado,
            vec![
                (StampField::EntregadoAt, salida()?),
                (StampField::FechaSalida, salida()?),
            ],
        ),
        (LegacyTipo::Devolucion, None) => (
            Tipo::Entrega,
            Estado::PendienteDevolucion,
            vec![(StampField::MarcadoDevolucionAt, Stamp::At(fecha_ingreso))],
        ),
        (LegacyTipo::Devolucion, Some(ResultadoRetiro::Transportista)) => (
            Tipo::Entrega,
            Estado::Devuelto,
            vec![
                (StampField::MarcadoDevolucionAt, Stamp::At(fecha_ingreso)),
                (StampField::DevueltoAt, salida()?),
                (StampField::FechaSalida, salida()?),
            ],
        ),
    };

    Ok(PackageWrite {
        barcode: Barcode(barcode),
        nombre: RecipientName::new(row.nombre.as_deref().unwrap_or_default()),
        empresa,
        tipo,
        estante: row.estante,
        estado,
        fecha_ingreso: Stamp::At(fecha_ingreso),
        stamps,
    })
}

fn parse_resultado(raw: &str) -> Result<ResultadoRetiro, String> {
    match raw.to_ascii_lowercase().as_str() {
        "cliente" => Ok(ResultadoRetiro::Cliente),
        "transportista" => Ok(ResultadoRetiro::Transportista),
        other => Err(format!("unknown resultadoRetiro '{other}'")),
    }
}

fn bad_date(raw: &str) -> String {
    format!("unparseable timestamp '{raw}'")
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
