use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier printed on the package label and used as the store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(pub String);

impl Barcode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Barcode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Courier that brought the package in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Empresa {
    #[default]
    #[serde(rename = "SEUR")]
    Seur,
}

impl Empresa {
    pub const ALL: [Empresa; 1] = [Empresa::Seur];

    pub const fn label(self) -> &'static str {
        match self {
            Empresa::Seur => "SEUR",
        }
    }
}

/// Intake classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tipo {
    /// Left at the counter for a customer to collect.
    Entrega,
    /// Waiting for the carrier to take it away.
    Envio,
}

impl Tipo {
    pub const ALL: [Tipo; 2] = [Tipo::Entrega, Tipo::Envio];

    pub const fn label(self) -> &'static str {
        match self {
            Tipo::Entrega => "entrega",
            Tipo::Envio => "envio",
        }
    }
}

/// Lifecycle state of a package.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Estado {
    #[default]
    EnDeposito,
    PendienteDevolucion,
    Entregado,
    Devuelto,
}

impl Estado {
    pub const ALL: [Estado; 4] = [
        Estado::EnDeposito,
        Estado::PendienteDevolucion,
        Estado::Entregado,
        Estado::Devuelto,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Estado::EnDeposito => "EN_DEPOSITO",
            Estado::PendienteDevolucion => "PENDIENTE_DEVOLUCION",
            Estado::Entregado => "ENTREGADO",
            Estado::Devuelto => "DEVUELTO",
        }
    }

    /// Still physically at the counter.
    pub const fn is_active(self) -> bool {
        matches!(self, Estado::EnDeposito | Estado::PendienteDevolucion)
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for Estado {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Recipient name together with its search key.
///
/// The only way to build one is [`RecipientName::new`], so the lowercase form
/// always matches the display form it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientName {
    display: Option<String>,
    lower: String,
}

impl RecipientName {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::absent();
        }
        Self {
            display: Some(trimmed.to_string()),
            lower: trimmed.to_lowercase(),
        }
    }

    pub fn absent() -> Self {
        Self {
            display: None,
            lower: String::new(),
        }
    }

    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }
}

/// Timestamp fields written by lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StampField {
    EntregadoAt,
    DevueltoAt,
    MarcadoDevolucionAt,
    FechaSalida,
}

/// Stored package record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub barcode: Barcode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default)]
    pub nombre_lower: String,
    #[serde(default)]
    pub empresa: Empresa,
    pub tipo: Tipo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estante: Option<String>,
    #[serde(default)]
    pub estado: Estado,
    pub fecha_ingreso: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entregado_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devuelto_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marcado_devolucion_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_salida: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn is_active(&self) -> bool {
        self.estado.is_active()
    }

    pub fn stamp(&self, field: StampField) -> Option<DateTime<Utc>> {
        match field {
            StampField::EntregadoAt => self.entregado_at,
            StampField::DevueltoAt => self.devuelto_at,
            StampField::MarcadoDevolucionAt => self.marcado_devolucion_at,
            StampField::FechaSalida => self.fecha_salida,
        }
    }

    /// Sets a stamp unless it already carries a value.
    pub fn stamp_once(&mut self, field: StampField, at: DateTime<Utc>) {
        let slot = match field {
            StampField::EntregadoAt => &mut self.entregado_at,
            StampField::DevueltoAt => &mut self.devuelto_at,
            StampField::MarcadoDevolucionAt => &mut self.marcado_devolucion_at,
            StampField::FechaSalida => &mut self.fecha_salida,
        };
        slot.get_or_insert(at);
    }

    pub fn rename(&mut self, name: &RecipientName) {
        self.nombre = name.display().map(str::to_string);
        self.nombre_lower = name.lower().to_string();
    }

    /// Both outcome stamps set; the lifecycle never produces this.
    pub fn has_conflicting_outcomes(&self) -> bool {
        self.entregado_at.is_some() && self.devuelto_at.is_some()
    }
}

pub(crate) fn clean_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
