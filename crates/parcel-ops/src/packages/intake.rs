use rand::Rng;
use serde::{Deserialize, Serialize};

use super::domain::{clean_optional, Barcode, Empresa, Estado, RecipientName, Tipo};
use super::store::{PackageWrite, Stamp};

pub const BARCODE_LENGTH: usize = 12;
const BARCODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Counter intake form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    /// Scanned label; generated when absent or blank.
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub empresa: Empresa,
    pub tipo: Tipo,
    #[serde(default)]
    pub estante: Option<String>,
}

impl IntakeRequest {
    pub fn new(tipo: Tipo) -> Self {
        Self {
            barcode: None,
            nombre: None,
            empresa: Empresa::default(),
            tipo,
            estante: None,
        }
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_nombre(mut self, nombre: impl Into<String>) -> Self {
        self.nombre = Some(nombre.into());
        self
    }

    pub fn with_estante(mut self, estante: impl Into<String>) -> Self {
        self.estante = Some(estante.into());
        self
    }

    /// The operator-supplied barcode, trimmed; `None` when it must be generated.
    pub fn supplied_barcode(&self) -> Option<Barcode> {
        clean_optional(self.barcode.as_deref()).map(Barcode)
    }

    /// New record in `EN_DEPOSITO` with server-assigned intake time.
    pub(crate) fn into_write(self, barcode: Barcode) -> PackageWrite {
        PackageWrite {
            barcode,
            nombre: RecipientName::new(self.nombre.as_deref().unwrap_or_default()),
            empresa: self.empresa,
            tipo: self.tipo,
            estante: clean_optional(self.estante.as_deref()),
            estado: Estado::EnDeposito,
            fecha_ingreso: Stamp::ServerTime,
            stamps: Vec::new(),
        }
    }
}

/// Source of candidate barcodes for unlabeled packages.
pub trait BarcodeSource: Send + Sync {
    fn next_barcode(&self) -> Barcode;
}

/// Uppercase alphanumeric tokens from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBarcodes;

impl BarcodeSource for RandomBarcodes {
    fn next_barcode(&self) -> Barcode {
        let mut rng = rand::rng();
        let token: String = (0..BARCODE_LENGTH)
            .map(|_| {
                let index = rng.random_range(0..BARCODE_ALPHABET.len());
                BARCODE_ALPHABET[index] as char
            })
            .collect();
        Barcode(token)
    }
}
