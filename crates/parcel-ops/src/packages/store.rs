use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::domain::{Barcode, Empresa, Estado, Package, RecipientName, StampField, Tipo};

/// Timestamp value for a write: either fixed by the caller or assigned by the
/// store when the write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    ServerTime,
    At(DateTime<Utc>),
}

impl Stamp {
    pub fn resolve(self, server_now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Stamp::ServerTime => server_now,
            Stamp::At(at) => at,
        }
    }
}

/// Full record as handed to [`PackageStore::put`]. `createdAt` and
/// `updatedAt` are always assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageWrite {
    pub barcode: Barcode,
    pub nombre: RecipientName,
    pub empresa: Empresa,
    pub tipo: Tipo,
    pub estante: Option<String>,
    pub estado: Estado,
    pub fecha_ingreso: Stamp,
    pub stamps: Vec<(StampField, Stamp)>,
}

impl PackageWrite {
    pub fn into_package(self, server_now: DateTime<Utc>) -> Package {
        let mut package = Package {
            barcode: self.barcode,
            nombre: None,
            nombre_lower: String::new(),
            empresa: self.empresa,
            tipo: self.tipo,
            estante: self.estante,
            estado: self.estado,
            fecha_ingreso: self.fecha_ingreso.resolve(server_now),
            entregado_at: None,
            devuelto_at: None,
            marcado_devolucion_at: None,
            fecha_salida: None,
            created_at: server_now,
            updated_at: server_now,
        };
        package.rename(&self.nombre);
        for (field, stamp) in self.stamps {
            package.stamp_once(field, stamp.resolve(server_now));
        }
        package
    }
}

/// Merge-write applied by [`PackageStore::update`] and
/// [`PackageStore::batch_update`]. Listed stamps are set to the commit time
/// unless already present; `updatedAt` is always refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackagePatch {
    /// Write is refused with [`StoreError::StateChanged`] unless the stored
    /// `estado` still equals this when the write lands.
    pub expected_estado: Option<Estado>,
    pub estado: Option<Estado>,
    pub nombre: Option<RecipientName>,
    pub estante: Option<Option<String>>,
    pub stamps: Vec<StampField>,
}

impl PackagePatch {
    pub fn is_empty(&self) -> bool {
        self.estado.is_none()
            && self.nombre.is_none()
            && self.estante.is_none()
            && self.stamps.is_empty()
    }

    /// Fails when the stored record has left the expected state.
    pub fn check_expected(&self, package: &Package) -> Result<(), StoreError> {
        match self.expected_estado {
            Some(expected) if expected != package.estado => Err(StoreError::StateChanged {
                barcode: package.barcode.clone(),
                expected,
                found: package.estado,
                tipo: package.tipo,
            }),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, package: &mut Package, server_now: DateTime<Utc>) {
        if let Some(estado) = self.estado {
            package.estado = estado;
        }
        if let Some(name) = &self.nombre {
            package.rename(name);
        }
        if let Some(estante) = &self.estante {
            package.estante = estante.clone();
        }
        for field in &self.stamps {
            package.stamp_once(*field, server_now);
        }
        package.updated_at = server_now;
    }
}

/// Timestamp fields a query may range over or order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    FechaIngreso,
    CreatedAt,
    EntregadoAt,
    DevueltoAt,
}

impl TimeField {
    pub fn read(self, package: &Package) -> Option<DateTime<Utc>> {
        match self {
            TimeField::FechaIngreso => Some(package.fecha_ingreso),
            TimeField::CreatedAt => Some(package.created_at),
            TimeField::EntregadoAt => package.entregado_at,
            TimeField::DevueltoAt => package.devuelto_at,
        }
    }
}

/// Conjunctive filter clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    EstadoIn(Vec<Estado>),
    TipoIn(Vec<Tipo>),
    EmpresaIs(Empresa),
    /// `start <= field < end`; records without the field never match.
    Within {
        field: TimeField,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Filter {
    pub fn matches(&self, package: &Package) -> bool {
        match self {
            Filter::EstadoIn(states) => states.contains(&package.estado),
            Filter::TipoIn(tipos) => tipos.contains(&package.tipo),
            Filter::EmpresaIs(empresa) => package.empresa == *empresa,
            Filter::Within { field, start, end } => field
                .read(package)
                .is_some_and(|at| at >= *start && at < *end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// What the store's query layer can do: equality/`in` filters, a time range,
/// one ordering field and a row cap. No text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageQuery {
    pub filters: Vec<Filter>,
    pub order_by: Option<(TimeField, Direction)>,
    pub limit: Option<usize>,
}

impl PackageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: TimeField, direction: Direction) -> Self {
        self.order_by = Some((field, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, package: &Package) -> bool {
        self.filters.iter().all(|filter| filter.matches(package))
    }

    /// Runs the query over an in-memory collection.
    pub fn evaluate<'a, I>(&self, packages: I) -> Vec<Package>
    where
        I: IntoIterator<Item = &'a Package>,
    {
        let mut rows: Vec<Package> = packages
            .into_iter()
            .filter(|package| self.matches(package))
            .cloned()
            .collect();

        if let Some((field, direction)) = self.order_by {
            rows.sort_by(|left, right| {
                let ordering = field
                    .read(left)
                    .cmp(&field.read(right))
                    .then_with(|| left.barcode.cmp(&right.barcode));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Live query handle. The first update is the current result set; every
/// committed write that follows produces another full result set.
///
/// After [`Subscription::unsubscribe`] (or drop) no further updates are
/// delivered, including ones already buffered.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Vec<Package>>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(receiver: mpsc::UnboundedReceiver<Vec<Package>>, teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            receiver,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    /// Waits for the next result set. `None` once unsubscribed or when the
    /// store goes away.
    pub async fn next(&mut self) -> Option<Vec<Package>> {
        if self.teardown.is_none() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn unsubscribe(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
            self.receiver.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Document collection keyed by barcode.
#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn get(&self, barcode: &Barcode) -> Result<Option<Package>, StoreError>;
    /// Creates the record or overwrites it entirely.
    async fn put(&self, write: PackageWrite) -> Result<Package, StoreError>;
    /// Merge-write; `StoreError::NotFound` if the record is absent and
    /// `StoreError::StateChanged` if the patch's expected state no longer holds.
    async fn update(&self, barcode: &Barcode, patch: PackagePatch) -> Result<Package, StoreError>;
    async fn query(&self, query: &PackageQuery) -> Result<Vec<Package>, StoreError>;
    /// Applies every patch or none of them. Expected states are checked for
    /// the whole batch before anything is written.
    async fn batch_update(&self, updates: Vec<(Barcode, PackagePatch)>)
        -> Result<usize, StoreError>;
    async fn subscribe(&self, query: PackageQuery) -> Result<Subscription, StoreError>;
    /// Server clock; never goes backwards.
    async fn now(&self) -> Result<DateTime<Utc>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Barcode),
    #[error("batch rejected: {0}")]
    BatchRejected(String),
    #[error("record {barcode} is {found}, expected {expected}")]
    StateChanged {
        barcode: Barcode,
        expected: Estado,
        found: Estado,
        tipo: Tipo,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
