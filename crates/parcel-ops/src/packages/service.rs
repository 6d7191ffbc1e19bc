use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::CounterConfig;

use super::domain::{clean_optional, Barcode, Estado, Package, RecipientName, Tipo};
use super::intake::{BarcodeSource, IntakeRequest, RandomBarcodes};
use super::lifecycle::{self, InvalidTransition, Trigger};
use super::listing::{listing_query, ListingFeed, ListingFilter};
use super::report::{aggregate, MonthlyReport, Period};
use super::search::{self, SearchQuery, SearchResults};
use super::store::{
    Direction, Filter, PackagePatch, PackageQuery, PackageStore, PackageWrite, StoreError,
    TimeField,
};

/// Counter operations over a [`PackageStore`].
pub struct PackageService<S, B = RandomBarcodes> {
    store: Arc<S>,
    barcodes: Arc<B>,
    config: CounterConfig,
}

impl<S> PackageService<S, RandomBarcodes>
where
    S: PackageStore + 'static,
{
    pub fn new(store: Arc<S>, config: CounterConfig) -> Self {
        Self::with_barcodes(store, Arc::new(RandomBarcodes), config)
    }
}

impl<S, B> PackageService<S, B>
where
    S: PackageStore + 'static,
    B: BarcodeSource + 'static,
{
    pub fn with_barcodes(store: Arc<S>, barcodes: Arc<B>, config: CounterConfig) -> Self {
        Self {
            store,
            barcodes,
            config,
        }
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Register a package in `EN_DEPOSITO`, generating a barcode when none was scanned.
    pub async fn intake(&self, request: IntakeRequest) -> Result<Package, ParcelError> {
        let barcode = match request.supplied_barcode() {
            Some(barcode) => {
                if self.get_optional(&barcode, "intake").await?.is_some() {
                    warn!(%barcode, "intake rejected: barcode already registered");
                    return Err(ParcelError::DuplicateIdentifier(barcode));
                }
                barcode
            }
            None => self.free_barcode().await?,
        };

        let tipo = request.tipo;
        let stored = self
            .store
            .put(request.into_write(barcode))
            .await
            .map_err(|err| store_failure("intake", err))?;

        info!(barcode = %stored.barcode, tipo = tipo.label(), "package registered");
        Ok(stored)
    }

    async fn free_barcode(&self) -> Result<Barcode, ParcelError> {
        let attempts = self.config.barcode_attempts.max(1);
        let mut candidate = self.barcodes.next_barcode();
        for attempt in 1..=attempts {
            if self.get_optional(&candidate, "intake").await?.is_none() {
                return Ok(candidate);
            }
            debug!(barcode = %candidate, attempt, "generated barcode collided");
            if attempt < attempts {
                candidate = self.barcodes.next_barcode();
            }
        }
        warn!(attempts, "no free barcode after retries");
        Err(ParcelError::DuplicateIdentifier(candidate))
    }

    pub async fn get(&self, barcode: &Barcode) -> Result<Package, ParcelError> {
        self.get_optional(barcode, "get")
            .await?
            .ok_or_else(|| ParcelError::RecordNotFound(barcode.clone()))
    }

    async fn get_optional(
        &self,
        barcode: &Barcode,
        operation: &'static str,
    ) -> Result<Option<Package>, ParcelError> {
        self.store
            .get(barcode)
            .await
            .map_err(|err| store_failure(operation, err))
    }

    /// Most recent packages by intake date, up to the snapshot limit.
    pub async fn load_snapshot(&self) -> Result<Vec<Package>, ParcelError> {
        let query = PackageQuery::new()
            .order_by(TimeField::FechaIngreso, Direction::Descending)
            .limit(self.config.snapshot_limit);
        let snapshot = self
            .store
            .query(&query)
            .await
            .map_err(|err| store_failure("load_snapshot", err))?;
        debug!(rows = snapshot.len(), "search snapshot loaded");
        Ok(snapshot)
    }

    pub fn search(&self, snapshot: &[Package], query: &SearchQuery) -> SearchResults {
        search::search(snapshot, query, self.config.display_limit)
    }

    /// Customer collected the package at the counter.
    pub async fn deliver(&self, barcode: &Barcode) -> Result<Package, ParcelError> {
        self.advance(barcode, Trigger::DeliverToCustomer).await
    }

    /// Queue the package to go back with the next carrier pickup.
    pub async fn mark_for_return(&self, barcode: &Barcode) -> Result<Package, ParcelError> {
        self.advance(barcode, Trigger::MarkForReturn).await
    }

    async fn advance(&self, barcode: &Barcode, trigger: Trigger) -> Result<Package, ParcelError> {
        let current = self.get(barcode).await?;
        let transition = lifecycle::plan(&current, trigger).map_err(|err| {
            warn!(%barcode, from = %err.from, trigger = trigger.label(), "transition rejected");
            err
        })?;

        let updated = self
            .store
            .update(barcode, transition.patch())
            .await
            .map_err(|err| write_failure(trigger, err))?;

        info!(
            %barcode,
            from = %transition.from,
            to = %transition.to,
            "package state advanced"
        );
        Ok(updated)
    }

    /// Rewrite recipient name and/or shelf without touching the lifecycle.
    pub async fn correct_details(
        &self,
        barcode: &Barcode,
        correction: DetailsCorrection,
    ) -> Result<Package, ParcelError> {
        let patch = correction.into_patch();
        if patch.is_empty() {
            return self.get(barcode).await;
        }

        let updated = self
            .store
            .update(barcode, patch)
            .await
            .map_err(|err| store_failure("correct_details", err))?;
        info!(%barcode, "package details corrected");
        Ok(updated)
    }

    /// Everything the carrier should take: queued returns and outbound items.
    pub async fn load_pending(&self) -> Result<Vec<Package>, ParcelError> {
        let returns = PackageQuery::new()
            .filter(Filter::EstadoIn(vec![Estado::PendienteDevolucion]))
            .order_by(TimeField::FechaIngreso, Direction::Descending);
        let outbound = PackageQuery::new()
            .filter(Filter::EstadoIn(vec![Estado::EnDeposito]))
            .filter(Filter::TipoIn(vec![Tipo::Envio]))
            .order_by(TimeField::FechaIngreso, Direction::Descending);

        let (returns, outbound) =
            tokio::try_join!(self.store.query(&returns), self.store.query(&outbound))
                .map_err(|err| store_failure("load_pending", err))?;

        let mut seen = HashSet::new();
        let mut pending: Vec<Package> = returns
            .into_iter()
            .chain(outbound)
            .filter(|package| seen.insert(package.barcode.clone()))
            .collect();
        pending.sort_by(|left, right| {
            right
                .fecha_ingreso
                .cmp(&left.fecha_ingreso)
                .then_with(|| left.barcode.cmp(&right.barcode))
        });
        Ok(pending)
    }

    /// Hand a batch to the carrier as one atomic write.
    ///
    /// Only the barcodes of `batch` are used. Each record is re-read and its
    /// transition planned from the stored state, and the write is refused if
    /// any of those states changed before it lands. A list that went stale
    /// (a package delivered at the counter, another operator's pickup) fails
    /// with `InvalidTransition` and nothing is written.
    pub async fn commit_pickup(&self, batch: &[Package]) -> Result<PickupReceipt, ParcelError> {
        let mut seen = HashSet::new();
        let mut transitions = Vec::new();
        for package in batch {
            if !seen.insert(package.barcode.clone()) {
                continue;
            }
            let current = self.get(&package.barcode).await?;
            let transition = lifecycle::plan(&current, Trigger::CarrierPickup).map_err(|err| {
                warn!(barcode = %err.barcode, from = %err.from, "pickup batch rejected");
                err
            })?;
            transitions.push(transition);
        }

        if transitions.is_empty() {
            return Ok(PickupReceipt::default());
        }

        let attempted = transitions.len();
        let updates = transitions
            .iter()
            .map(|transition| (transition.barcode.clone(), transition.patch()))
            .collect();

        let committed = self
            .store
            .batch_update(updates)
            .await
            .map_err(|err| match err {
                StoreError::BatchRejected(reason) => {
                    error!(attempted, %reason, "pickup batch failed; nothing committed");
                    ParcelError::PartialBatchFailure { attempted, reason }
                }
                other => write_failure(Trigger::CarrierPickup, other),
            })?;

        let returned = transitions
            .iter()
            .filter(|transition| transition.to == Estado::Devuelto)
            .count();
        let receipt = PickupReceipt {
            committed,
            returned,
            shipped: attempted - returned,
            barcodes: transitions
                .into_iter()
                .map(|transition| transition.barcode)
                .collect(),
        };
        info!(
            committed = receipt.committed,
            returned = receipt.returned,
            shipped = receipt.shipped,
            "carrier pickup registered"
        );
        Ok(receipt)
    }

    /// Month containing the store's current time.
    pub async fn current_period(&self) -> Result<Period, ParcelError> {
        let now = self
            .store
            .now()
            .await
            .map_err(|err| store_failure("current_period", err))?;
        Ok(Period::containing(now))
    }

    pub async fn report(&self, period: Period) -> Result<MonthlyReport, ParcelError> {
        let intake = period.query(TimeField::FechaIngreso);
        let delivered = period.query(TimeField::EntregadoAt);
        let returned = period.query(TimeField::DevueltoAt);
        let (ingresados, entregados, devueltos) = tokio::try_join!(
            self.store.query(&intake),
            self.store.query(&delivered),
            self.store.query(&returned),
        )
        .map_err(|err| store_failure("report", err))?;

        let report = aggregate(period, &ingresados, &entregados, &devueltos);
        if !report.anomalies.is_empty() {
            warn!(
                month = %report.month,
                anomalies = ?report.anomalies,
                "packages carry both entregadoAt and devueltoAt"
            );
        }
        Ok(report)
    }

    /// Live listing of the newest records, filtered per update.
    pub async fn watch_listing(&self, filter: ListingFilter) -> Result<ListingFeed, ParcelError> {
        let subscription = self
            .store
            .subscribe(listing_query(self.config.listing_limit))
            .await
            .map_err(|err| store_failure("watch_listing", err))?;
        Ok(ListingFeed::new(subscription, filter))
    }

    /// Write converted legacy records, skipping barcodes already present.
    ///
    /// Rows are written one by one. If the store fails midway the error
    /// carries the counts reached so far; running the import again skips
    /// what was already written.
    pub async fn import_legacy(
        &self,
        writes: Vec<PackageWrite>,
    ) -> Result<ImportSummary, ParcelError> {
        let mut summary = ImportSummary::default();
        for write in writes {
            let barcode = write.barcode.clone();
            let existing = self.store.get(&barcode).await;
            let written = match existing {
                Ok(Some(_)) => {
                    debug!(%barcode, "legacy row skipped: already present");
                    summary.skipped += 1;
                    continue;
                }
                Ok(None) => self.store.put(write).await.map(|_| ()),
                Err(err) => Err(err),
            };
            if let Err(err) = written {
                error!(
                    %barcode,
                    imported = summary.imported,
                    skipped = summary.skipped,
                    error = %err,
                    "legacy import interrupted"
                );
                return Err(ParcelError::ImportInterrupted {
                    imported: summary.imported,
                    skipped: summary.skipped,
                    barcode,
                    reason: err.to_string(),
                });
            }
            summary.imported += 1;
        }
        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "legacy import finished"
        );
        Ok(summary)
    }
}

fn store_failure(operation: &'static str, err: StoreError) -> ParcelError {
    error!(operation, error = %err, "package store call failed");
    ParcelError::from(err)
}

/// A lifecycle write lost its expected state to a concurrent change.
fn write_failure(trigger: Trigger, err: StoreError) -> ParcelError {
    match err {
        StoreError::StateChanged {
            barcode,
            expected,
            found,
            tipo,
        } => {
            warn!(
                %barcode,
                %expected,
                %found,
                trigger = trigger.label(),
                "state changed before write"
            );
            ParcelError::InvalidTransition(InvalidTransition {
                barcode,
                trigger,
                from: found,
                tipo,
            })
        }
        other => store_failure(trigger.label(), other),
    }
}

/// Administrative correction; `Some("")` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailsCorrection {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub estante: Option<String>,
}

impl DetailsCorrection {
    fn into_patch(self) -> PackagePatch {
        PackagePatch {
            nombre: self.nombre.as_deref().map(RecipientName::new),
            estante: self
                .estante
                .as_deref()
                .map(|estante| clean_optional(Some(estante))),
            ..PackagePatch::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PickupReceipt {
    pub committed: usize,
    pub returned: usize,
    pub shipped: usize,
    pub barcodes: Vec<Barcode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Error raised by the package service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParcelError {
    #[error("barcode {0} is already registered")]
    DuplicateIdentifier(Barcode),
    #[error("package {0} not found")]
    RecordNotFound(Barcode),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("package store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("pickup of {attempted} packages failed, none were updated: {reason}")]
    PartialBatchFailure { attempted: usize, reason: String },
    #[error("legacy import stopped at {barcode} after {imported} imported and {skipped} skipped: {reason}")]
    ImportInterrupted {
        imported: usize,
        skipped: usize,
        barcode: Barcode,
        reason: String,
    },
}

impl From<StoreError> for ParcelError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(barcode) => Self::RecordNotFound(barcode),
            StoreError::BatchRejected(reason) => Self::PartialBatchFailure {
                attempted: 0,
                reason,
            },
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            // Lifecycle writes go through `write_failure`, which knows the trigger.
            changed @ StoreError::StateChanged { .. } => {
                Self::StoreUnavailable(changed.to_string())
            }
        }
    }
}
