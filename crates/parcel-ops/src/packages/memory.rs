use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;

use super::domain::{Barcode, Package};
use super::store::{
    PackagePatch, PackageQuery, PackageStore, PackageWrite, StoreError, Subscription,
};

type Subscribers = Mutex<HashMap<u64, Subscriber>>;

struct Subscriber {
    query: PackageQuery,
    sender: mpsc::UnboundedSender<Vec<Package>>,
}

#[derive(Default)]
struct ClockState {
    manual: Option<DateTime<Utc>>,
    last_issued: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_writes: HashSet<Barcode>,
}

#[derive(Default)]
struct Inner {
    records: Mutex<HashMap<Barcode, Package>>,
    clock: Mutex<ClockState>,
    faults: Mutex<Faults>,
    subscribers: Arc<Subscribers>,
    next_subscriber: AtomicU64,
}

/// In-process [`PackageStore`] with a monotonic server clock, live
/// subscriptions and switchable failures.
#[derive(Clone, Default)]
pub struct MemoryPackageStore {
    inner: Arc<Inner>,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose clock only moves when told to.
    pub fn with_manual_clock(start: DateTime<Utc>) -> Self {
        let store = Self::default();
        if let Ok(mut clock) = store.inner.clock.lock() {
            clock.manual = Some(start);
        }
        store
    }

    pub fn set_clock(&self, at: DateTime<Utc>) {
        if let Ok(mut clock) = self.inner.clock.lock() {
            clock.manual = Some(at);
        }
    }

    pub fn advance_clock(&self, by: Duration) {
        if let Ok(mut clock) = self.inner.clock.lock() {
            let base = clock.manual.unwrap_or_else(Utc::now);
            clock.manual = Some(base + by);
        }
    }

    /// Every call fails with `StoreError::Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.offline = offline;
        }
    }

    /// Writes touching `barcode` fail; a batch containing it is rejected whole.
    pub fn fail_writes_for(&self, barcode: Barcode) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.failing_writes.insert(barcode);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            *faults = Faults::default();
        }
    }

    /// Copy of every stored record, unordered.
    pub fn records(&self) -> Vec<Package> {
        self.inner
            .records
            .lock()
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subscribers| subscribers.len())
            .unwrap_or_default()
    }

    fn records_guard(&self) -> Result<MutexGuard<'_, HashMap<Barcode, Package>>, StoreError> {
        self.inner
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        let faults = self
            .inner
            .faults
            .lock()
            .map_err(|_| StoreError::Unavailable("fault lock poisoned".to_string()))?;
        if faults.offline {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn write_fails(&self, barcode: &Barcode) -> bool {
        self.inner
            .faults
            .lock()
            .map(|faults| faults.failing_writes.contains(barcode))
            .unwrap_or(true)
    }

    fn server_now(&self) -> Result<DateTime<Utc>, StoreError> {
        let mut clock = self
            .inner
            .clock
            .lock()
            .map_err(|_| StoreError::Unavailable("clock lock poisoned".to_string()))?;
        let candidate = clock.manual.unwrap_or_else(Utc::now);
        let now = match clock.last_issued {
            Some(last) if last > candidate => last,
            _ => candidate,
        };
        clock.last_issued = Some(now);
        Ok(now)
    }

    fn notify(&self, records: &HashMap<Barcode, Package>) {
        let Ok(mut subscribers) = self.inner.subscribers.lock() else {
            return;
        };
        subscribers.retain(|_, subscriber| {
            let rows = subscriber.query.evaluate(records.values());
            subscriber.sender.send(rows).is_ok()
        });
    }
}

#[async_trait]
impl PackageStore for MemoryPackageStore {
    async fn get(&self, barcode: &Barcode) -> Result<Option<Package>, StoreError> {
        self.ensure_online()?;
        let records = self.records_guard()?;
        Ok(records.get(barcode).cloned())
    }

    async fn put(&self, write: PackageWrite) -> Result<Package, StoreError> {
        self.ensure_online()?;
        if self.write_fails(&write.barcode) {
            return Err(StoreError::Unavailable(format!(
                "write to {} failed",
                write.barcode
            )));
        }
        let mut records = self.records_guard()?;
        let now = self.server_now()?;
        let package = write.into_package(now);
        records.insert(package.barcode.clone(), package.clone());
        self.notify(&records);
        Ok(package)
    }

    async fn update(&self, barcode: &Barcode, patch: PackagePatch) -> Result<Package, StoreError> {
        self.ensure_online()?;
        if self.write_fails(barcode) {
            return Err(StoreError::Unavailable(format!("write to {barcode} failed")));
        }
        let mut records = self.records_guard()?;
        let now = self.server_now()?;
        let package = records
            .get_mut(barcode)
            .ok_or_else(|| StoreError::NotFound(barcode.clone()))?;
        patch.check_expected(package)?;
        patch.apply(package, now);
        let updated = package.clone();
        self.notify(&records);
        Ok(updated)
    }

    async fn query(&self, query: &PackageQuery) -> Result<Vec<Package>, StoreError> {
        self.ensure_online()?;
        let records = self.records_guard()?;
        Ok(query.evaluate(records.values()))
    }

    async fn batch_update(
        &self,
        updates: Vec<(Barcode, PackagePatch)>,
    ) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let mut records = self.records_guard()?;

        for (barcode, patch) in &updates {
            let Some(package) = records.get(barcode) else {
                return Err(StoreError::BatchRejected(format!(
                    "record {barcode} not found"
                )));
            };
            patch.check_expected(package)?;
            if self.write_fails(barcode) {
                return Err(StoreError::BatchRejected(format!(
                    "write to {barcode} failed"
                )));
            }
        }

        let now = self.server_now()?;
        for (barcode, patch) in &updates {
            if let Some(package) = records.get_mut(barcode) {
                patch.apply(package, now);
            }
        }
        self.notify(&records);
        Ok(updates.len())
    }

    async fn subscribe(&self, query: PackageQuery) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        {
            // Held across registration so no write slips between the initial
            // result and the first notification.
            let records = self.records_guard()?;
            let _ = sender.send(query.evaluate(records.values()));
            self.inner
                .subscribers
                .lock()
                .map_err(|_| StoreError::Unavailable("subscriber lock poisoned".to_string()))?
                .insert(id, Subscriber { query, sender });
        }

        let registry: Weak<Subscribers> = Arc::downgrade(&self.inner.subscribers);
        Ok(Subscription::new(receiver, move || {
            if let Some(registry) = registry.upgrade() {
                if let Ok(mut subscribers) = registry.lock() {
                    subscribers.remove(&id);
                }
            }
        }))
    }

    async fn now(&self) -> Result<DateTime<Utc>, StoreError> {
        self.ensure_online()?;
        self.server_now()
    }
}
