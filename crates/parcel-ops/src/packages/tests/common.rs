use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::CounterConfig;
use crate::packages::domain::{Barcode, Empresa, Estado, Package, RecipientName, StampField, Tipo};
use crate::packages::intake::BarcodeSource;
use crate::packages::memory::MemoryPackageStore;
use crate::packages::service::PackageService;
use crate::packages::store::{PackageStore, PackageWrite, Stamp};

pub(super) type TestService = PackageService<MemoryPackageStore, ScriptedBarcodes>;

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn opening_time() -> DateTime<Utc> {
    at(2024, 3, 10, 9)
}

/// Hands out queued barcodes first, then `GEN000001`, `GEN000002`, ...
#[derive(Default)]
pub(super) struct ScriptedBarcodes {
    queue: Mutex<VecDeque<Barcode>>,
    counter: Mutex<u32>,
}

impl ScriptedBarcodes {
    pub(super) fn with(barcodes: &[&str]) -> Self {
        Self {
            queue: Mutex::new(barcodes.iter().map(|code| Barcode::from(*code)).collect()),
            counter: Mutex::new(0),
        }
    }
}

impl BarcodeSource for ScriptedBarcodes {
    fn next_barcode(&self) -> Barcode {
        if let Some(next) = self.queue.lock().expect("queue mutex poisoned").pop_front() {
            return next;
        }
        let mut counter = self.counter.lock().expect("counter mutex poisoned");
        *counter += 1;
        Barcode(format!("GEN{:06}", *counter))
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryPackageStore>) {
    build_service_with(CounterConfig::default(), ScriptedBarcodes::default())
}

pub(super) fn build_service_with(
    config: CounterConfig,
    barcodes: ScriptedBarcodes,
) -> (TestService, Arc<MemoryPackageStore>) {
    let store = Arc::new(MemoryPackageStore::with_manual_clock(opening_time()));
    let service = PackageService::with_barcodes(store.clone(), Arc::new(barcodes), config);
    (service, store)
}

pub(super) fn write(
    barcode: &str,
    nombre: &str,
    tipo: Tipo,
    estado: Estado,
    fecha_ingreso: DateTime<Utc>,
) -> PackageWrite {
    PackageWrite {
        barcode: Barcode::from(barcode),
        nombre: RecipientName::new(nombre),
        empresa: Empresa::Seur,
        tipo,
        estante: None,
        estado,
        fecha_ingreso: Stamp::At(fecha_ingreso),
        stamps: Vec::new(),
    }
}

pub(super) async fn seed(
    store: &MemoryPackageStore,
    barcode: &str,
    nombre: &str,
    tipo: Tipo,
    estado: Estado,
    fecha_ingreso: DateTime<Utc>,
) -> Package {
    store
        .put(write(barcode, nombre, tipo, estado, fecha_ingreso))
        .await
        .expect("seed write")
}

pub(super) async fn seed_with_stamps(
    store: &MemoryPackageStore,
    mut record: PackageWrite,
    stamps: &[(StampField, DateTime<Utc>)],
) -> Package {
    record.stamps = stamps
        .iter()
        .map(|(field, at)| (*field, Stamp::At(*at)))
        .collect();
    store.put(record).await.expect("seed write")
}

pub(super) async fn stored(store: &MemoryPackageStore, barcode: &str) -> Package {
    store
        .get(&Barcode::from(barcode))
        .await
        .expect("get succeeds")
        .expect("record present")
}

/// Snapshot row built without a store, for pure search tests.
pub(super) fn row(barcode: &str, nombre: &str, tipo: Tipo, estado: Estado) -> Package {
    write(barcode, nombre, tipo, estado, opening_time()).into_package(opening_time())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
