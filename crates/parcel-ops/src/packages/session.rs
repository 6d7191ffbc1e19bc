use super::domain::{Barcode, Package};
use super::intake::BarcodeSource;
use super::search::{SearchQuery, SearchResults};
use super::service::{PackageService, ParcelError};
use super::store::PackageStore;

/// Operator-facing outcome of the last counter action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    Info(String),
    Error(String),
}

impl SessionMessage {
    pub fn text(&self) -> &str {
        match self {
            SessionMessage::Info(text) | SessionMessage::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SessionMessage::Error(_))
    }
}

/// State of one counter search screen: the loaded snapshot, the query being
/// typed, the package currently being written and the last message.
#[derive(Debug, Clone, Default)]
pub struct CounterSession {
    snapshot: Vec<Package>,
    query: SearchQuery,
    busy: Option<Barcode>,
    message: Option<SessionMessage>,
}

impl CounterSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &[Package] {
        &self.snapshot
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn busy(&self) -> Option<&Barcode> {
        self.busy.as_ref()
    }

    pub fn message(&self) -> Option<&SessionMessage> {
        self.message.as_ref()
    }

    pub fn set_query(&mut self, query: SearchQuery) {
        self.query = query;
    }

    pub fn results<S, B>(&self, service: &PackageService<S, B>) -> SearchResults
    where
        S: PackageStore + 'static,
        B: BarcodeSource + 'static,
    {
        service.search(&self.snapshot, &self.query)
    }

    /// Replace the snapshot with a fresh load. The old one is kept on failure.
    pub async fn load<S, B>(&mut self, service: &PackageService<S, B>) -> Result<(), ParcelError>
    where
        S: PackageStore + 'static,
        B: BarcodeSource + 'static,
    {
        self.message = None;
        match service.load_snapshot().await {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                Ok(())
            }
            Err(err) => {
                self.message = Some(SessionMessage::Error(format!(
                    "could not load packages: {err}"
                )));
                Err(err)
            }
        }
    }

    pub async fn deliver<S, B>(
        &mut self,
        service: &PackageService<S, B>,
        barcode: &Barcode,
    ) -> Result<Package, ParcelError>
    where
        S: PackageStore + 'static,
        B: BarcodeSource + 'static,
    {
        self.begin(barcode);
        let outcome = service.deliver(barcode).await;
        self.finish(outcome, "delivery registered", "could not register delivery")
    }

    pub async fn mark_for_return<S, B>(
        &mut self,
        service: &PackageService<S, B>,
        barcode: &Barcode,
    ) -> Result<Package, ParcelError>
    where
        S: PackageStore + 'static,
        B: BarcodeSource + 'static,
    {
        self.begin(barcode);
        let outcome = service.mark_for_return(barcode).await;
        self.finish(
            outcome,
            "package queued for return",
            "could not queue package for return",
        )
    }

    fn begin(&mut self, barcode: &Barcode) {
        self.message = None;
        self.busy = Some(barcode.clone());
    }

    fn finish(
        &mut self,
        outcome: Result<Package, ParcelError>,
        success: &str,
        failure: &str,
    ) -> Result<Package, ParcelError> {
        self.busy = None;
        match outcome {
            Ok(updated) => {
                if let Some(entry) = self
                    .snapshot
                    .iter_mut()
                    .find(|entry| entry.barcode == updated.barcode)
                {
                    *entry = updated.clone();
                }
                self.message = Some(SessionMessage::Info(format!(
                    "{success}: {}",
                    updated.barcode
                )));
                Ok(updated)
            }
            Err(err) => {
                self.message = Some(SessionMessage::Error(format!("{failure}: {err}")));
                Err(err)
            }
        }
    }
}
