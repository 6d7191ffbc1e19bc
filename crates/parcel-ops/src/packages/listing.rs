use serde::{Deserialize, Serialize};

use super::domain::{Empresa, Estado, Package, Tipo};
use super::search::{contains_all, tokenize};
use super::store::{Direction, PackageQuery, Subscription, TimeField};

/// Operator filters for the live listing of recent records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    #[serde(default)]
    pub estado: Option<Estado>,
    #[serde(default)]
    pub tipo: Option<Tipo>,
    #[serde(default)]
    pub empresa: Option<Empresa>,
    #[serde(default)]
    pub search: String,
}

impl ListingFilter {
    pub fn matches(&self, package: &Package) -> bool {
        if self.estado.is_some_and(|estado| package.estado != estado) {
            return false;
        }
        if self.tipo.is_some_and(|tipo| package.tipo != tipo) {
            return false;
        }
        if self.empresa.is_some_and(|empresa| package.empresa != empresa) {
            return false;
        }

        let tokens = tokenize(&self.search);
        if tokens.is_empty() {
            return true;
        }
        contains_all(&haystack(package), &tokens)
    }

    pub fn apply(&self, rows: Vec<Package>) -> Vec<Package> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

fn haystack(package: &Package) -> String {
    [
        package.barcode.as_str(),
        package.nombre.as_deref().unwrap_or_default(),
        package.estante.as_deref().unwrap_or_default(),
        package.estado.label(),
        package.tipo.label(),
        package.empresa.label(),
    ]
    .join(" ")
}

/// Store query behind the listing: newest records first, capped.
pub fn listing_query(limit: usize) -> PackageQuery {
    PackageQuery::new()
        .order_by(TimeField::CreatedAt, Direction::Descending)
        .limit(limit)
}

/// Filtered view over a live subscription.
#[derive(Debug)]
pub struct ListingFeed {
    subscription: Subscription,
    filter: ListingFilter,
}

impl ListingFeed {
    pub fn new(subscription: Subscription, filter: ListingFilter) -> Self {
        Self {
            subscription,
            filter,
        }
    }

    pub fn filter(&self) -> &ListingFilter {
        &self.filter
    }

    /// Takes effect from the next update.
    pub fn set_filter(&mut self, filter: ListingFilter) {
        self.filter = filter;
    }

    pub fn is_open(&self) -> bool {
        self.subscription.is_active()
    }

    pub async fn next(&mut self) -> Option<Vec<Package>> {
        let rows = self.subscription.next().await?;
        Some(self.filter.apply(rows))
    }

    pub fn close(&mut self) {
        self.subscription.unsubscribe();
    }
}
