use super::common::*;

use crate::packages::domain::{Estado, Tipo};
use crate::packages::intake::IntakeRequest;
use crate::packages::listing::ListingFilter;
use crate::packages::service::ParcelError;

#[tokio::test]
async fn feed_starts_with_current_rows_and_follows_writes() {
    let (service, store) = build_service();
    seed(&store, "L1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;

    let mut feed = service
        .watch_listing(ListingFilter::default())
        .await
        .expect("feed opens");
    let initial = feed.next().await.expect("initial rows");
    assert_eq!(initial.len(), 1);

    service
        .intake(IntakeRequest::new(Tipo::Envio).with_barcode("L2"))
        .await
        .expect("intake succeeds");
    let update = feed.next().await.expect("update after intake");
    let barcodes: Vec<&str> = update.iter().map(|package| package.barcode.as_str()).collect();
    assert!(barcodes.contains(&"L1"));
    assert!(barcodes.contains(&"L2"));
}

#[tokio::test]
async fn filter_narrows_each_update() {
    let (service, store) = build_service();
    seed(&store, "L1", "Nico Perez", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    seed(&store, "L2", "Marta", Tipo::Envio, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    seed(&store, "L3", "Nico Gil", Tipo::Entrega, Estado::Entregado, at(2024, 3, 1, 9)).await;

    let mut feed = service
        .watch_listing(ListingFilter {
            estado: Some(Estado::EnDeposito),
            ..ListingFilter::default()
        })
        .await
        .expect("feed opens");
    let rows = feed.next().await.expect("initial rows");
    assert_eq!(rows.len(), 2);

    feed.set_filter(ListingFilter {
        search: "nico".to_string(),
        tipo: Some(Tipo::Entrega),
        ..ListingFilter::default()
    });
    seed(&store, "L4", "", Tipo::Envio, Estado::EnDeposito, at(2024, 3, 2, 9)).await;
    let rows = feed.next().await.expect("update");
    let barcodes: Vec<&str> = rows.iter().map(|package| package.barcode.as_str()).collect();
    assert_eq!(barcodes.len(), 2);
    assert!(barcodes.contains(&"L1"));
    assert!(barcodes.contains(&"L3"));
}

#[test]
fn listing_search_covers_barcode_shelf_and_labels() {
    let mut package = row("SEUR-42", "Ana", Tipo::Entrega, Estado::PendienteDevolucion);
    package.estante = Some("B-7".to_string());

    let matches = |search: &str| {
        ListingFilter {
            search: search.to_string(),
            ..ListingFilter::default()
        }
        .matches(&package)
    };

    assert!(matches("seur-42"));
    assert!(matches("b-7 ana"));
    assert!(matches(Estado::PendienteDevolucion.label()));
    assert!(!matches("marta"));
}

#[tokio::test]
async fn closed_feed_receives_nothing() {
    let (service, store) = build_service();
    let mut feed = service
        .watch_listing(ListingFilter::default())
        .await
        .expect("feed opens");
    assert_eq!(store.subscriber_count(), 1);

    feed.close();
    seed(&store, "L1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;

    assert!(!feed.is_open());
    assert!(feed.next().await.is_none());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn dropped_feed_unsubscribes() {
    let (service, store) = build_service();
    let feed = service
        .watch_listing(ListingFilter::default())
        .await
        .expect("feed opens");

    drop(feed);

    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn feed_cannot_open_while_store_is_down() {
    let (service, store) = build_service();
    store.set_offline(true);

    let result = service.watch_listing(ListingFilter::default()).await;

    assert!(matches!(result, Err(ParcelError::StoreUnavailable(_))));
}
