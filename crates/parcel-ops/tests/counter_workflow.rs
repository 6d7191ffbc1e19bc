use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use parcel_ops::config::CounterConfig;
use parcel_ops::packages::{
    CounterSession, Estado, IntakeRequest, ListingFilter, MemoryPackageStore, PackageService,
    ParcelError, SearchQuery, Tipo,
};

#[tokio::test]
async fn a_day_at_the_counter() {
    let opening = Utc
        .with_ymd_and_hms(2024, 3, 11, 9, 0, 0)
        .single()
        .expect("valid opening time");
    let store = Arc::new(MemoryPackageStore::with_manual_clock(opening));
    let service = PackageService::new(store.clone(), CounterConfig::default());
    let mut listing = service
        .watch_listing(ListingFilter::default())
        .await
        .expect("listing opens");
    assert!(listing.next().await.expect("initial rows").is_empty());

    let for_nico = service
        .intake(IntakeRequest::new(Tipo::Entrega).with_nombre("Nico Pérez").with_estante("A-1"))
        .await
        .expect("intake");
    let for_marta = service
        .intake(IntakeRequest::new(Tipo::Entrega).with_nombre("Marta Gil"))
        .await
        .expect("intake");
    let outbound = service
        .intake(IntakeRequest::new(Tipo::Envio).with_barcode("SEUR-OUT-1"))
        .await
        .expect("intake");
    assert_eq!(for_nico.barcode.as_str().len(), parcel_ops::packages::BARCODE_LENGTH);
    assert_eq!(listing.next().await.expect("update").len(), 1);

    let mut session = CounterSession::new();
    session.load(&service).await.expect("snapshot loads");
    session.set_query(SearchQuery::text("perez nico"));
    let results = session.results(&service);
    assert_eq!(results.total_matched, 1);
    assert_eq!(results.shown[0].barcode, for_nico.barcode);

    store.advance_clock(Duration::hours(3));
    session
        .deliver(&service, &for_nico.barcode)
        .await
        .expect("nico collects");
    session
        .mark_for_return(&service, &for_marta.barcode)
        .await
        .expect("marta's parcel goes back");
    assert!(matches!(
        session.deliver(&service, &for_nico.barcode).await,
        Err(ParcelError::InvalidTransition(_))
    ));

    store.advance_clock(Duration::hours(5));
    let pending = service.load_pending().await.expect("pending loads");
    assert_eq!(pending.len(), 2);
    let receipt = service.commit_pickup(&pending).await.expect("pickup");
    assert_eq!(receipt.returned, 1);
    assert_eq!(receipt.shipped, 1);

    let shipped = service.get(&outbound.barcode).await.expect("outbound record");
    assert_eq!(shipped.estado, Estado::Entregado);
    assert_eq!(shipped.fecha_salida, Some(opening + Duration::hours(8)));

    let report = service
        .report(service.current_period().await.expect("period"))
        .await
        .expect("report");
    assert_eq!(report.intake.total, 3);
    assert_eq!(report.outcomes.count(Estado::Entregado), 2);
    assert_eq!(report.outcomes.count(Estado::Devuelto), 1);
    assert!(report.anomalies.is_empty());

    listing.close();
    assert_eq!(store.subscriber_count(), 0);
}
