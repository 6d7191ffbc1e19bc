use super::common::*;
use crate::config::CounterConfig;
use crate::packages::domain::{Barcode, Estado, Tipo};
use crate::packages::intake::IntakeRequest;
use crate::packages::search::SearchQuery;
use crate::packages::service::ParcelError;

#[tokio::test]
async fn intake_stamps_server_time_and_derives_lowercase_name() {
    let (service, _store) = build_service();

    let package = service
        .intake(
            IntakeRequest::new(Tipo::Entrega)
                .with_nombre("  Ana López ")
                .with_estante("B-2"),
        )
        .await
        .expect("intake succeeds");

    assert_eq!(package.barcode, Barcode::from("GEN000001"));
    assert_eq!(package.estado, Estado::EnDeposito);
    assert_eq!(package.nombre.as_deref(), Some("Ana López"));
    assert_eq!(package.nombre_lower, "ana lópez");
    assert_eq!(package.estante.as_deref(), Some("B-2"));
    assert_eq!(package.fecha_ingreso, opening_time());
    assert_eq!(package.created_at, package.updated_at);
    assert!(package.entregado_at.is_none());
}

#[tokio::test]
async fn intake_keeps_scanned_barcode() {
    let (service, store) = build_service();

    let package = service
        .intake(IntakeRequest::new(Tipo::Envio).with_barcode(" SEUR-777 "))
        .await
        .expect("intake succeeds");

    assert_eq!(package.barcode, Barcode::from("SEUR-777"));
    assert!(package.nombre.is_none());
    assert_eq!(package.nombre_lower, "");
    assert_eq!(stored(&store, "SEUR-777").await, package);
}

#[tokio::test]
async fn blank_barcode_is_generated() {
    let (service, _store) = build_service();

    let package = service
        .intake(IntakeRequest::new(Tipo::Entrega).with_barcode("   "))
        .await
        .expect("intake succeeds");

    assert_eq!(package.barcode, Barcode::from("GEN000001"));
}

#[tokio::test]
async fn duplicate_scanned_barcode_never_overwrites() {
    let (service, store) = build_service();
    let original = seed(&store, "DUP-1", "Nico Perez", Tipo::Entrega, Estado::Entregado, at(2024, 2, 1, 8)).await;

    match service
        .intake(IntakeRequest::new(Tipo::Envio).with_barcode("DUP-1").with_nombre("Otro"))
        .await
    {
        Err(ParcelError::DuplicateIdentifier(barcode)) => assert_eq!(barcode, Barcode::from("DUP-1")),
        other => panic!("expected duplicate identifier, got {other:?}"),
    }

    assert_eq!(stored(&store, "DUP-1").await, original);
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn generated_collision_is_retried() {
    let (service, store) = build_service_with(
        CounterConfig::default(),
        ScriptedBarcodes::with(&["TAKEN", "FREE"]),
    );
    seed(&store, "TAKEN", "", Tipo::Entrega, Estado::EnDeposito, at(2024, 2, 1, 8)).await;

    let package = service
        .intake(IntakeRequest::new(Tipo::Entrega))
        .await
        .expect("second candidate is free");

    assert_eq!(package.barcode, Barcode::from("FREE"));
    assert_eq!(store.records().len(), 2);
}

#[tokio::test]
async fn generated_collisions_give_up_after_configured_attempts() {
    let config = CounterConfig {
        barcode_attempts: 2,
        ..CounterConfig::default()
    };
    let (service, store) = build_service_with(config, ScriptedBarcodes::with(&["A", "B", "C"]));
    seed(&store, "A", "", Tipo::Entrega, Estado::EnDeposito, at(2024, 2, 1, 8)).await;
    seed(&store, "B", "", Tipo::Entrega, Estado::EnDeposito, at(2024, 2, 1, 8)).await;

    match service.intake(IntakeRequest::new(Tipo::Entrega)).await {
        Err(ParcelError::DuplicateIdentifier(barcode)) => assert_eq!(barcode, Barcode::from("B")),
        other => panic!("expected duplicate identifier, got {other:?}"),
    }
    assert_eq!(store.records().len(), 2);
}

#[tokio::test]
async fn intake_reports_store_outage() {
    let (service, store) = build_service();
    store.set_offline(true);

    let result = service.intake(IntakeRequest::new(Tipo::Entrega)).await;

    assert!(matches!(result, Err(ParcelError::StoreUnavailable(_))));
    store.set_offline(false);
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn accented_names_are_found_without_accents() {
    let (service, _store) = build_service();
    service
        .intake(IntakeRequest::new(Tipo::Entrega).with_nombre("Ana López"))
        .await
        .expect("intake succeeds");

    let snapshot = service.load_snapshot().await.expect("snapshot loads");
    let results = service.search(&snapshot, &SearchQuery::text("lopez"));

    assert_eq!(results.total_matched, 1);
    assert_eq!(results.shown[0].nombre.as_deref(), Some("Ana López"));
}

#[tokio::test]
async fn correction_renames_and_clears_shelf() {
    let (service, _store) = build_service();
    let package = service
        .intake(
            IntakeRequest::new(Tipo::Entrega)
                .with_nombre("nico")
                .with_estante("A-1"),
        )
        .await
        .expect("intake succeeds");

    let corrected = service
        .correct_details(
            &package.barcode,
            crate::packages::DetailsCorrection {
                nombre: Some("Nicolás Pérez".to_string()),
                estante: Some(String::new()),
            },
        )
        .await
        .expect("correction succeeds");

    assert_eq!(corrected.nombre_lower, "nicolás pérez");
    assert!(corrected.estante.is_none());
    assert_eq!(corrected.estado, Estado::EnDeposito);
    assert_eq!(corrected.fecha_ingreso, package.fecha_ingreso);
}
