use super::common::*;
use chrono::Duration;

use crate::packages::domain::{Barcode, Estado, Tipo};
use crate::packages::lifecycle::{self, Trigger};
use crate::packages::service::ParcelError;
use crate::packages::store::{PackageStore, StoreError};

#[tokio::test]
async fn deliver_moves_to_entregado_with_stamp() {
    let (service, store) = build_service();
    seed(&store, "P1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    store.advance_clock(Duration::hours(2));

    let delivered = service.deliver(&Barcode::from("P1")).await.expect("deliver succeeds");

    assert_eq!(delivered.estado, Estado::Entregado);
    assert_eq!(delivered.entregado_at, Some(opening_time() + Duration::hours(2)));
    assert_eq!(delivered.updated_at, opening_time() + Duration::hours(2));
    assert!(delivered.fecha_salida.is_none());
}

#[tokio::test]
async fn second_delivery_is_rejected_and_leaves_record_alone() {
    let (service, store) = build_service();
    seed(&store, "P1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    let delivered = service.deliver(&Barcode::from("P1")).await.expect("first delivery");
    store.advance_clock(Duration::minutes(5));

    match service.deliver(&Barcode::from("P1")).await {
        Err(ParcelError::InvalidTransition(err)) => {
            assert_eq!(err.from, Estado::Entregado);
            assert_eq!(err.trigger, Trigger::DeliverToCustomer);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    assert_eq!(stored(&store, "P1").await, delivered);
}

#[tokio::test]
async fn mark_for_return_is_only_allowed_once() {
    let (service, store) = build_service();
    seed(&store, "P1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;

    let marked = service
        .mark_for_return(&Barcode::from("P1"))
        .await
        .expect("mark succeeds");
    assert_eq!(marked.estado, Estado::PendienteDevolucion);
    assert_eq!(marked.marcado_devolucion_at, Some(opening_time()));

    let again = service.mark_for_return(&Barcode::from("P1")).await;
    assert!(matches!(again, Err(ParcelError::InvalidTransition(_))));
    assert_eq!(stored(&store, "P1").await, marked);
}

#[tokio::test]
async fn queued_return_cannot_be_handed_to_customer() {
    let (service, store) = build_service();
    let original = seed(&store, "P1", "Nico", Tipo::Entrega, Estado::PendienteDevolucion, at(2024, 3, 1, 9)).await;

    let result = service.deliver(&Barcode::from("P1")).await;

    assert!(matches!(result, Err(ParcelError::InvalidTransition(_))));
    assert_eq!(stored(&store, "P1").await, original);
}

#[tokio::test]
async fn unknown_barcode_is_not_found() {
    let (service, _store) = build_service();

    let result = service.mark_for_return(&Barcode::from("NOPE")).await;

    assert_eq!(result, Err(ParcelError::RecordNotFound(Barcode::from("NOPE"))));
}

#[tokio::test]
async fn failed_write_leaves_record_unchanged() {
    let (service, store) = build_service();
    let original = seed(&store, "P1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    store.fail_writes_for(Barcode::from("P1"));

    let result = service.deliver(&Barcode::from("P1")).await;

    assert!(matches!(result, Err(ParcelError::StoreUnavailable(_))));
    assert_eq!(stored(&store, "P1").await, original);
}

#[tokio::test]
async fn update_with_outdated_expected_state_is_refused() {
    let (service, store) = build_service();
    seed(&store, "P1", "Nico", Tipo::Entrega, Estado::EnDeposito, at(2024, 3, 1, 9)).await;
    let seen = stored(&store, "P1").await;
    let planned = lifecycle::plan(&seen, Trigger::MarkForReturn).expect("mark planned");
    let delivered = service.deliver(&Barcode::from("P1")).await.expect("deliver succeeds");

    match store.update(&Barcode::from("P1"), planned.patch()).await {
        Err(StoreError::StateChanged { expected, found, .. }) => {
            assert_eq!(expected, Estado::EnDeposito);
            assert_eq!(found, Estado::Entregado);
        }
        other => panic!("expected state change, got {other:?}"),
    }
    assert_eq!(stored(&store, "P1").await, delivered);
}
