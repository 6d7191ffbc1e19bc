//! Transition table for a package's `estado`.

use serde::Serialize;

use super::domain::{Barcode, Estado, Package, StampField, Tipo};
use super::store::PackagePatch;

/// Event that moves a package out of its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    DeliverToCustomer,
    MarkForReturn,
    CarrierPickup,
}

impl Trigger {
    pub const fn label(self) -> &'static str {
        match self {
            Trigger::DeliverToCustomer => "deliver-to-customer",
            Trigger::MarkForReturn => "mark-for-return",
            Trigger::CarrierPickup => "carrier-pickup",
        }
    }
}

/// Accepted move with the stamps it must write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub barcode: Barcode,
    pub trigger: Trigger,
    pub from: Estado,
    pub to: Estado,
    pub stamps: &'static [StampField],
}

impl Transition {
    pub fn patch(&self) -> PackagePatch {
        PackagePatch {
            expected_estado: Some(self.from),
            estado: Some(self.to),
            stamps: self.stamps.to_vec(),
            ..PackagePatch::default()
        }
    }
}

/// Trigger fired from a state that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} is not allowed for package {barcode} in state {from}", .trigger.label())]
pub struct InvalidTransition {
    pub barcode: Barcode,
    pub trigger: Trigger,
    pub from: Estado,
    pub tipo: Tipo,
}

const DELIVERED: &[StampField] = &[StampField::EntregadoAt];
const MARKED_FOR_RETURN: &[StampField] = &[StampField::MarcadoDevolucionAt];
const RETURNED_TO_CARRIER: &[StampField] = &[StampField::DevueltoAt, StampField::FechaSalida];
const SHIPPED_WITH_CARRIER: &[StampField] = &[StampField::EntregadoAt, StampField::FechaSalida];

/// Looks up the transition for `trigger` from the package's current state.
pub fn plan(package: &Package, trigger: Trigger) -> Result<Transition, InvalidTransition> {
    let (to, stamps) = match (package.estado, package.tipo, trigger) {
        (Estado::EnDeposito, _, Trigger::DeliverToCustomer) => (Estado::Entregado, DELIVERED),
        (Estado::EnDeposito, _, Trigger::MarkForReturn) => {
            (Estado::PendienteDevolucion, MARKED_FOR_RETURN)
        }
        (Estado::PendienteDevolucion, _, Trigger::CarrierPickup) => {
            (Estado::Devuelto, RETURNED_TO_CARRIER)
        }
        (Estado::EnDeposito, Tipo::Envio, Trigger::CarrierPickup) => {
            (Estado::Entregado, SHIPPED_WITH_CARRIER)
        }
        (from, tipo, trigger) => {
            return Err(InvalidTransition {
                barcode: package.barcode.clone(),
                trigger,
                from,
                tipo,
            })
        }
    };

    Ok(Transition {
        barcode: package.barcode.clone(),
        trigger,
        from: package.estado,
        to,
        stamps,
    })
}

/// Waiting for the carrier: queued returns plus outbound items still here.
pub fn awaits_carrier(package: &Package) -> bool {
    match package.estado {
        Estado::PendienteDevolucion => true,
        Estado::EnDeposito => package.tipo == Tipo::Envio,
        Estado::Entregado | Estado::Devuelto => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn package(estado: Estado, tipo: Tipo) -> Package {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        Package {
            barcode: Barcode::from("PKG1"),
            nombre: Some("Nico Perez".to_string()),
            nombre_lower: "nico perez".to_string(),
            empresa: Default::default(),
            tipo,
            estante: None,
            estado,
            fecha_ingreso: at,
            entregado_at: None,
            devuelto_at: None,
            marcado_devolucion_at: None,
            fecha_salida: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn table_accepts_listed_moves() {
        use Estado::*;
        let cases = [
            (EnDeposito, Tipo::Entrega, Trigger::DeliverToCustomer, Entregado),
            (EnDeposito, Tipo::Envio, Trigger::DeliverToCustomer, Entregado),
            (EnDeposito, Tipo::Entrega, Trigger::MarkForReturn, PendienteDevolucion),
            (PendienteDevolucion, Tipo::Entrega, Trigger::CarrierPickup, Devuelto),
            (EnDeposito, Tipo::Envio, Trigger::CarrierPickup, Entregado),
        ];

        for (from, tipo, trigger, to) in cases {
            let transition = plan(&package(from, tipo), trigger).expect("listed move");
            assert_eq!(transition.from, from);
            assert_eq!(transition.to, to, "{from} via {trigger:?}");
        }
    }

    #[test]
    fn terminal_states_reject_every_trigger() {
        for estado in [Estado::Entregado, Estado::Devuelto] {
            for tipo in Tipo::ALL {
                for trigger in [
                    Trigger::DeliverToCustomer,
                    Trigger::MarkForReturn,
                    Trigger::CarrierPickup,
                ] {
                    let error = plan(&package(estado, tipo), trigger).unwrap_err();
                    assert_eq!(error.from, estado);
                    assert_eq!(error.trigger, trigger);
                }
            }
        }
    }

    #[test]
    fn pending_return_cannot_be_marked_again_or_handed_over() {
        let pending = package(Estado::PendienteDevolucion, Tipo::Entrega);
        assert!(plan(&pending, Trigger::MarkForReturn).is_err());
        assert!(plan(&pending, Trigger::DeliverToCustomer).is_err());
    }

    #[test]
    fn carrier_pickup_of_counter_item_is_rejected() {
        let error = plan(&package(Estado::EnDeposito, Tipo::Entrega), Trigger::CarrierPickup)
            .unwrap_err();
        assert!(error.to_string().contains("carrier-pickup"));
        assert!(error.to_string().contains("EN_DEPOSITO"));
    }

    #[test]
    fn carrier_moves_stamp_departure() {
        let transition = plan(
            &package(Estado::EnDeposito, Tipo::Envio),
            Trigger::CarrierPickup,
        )
        .expect("outbound pickup");
        let patch = transition.patch();
        assert_eq!(patch.expected_estado, Some(Estado::EnDeposito));
        assert_eq!(patch.estado, Some(Estado::Entregado));
        assert!(patch.stamps.contains(&StampField::EntregadoAt));
        assert!(patch.stamps.contains(&StampField::FechaSalida));
    }

    #[test]
    fn awaits_carrier_matches_pending_set() {
        assert!(awaits_carrier(&package(Estado::PendienteDevolucion, Tipo::Entrega)));
        assert!(awaits_carrier(&package(Estado::EnDeposito, Tipo::Envio)));
        assert!(!awaits_carrier(&package(Estado::EnDeposito, Tipo::Entrega)));
        assert!(!awaits_carrier(&package(Estado::Entregado, Tipo::Envio)));
    }
}
