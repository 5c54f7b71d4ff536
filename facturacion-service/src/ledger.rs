//! Invoice balance reconciliation.
//!
//! Every write path (single create, single update, bulk validation and bulk
//! commit) derives `por_cobrar` and `estatus` through [`reconcile`]; nothing
//! else computes them.

use crate::models::InvoiceStatus;
use rust_decimal::Decimal;

/// Outstanding balance at or below which an invoice counts as paid.
///
/// `por_cobrar` is already clamped at zero, so an invoice is `Pagada` exactly
/// when payments plus credit note cover the total.
pub const PAID_THRESHOLD: Decimal = Decimal::ZERO;

/// Scale used for every derived money value.
pub const MONEY_SCALE: u32 = 2;

/// Amounts applied against an invoice total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Payments {
    pub pago1: Decimal,
    pub pago2: Decimal,
    pub pago3: Decimal,
    pub nc: Decimal,
}

impl Payments {
    pub fn new(pago1: Decimal, pago2: Decimal, pago3: Decimal, nc: Decimal) -> Self {
        Self {
            pago1,
            pago2,
            pago3,
            nc,
        }
    }

    /// Builds payments from optional slots, treating absent slots as zero.
    pub fn from_optional(
        pago1: Option<Decimal>,
        pago2: Option<Decimal>,
        pago3: Option<Decimal>,
        nc: Option<Decimal>,
    ) -> Self {
        Self::new(
            pago1.unwrap_or_default(),
            pago2.unwrap_or_default(),
            pago3.unwrap_or_default(),
            nc.unwrap_or_default(),
        )
    }

    /// Sum of the three payment slots and the credit note.
    pub fn applied(&self) -> Decimal {
        self.pago1 + self.pago2 + self.pago3 + self.nc
    }
}

/// Derived state of an invoice balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub por_cobrar: Decimal,
    pub estatus: InvoiceStatus,
    /// Amount applied beyond the total. Not persisted; `por_cobrar` stays clamped at zero.
    pub excedente: Decimal,
}

impl Settlement {
    pub fn is_overpaid(&self) -> bool {
        self.excedente > Decimal::ZERO
    }
}

fn money(value: Decimal) -> Decimal {
    let mut value = value;
    value.rescale(MONEY_SCALE);
    value
}

/// Computes `por_cobrar = max(0, total - applied)` and the matching status.
pub fn reconcile(total: Decimal, payments: &Payments) -> Settlement {
    let remaining = total - payments.applied();
    let por_cobrar = money(remaining.max(Decimal::ZERO));
    let excedente = money((-remaining).max(Decimal::ZERO));

    let estatus = if por_cobrar <= PAID_THRESHOLD {
        InvoiceStatus::Pagada
    } else {
        InvoiceStatus::Pendiente
    };

    Settlement {
        por_cobrar,
        estatus,
        excedente,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn partial_payment_leaves_balance_pending() {
        let payments = Payments::new(d("10000"), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        let settlement = reconcile(d("25000.50"), &payments);

        assert_eq!(settlement.por_cobrar, d("15000.50"));
        assert_eq!(settlement.estatus, InvoiceStatus::Pendiente);
        assert!(!settlement.is_overpaid());
    }

    #[test]
    fn exact_payment_settles_invoice() {
        let payments = Payments::from_optional(Some(d("8500.25")), None, None, None);
        let settlement = reconcile(d("8500.25"), &payments);

        assert_eq!(settlement.por_cobrar, Decimal::ZERO);
        assert_eq!(settlement.por_cobrar.to_string(), "0.00");
        assert_eq!(settlement.estatus, InvoiceStatus::Pagada);
    }

    #[test]
    fn one_centavo_outstanding_is_still_pending() {
        let payments = Payments::new(d("99.99"), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        let settlement = reconcile(d("100.00"), &payments);

        assert_eq!(settlement.por_cobrar, d("0.01"));
        assert_eq!(settlement.estatus, InvoiceStatus::Pendiente);
    }

    #[test]
    fn overpayment_clamps_balance_and_reports_excess() {
        let payments = Payments::new(d("600"), d("300"), d("200"), d("50"));
        let settlement = reconcile(d("1000"), &payments);

        assert_eq!(settlement.por_cobrar, Decimal::ZERO);
        assert_eq!(settlement.estatus, InvoiceStatus::Pagada);
        assert_eq!(settlement.excedente, d("150"));
        assert!(settlement.is_overpaid());
    }

    #[test]
    fn credit_note_counts_towards_balance() {
        let payments = Payments::new(d("400"), d("100"), Decimal::ZERO, d("500"));
        let settlement = reconcile(d("1000"), &payments);

        assert_eq!(settlement.estatus, InvoiceStatus::Pagada);
    }

    #[test]
    fn zero_total_is_paid() {
        let settlement = reconcile(Decimal::ZERO, &Payments::default());
        assert_eq!(settlement.estatus, InvoiceStatus::Pagada);
    }

    #[test]
    fn invariant_holds_across_sample_grid() {
        let totals = ["0", "0.01", "99.99", "1500", "25000.50", "1000000.00"];
        let amounts = ["0", "0.01", "33.33", "500", "1500", "25000.50"];

        for total in totals {
            for pago1 in amounts {
                for nc in amounts {
                    let payments = Payments::new(d(pago1), d("0.5"), Decimal::ZERO, d(nc));
                    let settlement = reconcile(d(total), &payments);

                    let expected = (d(total) - payments.applied()).max(Decimal::ZERO);
                    assert_eq!(
                        settlement.por_cobrar, expected,
                        "total={total} pago1={pago1} nc={nc}"
                    );
                    assert_eq!(
                        settlement.estatus == InvoiceStatus::Pagada,
                        settlement.por_cobrar <= PAID_THRESHOLD
                    );
                    assert!(settlement.por_cobrar >= Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn reconciling_twice_is_stable() {
        let payments = Payments::new(d("1200.10"), d("300"), Decimal::ZERO, d("0.40"));
        let first = reconcile(d("2000"), &payments);
        let second = reconcile(d("2000"), &payments);
        assert_eq!(first, second);

        // A settled balance fed back in as the new total stays settled.
        let full = Payments::from_optional(Some(d("1500.50")), None, None, None);
        let paid = reconcile(d("1500.50"), &full);
        assert_eq!(paid.estatus, InvoiceStatus::Pagada);
        let again = reconcile(paid.por_cobrar, &Payments::default());
        assert_eq!(again.estatus, InvoiceStatus::Pagada);
        assert_eq!(again.por_cobrar, paid.por_cobrar);
    }
}
