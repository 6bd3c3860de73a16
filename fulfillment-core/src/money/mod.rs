//! Money calculation using rust_decimal for precision.
//!
//! Pure functions over an order snapshot: given the active (non-cancelled)
//! lines with their recorded tax component rates, the discount total and the
//! outlet charge rules, produce the per-component tax breakup and the five
//! monetary totals. All arithmetic runs in `Decimal`; results convert to
//! `f64` rounded to 2 decimal places for storage.
//!
//! Tax is always computed on each line's share of the **discounted** taxable
//! amount, never on the gross subtotal.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;

use crate::config::{ChargeBasis, ChargeTaxTreatment, ServiceChargeRule};
use shared::models::{TaxComponentBreakup, TaxComponentRate};

#[cfg(test)]
mod tests;

/// Rounding for monetary values (2 decimal places, half-up).
const DECIMAL_PLACES: u32 = 2;

/// Convert f64 to Decimal for calculation.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places.
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

#[inline]
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// One active line feeding the bill: its total and recorded component rates.
/// An empty component list degrades to zero tax for the line.
#[derive(Debug, Clone, Default)]
pub struct TaxableLine {
    pub line_total: f64,
    pub components: Vec<TaxComponentRate>,
}

/// Pass-through charges added after tax.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtraCharges {
    pub packaging: f64,
    pub delivery: f64,
}

/// Full bill computation output.
///
/// `grand_total` is an integer currency amount (nearest-integer rounding of
/// `pre_round_total`); `round_off` is the signed difference, so
/// `grand_total - round_off == pre_round_total` exactly.
#[derive(Debug, Clone, Default)]
pub struct BillBreakdown {
    pub subtotal: f64,
    pub discount_total: f64,
    pub taxable_amount: f64,
    /// Keyed by tax-component code (`CGST`, `SGST`, `IGST`, ...).
    pub breakup: BTreeMap<String, TaxComponentBreakup>,
    pub tax_total: f64,
    pub service_charge: f64,
    pub packaging_charge: f64,
    pub delivery_charge: f64,
    pub pre_round_total: f64,
    pub grand_total: f64,
    pub round_off: f64,
    /// Tax amount per input line, in input order (written back onto items).
    pub line_taxes: Vec<f64>,
}

/// Compute the bill for a set of active lines.
///
/// `service_charge` is the outlet rule already filtered for applicability —
/// callers pass `None` for non-dine-in orders and for split invoices. When
/// `interstate` is set, each line's split components collapse into a single
/// `IGST` entry at the summed rate.
///
/// Never fails: malformed input degrades (missing tax detail → zero tax for
/// that line; discount larger than the subtotal → zero taxable amount).
pub fn compute_bill(
    lines: &[TaxableLine],
    discount_total: f64,
    service_charge: Option<&ServiceChargeRule>,
    charges: ExtraCharges,
    interstate: bool,
) -> BillBreakdown {
    let mut subtotal = Decimal::ZERO;
    for line in lines {
        subtotal += round2(to_decimal(line.line_total));
    }

    let discount = round2(to_decimal(discount_total));
    let taxable = (subtotal - discount).max(Decimal::ZERO);

    // Each line is taxed on its share of the discounted taxable amount.
    let scale = if subtotal > Decimal::ZERO {
        taxable / subtotal
    } else {
        Decimal::ZERO
    };

    let mut breakup: BTreeMap<String, TaxComponentBreakup> = BTreeMap::new();
    let mut tax_total = Decimal::ZERO;
    let mut line_taxes = Vec::with_capacity(lines.len());

    for line in lines {
        let line_taxable = round2(to_decimal(line.line_total) * scale);
        let mut line_tax = Decimal::ZERO;

        let components: Vec<TaxComponentRate> = if interstate && !line.components.is_empty() {
            let summed: f64 = line.components.iter().map(|c| c.rate).sum();
            vec![TaxComponentRate {
                code: "IGST".to_string(),
                rate: summed,
            }]
        } else {
            line.components.clone()
        };

        for component in &components {
            let rate = to_decimal(component.rate);
            if rate <= Decimal::ZERO {
                continue;
            }
            let amount = round2(line_taxable * rate / Decimal::ONE_HUNDRED);
            line_tax += amount;
            tax_total += amount;

            let entry = breakup.entry(component.code.clone()).or_insert_with(|| {
                TaxComponentBreakup {
                    rate: component.rate,
                    ..Default::default()
                }
            });
            entry.taxable_amount = to_f64(to_decimal(entry.taxable_amount) + line_taxable);
            entry.tax_amount = to_f64(to_decimal(entry.tax_amount) + amount);
        }
        line_taxes.push(to_f64(line_tax));
    }

    // Service charge on the taxable amount; its own tax treatment is an
    // outlet rule, folded into the same breakup.
    let mut service = Decimal::ZERO;
    if let Some(rule) = service_charge {
        service = match rule.basis {
            ChargeBasis::Percentage(pct) => {
                round2(taxable * to_decimal(pct) / Decimal::ONE_HUNDRED)
            }
            ChargeBasis::Flat(value) => round2(to_decimal(value)),
        };
        if let ChargeTaxTreatment::Taxed { components } = &rule.tax {
            for component in components {
                let rate = to_decimal(component.rate);
                if rate <= Decimal::ZERO {
                    continue;
                }
                let amount = round2(service * rate / Decimal::ONE_HUNDRED);
                tax_total += amount;
                let entry = breakup.entry(component.code.clone()).or_insert_with(|| {
                    TaxComponentBreakup {
                        rate: component.rate,
                        ..Default::default()
                    }
                });
                entry.taxable_amount = to_f64(to_decimal(entry.taxable_amount) + service);
                entry.tax_amount = to_f64(to_decimal(entry.tax_amount) + amount);
            }
        }
    }

    let packaging = round2(to_decimal(charges.packaging));
    let delivery = round2(to_decimal(charges.delivery));

    let pre_round = round2(taxable + tax_total + service + packaging + delivery);
    let grand = pre_round.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let round_off = round2(grand - pre_round);

    BillBreakdown {
        subtotal: to_f64(subtotal),
        discount_total: to_f64(discount),
        taxable_amount: to_f64(taxable),
        breakup,
        tax_total: to_f64(tax_total),
        service_charge: to_f64(service),
        packaging_charge: to_f64(packaging),
        delivery_charge: to_f64(delivery),
        pre_round_total: to_f64(pre_round),
        grand_total: to_f64(grand),
        round_off: to_f64(round_off),
        line_taxes,
    }
}
