use super::*;

fn gst_5() -> Vec<TaxComponentRate> {
    vec![
        TaxComponentRate {
            code: "CGST".to_string(),
            rate: 2.5,
        },
        TaxComponentRate {
            code: "SGST".to_string(),
            rate: 2.5,
        },
    ]
}

fn line(total: f64, components: Vec<TaxComponentRate>) -> TaxableLine {
    TaxableLine {
        line_total: total,
        components,
    }
}

#[test]
fn tax_is_computed_on_discounted_amount_not_gross() {
    // Historical scenario: subtotal 846.00, 10% discount 84.60.
    let bill = compute_bill(
        &[line(846.0, gst_5())],
        84.60,
        None,
        ExtraCharges::default(),
        false,
    );

    assert_eq!(bill.subtotal, 846.0);
    assert_eq!(bill.taxable_amount, 761.40);
    // 5% of 761.40 = 38.07; per-component rounding may shift by a paisa.
    assert!((bill.tax_total - 38.07).abs() < 0.5, "tax = {}", bill.tax_total);
    // Never 5% of the gross 846.00 (= 42.30).
    assert!((bill.tax_total - 42.30).abs() > 1.0);
    assert_eq!(bill.grand_total, 799.0);
    assert!(bill.round_off < 0.0);
}

#[test]
fn rounding_identity_holds_exactly() {
    for (subtotal, discount) in [(846.0, 84.60), (101.37, 0.0), (55.55, 5.55), (999.99, 100.0)] {
        let bill = compute_bill(
            &[line(subtotal, gst_5())],
            discount,
            None,
            ExtraCharges::default(),
            false,
        );
        let reconstructed = to_f64(to_decimal(bill.grand_total) - to_decimal(bill.round_off));
        assert_eq!(reconstructed, bill.pre_round_total);
        assert_eq!(bill.grand_total.fract(), 0.0, "grand total must be integral");
    }
}

#[test]
fn breakup_is_keyed_by_component_code() {
    let bill = compute_bill(
        &[line(200.0, gst_5()), line(100.0, gst_5())],
        0.0,
        None,
        ExtraCharges::default(),
        false,
    );

    assert_eq!(bill.breakup.len(), 2);
    let cgst = &bill.breakup["CGST"];
    assert_eq!(cgst.rate, 2.5);
    assert_eq!(cgst.taxable_amount, 300.0);
    assert_eq!(cgst.tax_amount, 7.5);
    assert_eq!(bill.breakup["SGST"].tax_amount, 7.5);
    assert_eq!(bill.tax_total, 15.0);
}

#[test]
fn interstate_collapses_components_into_igst() {
    let bill = compute_bill(
        &[line(300.0, gst_5())],
        0.0,
        None,
        ExtraCharges::default(),
        true,
    );

    assert_eq!(bill.breakup.len(), 1);
    let igst = &bill.breakup["IGST"];
    assert_eq!(igst.rate, 5.0);
    assert_eq!(igst.tax_amount, 15.0);
    assert_eq!(bill.tax_total, 15.0);
}

#[test]
fn missing_tax_detail_degrades_to_zero_tax() {
    let bill = compute_bill(
        &[line(120.0, Vec::new()), line(80.0, gst_5())],
        0.0,
        None,
        ExtraCharges::default(),
        false,
    );

    assert_eq!(bill.line_taxes[0], 0.0);
    assert_eq!(bill.line_taxes[1], 4.0);
    assert_eq!(bill.tax_total, 4.0);
}

#[test]
fn service_charge_applies_on_taxable_amount() {
    let rule = ServiceChargeRule {
        basis: ChargeBasis::Percentage(10.0),
        tax: ChargeTaxTreatment::Exempt,
    };
    let bill = compute_bill(
        &[line(500.0, gst_5())],
        100.0,
        Some(&rule),
        ExtraCharges::default(),
        false,
    );

    // 10% of the discounted 400.00, not of the gross 500.00.
    assert_eq!(bill.service_charge, 40.0);
    assert_eq!(bill.tax_total, 20.0);
    assert_eq!(bill.pre_round_total, 460.0);
    assert_eq!(bill.grand_total, 460.0);
}

#[test]
fn taxed_service_charge_folds_into_breakup() {
    let rule = ServiceChargeRule {
        basis: ChargeBasis::Flat(50.0),
        tax: ChargeTaxTreatment::Taxed {
            components: vec![TaxComponentRate {
                code: "CGST".to_string(),
                rate: 9.0,
            }],
        },
    };
    let bill = compute_bill(
        &[line(100.0, Vec::new())],
        0.0,
        Some(&rule),
        ExtraCharges::default(),
        false,
    );

    assert_eq!(bill.service_charge, 50.0);
    assert_eq!(bill.breakup["CGST"].tax_amount, 4.5);
    assert_eq!(bill.tax_total, 4.5);
    assert_eq!(bill.pre_round_total, 154.5);
    assert_eq!(bill.grand_total, 155.0);
    assert_eq!(bill.round_off, 0.5);
}

#[test]
fn packaging_and_delivery_are_added_after_tax() {
    let bill = compute_bill(
        &[line(100.0, gst_5())],
        0.0,
        None,
        ExtraCharges {
            packaging: 10.0,
            delivery: 30.0,
        },
        false,
    );

    assert_eq!(bill.tax_total, 5.0);
    assert_eq!(bill.pre_round_total, 145.0);
    assert_eq!(bill.grand_total, 145.0);
}

#[test]
fn discount_exceeding_subtotal_clamps_taxable_to_zero() {
    let bill = compute_bill(
        &[line(50.0, gst_5())],
        80.0,
        None,
        ExtraCharges::default(),
        false,
    );

    assert_eq!(bill.taxable_amount, 0.0);
    assert_eq!(bill.tax_total, 0.0);
    assert_eq!(bill.grand_total, 0.0);
}

#[test]
fn empty_order_is_all_zeroes() {
    let bill = compute_bill(&[], 0.0, None, ExtraCharges::default(), false);
    assert_eq!(bill.subtotal, 0.0);
    assert_eq!(bill.grand_total, 0.0);
    assert!(bill.breakup.is_empty());
}

#[test]
fn negative_round_off_when_rounding_down() {
    // 761.40 + 38.08 = 799.48 → 799, round-off -0.48.
    let bill = compute_bill(
        &[line(846.0, gst_5())],
        84.60,
        None,
        ExtraCharges::default(),
        false,
    );
    assert_eq!(bill.grand_total, 799.0);
    assert_eq!(bill.round_off, -0.48);
}
