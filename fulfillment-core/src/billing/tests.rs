use super::*;
use crate::config::{ChargeBasis, ChargeTaxTreatment, OutletConfig, ServiceChargeRule};
use crate::error::CoreError;
use crate::orders::CreateOrderRequest;
use crate::pricing::ItemSelection;
use crate::testutil::*;

use shared::models::StationKind;

fn billed_menu() -> StubMenu {
    standard_menu().with_item("thali", 846.0, Some(station("grill", StationKind::Kitchen)))
}

fn order_with(
    engine: &crate::engine::Engine,
    selections: Vec<ItemSelection>,
) -> shared::models::Order {
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    engine.orders.add_items(&order.id, &owner(), selections).unwrap();
    order
}

#[test]
fn generate_bill_is_idempotent() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 2)]);

    let first = engine.billing.generate_bill(&order.id, &owner()).unwrap();
    let second = engine.billing.generate_bill(&order.id, &owner()).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.invoice_number, second.invoice_number);
    assert_eq!(engine.storage().invoices_for_order(&order.id).unwrap().len(), 1);

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Billed);
}

#[test]
fn invoice_freezes_tax_on_the_discounted_amount() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("thali", 1)]);

    engine
        .billing
        .apply_discount(
            &order.id,
            &manager(),
            DiscountRequest {
                scope: DiscountScope::Order,
                value: DiscountValue::Percentage(10.0),
                label: Some("regular".to_string()),
            },
        )
        .unwrap();

    let invoice = engine.billing.generate_bill(&order.id, &owner()).unwrap();
    assert_eq!(invoice.subtotal, 846.0);
    assert_eq!(invoice.discount_total, 84.60);
    assert_eq!(invoice.taxable_amount, 761.40);
    assert!((invoice.tax_total - 38.07).abs() < 0.5);
    assert_eq!(invoice.grand_total, 799.0);
    assert_eq!(invoice.round_off, -0.48);
    assert_eq!(
        invoice.amount_in_words,
        "Rupees Seven Hundred Ninety Nine Only"
    );

    let cgst = &invoice.tax_breakup["CGST"];
    assert_eq!(cgst.rate, 2.5);
    assert_eq!(cgst.taxable_amount, 761.40);
}

#[test]
fn discounts_are_rejected_after_billing() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 1)]);
    engine.billing.generate_bill(&order.id, &owner()).unwrap();

    let err = engine
        .billing
        .apply_discount(
            &order.id,
            &manager(),
            DiscountRequest {
                scope: DiscountScope::Order,
                value: DiscountValue::Flat(50.0),
                label: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
}

#[test]
fn item_scoped_percentage_uses_the_line_total() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(
        &engine,
        vec![
            ItemSelection::new("dal-makhani", 2), // 500.00
            ItemSelection::new("mojito", 1),      // 180.00
        ],
    );
    let items = engine.storage().items_for_order(&order.id).unwrap();
    let dal = items.iter().find(|i| i.menu_item_id == "dal-makhani").unwrap();

    let discount = engine
        .billing
        .apply_discount(
            &order.id,
            &manager(),
            DiscountRequest {
                scope: DiscountScope::Item {
                    item_id: dal.id.clone(),
                },
                value: DiscountValue::Percentage(20.0),
                label: None,
            },
        )
        .unwrap();
    assert_eq!(discount.amount, 100.0);

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.discount_total, 100.0);
    assert_eq!(order_row.taxable_amount, 580.0);
    assert_eq!(order_row.tax_total, 29.0);
}

#[test]
fn dine_in_service_charge_lands_on_the_bill() {
    let config = OutletConfig::default().with_service_charge(ServiceChargeRule {
        basis: ChargeBasis::Percentage(10.0),
        tax: ChargeTaxTreatment::Exempt,
    });
    let (engine, _rx) = test_engine_with(config, billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 2)]);

    let invoice = engine.billing.generate_bill(&order.id, &owner()).unwrap();
    assert_eq!(invoice.service_charge, 50.0);
    assert_eq!(invoice.tax_total, 25.0);
    assert_eq!(invoice.grand_total, 575.0);
}

#[test]
fn split_bills_cover_their_subsets_without_service_charge() {
    let config = OutletConfig::default().with_service_charge(ServiceChargeRule {
        basis: ChargeBasis::Percentage(10.0),
        tax: ChargeTaxTreatment::Exempt,
    });
    let (engine, _rx) = test_engine_with(config, billed_menu());
    let order = order_with(
        &engine,
        vec![
            ItemSelection::new("dal-makhani", 2), // 500.00
            ItemSelection::new("mojito", 2),      // 360.00
        ],
    );
    let items = engine.storage().items_for_order(&order.id).unwrap();
    let dal = items.iter().find(|i| i.menu_item_id == "dal-makhani").unwrap();
    let mojito = items.iter().find(|i| i.menu_item_id == "mojito").unwrap();

    let invoices = engine
        .billing
        .split_bill(
            &order.id,
            &owner(),
            vec![vec![dal.id.clone()], vec![mojito.id.clone()]],
        )
        .unwrap();
    assert_eq!(invoices.len(), 2);

    let dal_invoice = invoices
        .iter()
        .find(|i| i.split_item_ids.as_ref().unwrap().contains(&dal.id))
        .unwrap();
    assert_eq!(dal_invoice.subtotal, 500.0);
    assert_eq!(dal_invoice.tax_total, 25.0);
    assert_eq!(dal_invoice.service_charge, 0.0, "splits carry no service charge");
    assert_eq!(dal_invoice.grand_total, 525.0);

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Billed);
}

#[test]
fn split_rejects_items_in_two_groups() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 1)]);
    let items = engine.storage().items_for_order(&order.id).unwrap();

    let err = engine
        .billing
        .split_bill(
            &order.id,
            &owner(),
            vec![vec![items[0].id.clone()], vec![items[0].id.clone()]],
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation(_)));
}

#[test]
fn cancel_invoice_reverts_the_order_to_served() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 1)]);
    let invoice = engine.billing.generate_bill(&order.id, &owner()).unwrap();

    let cancelled = engine.billing.cancel_invoice(&invoice.id).unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Served);

    // A fresh bill gets a fresh invoice row — at most one is non-cancelled.
    let fresh = engine.billing.generate_bill(&order.id, &owner()).unwrap();
    assert_ne!(fresh.id, invoice.id);
    let live = engine
        .storage()
        .invoices_for_order(&order.id)
        .unwrap()
        .into_iter()
        .filter(|i| i.is_active())
        .count();
    assert_eq!(live, 1);
}

#[test]
fn settlement_closes_the_financial_record_and_the_table() {
    let (engine, _rx) = test_engine(billed_menu());
    let order = order_with(&engine, vec![ItemSelection::new("dal-makhani", 1)]);
    let invoice = engine.billing.generate_bill(&order.id, &owner()).unwrap();

    let paid = engine
        .billing
        .settle_invoice(&invoice.id, &manager(), "UPI")
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.payment.as_ref().unwrap().method, "UPI");

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.status, OrderStatus::Paid);
    assert!(engine.storage().open_session_for_table("t1").unwrap().is_none());

    // Closed financial records reject further billing operations.
    let err = engine.billing.settle_invoice(&invoice.id, &manager(), "CASH").unwrap_err();
    assert!(matches!(err, CoreError::InvoicePaid(_)));
    let err = engine.billing.cancel_invoice(&invoice.id).unwrap_err();
    assert!(matches!(err, CoreError::InvoicePaid(_)));
    let err = engine.billing.generate_bill(&order.id, &owner()).unwrap_err();
    assert!(matches!(err, CoreError::OrderAlreadyPaid(_)));
}

#[test]
fn invoice_numbers_are_scoped_to_the_year() {
    let (engine, _rx) = test_engine(billed_menu());
    let order_a = order_with(&engine, vec![ItemSelection::new("dal-makhani", 1)]);
    let a = engine.billing.generate_bill(&order_a.id, &owner()).unwrap();

    let order_b = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::takeaway())
        .unwrap();
    engine
        .orders
        .add_items(&order_b.id, &owner(), vec![ItemSelection::new("mojito", 1)])
        .unwrap();
    let b = engine.billing.generate_bill(&order_b.id, &owner()).unwrap();

    assert!(a.invoice_number.starts_with("INV"));
    assert!(a.invoice_number.ends_with("-00001"));
    assert!(b.invoice_number.ends_with("-00002"));
}
