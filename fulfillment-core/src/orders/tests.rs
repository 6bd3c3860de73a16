use super::*;
use crate::error::CoreError;
use crate::pricing::ItemSelection;
use crate::testutil::*;

use shared::models::{InvoiceStatus, OrderItemStatus};

#[test]
fn create_dine_in_order_opens_session() {
    let (engine, _rx) = test_engine(standard_menu());

    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("ORD"));
    assert!(order.order_number.ends_with("-0001"));
    assert!(order.session_id.is_some());

    let session = engine
        .storage()
        .open_session_for_table("t1")
        .unwrap()
        .expect("session should be open");
    assert_eq!(session.opened_by, "u-owner");
    assert_eq!(session.order_id.as_deref(), Some(order.id.as_str()));
}

#[test]
fn order_numbers_increment_within_the_day() {
    let (engine, _rx) = test_engine(standard_menu());

    let first = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::takeaway())
        .unwrap();
    let second = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::takeaway())
        .unwrap();

    assert!(first.order_number.ends_with("-0001"));
    assert!(second.order_number.ends_with("-0002"));
}

#[test]
fn create_order_on_occupied_table_is_rejected() {
    let (engine, _rx) = test_engine(standard_menu());
    engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();

    // The owner cannot double-book their own table.
    let err = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap_err();
    assert!(matches!(err, CoreError::TargetUnavailable(t) if t == "t1"));

    // A non-owner fails the ownership check first.
    let err = engine
        .orders
        .create_order(&stranger(), CreateOrderRequest::dine_in("t1"))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotSessionOwner { .. }));
}

#[test]
fn add_items_prices_lines_and_recomputes_totals() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();

    let items = engine
        .orders
        .add_items(
            &order.id,
            &owner(),
            vec![ItemSelection::new("dal-makhani", 2)],
        )
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, OrderItemStatus::Pending);

    let order = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order.subtotal, 500.0);
    assert_eq!(order.taxable_amount, 500.0);
    assert_eq!(order.tax_total, 25.0); // 5% GST
    assert_eq!(order.grand_total, 525.0);
    assert_eq!(order.round_off, 0.0);
}

#[test]
fn non_owner_cannot_mutate_a_dine_in_order() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();

    let err = engine
        .orders
        .add_items(
            &order.id,
            &stranger(),
            vec![ItemSelection::new("dal-makhani", 1)],
        )
        .unwrap_err();
    match err {
        CoreError::NotSessionOwner {
            owner_id,
            owner_name,
        } => {
            assert_eq!(owner_id, "u-owner");
            assert_eq!(owner_name, "Asha");
        }
        other => panic!("expected NotSessionOwner, got {other:?}"),
    }

    // The owner and a privileged role both succeed.
    engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 1)])
        .unwrap();
    engine
        .orders
        .add_items(&order.id, &manager(), vec![ItemSelection::new("mojito", 1)])
        .unwrap();
}

#[test]
fn items_cannot_be_added_once_billed() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 1)])
        .unwrap();
    engine.billing.generate_bill(&order.id, &owner()).unwrap();

    let err = engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("mojito", 1)])
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidStateTransition { current, .. } if current == "BILLED"
    ));
}

#[test]
fn quantity_edit_is_bounded_by_pending_status() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    let items = engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 1)])
        .unwrap();

    // Still pending: edit allowed, totals follow.
    engine
        .orders
        .update_item_quantity(&order.id, &items[0].id, 3, &owner())
        .unwrap();
    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.subtotal, 750.0);

    // Sent to kitchen: edit rejected, cancel-and-re-add is the only path.
    engine.tickets.create_tickets(&order.id, &owner(), false).unwrap();
    let err = engine
        .orders
        .update_item_quantity(&order.id, &items[0].id, 5, &owner())
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidStateTransition { current, .. } if current == "SENT_TO_KITCHEN"
    ));
}

#[test]
fn cancelling_a_pending_item_is_a_pure_item_update() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    let items = engine
        .orders
        .add_items(
            &order.id,
            &owner(),
            vec![
                ItemSelection::new("dal-makhani", 1),
                ItemSelection::new("mojito", 2),
            ],
        )
        .unwrap();

    let dal = items.iter().find(|i| i.menu_item_id == "dal-makhani").unwrap();
    engine
        .orders
        .cancel_item(&order.id, &dal.id, &owner(), CancelItemRequest::full())
        .unwrap();

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.subtotal, 360.0); // only the mojitos remain
    assert!(engine.storage().tickets_for_order(&order.id).unwrap().is_empty());
}

#[test]
fn partial_cancellation_reduces_quantity() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    let items = engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 3)])
        .unwrap();

    let item = engine
        .orders
        .cancel_item(
            &order.id,
            &items[0].id,
            &owner(),
            CancelItemRequest::partial(1),
        )
        .unwrap();
    assert_eq!(item.quantity, 2);
    assert_eq!(item.status, OrderItemStatus::Pending);

    let order_row = engine.storage().get_order(&order.id).unwrap().unwrap();
    assert_eq!(order_row.subtotal, 500.0);
}

#[test]
fn cancelling_prepared_work_requires_an_approver() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    let items = engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 1)])
        .unwrap();
    let tickets = engine.tickets.create_tickets(&order.id, &owner(), false).unwrap();
    engine.tickets.accept_ticket(&tickets[0].id).unwrap();
    engine.tickets.start_preparing(&tickets[0].id).unwrap();

    let err = engine
        .orders
        .cancel_item(&order.id, &items[0].id, &owner(), CancelItemRequest::full())
        .unwrap_err();
    assert!(matches!(err, CoreError::ApprovalRequired { .. }));

    engine
        .orders
        .cancel_item(
            &order.id,
            &items[0].id,
            &owner(),
            CancelItemRequest::full().with_approval(manager()),
        )
        .unwrap();
}

#[test]
fn order_cancellation_cascades_in_one_transaction() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    engine
        .orders
        .add_items(
            &order.id,
            &owner(),
            vec![
                ItemSelection::new("paneer-tikka", 1),
                ItemSelection::new("mojito", 2),
            ],
        )
        .unwrap();
    let tickets = engine.tickets.create_tickets(&order.id, &owner(), false).unwrap();
    assert_eq!(tickets.len(), 2);
    let invoice = engine.billing.generate_bill(&order.id, &owner()).unwrap();

    engine
        .orders
        .cancel_order(
            &order.id,
            &owner(),
            CancelOrderRequest {
                reason: Some("guest left".to_string()),
                approved_by: Some(manager()),
            },
        )
        .unwrap();

    let detail = engine.order_detail(&order.id).unwrap();
    assert_eq!(detail.order.status, OrderStatus::Cancelled);
    assert!(detail
        .items
        .iter()
        .all(|i| i.status == OrderItemStatus::Cancelled));
    assert!(detail
        .tickets
        .iter()
        .all(|t| t.status == TicketStatus::Cancelled));
    assert!(detail
        .tickets
        .iter()
        .flat_map(|t| t.items.iter())
        .all(|i| i.status == shared::models::KotItemStatus::Cancelled));
    let cancelled_invoice = detail
        .invoices
        .iter()
        .find(|i| i.id == invoice.id)
        .unwrap();
    assert_eq!(cancelled_invoice.status, InvoiceStatus::Cancelled);

    // The table is released and can be taken by anyone.
    assert!(engine.storage().open_session_for_table("t1").unwrap().is_none());
    engine
        .orders
        .create_order(&stranger(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
}

#[test]
fn transfer_rejects_an_occupied_destination() {
    let (engine, _rx) = test_engine(standard_menu());
    let order_a = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    engine
        .orders
        .create_order(&stranger(), CreateOrderRequest::dine_in("t2"))
        .unwrap();

    let err = engine
        .orders
        .transfer_table(&order_a.id, "t2", &owner())
        .unwrap_err();
    assert!(matches!(err, CoreError::TargetUnavailable(t) if t == "t2"));
}

#[test]
fn transfer_moves_the_session_and_keeps_its_owner() {
    let (engine, _rx) = test_engine(standard_menu());
    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();

    let moved = engine
        .orders
        .transfer_table(&order.id, "t5", &owner())
        .unwrap();
    assert_eq!(moved.table_id.as_deref(), Some("t5"));

    assert!(engine.storage().open_session_for_table("t1").unwrap().is_none());
    let session = engine
        .storage()
        .open_session_for_table("t5")
        .unwrap()
        .unwrap();
    assert_eq!(session.opened_by, "u-owner");

    // Ownership still bites on the new table.
    let err = engine
        .orders
        .add_items(&moved.id, &stranger(), vec![ItemSelection::new("mojito", 1)])
        .unwrap_err();
    assert!(matches!(err, CoreError::NotSessionOwner { .. }));
}

#[test]
fn notifications_are_published_after_commit() {
    let (engine, _rx) = test_engine(standard_menu());
    let mut events = engine.subscribe();

    let order = engine
        .orders
        .create_order(&owner(), CreateOrderRequest::dine_in("t1"))
        .unwrap();
    engine
        .orders
        .add_items(&order.id, &owner(), vec![ItemSelection::new("dal-makhani", 1)])
        .unwrap();

    let created = events.try_recv().unwrap();
    assert!(matches!(
        created.payload,
        NotificationPayload::OrderCreated { ref order_id } if *order_id == order.id
    ));
    let added = events.try_recv().unwrap();
    assert!(matches!(
        added.payload,
        NotificationPayload::OrderItemsAdded { ref item_ids, .. } if item_ids.len() == 1
    ));
}
