mod common;

use common::TestHarness;
use rust_decimal_macros::dec;
use sourcing_api::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    services::purchase_orders::{
        AddOrderItemRequest, GeneratePurchaseOrderRequest, OrderWithItems,
        UpdateOrderItemRequest, UpdateOrderRequest,
    },
};
use uuid::Uuid;

/// Runs the whole settlement pipeline for one item (quantity 10) at the
/// given winning price and returns the materialized order.
async fn settled_order(h: &TestHarness, price: rust_decimal::Decimal) -> OrderWithItems {
    let (quote, items) = h.open_quote(1).await;
    let supplier = Uuid::new_v4();
    let inv = h.invite(quote.id, supplier).await;
    h.bid(&inv.public_token, items[0].id, price).await;
    h.services
        .winners
        .auto_select_winners(h.tenant_id, quote.id)
        .await
        .expect("auto-select");
    h.services
        .quotes
        .close_quote(h.tenant_id, quote.id)
        .await
        .expect("close");
    h.services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            supplier,
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect("generate order")
}

/// total_amount == Σ line totals + tax + shipping after every edit.
#[tokio::test]
async fn totals_follow_every_item_edit() {
    let h = TestHarness::new().await;
    let generated = settled_order(&h, dec!(4.50)).await;
    let order_id = generated.order.id;
    assert_eq!(generated.order.subtotal, dec!(45.00));

    let with_extra = h
        .services
        .purchase_orders
        .add_item(
            h.tenant_id,
            order_id,
            AddOrderItemRequest {
                product_id: Uuid::new_v4(),
                package_id: None,
                description: Some("Pallet wrap".to_string()),
                quantity: 2,
                unit_price: dec!(10.00),
            },
        )
        .await
        .expect("add line");
    assert_eq!(with_extra.order.subtotal, dec!(65.00));
    assert_eq!(with_extra.order.total_amount, dec!(65.00));

    let updated = h
        .services
        .purchase_orders
        .update_order(
            h.tenant_id,
            order_id,
            UpdateOrderRequest {
                tax_amount: Some(dec!(6.50)),
                shipping_cost: Some(dec!(12.00)),
                ..Default::default()
            },
        )
        .await
        .expect("set surcharges");
    assert_eq!(updated.subtotal, dec!(65.00));
    assert_eq!(updated.total_amount, dec!(83.50));

    let added_line_id = with_extra
        .items
        .iter()
        .find(|i| i.quote_item_id.is_none())
        .expect("manual line")
        .id;
    let repriced = h
        .services
        .purchase_orders
        .update_item(
            h.tenant_id,
            order_id,
            added_line_id,
            UpdateOrderItemRequest {
                quantity: Some(3),
                unit_price: Some(dec!(9.00)),
                description: None,
            },
        )
        .await
        .expect("reprice line");
    assert_eq!(repriced.order.subtotal, dec!(72.00));
    assert_eq!(repriced.order.total_amount, dec!(90.50));

    let after_remove = h
        .services
        .purchase_orders
        .remove_item(h.tenant_id, order_id, added_line_id)
        .await
        .expect("remove line");
    assert_eq!(after_remove.subtotal, dec!(45.00));
    assert_eq!(after_remove.total_amount, dec!(63.50));
}

/// Only draft orders accept edits; sending the order freezes its lines.
#[tokio::test]
async fn non_draft_orders_refuse_edits() {
    let h = TestHarness::new().await;
    let generated = settled_order(&h, dec!(2.00)).await;
    let order_id = generated.order.id;

    h.services
        .purchase_orders
        .change_status(h.tenant_id, order_id, PurchaseOrderStatus::Sent)
        .await
        .expect("send order");

    let err = h
        .services
        .purchase_orders
        .add_item(
            h.tenant_id,
            order_id,
            AddOrderItemRequest {
                product_id: Uuid::new_v4(),
                package_id: None,
                description: None,
                quantity: 1,
                unit_price: dec!(1.00),
            },
        )
        .await
        .expect_err("sent orders are frozen");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = h
        .services
        .purchase_orders
        .update_order(
            h.tenant_id,
            order_id,
            UpdateOrderRequest {
                tax_amount: Some(dec!(1.00)),
                ..Default::default()
            },
        )
        .await
        .expect_err("sent orders are frozen");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = h
        .services
        .purchase_orders
        .delete_order(h.tenant_id, order_id)
        .await
        .expect_err("sent orders cannot be deleted");
    assert!(matches!(err, ServiceError::Conflict(_)));
}

/// The lifecycle is the explicit table: draft→sent→confirmed→delivered,
/// with cancel reachable from draft and sent only.
#[tokio::test]
async fn enforces_order_status_transitions() {
    let h = TestHarness::new().await;
    let generated = settled_order(&h, dec!(2.00)).await;
    let order_id = generated.order.id;

    let err = h
        .services
        .purchase_orders
        .change_status(h.tenant_id, order_id, PurchaseOrderStatus::Confirmed)
        .await
        .expect_err("draft cannot confirm");
    assert!(matches!(err, ServiceError::IllegalTransition { .. }));

    for status in [
        PurchaseOrderStatus::Sent,
        PurchaseOrderStatus::Confirmed,
        PurchaseOrderStatus::Delivered,
    ] {
        h.services
            .purchase_orders
            .change_status(h.tenant_id, order_id, status)
            .await
            .expect("forward transition");
    }

    let err = h
        .services
        .purchase_orders
        .change_status(h.tenant_id, order_id, PurchaseOrderStatus::Cancelled)
        .await
        .expect_err("delivered is final");
    assert!(matches!(err, ServiceError::IllegalTransition { .. }));
}

/// po_numbers are date-stamped and increase per tenant.
#[tokio::test]
async fn po_numbers_increase_within_the_day() {
    let h = TestHarness::new().await;
    let first = settled_order(&h, dec!(1.00)).await;
    let second = settled_order(&h, dec!(1.50)).await;

    let prefix = format!("PO-{}-", chrono::Utc::now().format("%Y%m%d"));
    assert!(first.order.po_number.starts_with(&prefix));
    assert!(second.order.po_number.starts_with(&prefix));
    assert_ne!(first.order.po_number, second.order.po_number);

    let seq = |n: &str| {
        n.strip_prefix(&prefix)
            .and_then(|s| s.parse::<u32>().ok())
            .expect("sequence suffix")
    };
    assert_eq!(seq(&second.order.po_number), seq(&first.order.po_number) + 1);
}
