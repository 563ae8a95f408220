mod common;

use common::TestHarness;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use sourcing_api::{
    entities::{
        price_history::{Column as HistoryColumn, Entity as HistoryEntity},
        purchase_order::PurchaseOrderStatus,
        quote::QuoteStatus,
        quote_item::Entity as QuoteItemEntity,
    },
    services::purchase_orders::GeneratePurchaseOrderRequest,
};
use uuid::Uuid;

/// Full pipeline: invite two suppliers, collect bids, auto-select the
/// cheapest, close, and materialize the purchase order.
#[tokio::test]
async fn settles_quote_end_to_end() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let item = &items[0];

    let supplier_a = Uuid::new_v4();
    let supplier_b = Uuid::new_v4();
    let inv_a = h.invite(quote.id, supplier_a).await;
    let inv_b = h.invite(quote.id, supplier_b).await;

    h.bid(&inv_a.public_token, item.id, dec!(5.00)).await;
    h.bid(&inv_b.public_token, item.id, dec!(4.50)).await;
    h.services
        .responses
        .submit(&inv_a.public_token)
        .await
        .expect("supplier A submit");
    h.services
        .responses
        .submit(&inv_b.public_token)
        .await
        .expect("supplier B submit");

    let resolved = h
        .services
        .winners
        .auto_select_winners(h.tenant_id, quote.id)
        .await
        .expect("auto-select");
    assert_eq!(resolved, 1);

    let winner_item = QuoteItemEntity::find_by_id(item.id)
        .one(&*h.db)
        .await
        .expect("query item")
        .expect("item exists");
    assert_eq!(winner_item.winner_supplier_id, Some(supplier_b));
    assert!(winner_item.winner_reason.is_some());
    assert!(winner_item.winner_set_by.is_none());

    let outcome = h
        .services
        .quotes
        .close_quote(h.tenant_id, quote.id)
        .await
        .expect("close quote");
    assert_eq!(outcome.quote.status, QuoteStatus::Closed);
    assert!(outcome.quote.closed_at.is_some());
    assert_eq!(outcome.price_history_entries, 1);

    let snapshot = h
        .services
        .snapshots
        .get_snapshot(h.tenant_id, quote.id)
        .await
        .expect("snapshot exists");
    assert_eq!(snapshot.item_count, 1);
    assert_eq!(snapshot.supplier_count, 2);
    assert_eq!(snapshot.response_count, 2);
    assert_eq!(snapshot.total_value, dec!(45.00));

    let ledger_rows = HistoryEntity::find()
        .filter(HistoryColumn::QuoteId.eq(quote.id))
        .count(&*h.db)
        .await
        .expect("count ledger");
    assert_eq!(ledger_rows, 1);

    let order = h
        .services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            supplier_b,
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect("generate purchase order");

    assert_eq!(order.order.status, PurchaseOrderStatus::Draft);
    assert_eq!(order.order.subtotal, dec!(45.00));
    assert_eq!(order.order.total_amount, dec!(45.00));
    assert!(order.order.po_number.starts_with("PO-"));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_price, dec!(4.50));
    assert_eq!(order.items[0].quantity, 10);
    assert_eq!(order.items[0].quote_item_id, Some(item.id));
}

/// Opening dispatches one portal link per invitation with a contact
/// address; a delivery failure is reported but never blocks the
/// transition.
#[tokio::test]
async fn opening_notifies_invited_suppliers_best_effort() {
    let h = TestHarness::new().await;
    let (quote, _) = h.draft_quote(1).await;

    for (supplier_email, supplier) in [
        (Some("a@example.com"), Uuid::new_v4()),
        (Some("b@example.com"), Uuid::new_v4()),
        (None, Uuid::new_v4()),
    ] {
        h.services
            .invitations
            .invite_supplier(
                h.tenant_id,
                quote.id,
                supplier,
                supplier_email.map(str::to_string),
            )
            .await
            .expect("invite");
    }
    h.notifier
        .fail_recipients
        .lock()
        .await
        .push("b@example.com".to_string());

    let outcome = h
        .services
        .quotes
        .open_quote(h.tenant_id, quote.id)
        .await
        .expect("open despite delivery failure");
    assert_eq!(outcome.quote.status, QuoteStatus::Open);
    assert_eq!(outcome.invitations_notified, 1);
    assert_eq!(outcome.notification_failures, vec!["b@example.com"]);

    let sent = h.notifier.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "a@example.com");
    assert!(sent[0].body.contains("/portal/quotes/"));
}

/// The losing supplier's bid must not leak into the purchase order for
/// the winner, and a supplier with no won items yields no order.
#[tokio::test]
async fn purchase_order_covers_only_won_items() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(2).await;

    let supplier_a = Uuid::new_v4();
    let supplier_b = Uuid::new_v4();
    let inv_a = h.invite(quote.id, supplier_a).await;
    let inv_b = h.invite(quote.id, supplier_b).await;

    // A wins item 0, B wins item 1.
    h.bid(&inv_a.public_token, items[0].id, dec!(2.00)).await;
    h.bid(&inv_b.public_token, items[0].id, dec!(3.00)).await;
    h.bid(&inv_a.public_token, items[1].id, dec!(9.00)).await;
    h.bid(&inv_b.public_token, items[1].id, dec!(8.00)).await;

    h.services
        .winners
        .auto_select_winners(h.tenant_id, quote.id)
        .await
        .expect("auto-select");
    h.services
        .quotes
        .close_quote(h.tenant_id, quote.id)
        .await
        .expect("close quote");

    let order_a = h
        .services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            supplier_a,
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect("order for supplier A");
    assert_eq!(order_a.items.len(), 1);
    assert_eq!(order_a.order.subtotal, dec!(20.00));

    let order_b = h
        .services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            supplier_b,
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect("order for supplier B");
    assert_eq!(order_b.items.len(), 1);
    assert_eq!(order_b.order.subtotal, dec!(80.00));

    // A third supplier won nothing; there is nothing to materialize.
    let err = h
        .services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            Uuid::new_v4(),
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect_err("no won items");
    assert!(matches!(err, sourcing_api::errors::ServiceError::NotFound(_)));
}

/// Generating before the quote is closed is refused; the snapshot is
/// the source of truth for purchase orders.
#[tokio::test]
async fn refuses_purchase_order_for_open_quote() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;

    let supplier = Uuid::new_v4();
    let inv = h.invite(quote.id, supplier).await;
    h.bid(&inv.public_token, items[0].id, dec!(1.00)).await;
    h.services
        .winners
        .auto_select_winners(h.tenant_id, quote.id)
        .await
        .expect("auto-select");

    let err = h
        .services
        .purchase_orders
        .generate_from_quote(
            h.tenant_id,
            quote.id,
            supplier,
            h.user_id,
            GeneratePurchaseOrderRequest::default(),
        )
        .await
        .expect_err("quote still open");
    assert!(matches!(err, sourcing_api::errors::ServiceError::Conflict(_)));
}
