mod common;

use chrono::{Duration, Utc};
use common::TestHarness;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use sourcing_api::{
    entities::{
        quote_invitation::InvitationStatus,
        quote_response::{Column as ResponseColumn, Entity as ResponseEntity},
    },
    errors::ServiceError,
    services::{quotes::UpdateQuoteRequest, responses::SaveResponseRequest},
};
use uuid::Uuid;

fn save_request(price: rust_decimal::Decimal) -> SaveResponseRequest {
    SaveResponseRequest {
        price,
        min_order_quantity: None,
        delivery_days: None,
        note: None,
    }
}

/// Saving twice for the same item overwrites in place: one row per
/// (invitation, item), the latest price wins.
#[tokio::test]
async fn saving_again_overwrites_the_same_row() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv = h.invite(quote.id, Uuid::new_v4()).await;

    h.bid(&inv.public_token, items[0].id, dec!(7.00)).await;
    let second = h
        .services
        .responses
        .save_response(&inv.public_token, items[0].id, save_request(dec!(6.25)))
        .await
        .expect("second save");
    assert_eq!(second.price, dec!(6.25));

    let rows = ResponseEntity::find()
        .filter(ResponseColumn::InvitationId.eq(inv.id))
        .filter(ResponseColumn::QuoteItemId.eq(items[0].id))
        .count(&*h.db)
        .await
        .expect("count rows");
    assert_eq!(rows, 1);
}

/// Saving a bid moves the invitation from invited to partial; submit
/// makes it final and stamps submitted_at.
#[tokio::test]
async fn submit_finalizes_the_invitation() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv = h.invite(quote.id, Uuid::new_v4()).await;

    h.bid(&inv.public_token, items[0].id, dec!(3.00)).await;
    let after_save = h
        .services
        .invitations
        .resolve(&inv.public_token)
        .await
        .expect("resolve")
        .0;
    assert_eq!(after_save.status, InvitationStatus::Partial);

    let submitted = h
        .services
        .responses
        .submit(&inv.public_token)
        .await
        .expect("submit");
    assert_eq!(submitted.status, InvitationStatus::Submitted);
    assert!(submitted.submitted_at.is_some());

    // The channel is now read-only for this supplier.
    let err = h
        .services
        .responses
        .save_response(&inv.public_token, items[0].id, save_request(dec!(2.00)))
        .await
        .expect_err("post-submit write");
    assert!(matches!(err, ServiceError::AlreadySubmitted));

    let err = h
        .services
        .responses
        .submit(&inv.public_token)
        .await
        .expect_err("double submit");
    assert!(matches!(err, ServiceError::AlreadySubmitted));
}

/// A past deadline refuses writes with the dedicated Expired refusal,
/// while reads keep working for the supplier.
#[tokio::test]
async fn past_deadline_refuses_writes_but_allows_reads() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv = h.invite(quote.id, Uuid::new_v4()).await;

    h.services
        .quotes
        .update_quote(
            h.tenant_id,
            quote.id,
            UpdateQuoteRequest {
                deadline: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .expect("backdate deadline");

    let err = h
        .services
        .responses
        .save_response(&inv.public_token, items[0].id, save_request(dec!(5.00)))
        .await
        .expect_err("expired write");
    assert!(matches!(err, ServiceError::Expired));

    let view = h
        .services
        .responses
        .portal_view(&inv.public_token)
        .await
        .expect("expired read still allowed");
    assert!(!view.writable);
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let h = TestHarness::new().await;
    h.open_quote(1).await;

    let err = h
        .services
        .responses
        .portal_view("not-a-real-token")
        .await
        .expect_err("bad token");
    assert!(matches!(err, ServiceError::InvalidToken));
}

/// One invitation per (quote, supplier); re-inviting never issues a
/// second credential.
#[tokio::test]
async fn duplicate_invite_is_a_conflict() {
    let h = TestHarness::new().await;
    let (quote, _) = h.open_quote(1).await;
    let supplier = Uuid::new_v4();

    h.invite(quote.id, supplier).await;
    let err = h
        .services
        .invitations
        .invite_supplier(h.tenant_id, quote.id, supplier, None)
        .await
        .expect_err("second invite");
    assert!(matches!(err, ServiceError::AlreadyInvited(_)));
}

/// The portal view exposes only the viewing supplier's own bids.
#[tokio::test]
async fn portal_view_is_scoped_to_the_invitation() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv_a = h.invite(quote.id, Uuid::new_v4()).await;
    let inv_b = h.invite(quote.id, Uuid::new_v4()).await;

    h.bid(&inv_a.public_token, items[0].id, dec!(4.00)).await;

    let view_b = h
        .services
        .responses
        .portal_view(&inv_b.public_token)
        .await
        .expect("supplier B view");
    assert_eq!(view_b.items.len(), 1);
    assert!(view_b.items[0].response.is_none());

    let view_a = h
        .services
        .responses
        .portal_view(&inv_a.public_token)
        .await
        .expect("supplier A view");
    assert_eq!(
        view_a.items[0].response.as_ref().map(|r| r.price),
        Some(dec!(4.00))
    );
}

/// The buyer's quote detail aggregates every supplier's bids, scoped
/// to the tenant.
#[tokio::test]
async fn buyer_sees_all_responses_for_a_quote() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(2).await;
    let inv_a = h.invite(quote.id, Uuid::new_v4()).await;
    let inv_b = h.invite(quote.id, Uuid::new_v4()).await;

    h.bid(&inv_a.public_token, items[0].id, dec!(4.00)).await;
    h.bid(&inv_b.public_token, items[0].id, dec!(3.50)).await;
    h.bid(&inv_b.public_token, items[1].id, dec!(9.00)).await;

    let all = h
        .services
        .responses
        .list_for_quote(h.tenant_id, quote.id)
        .await
        .expect("buyer listing");
    assert_eq!(all.len(), 3);

    let other_tenant = h
        .services
        .responses
        .list_for_quote(Uuid::new_v4(), quote.id)
        .await
        .expect("foreign tenant listing");
    assert!(other_tenant.is_empty());
}

/// Reading the portal stamps the access and advances invited -> viewed
/// exactly once; later reads never move the status backward.
#[tokio::test]
async fn viewing_records_supplier_access() {
    let h = TestHarness::new().await;
    let (quote, items) = h.open_quote(1).await;
    let inv = h.invite(quote.id, Uuid::new_v4()).await;
    assert_eq!(inv.status, InvitationStatus::Invited);
    assert!(inv.last_access_at.is_none());

    let view = h
        .services
        .responses
        .portal_view(&inv.public_token)
        .await
        .expect("first view");
    assert_eq!(view.invitation_status, InvitationStatus::Viewed);

    h.bid(&inv.public_token, items[0].id, dec!(5.00)).await;
    h.services
        .responses
        .submit(&inv.public_token)
        .await
        .expect("submit");

    let view = h
        .services
        .responses
        .portal_view(&inv.public_token)
        .await
        .expect("post-submit view");
    assert_eq!(view.invitation_status, InvitationStatus::Submitted);

    let (stored, _) = h
        .services
        .invitations
        .resolve(&inv.public_token)
        .await
        .expect("resolve");
    assert!(stored.last_access_at.is_some());
}

/// A bid against an item of a different quote is refused even with a
/// valid token.
#[tokio::test]
async fn rejects_items_outside_the_invitations_quote() {
    let h = TestHarness::new().await;
    let (quote_a, _) = h.open_quote(1).await;
    let (_, items_b) = h.open_quote(1).await;
    let inv = h.invite(quote_a.id, Uuid::new_v4()).await;

    let err = h
        .services
        .responses
        .save_response(&inv.public_token, items_b[0].id, save_request(dec!(2.00)))
        .await
        .expect_err("cross-quote item");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
