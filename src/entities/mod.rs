//! Database entities for the settlement pipeline.
//!
//! Every table carries a `tenant_id`; services filter on it for each
//! query. Status columns are string-backed active enums so the stored
//! value stays readable in the database.

pub mod price_history;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod quote;
pub mod quote_invitation;
pub mod quote_item;
pub mod quote_response;
pub mod quote_snapshot;

pub use price_history::Entity as PriceHistory;
pub use purchase_order::Entity as PurchaseOrder;
pub use purchase_order_item::Entity as PurchaseOrderItem;
pub use quote::Entity as Quote;
pub use quote_invitation::Entity as QuoteInvitation;
pub use quote_item::Entity as QuoteItem;
pub use quote_response::Entity as QuoteResponse;
pub use quote_snapshot::Entity as QuoteSnapshot;
