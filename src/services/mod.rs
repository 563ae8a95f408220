//! Business logic for the settlement pipeline. Each public method is
//! one transaction boundary; partial application of a multi-step
//! operation is never an observable state.

pub mod closure;
pub mod invitations;
pub mod purchase_orders;
pub mod quotes;
pub mod responses;
pub mod winners;

pub use closure::SnapshotService;
pub use invitations::InvitationService;
pub use purchase_orders::PurchaseOrderService;
pub use quotes::QuoteService;
pub use responses::ResponseService;
pub use winners::WinnerService;
