//! Order lifecycle rules and account codes, free of any storage or transport.

pub mod loyalty;
pub mod order;
pub mod otp;
pub mod status;
pub mod totals;

pub use order::{IllegalTransition, Order, OrderItem, PaymentReceipt, ShippingAddress, TransitionMetadata};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus, TransitionPolicy};
pub use totals::Totals;
