pub mod order;
pub mod product;
pub mod tracking_checkpoint;
pub mod tracking_ledger;
pub mod user;

pub use order::{Entity as Order, OrderStatus, PaymentMethod};
pub use product::{Entity as Product, ProductCategory};
pub use tracking_checkpoint::Entity as TrackingCheckpoint;
pub use tracking_ledger::Entity as TrackingLedger;
pub use user::{AccountStatus, Entity as User, UserRole};
