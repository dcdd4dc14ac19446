//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row
//! types. Patch and `New*` types describe writes handed to the data store.

pub mod cart;
pub mod item;
pub mod order;
pub mod user;

pub use cart::{Cart, CartItem, CartLine};
pub use item::{Item, ItemPatch, NewItem};
pub use order::{ConsumedCartItem, NewOrder, NewOrderItem, Order, OrderItem};
pub use user::{Me, NewUser, PendingReset, User, UserPatch};
