mod core;
mod dml;
mod prepared;
mod select;
mod tx;

pub use core::Connection;
pub use tx::TransactionBehavior;
