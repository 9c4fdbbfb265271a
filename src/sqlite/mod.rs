// SQLite driver layer
//
// - connection: connection lifecycle, transactions and convenience queries
// - prepared / query: compiled statements and their row cursors
// - params: binding of host values
// - blob: incremental blob streams
// - hooks: engine callback bridging
// - config: open flags and options
// - schema: catalog introspection

pub mod blob;
pub mod config;
pub mod connection;
pub mod hooks;
pub mod params;
pub mod prepared;
pub mod query;
pub mod schema;

pub use blob::BlobStream;
pub use config::{OpenFlag, OpenOptions, OpenOptionsBuilder, validate_flags};
pub use connection::{Connection, TransactionBehavior};
pub use hooks::{Action, AuthRequest, Authorization, CallbackBridge};
pub use params::BindParams;
pub use prepared::{Statement, StatusCounter};
pub use query::{FromRow, Row, Rows, build_result_set};
pub use schema::{ColumnInfo, DatabaseInfo, ForeignKey, IndexInfo};
