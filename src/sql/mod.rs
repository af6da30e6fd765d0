pub mod connection;
pub mod value_table;

pub use connection::*;
pub use value_table::SqliteValueStore;
