pub mod compactor;
pub mod config;
pub mod limits;
pub mod model;
pub mod observability;
pub mod registrar;
pub mod sql;
pub mod store;
pub mod tenant;
pub mod wal;
pub mod wire;
