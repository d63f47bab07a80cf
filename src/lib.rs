pub mod context;
pub mod gateway;
pub mod identity;
pub mod merkle;
pub mod record;
pub mod schema;
pub mod store;
pub mod sync;
