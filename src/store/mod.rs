pub mod client;
pub mod schema;
pub mod session;
pub mod task;

pub use client::{SessionStore, StoreError};
pub use schema::initialize_schema;
