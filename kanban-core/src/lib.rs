pub mod drag;
pub mod events;
pub mod store;
pub mod types;
