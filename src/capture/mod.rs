pub mod buffer;
pub mod codec;
pub mod events;
pub mod filter;
pub mod presenter;
pub mod scheduler;
pub mod service;
pub mod store;
