pub mod events;
pub mod packets;
