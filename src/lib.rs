//! Campus marketplace core: listings, per-account data, and a buyer/seller
//! chat built on a WebSocket echo relay. The `unimarket` binary serves the
//! local development relay; everything else is a library for the hosting
//! surface.

pub mod bus;
pub mod catalog;
pub mod chat;
pub mod connection;
pub mod conversation;
pub mod manager;
pub mod relay;
pub mod store;
