pub mod account_store;
pub mod crypto;
pub mod events;
pub mod ledger;
pub mod quic;
pub mod snapshot;
