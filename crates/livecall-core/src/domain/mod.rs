pub mod account;
pub mod billing;
pub mod call;
pub mod control;
pub mod error;
pub mod session;
