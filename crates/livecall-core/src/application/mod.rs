pub mod ports;

pub mod accounts;
pub mod approval;
pub mod billing;
pub mod call_session;
pub mod handle_request;
pub mod incoming_call;
pub mod market;
pub mod presence;
pub mod session;
