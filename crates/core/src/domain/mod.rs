pub mod cargo;
pub mod carrier;
pub mod port;
pub mod quote;
pub mod session;
