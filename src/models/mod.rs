//! Data models shared by the upstream clients, the vehicle cache, and the HTTP API.

mod employee;
mod token;
mod vehicle;

pub use employee::*;
pub use token::*;
pub use vehicle::*;
