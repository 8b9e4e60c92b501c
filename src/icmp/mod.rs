pub mod packet;
pub mod socket;

pub use packet::*;
pub use socket::*;
