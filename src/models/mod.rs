pub mod common;
pub mod pagination;
pub mod participant;
pub mod reference;
pub mod ticket;

pub use common::*;
pub use pagination::*;
pub use participant::*;
pub use reference::*;
pub use ticket::*;
