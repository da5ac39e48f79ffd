pub mod rule;
pub mod sla;
pub mod ticket;

pub use rule::*;
pub use sla::*;
pub use ticket::*;
