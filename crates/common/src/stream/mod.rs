pub mod policy;
pub mod relay;
pub mod sse;

pub use policy::RelayPolicy;
pub use relay::{RelayEvent, relay};
