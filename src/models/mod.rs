pub mod event;

pub use event::{AddressCount, FailedLoginEvent};
