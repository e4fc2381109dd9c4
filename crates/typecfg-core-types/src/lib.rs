//! Core types shared by the typecfg error and logging facilities
//!
//! - **Correlation types**: `RequestId` for tying the log
//!   events of one configuration selection together
//! - **Sensitive data**: `Sensitive<T>` redacts environment identities
//! - **Schema constants**: canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::RequestId;
pub use sensitive::Sensitive;
