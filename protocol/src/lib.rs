//! Types shared between the page-resident content pipeline and the privileged
//! background host.

pub mod analysis;
mod failure;
pub mod media;
pub mod message;

pub use failure::FailureKind;
