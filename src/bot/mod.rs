//! The running bot: one IRC session and the loop that feeds it.

mod runner;
mod session;

pub use runner::{drive, run, Shutdown};
pub use session::{Session, VERSION_REPLY};
