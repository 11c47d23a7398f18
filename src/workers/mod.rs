//! The processor's task graph (spec §2, §4.4–§4.9). Each submodule is one
//! periodic task with its own `run(self, shutdown_rx)` loop; `main.rs`
//! spawns all of them onto the same runtime.

pub mod account_checker;
pub mod rails_poller;
pub mod scavenger;
pub mod submitter;
pub mod trustline_checker;

pub use account_checker::PendingFundingChecker;
pub use rails_poller::RailsPoller;
pub use scavenger::Scavenger;
pub use submitter::Submitter;
pub use trustline_checker::TrustlineChecker;
