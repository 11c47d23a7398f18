//! Pluggable collaborator interfaces (spec §4.6, §6.3).
//!
//! The processor itself never decides whether a deposit is legitimate,
//! never holds signing keys, and never computes a fee policy — all of
//! that is delegated to these traits. Concrete implementations are
//! provided where the spec supplies one (`SelfCustody`) and left for
//! anchor integrators otherwise.

pub mod custody;
pub mod deposit;
pub mod fee;
pub mod rails;
pub mod webhook;

pub use custody::{Custody, SelfCustody};
pub use deposit::{Deposit, NoopDeposit};
pub use fee::{FeeFunction, ZeroFee};
pub use rails::{FundedDeposit, Rails, UnimplementedRails};
pub use webhook::WebhookNotifier;
