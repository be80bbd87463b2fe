//! Pool operations. Every entry point stages its changes on a copy of the
//! pool and commits only after all checks passed.

pub mod action;
pub mod governance;
pub mod liquidation;
pub mod poke;
pub mod rewards;
pub mod settlement;

pub use action::{check_mixing, Action, ActionKind, MAX_ACTION_SIZE};
pub use governance::GovernanceAction;
pub use liquidation::LiquidationEvent;
pub use poke::PokeReport;
pub use settlement::{position_slot, TradeContext, TradeReceipt};
