pub mod accounts;
pub mod config;
pub mod curve;
pub mod liquidity;
pub mod mark;
pub mod pool;

pub use accounts::*;
pub use config::*;
pub use curve::CurveState;
pub use liquidity::{LiquidityState, LiquidityTrend};
pub use mark::MarkState;
pub use pool::{safe_boundaries, PerpPool};
