pub mod fixed_point;
pub mod signed;

pub use fixed_point::*;
pub use signed::SignedWad;
