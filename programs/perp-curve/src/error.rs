use num_derive::FromPrimitive;
use solana_program::{
    decode_error::DecodeError,
    program_error::{PrintProgramError, ProgramError},
};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum PerpError {
    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Pool already initialized")]
    AlreadyInitialized = 1,

    #[error("Pool not initialized")]
    NotInitialized = 2,

    #[error("Invalid PDA")]
    InvalidPda = 3,

    #[error("Account does not match pool configuration")]
    InvalidAccount = 4,

    #[error("Invalid strike")]
    InvalidStrike = 5,

    #[error("Invalid action")]
    InvalidAction = 6,

    #[error("Slippage bound violated")]
    SlippageViolation = 7,

    #[error("Received less than min get")]
    MinGetViolation = 8,

    #[error("Paid more than max pay")]
    MaxPayViolation = 9,

    #[error("Slippage too high")]
    ExcessiveSlippage = 10,

    #[error("Insufficient position balance")]
    InsufficientBalance = 11,

    #[error("Not enough value attached")]
    InsufficientValue = 12,

    #[error("Curve reserve exhausted")]
    CurveExhausted = 13,

    #[error("Cannot mint long and short in one batch")]
    MixedMintNotAllowed = 14,

    #[error("Cannot burn long and short in one batch")]
    MixedBurnNotAllowed = 15,

    #[error("Strike is inside the liquidation zone")]
    UnsafeStrike = 16,

    #[error("Only governor can call this function")]
    Unauthorized = 17,

    #[error("Minting is disabled")]
    MintDisabled = 18,

    #[error("Trading is halted")]
    TradingHalted = 19,

    #[error("Invalid parameter")]
    InvalidParameter = 20,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 21,

    #[error("Division by zero")]
    DivisionByZero = 22,

    #[error("Account data too small")]
    AccountTooSmall = 23,
}

impl PrintProgramError for PerpError {
    fn print<E>(&self) {
        use solana_program::msg;
        msg!("PerpError: {}", self);
    }
}

impl From<PerpError> for ProgramError {
    fn from(e: PerpError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for PerpError {
    fn type_of() -> &'static str {
        "PerpError"
    }
}
