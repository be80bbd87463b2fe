use crate::{error::PerpError, slot::{Side, TokenClass}};

const KIND_BITS: u32 = 2;
const SLOT_BITS: u32 = 16;
const SIZE_SHIFT: u32 = KIND_BITS + SLOT_BITS;

/// Largest size that fits in a packed action
pub const MAX_ACTION_SIZE: u128 = u128::MAX >> SIZE_SHIFT;

/// Batch action kinds, named by the trader's side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Open a short, mints the long token
    MintShort = 0,
    /// Close a short, burns the long token
    BurnShort = 1,
    /// Open a long, mints the short token
    MintLong = 2,
    /// Close a long, burns the short token
    BurnLong = 3,
}

impl ActionKind {
    pub fn from_bits(bits: u128) -> Self {
        match bits & 3 {
            0 => ActionKind::MintShort,
            1 => ActionKind::BurnShort,
            2 => ActionKind::MintLong,
            _ => ActionKind::BurnLong,
        }
    }

    pub fn side(self) -> Side {
        match self {
            ActionKind::MintShort | ActionKind::BurnShort => Side::Short,
            ActionKind::MintLong | ActionKind::BurnLong => Side::Long,
        }
    }

    pub fn token_class(self) -> TokenClass {
        self.side().token_class()
    }

    pub fn is_mint(self) -> bool {
        matches!(self, ActionKind::MintShort | ActionKind::MintLong)
    }

    /// Whether the action moves the curve reserve up
    pub fn raises_reserve(self) -> bool {
        matches!(self, ActionKind::MintLong | ActionKind::BurnShort)
    }
}

/// One entry of a batch: `kind | slot << 2 | size << 18`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub slot: u16,
    pub size: u128,
}

impl Action {
    pub fn new(kind: ActionKind, slot: u16, size: u128) -> Result<Self, PerpError> {
        if size == 0 || size > MAX_ACTION_SIZE {
            return Err(PerpError::InvalidAction);
        }
        Ok(Self { kind, slot, size })
    }

    pub fn pack(&self) -> u128 {
        (self.kind as u128) | ((self.slot as u128) << KIND_BITS) | (self.size << SIZE_SHIFT)
    }

    pub fn unpack(packed: u128) -> Result<Self, PerpError> {
        let kind = ActionKind::from_bits(packed);
        let slot = ((packed >> KIND_BITS) & 0xffff) as u16;
        let size = packed >> SIZE_SHIFT;
        Self::new(kind, slot, size)
    }
}

/// Rejects batches that open both sides or close both sides at once.
pub fn check_mixing(actions: &[Action]) -> Result<(), PerpError> {
    let has = |kind: ActionKind| actions.iter().any(|action| action.kind == kind);

    if has(ActionKind::MintLong) && has(ActionKind::MintShort) {
        return Err(PerpError::MixedMintNotAllowed);
    }
    if has(ActionKind::BurnLong) && has(ActionKind::BurnShort) {
        return Err(PerpError::MixedBurnNotAllowed);
    }
    Ok(())
}
