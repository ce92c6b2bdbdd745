pub mod action;
pub mod squad;
pub mod user;

pub use action::{ActionRecord, ActionType, UnknownActionType};
pub use squad::{InvitationStatus, Squad, SquadInvitation};
pub use user::{ReferralBoost, User, UserRef};
