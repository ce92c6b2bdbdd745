pub mod config;
pub mod domain;
pub mod events;
pub mod models;
pub mod notify;
pub mod store;

// Re-export commonly used types
pub use config::{AirdropTierRule, AssetTier, RewardsConfig, SquadTierRule};

pub use models::{
    ActionRecord, ActionType, InvitationStatus, ReferralBoost, Squad, SquadInvitation, User,
    UserRef,
};

pub use store::{
    AddMemberOutcome, LedgerStore, MemoryStore, PointsChange, SquadUpdate, StoreError, UserUpdate,
};

pub use domain::{
    AirdropService, AssetMinter, AwardOptions, AwardReceipt, EngineError, MintOutcome,
    PointsEngine, ReferralService, SimulatedMinter, SocialActionOutcome, SocialActionService,
    SquadService,
};

pub use events::{EventPublisher, NoopPublisher, Topic};

pub use notify::{Notification, NotificationKind, NotificationSink, NoopNotifier};
