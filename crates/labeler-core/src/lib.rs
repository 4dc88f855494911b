//! VCon Labeler Core
//!
//! Annotation-session engine for two-channel audio: regions, per-channel
//! annotations, loop resolution, display rows and the vCon session codec.

pub mod codec;
pub mod display;
pub mod error;
pub mod looping;
pub mod party;
pub mod session;
pub mod store;
pub mod time;
pub mod vocabulary;
pub mod workspace;

pub use codec::{decode, encode, restore, MediaInfo, RestoreReport};
pub use display::{aggregate, DisplayAggregator};
pub use error::{LabelerError, Result};
pub use looping::{resolve_loop_region, LoopController, LOOP_EPSILON};
pub use party::PartyRegistry;
pub use session::Session;
pub use store::{Removal, SessionStore};
pub use time::{format_seconds, round3};
pub use vocabulary::LabelVocabulary;
pub use workspace::{
    session_file_for, LoadOutcome, LoadTicket, PersistJob, StoredSession, Workspace,
};
