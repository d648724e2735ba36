//! The broad-phase: stable object handles, pair maintenance, and culling queries
//! over the BVH.

pub use self::broad_phase::{BroadPhase, BroadPhaseSettings, SettingsError};
pub use self::handle::ObjectHandle;
pub use self::pairs::{ObjectRef, ObjectType, PairCallback, UnpairCallback};

mod broad_phase;
mod handle;
mod pairs;
