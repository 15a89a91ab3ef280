// Gameplay core: playback clock, object pools, judgment, session tick loop

pub mod clock;
pub mod config;
mod hit_object;
mod judge;
pub mod persist;
pub mod pool;
mod session;
mod timing_line;

pub use clock::{AudioTrack, ClockState, PlaybackClock, SilentTrack};
pub use config::{ResolvedConfig, SessionConfig, SettingsHandle, TimeCorrection};
pub use hit_object::{HitObject, HitObjectState};
pub use judge::{JudgedPart, JudgmentEngine, JudgmentRecord};
pub use pool::{ObjectPool, PoolItem, PoolWindow};
pub use session::{GameplaySession, InputSource, SessionPhase, SessionResult, TickReport};
pub use timing_line::TimingLine;
