// Replay frames, playback cursor, live capture, autoplay, storage

pub mod autoplay;
pub mod codec;
mod cursor;
mod frame;
mod recorder;
mod replay;
pub mod storage;

pub use autoplay::generate_autoplay;
pub use cursor::ReplayCursor;
pub use frame::{InputFrame, KeyEvent, MAX_KEY_COUNT, lane_bit};
pub use recorder::ReplayRecorder;
pub use replay::{Replay, ReplaySummary};
