mod format;
mod now_playing;

pub use format::format_time;
pub use now_playing::{NowPlayingView, PlayIndicator};
