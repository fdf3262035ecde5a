//! Strategy layer: signal sources, stop trailing, break-even and sizing, and
//! the channel strategy that combines them.

pub mod channel;
pub mod donchian;
pub mod signal;
pub mod sizing;
pub mod trail;

pub use channel::ChannelStrategy;
pub use donchian::DonchianChannel;
pub use signal::{ChannelData, SignalSource};
pub use sizing::PositionSizer;
pub use trail::{break_even_level, StopTrailer};
