//! Domain types for channelbot

pub mod account;
pub mod bar;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod position;

pub use account::{Account, AccountPosition};
pub use bar::Bar;
pub use ids::{
    decode_order_type, decode_position_id, decode_position_id_full, encode_order_id,
    encode_position_id, other_direction_id, PositionDirection, ORDER_ID_SEPARATOR,
    POSITION_ID_SEPARATOR,
};
pub use instrument::{Instrument, InstrumentError, TickPolicy};
pub use order::{Order, OrderType};
pub use position::{Position, PositionStatus};
