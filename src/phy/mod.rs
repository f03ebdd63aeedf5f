// Serial framing: 8 data bits, no parity, one stop bit, LSB first

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod timing;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
pub use timing::BitTiming;
