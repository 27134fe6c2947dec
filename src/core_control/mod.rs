pub mod codec;
pub mod reply;
pub mod tls;

pub use codec::ControlCodec;
pub use reply::{Reply, ReplyAssembler};
