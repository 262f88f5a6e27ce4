pub mod mailbox;

pub use mailbox::{ChannelError, RequestChannel};
