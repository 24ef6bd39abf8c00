//! Inter-agent communication tools.

mod read_message;
mod talk;

pub use read_message::ReadMessageTool;
pub use talk::TalkTool;
