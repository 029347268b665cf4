//! Data types, persistence and pure logic shared by the X-ray report engine
//! and its CLI.

pub mod chat;
pub mod events;
pub mod knowledge;
pub mod prompts;
pub mod report;
pub mod status;
pub mod uploads;
