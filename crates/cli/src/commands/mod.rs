pub mod chat;
pub mod init;
pub mod prompt;
pub mod reset;
pub mod send;
