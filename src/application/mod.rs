pub mod agent;
pub mod chat;
pub mod search;
pub mod stdio;
