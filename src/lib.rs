//! vCard splitter — a chat bot that turns an uploaded list of phone numbers
//! into a set of equally sized vCard files.

pub mod cards;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
