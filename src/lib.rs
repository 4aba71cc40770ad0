//! SecureStore - Password-Protected Secret Keeper Bot
//!
//! A Telegram bot that lets a single chat set a password, then stage and
//! store encrypted secret records while authorized.
//!
//! Key principles:
//! - Plaintext secrets never linger in the chat transcript
//! - Only the password fingerprint is persisted, never the password
//! - Record key lives in memory only while the chat is authorized
//! - Inactivity deauthorizes the chat and may purge its history

pub mod chat;
pub mod crypto;
pub mod session;
pub mod storage;
