//! Google Drive reorganizer
//!
//! Moves everything at the Drive root into a backup folder, then walks the
//! backed-up files one by one, asks Gemini where each belongs and lets the
//! user confirm, redirect, rename or skip before anything is moved.
//!
//! ## Layout
//!
//! ```text
//! commands/     clap CLI: organize, auth
//! organizer/    backup staging, decision state machine, run driver
//! classifier/   Classifier trait, Gemini client, cache, cost/rate limits
//! drive/        RemoteStore trait, Drive REST client, OAuth, retry,
//!               tree walker, folder resolver, mover
//! config.rs     layered AppConfig (defaults, YAML, env, flags)
//! credentials   Gemini API key: keychain with file fallback
//! ```

pub mod cancel;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod console;
pub mod credentials;
pub mod drive;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod organizer;
pub mod progress;

#[cfg(test)]
mod testing;
