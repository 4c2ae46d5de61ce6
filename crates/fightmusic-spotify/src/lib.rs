//! # fightmusic-spotify
//!
//! Spotify Web API client for Fight Music.
//!
//! This crate covers the small slice of the Web API the trigger needs:
//! device listing, playback state, start/pause, volume and track lookup,
//! plus the OAuth authorization-code flow that unlocks them.

pub mod auth;
pub mod callback;
pub mod client;
pub mod endpoints;
pub mod types;

pub use auth::{Authenticator, Credentials, Token, TokenCache, SCOPES};
pub use client::SpotifyClient;
