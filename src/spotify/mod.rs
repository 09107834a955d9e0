pub mod auth;
pub mod client;
pub mod ids;
pub mod types;

pub use client::SpotifyCatalog;
pub use ids::{SpotifyKind, extract_spotify_id};
