//! Text and image generation over REST
//!
//! The chat assistant answers business questions with the ledger as
//! context, and the image endpoint produces repaint previews from a
//! photo of a wall.

pub mod client;

pub use client::AssistantClient;
