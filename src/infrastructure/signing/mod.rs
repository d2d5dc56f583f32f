//! Signing endpoint client.

mod client;
mod dto;

pub use client::HttpSigningClient;
