//! GDZ Solver Bot - Rust implementation
//!
//! A Telegram bot that solves homework problems (text or photographed) by
//! forwarding them to the Gemini API, rotating through a pool of API keys
//! on rate limits and transient failures.

/// Telegram bot handlers and messaging
pub mod bot;
/// Configuration management
pub mod config;
/// HTTP health endpoint for uptime monitors
pub mod health;
/// Gemini client, key pool and solve dispatcher
pub mod llm;
/// Text cleaning and message splitting
pub mod utils;
