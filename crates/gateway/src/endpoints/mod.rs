//! # Gatewayエンドポイント

pub mod webhook;

pub use webhook::handle_webhook;
