//! Slack integration - Events API over HTTP
//!
//! This crate is the bot's messaging gateway:
//! - **Signatures** (`signature`) - `v0` request signing checks
//! - **Events** (`events`) - payload decoding into [`events::BotCommand`], reply pipeline
//! - **Commands** (`commands`) - routes each command to the attendance engines
//! - **Views** (`views`) - menu, forms, overview, profile and monthly report
//! - **Block Kit** (`blocks`) - message builders
//! - **Web API** (`client`) - `chat.postMessage` and `users.profile.get`
//!
//! # Getting Started
//!
//! 1. Create a Slack app and enable Event Subscriptions and Interactivity,
//!    both pointing at `https://<host>/slack/events`
//! 2. Subscribe to `message.im`
//! 3. Set `KINTAI_SLACK_BOT_TOKEN` and `KINTAI_SLACK_SIGNING_SECRET`
//! 4. DM the bot `menu`
//!
//! # Architecture
//!
//! ```text
//! POST /slack/events → SignatureVerifier → decode_request → BotCommand
//!                                                            ↓ (spawned)
//!        chat.postMessage ← views ← CommandRouter ← EventProcessor
//! ```

pub mod blocks;
pub mod client;
pub mod commands;
pub mod events;
pub mod signature;
pub mod views;

pub use client::{SlackApi, SlackApiError, SlackWebClient};
pub use commands::{CommandRouter, CommandServices};
pub use events::{
    decode_request, BotCommand, DecodeError, EventHandler, EventProcessor, HandlerResult,
    InboundPayload, SlackEnvelope,
};
pub use kintai_core::context::RequestContext;
pub use signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
