//! Aqua Sherpa - conversational assistant for aquaculture operations
//!
//! Each user message is classified, routed to the device agent, the expert
//! consultation service or casual chat, enriched with weather and a
//! background search, and integrated into one answer. Exactly one user turn
//! and one assistant turn are persisted per request.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
