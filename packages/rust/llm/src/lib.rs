//! Model gateway: one contract over the hosted and self-hosted backends.
//!
//! This crate provides:
//! - [`ModelGateway`] / [`HttpGateway`]: send an instruction plus text, get raw reply text
//! - [`directive`]: the output-format directive every backend appends
//! - [`openai`], [`anthropic`], [`local`]: the three wire protocols

pub mod anthropic;
pub mod directive;
pub mod gateway;
pub mod local;
pub mod openai;

pub use directive::{FORMAT_DIRECTIVE, with_directive};
pub use gateway::{HttpGateway, ModelGateway, ModelReply};
pub use local::LocalAttempt;
