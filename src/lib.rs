#![doc(html_root_url = "https://docs.rs/peek-sync/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! The live-preview half of a source-to-rendered-document synchronization tool.
//!
//! A server converts a text document into HTML fragments. This crate keeps a rendered tree in sync with them:
//!
//! - [`diff::Reconciler`] patches each new fragment into the live [`dom::Document`] without losing
//!   expand/collapse state or already rendered diagrams,
//! - [`block_index::BlockIndex`] and [`scroll::ScrollSync`] keep the source cursor line centered in the [`viewport::Viewport`],
//! - [`pipeline::DiagramPipeline`] renders diagram placeholders asynchronously through registered [`diagram::Renderer`]s.
//!
//! [`preview::Preview`] wires all of these together.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod block_index;
pub mod config;
pub mod debounce;
pub mod diagram;
pub mod diff;
pub mod dom;
pub mod error;
pub mod load;
pub mod message;
pub mod pipeline;
pub mod plantuml;
pub mod preview;
pub mod scroll;
pub mod viewport;

pub use error::Error;
pub use preview::Preview;
