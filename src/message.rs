//! Events pushed by the preview server.

use crate::error::MessageError;
use core::str::FromStr;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Message {
	/// A newly rendered document: root-level HTML and the source's line count.
	Show { html: String, lcount: u32 },
	/// The source cursor moved to `line`.
	Scroll { line: u32 },
	/// Base path for resolving relative links.
	Base { base: String },
	/// Anything newer than this client. Ignored.
	#[serde(other)]
	Unknown,
}
impl Message {
	/// Decodes one (UTF-8 JSON) transport frame.
	///
	/// # Errors
	///
	/// Iff `payload` is not JSON or lacks a known action's fields.
	pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
		Ok(serde_json::from_slice(payload)?)
	}
}
impl FromStr for Message {
	type Err = MessageError;

	fn from_str(payload: &str) -> Result<Self, Self::Err> {
		Ok(serde_json::from_str(payload)?)
	}
}
