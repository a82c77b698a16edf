//! Preview settings, as injected into the page alongside the client.

use crate::error::ConfigError;
use core::time::Duration;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
	#[default]
	Light,
	Dark,
}

/// Unknown keys are ignored, missing ones fall back to [`PreviewConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
	pub theme: Theme,
	/// Attribute carrying the first source line a block renders.
	pub line_attribute: String,
	/// Quiet period before a requested diagram scan runs.
	pub scan_debounce_ms: u64,
	/// Class of the loading indicator inside unrendered diagram placeholders.
	pub loader_class: String,
	/// Class of the marker shown in place of a diagram that failed to render.
	pub error_class: String,
	pub plantuml_server: String,
}
impl Default for PreviewConfig {
	fn default() -> Self {
		Self {
			theme: Theme::Light,
			line_attribute: "data-line-begin".to_owned(),
			scan_debounce_ms: 200,
			loader_class: "peek-loader".to_owned(),
			error_class: "diagram-error".to_owned(),
			plantuml_server: "https://www.plantuml.com/plantuml".to_owned(),
		}
	}
}
impl PreviewConfig {
	/// # Errors
	///
	/// Iff `json` is malformed or a present key has the wrong type.
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		Ok(serde_json::from_str(json)?)
	}

	#[must_use]
	pub fn scan_debounce(&self) -> Duration {
		Duration::from_millis(self.scan_debounce_ms)
	}
}
