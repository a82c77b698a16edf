//! A [`Renderer`] that points an `<img>` at a `PlantUML` server.

use crate::{
	config::{PreviewConfig, Theme},
	diagram::{RenderRequest, Renderer},
	error::RenderError,
};
use core::fmt::Write as _;
use futures::{
	future::{self, LocalBoxFuture},
	FutureExt,
};
use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};
use tracing::trace;

const DARK_THEME: &str = "cyborg-outline";

static START_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(@start\w+.*?\n)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantUml {
	server_url: String,
	theme: Theme,
}
impl PlantUml {
	#[must_use]
	pub fn new(server_url: impl Into<String>, theme: Theme) -> Self {
		Self {
			server_url: server_url.into().trim_end_matches('/').to_owned(),
			theme,
		}
	}

	#[must_use]
	pub fn from_config(config: &PreviewConfig) -> Self {
		Self::new(config.plantuml_server.as_str(), config.theme)
	}

	/// The server URL serving `source` as SVG.
	#[must_use]
	pub fn image_url(&self, source: &str) -> String {
		let source = self.themed(source);
		format!("{}/svg/~h{}", self.server_url, encode_hex(&source))
	}

	/// Adds a dark theme directive after the `@start…` line, unless one is present already.
	#[must_use]
	pub fn themed<'a>(&self, source: &'a str) -> Cow<'a, str> {
		if self.theme != Theme::Dark || source.contains("!theme ") {
			return Cow::Borrowed(source);
		}
		START_LINE.replacen(source, 1, format!("${{1}}!theme {}\n", DARK_THEME))
	}
}
impl Renderer for PlantUml {
	fn render(&self, request: RenderRequest) -> LocalBoxFuture<'static, Result<Option<String>, RenderError>> {
		trace!("Encoding PlantUML diagram {}.", request.id);
		let markup = format!(r#"<img src="{}" alt="PlantUML Diagram" style="max-width: 100%;" />"#, self.image_url(&request.source));
		future::ready(Ok(Some(markup))).boxed_local()
	}
}

/// Lower-case hex of the UTF-8 bytes, as expected after the server's `~h` prefix.
#[must_use]
pub fn encode_hex(text: &str) -> String {
	text.bytes().fold(String::with_capacity(text.len() * 2), |mut hex, byte| {
		let _ = write!(hex, "{:02x}", byte);
		hex
	})
}
