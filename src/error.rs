use thiserror::Error;

/// Markup that could not be loaded into a [`Document`](`crate::dom::Document`).
#[derive(Debug, Error)]
pub enum LoadError {
	#[error("malformed markup at byte {position}: {message}")]
	Syntax { position: u64, message: String },
}

/// A diagram that could not be rendered. Recovered locally by showing an error marker in place of the diagram.
#[derive(Debug, Error)]
pub enum RenderError {
	#[error("renderer failed: {0}")]
	Failed(String),
	#[error("rendered markup is malformed: {0}")]
	Malformed(#[from] LoadError),
}
impl RenderError {
	#[must_use]
	pub fn failed(message: impl ToString) -> Self {
		Self::Failed(message.to_string())
	}
}

#[derive(Debug, Error)]
pub enum MessageError {
	#[error("invalid message payload: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid preview configuration: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Load(#[from] LoadError),
	#[error(transparent)]
	Message(#[from] MessageError),
	#[error(transparent)]
	Config(#[from] ConfigError),
}
