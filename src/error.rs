use thiserror::Error;
use tracing::Level;

/// A failure reported by the host document while mutating the tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host document error: {0}")]
pub struct HostError(pub String);

/// A controller factory refused to attach.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("controller attachment failed: {0}")]
pub struct ControllerError(pub String);

/// Why a single patch had no (or only partial) effect.
///
/// None of these are fatal to a batch: [`PatchApplier::apply`](`crate::PatchApplier::apply`) logs each one at
/// [`PatchError::level`] and continues with the next patch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PatchError {
	#[error("target element {html_id:?} not found")]
	MissingTarget { html_id: String },

	#[error("parent element {parent_html_id:?} not found for {html_id:?}")]
	MissingParent { html_id: String, parent_html_id: String },

	#[error("markup for {html_id:?} contains no element")]
	EmptyMarkup { html_id: String },

	#[error("unknown action {action:?}")]
	UnknownAction { action: String },

	#[error("malformed payload: {0}")]
	MalformedPayload(#[from] serde_json::Error),

	#[error(transparent)]
	Host(#[from] HostError),

	#[error(transparent)]
	Controller(#[from] ControllerError),
}

impl PatchError {
	/// The level this error is logged at when it ends a patch.
	#[must_use]
	pub fn level(&self) -> Level {
		match self {
			Self::MissingTarget { .. } | Self::EmptyMarkup { .. } | Self::UnknownAction { .. } => Level::WARN,
			Self::MissingParent { .. } | Self::MalformedPayload(_) | Self::Host(_) | Self::Controller(_) => Level::ERROR,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn levels_follow_severity() {
		assert_eq!(PatchError::MissingTarget { html_id: "a".into() }.level(), Level::WARN);
		assert_eq!(PatchError::UnknownAction { action: "FROB".into() }.level(), Level::WARN);
		assert_eq!(
			PatchError::MissingParent {
				html_id: "a".into(),
				parent_html_id: "p".into()
			}
			.level(),
			Level::ERROR
		);
		assert_eq!(PatchError::Host(HostError("boom".into())).level(), Level::ERROR);
	}

	#[test]
	fn messages_name_the_ids() {
		let error = PatchError::MissingParent {
			html_id: "n1".into(),
			parent_html_id: "root".into(),
		};
		assert_eq!(error.to_string(), r#"parent element "root" not found for "n1""#);
	}
}
