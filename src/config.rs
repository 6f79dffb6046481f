use serde::Deserialize;

/// When deferred controller attachments run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferMode {
	/// Once per [`apply`](`crate::PatchApplier::apply`) call, after every patch of the batch was applied.
	PostBatch,
	/// Only when [`run_deferred`](`crate::PatchApplier::run_deferred`) is called, typically from a microtask.
	Manual,
}

impl Default for DeferMode {
	fn default() -> Self {
		Self::PostBatch
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApplierConfig {
	/// Appended to an element's id to find its helper/error text element.
	pub helper_suffix: String,
	/// Property that, when present and non-empty, overrides `old_props.css_class` as the previous class string.
	pub old_class_key: String,
	pub defer: DeferMode,
}

impl Default for ApplierConfig {
	fn default() -> Self {
		Self {
			helper_suffix: "_helper".to_owned(),
			old_class_key: "old_shared_class".to_owned(),
			defer: DeferMode::default(),
		}
	}
}
