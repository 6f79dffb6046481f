//! The seam between the patch engine and whatever actually owns the element tree.
//!
//! [`PatchApplier`](`crate::PatchApplier`) never keeps element references across patches.
//! Every lookup goes through [`Document::element_by_id`], so the document's identifier index is the only
//! identifier → element table in play.

use crate::error::HostError;

/// A live element handle.
///
/// Handles are cheap to clone and refer to the same underlying node.
pub trait Element: Clone {
	/// The element's `id` attribute, if any.
	fn html_id(&self) -> Option<String>;

	/// Node identity, not structural equality.
	fn is_same_node(&self, other: &Self) -> bool;

	fn add_class(&self, class: &str) -> Result<(), HostError>;
	fn remove_class(&self, class: &str) -> Result<(), HostError>;

	/// Replaces all children with a single text node (or none, if `text` is empty).
	fn set_text_content(&self, text: &str);

	fn set_src(&self, src: &str) -> Result<(), HostError>;
	fn set_title(&self, title: &str) -> Result<(), HostError>;

	/// The *live* value, including whatever the user typed since the last write.
	fn value(&self) -> Option<String>;
	fn set_value(&self, value: &str) -> Result<(), HostError>;
}

/// A host document: owns the tree and the identifier index.
pub trait Document {
	type Element: Element;

	/// Looks up a *connected* element.
	fn element_by_id(&self, html_id: &str) -> Option<Self::Element>;

	/// Parses `markup` (trimmed) and returns its first element, detached.
	///
	/// `Ok(None)` means the markup parsed but contained no element.
	fn parse_fragment(&self, markup: &str) -> Result<Option<Self::Element>, HostError>;

	fn parent(&self, element: &Self::Element) -> Option<Self::Element>;

	/// Inserts (or moves) `node` under `parent`, before `reference` or at the end.
	///
	/// `node` keeps its identity when it is already attached elsewhere.
	fn insert_before(&self, parent: &Self::Element, node: &Self::Element, reference: Option<&Self::Element>) -> Result<(), HostError>;

	/// Detaches `element` from its parent. Detached elements are left as-is.
	fn remove(&self, element: &Self::Element) -> Result<(), HostError>;

	fn replace_child(&self, parent: &Self::Element, new: &Self::Element, old: &Self::Element) -> Result<(), HostError>;
}
