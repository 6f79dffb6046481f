//! Per-property update policies.
//!
//! Properties are dispatched by name through a registry of [`PropertyHandler`]s.
//! Names without a registered handler are ignored, so producers may send properties this version doesn't know yet.

use crate::{
	config::ApplierConfig,
	error::PatchError,
	host::{Document, Element},
	patch::{is_truthy, value_to_string, PropertyDelta},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::{HashMap, HashSet};
use serde_json::Value;
use tracing::trace;

/// Everything a handler may look at besides the new value.
pub struct PropertyContext<'a, D: Document> {
	pub document: &'a D,
	pub element: &'a D::Element,
	/// The complete delta this property belongs to.
	pub props: &'a PropertyDelta,
	pub old_props: Option<&'a PropertyDelta>,
	pub config: &'a ApplierConfig,
}

pub trait PropertyHandler<D: Document> {
	fn apply(&self, context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError>;
}

impl<D, F> PropertyHandler<D> for F
where
	D: Document,
	F: Fn(&PropertyContext<'_, D>, &Value) -> Result<(), PatchError>,
{
	fn apply(&self, context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
		self(context, value)
	}
}

pub struct PropertyReconciler<D: Document> {
	handlers: HashMap<String, Box<dyn PropertyHandler<D>>>,
}

impl<D: Document> Debug for PropertyReconciler<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.handlers.keys().collect();
		names.sort();
		f.debug_struct("PropertyReconciler").field("handlers", &names).finish()
	}
}

impl<D: Document + 'static> Default for PropertyReconciler<D> {
	fn default() -> Self {
		Self::with_defaults()
	}
}

impl<D: Document + 'static> PropertyReconciler<D> {
	/// A reconciler that ignores every property.
	#[must_use]
	pub fn empty() -> Self {
		Self { handlers: HashMap::new() }
	}

	/// `css_class`, `data`, `src`, `tooltip`, `value` and `errorText`.
	#[must_use]
	pub fn with_defaults() -> Self {
		let mut reconciler = Self::empty();
		reconciler.register("css_class", css_class::<D>);
		reconciler.register("data", text_content::<D>);
		reconciler.register("src", src::<D>);
		reconciler.register("tooltip", tooltip::<D>);
		reconciler.register("value", live_value::<D>);
		reconciler.register("errorText", helper_text::<D>);
		reconciler
	}

	/// Adds a handler, replacing any previous one of the same name.
	pub fn register(&mut self, name: impl Into<String>, handler: impl PropertyHandler<D> + 'static) -> &mut Self {
		self.handlers.insert(name.into(), Box::new(handler));
		self
	}

	pub fn unregister(&mut self, name: &str) -> bool {
		self.handlers.remove(name).is_some()
	}

	#[must_use]
	pub fn handles(&self, name: &str) -> bool {
		self.handlers.contains_key(name)
	}

	/// Applies each property of `props` to `element`, in order.
	///
	/// Stops at the first handler error.
	pub fn reconcile(
		&self,
		document: &D,
		element: &D::Element,
		props: &PropertyDelta,
		old_props: Option<&PropertyDelta>,
		config: &ApplierConfig,
	) -> Result<(), PatchError> {
		let context = PropertyContext {
			document,
			element,
			props,
			old_props,
			config,
		};
		for (name, value) in props {
			match self.handlers.get(name.as_str()) {
				Some(handler) => {
					trace!(property = name.as_str(), "Reconciling property.");
					handler.apply(&context, value)?;
				}
				None => trace!(property = name.as_str(), "No handler for property; ignoring."),
			}
		}
		Ok(())
	}
}

/// `None` for absent, `null` and empty values.
fn class_string(value: Option<&Value>) -> Option<String> {
	value.filter(|value| is_truthy(value)).map(value_to_string)
}

/// Removes classes only in the old string and adds classes only in the new one.
/// Classes present in both, and classes that other code added, are left alone.
fn css_class<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	let old = class_string(context.props.get(&context.config.old_class_key))
		.or_else(|| class_string(context.old_props.and_then(|old_props| old_props.get("css_class"))));
	let new = class_string(Some(value));
	if old == new {
		return Ok(());
	}

	let old = old.unwrap_or_default();
	let new = new.unwrap_or_default();
	let old: HashSet<&str> = old.split_ascii_whitespace().collect();
	let new_ordered: Vec<&str> = new.split_ascii_whitespace().collect();
	let new: HashSet<&str> = new_ordered.iter().copied().collect();

	for class in old.iter().filter(|class| !new.contains(*class)) {
		context.element.remove_class(class)?;
	}
	for class in new_ordered.into_iter().filter(|class| !old.contains(class)) {
		context.element.add_class(class)?;
	}
	Ok(())
}

fn text_content<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	context.element.set_text_content(&value_to_string(value));
	Ok(())
}

fn src<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	Ok(context.element.set_src(&value_to_string(value))?)
}

fn tooltip<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	Ok(context.element.set_title(&value_to_string(value))?)
}

/// Writes only on change, so that the caret of a focused input doesn't jump while the user types.
fn live_value<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	let value = value_to_string(value);
	if context.element.value().as_deref() == Some(value.as_str()) {
		trace!("Live value already up to date.");
		return Ok(());
	}
	Ok(context.element.set_value(&value)?)
}

fn helper_text<D: Document>(context: &PropertyContext<'_, D>, value: &Value) -> Result<(), PatchError> {
	let helper_id = format!("{}{}", context.element.html_id().unwrap_or_default(), context.config.helper_suffix);
	match context.document.element_by_id(&helper_id) {
		Some(helper) => helper.set_text_content(&value_to_string(value)),
		None => trace!(helper_id = helper_id.as_str(), "No helper element."),
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::{MemoryDocument, MemoryElement};
	use serde_json::json;

	fn delta(value: Value) -> PropertyDelta {
		serde_json::from_value(value).unwrap()
	}

	fn reconcile(document: &MemoryDocument, element: &MemoryElement, props: Value, old_props: Option<Value>) {
		let old_props = old_props.map(delta);
		PropertyReconciler::with_defaults()
			.reconcile(document, element, &delta(props), old_props.as_ref(), &ApplierConfig::default())
			.unwrap();
	}

	#[test]
	fn class_delta_converges() {
		let document = MemoryDocument::from_html(r#"<div id="e" class="a b"></div>"#);
		let element = document.element_by_id("e").unwrap();
		reconcile(&document, &element, json!({ "css_class": "b c" }), Some(json!({ "css_class": "a b" })));

		let mut classes = element.class_list();
		classes.sort();
		assert_eq!(classes, ["b", "c"]);
	}

	#[test]
	fn class_delta_keeps_foreign_classes() {
		let document = MemoryDocument::from_html(r#"<div id="e" class="a focused"></div>"#);
		let element = document.element_by_id("e").unwrap();
		reconcile(&document, &element, json!({ "css_class": "c" }), Some(json!({ "css_class": "a" })));
		assert_eq!(element.class_list(), ["focused", "c"]);
	}

	#[test]
	fn old_shared_class_wins_over_old_props() {
		let document = MemoryDocument::from_html(r#"<div id="e" class="shared x"></div>"#);
		let element = document.element_by_id("e").unwrap();
		reconcile(
			&document,
			&element,
			json!({ "css_class": "other", "old_shared_class": "shared" }),
			Some(json!({ "css_class": "x" })),
		);
		assert_eq!(element.class_list(), ["x", "other"]);
	}

	#[test]
	fn unchanged_class_string_is_a_no_op() {
		let document = MemoryDocument::from_html(r#"<div id="e" class="b"></div>"#);
		let element = document.element_by_id("e").unwrap();
		reconcile(&document, &element, json!({ "css_class": "a" }), Some(json!({ "css_class": "a" })));
		assert_eq!(element.class_list(), ["b"]);
	}

	#[test]
	fn value_guard_skips_identical_writes() {
		let document = MemoryDocument::from_html(r#"<input id="i" value="">"#);
		let input = document.element_by_id("i").unwrap();
		input.type_text("hel");

		reconcile(&document, &input, json!({ "value": "hel" }), None);
		assert_eq!(input.value_writes(), 0);

		reconcile(&document, &input, json!({ "value": "hello" }), None);
		assert_eq!((input.value().as_deref(), input.value_writes()), (Some("hello"), 1));
	}

	#[test]
	fn empty_value_on_input_without_value_attribute_is_not_written() {
		let document = MemoryDocument::from_html(r#"<input id="i">"#);
		let input = document.element_by_id("i").unwrap();
		reconcile(&document, &input, json!({ "value": "" }), None);
		assert_eq!(input.value_writes(), 0);
	}

	#[test]
	fn numbers_are_stringified() {
		let document = MemoryDocument::from_html(r#"<input id="i" value="3">"#);
		let input = document.element_by_id("i").unwrap();
		reconcile(&document, &input, json!({ "value": 3 }), None);
		assert_eq!(input.value_writes(), 0);
	}

	#[test]
	fn text_src_and_tooltip() {
		let document = MemoryDocument::from_html(r#"<img id="img"><p id="p">old</p>"#);
		let img = document.element_by_id("img").unwrap();
		let p = document.element_by_id("p").unwrap();
		reconcile(&document, &img, json!({ "src": "/a.png", "tooltip": "A" }), None);
		reconcile(&document, &p, json!({ "data": 42 }), None);

		assert_eq!(img.attribute("src").as_deref(), Some("/a.png"));
		assert_eq!(img.attribute("title").as_deref(), Some("A"));
		assert_eq!(p.text_content(), "42");
	}

	#[test]
	fn error_text_goes_to_helper_element() {
		let document = MemoryDocument::from_html(r#"<input id="email"><span id="email_helper"></span><input id="name">"#);
		let email = document.element_by_id("email").unwrap();
		reconcile(&document, &email, json!({ "errorText": "Invalid address" }), None);
		assert_eq!(document.element_by_id("email_helper").unwrap().text_content(), "Invalid address");

		// No helper: nothing happens.
		let name = document.element_by_id("name").unwrap();
		reconcile(&document, &name, json!({ "errorText": "Required" }), None);
		assert_eq!(document.inner_html(), r#"<input id="email"><span id="email_helper">Invalid address</span><input id="name">"#);
	}

	#[test]
	fn unknown_properties_are_ignored() {
		let document = MemoryDocument::from_html(r#"<p id="p">x</p>"#);
		let p = document.element_by_id("p").unwrap();
		reconcile(&document, &p, json!({ "sparkle": true, "data": "y" }), None);
		assert_eq!(p.outer_html(), r#"<p id="p">y</p>"#);
	}

	#[test]
	fn custom_handlers_extend_the_table() {
		let document = MemoryDocument::from_html(r#"<p id="p"></p>"#);
		let p = document.element_by_id("p").unwrap();
		fn aria_label(context: &PropertyContext<'_, MemoryDocument>, value: &Value) -> Result<(), PatchError> {
			context.element.set_attribute("aria-label", &value_to_string(value));
			Ok(())
		}

		let mut reconciler = PropertyReconciler::<MemoryDocument>::with_defaults();
		reconciler.register("aria_label", aria_label);
		assert!(reconciler.handles("aria_label"));
		reconciler
			.reconcile(&document, &p, &delta(json!({ "aria_label": "Close" })), None, &ApplierConfig::default())
			.unwrap();
		assert_eq!(p.attribute("aria-label").as_deref(), Some("Close"));
	}
}
