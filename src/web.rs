//! The browser [`Document`], backed by [`web_sys`].
//!
//! `value` and `src` go through [`Reflect`] so that they work on any element kind,
//! matching what a script assigning `el.value`/`el.src` would do.

use crate::{
	error::HostError,
	host::{self, Document},
};
use js_sys::Reflect;
use wasm_bindgen::{JsCast, JsValue};

fn host_error(error: JsValue) -> HostError {
	HostError(format!("{:?}", error))
}

fn set_property(element: &web_sys::Element, name: &str, value: &str) -> Result<(), HostError> {
	Reflect::set(element, &JsValue::from_str(name), &JsValue::from_str(value))
		.map(drop)
		.map_err(host_error)
}

impl host::Element for web_sys::Element {
	fn html_id(&self) -> Option<String> {
		Some(self.id()).filter(|id| !id.is_empty())
	}

	fn is_same_node(&self, other: &Self) -> bool {
		web_sys::Node::is_same_node(self, Some(&**other))
	}

	fn add_class(&self, class: &str) -> Result<(), HostError> {
		self.class_list().add_1(class).map_err(host_error)
	}

	fn remove_class(&self, class: &str) -> Result<(), HostError> {
		self.class_list().remove_1(class).map_err(host_error)
	}

	fn set_text_content(&self, text: &str) {
		web_sys::Node::set_text_content(self, Some(text));
	}

	fn set_src(&self, src: &str) -> Result<(), HostError> {
		set_property(self, "src", src)
	}

	fn set_title(&self, title: &str) -> Result<(), HostError> {
		match self.dyn_ref::<web_sys::HtmlElement>() {
			Some(html_element) => {
				web_sys::HtmlElement::set_title(html_element, title);
				Ok(())
			}
			// SVG and MathML elements don't reflect `title`.
			None => self.set_attribute("title", title).map_err(host_error),
		}
	}

	fn value(&self) -> Option<String> {
		Reflect::get(self, &JsValue::from_str("value")).ok()?.as_string()
	}

	fn set_value(&self, value: &str) -> Result<(), HostError> {
		set_property(self, "value", value)
	}
}

#[derive(Debug, Clone)]
pub struct WebDocument {
	document: web_sys::Document,
}

impl WebDocument {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self { document }
	}

	/// The current window's document, if there is one.
	#[must_use]
	pub fn from_window() -> Option<Self> {
		web_sys::window()?.document().map(Self::new)
	}

	#[must_use]
	pub fn inner(&self) -> &web_sys::Document {
		&self.document
	}
}

impl Document for WebDocument {
	type Element = web_sys::Element;

	fn element_by_id(&self, html_id: &str) -> Option<web_sys::Element> {
		self.document.get_element_by_id(html_id)
	}

	fn parse_fragment(&self, markup: &str) -> Result<Option<web_sys::Element>, HostError> {
		let container = self.document.create_element("div").map_err(host_error)?;
		container.set_inner_html(markup.trim());
		let element = container.first_element_child();
		if let Some(element) = &element {
			element.remove();
		}
		Ok(element)
	}

	fn parent(&self, element: &web_sys::Element) -> Option<web_sys::Element> {
		element.parent_element()
	}

	fn insert_before(&self, parent: &web_sys::Element, node: &web_sys::Element, reference: Option<&web_sys::Element>) -> Result<(), HostError> {
		parent
			.insert_before(node, reference.map(|reference| &**reference))
			.map(drop)
			.map_err(host_error)
	}

	fn remove(&self, element: &web_sys::Element) -> Result<(), HostError> {
		element.remove();
		Ok(())
	}

	fn replace_child(&self, parent: &web_sys::Element, new: &web_sys::Element, old: &web_sys::Element) -> Result<(), HostError> {
		parent.replace_child(new, old).map(drop).map_err(host_error)
	}
}
