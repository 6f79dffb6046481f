//! An in-memory [`Document`] for native use and tests.
//!
//! Element handles are [`Rc`]-shared, so identity is pointer identity: a moved element is observably the same
//! object afterwards, a replaced one is not.

use crate::{
	error::HostError,
	host::{self, Document},
	markup::{self, ParsedNode},
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter, Write as _},
};
use indexmap::IndexMap;
use std::rc::{Rc, Weak};
use tracing::trace;

#[derive(Clone)]
enum Child {
	Element(MemoryElement),
	Text(String),
}

struct Node {
	name: String,
	attributes: RefCell<IndexMap<String, String>>,
	children: RefCell<Vec<Child>>,
	parent: RefCell<Weak<Node>>,
	value: RefCell<Option<String>>,
	value_writes: Cell<usize>,
}

/// A handle to an element of a [`MemoryDocument`].
#[derive(Clone)]
pub struct MemoryElement(Rc<Node>);

impl Debug for MemoryElement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryElement")
			.field("name", &self.0.name)
			.field("id", &self.attribute("id"))
			.finish()
	}
}

impl MemoryElement {
	fn new(name: &str, attributes: impl IntoIterator<Item = (String, String)>) -> Self {
		let attributes: IndexMap<String, String> = attributes.into_iter().collect();
		// Form controls always have a live value, empty unless the markup says otherwise.
		// A `<textarea>`'s comes from its text, once the children are known.
		let value = match name {
			"input" => Some(attributes.get("value").cloned().unwrap_or_default()),
			"select" | "textarea" => Some(String::new()),
			_ => attributes.get("value").cloned(),
		};
		Self(Rc::new(Node {
			name: name.to_owned(),
			attributes: RefCell::new(attributes),
			children: RefCell::new(Vec::new()),
			parent: RefCell::new(Weak::new()),
			value: RefCell::new(value),
			value_writes: Cell::new(0),
		}))
	}

	fn from_parsed(name: String, attributes: Vec<(String, String)>, children: Vec<ParsedNode>) -> Self {
		let element = Self::new(&name, attributes);
		for child in children {
			let child = match child {
				ParsedNode::Text(text) => Child::Text(text),
				ParsedNode::Element { name, attributes, children } => {
					let child = Self::from_parsed(name, attributes, children);
					*child.0.parent.borrow_mut() = Rc::downgrade(&element.0);
					Child::Element(child)
				}
			};
			element.0.children.borrow_mut().push(child);
		}
		if element.0.name == "textarea" {
			*element.0.value.borrow_mut() = Some(element.text_content());
		}
		element
	}

	#[must_use]
	pub fn tag_name(&self) -> &str {
		&self.0.name
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		self.0.attributes.borrow().get(name).cloned()
	}

	pub fn set_attribute(&self, name: &str, value: &str) {
		self.0.attributes.borrow_mut().insert(name.to_owned(), value.to_owned());
	}

	/// Class tokens in attribute order.
	#[must_use]
	pub fn class_list(&self) -> Vec<String> {
		self.attribute("class")
			.map(|class| class.split_ascii_whitespace().map(str::to_owned).collect())
			.unwrap_or_default()
	}

	fn set_class_list(&self, classes: &[String]) {
		self.set_attribute("class", &classes.join(" "));
	}

	#[must_use]
	pub fn text_content(&self) -> String {
		let mut text = String::new();
		self.collect_text(&mut text);
		text
	}

	fn collect_text(&self, out: &mut String) {
		for child in self.0.children.borrow().iter() {
			match child {
				Child::Text(text) => out.push_str(text),
				Child::Element(element) => element.collect_text(out),
			}
		}
	}

	/// Element children, skipping text.
	#[must_use]
	pub fn children(&self) -> Vec<MemoryElement> {
		self.0
			.children
			.borrow()
			.iter()
			.filter_map(|child| match child {
				Child::Element(element) => Some(element.clone()),
				Child::Text(_) => None,
			})
			.collect()
	}

	/// How often the live value was written through [`host::Element::set_value`].
	#[must_use]
	pub fn value_writes(&self) -> usize {
		self.0.value_writes.get()
	}

	/// Simulates user input: changes the live value without counting as a write.
	pub fn type_text(&self, value: &str) {
		*self.0.value.borrow_mut() = Some(value.to_owned());
	}

	#[must_use]
	pub fn outer_html(&self) -> String {
		let mut html = String::new();
		self.write_html(&mut html);
		html
	}

	fn write_html(&self, out: &mut String) {
		out.push('<');
		out.push_str(&self.0.name);
		for (name, value) in self.0.attributes.borrow().iter() {
			// Writing to a `String` can't fail.
			let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
		}
		out.push('>');
		if markup::is_void_element(&self.0.name) {
			return;
		}
		for child in self.0.children.borrow().iter() {
			match child {
				Child::Text(text) => out.push_str(&escape(text, false)),
				Child::Element(element) => element.write_html(out),
			}
		}
		let _ = write!(out, "</{}>", self.0.name);
	}

	fn parent_element(&self) -> Option<MemoryElement> {
		self.0.parent.borrow().upgrade().map(MemoryElement)
	}

	fn position_in(&self, parent: &MemoryElement) -> Option<usize> {
		parent
			.0
			.children
			.borrow()
			.iter()
			.position(|child| matches!(child, Child::Element(element) if Rc::ptr_eq(&element.0, &self.0)))
	}

	fn detach(&self) {
		if let Some(parent) = self.parent_element() {
			if let Some(index) = self.position_in(&parent) {
				parent.0.children.borrow_mut().remove(index);
			}
		}
		*self.0.parent.borrow_mut() = Weak::new();
	}

	fn find_by_id(&self, html_id: &str) -> Option<MemoryElement> {
		if self.0.attributes.borrow().get("id").map(String::as_str) == Some(html_id) {
			return Some(self.clone());
		}
		self.children().iter().find_map(|child| child.find_by_id(html_id))
	}
}

fn escape(text: &str, attribute: bool) -> String {
	let mut out = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' if attribute => out.push_str("&quot;"),
			c => out.push(c),
		}
	}
	out
}

impl host::Element for MemoryElement {
	fn html_id(&self) -> Option<String> {
		self.attribute("id")
	}

	fn is_same_node(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn add_class(&self, class: &str) -> Result<(), HostError> {
		let mut classes = self.class_list();
		if !classes.iter().any(|c| c == class) {
			classes.push(class.to_owned());
			self.set_class_list(&classes);
		}
		Ok(())
	}

	fn remove_class(&self, class: &str) -> Result<(), HostError> {
		let mut classes = self.class_list();
		let len = classes.len();
		classes.retain(|c| c != class);
		if classes.len() != len {
			self.set_class_list(&classes);
		}
		Ok(())
	}

	fn set_text_content(&self, text: &str) {
		for child in self.0.children.borrow_mut().drain(..) {
			if let Child::Element(element) = child {
				*element.0.parent.borrow_mut() = Weak::new();
			}
		}
		if !text.is_empty() {
			self.0.children.borrow_mut().push(Child::Text(text.to_owned()));
		}
	}

	fn set_src(&self, src: &str) -> Result<(), HostError> {
		self.set_attribute("src", src);
		Ok(())
	}

	fn set_title(&self, title: &str) -> Result<(), HostError> {
		self.set_attribute("title", title);
		Ok(())
	}

	fn value(&self) -> Option<String> {
		self.0.value.borrow().clone()
	}

	fn set_value(&self, value: &str) -> Result<(), HostError> {
		*self.0.value.borrow_mut() = Some(value.to_owned());
		self.0.value_writes.set(self.0.value_writes.get() + 1);
		Ok(())
	}
}

/// An in-memory document rooted at a `<body>` element.
#[derive(Debug)]
pub struct MemoryDocument {
	body: MemoryElement,
}

impl Default for MemoryDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryDocument {
	#[must_use]
	pub fn new() -> Self {
		Self {
			body: MemoryElement::new("body", None),
		}
	}

	/// Creates a document whose `<body>` contains `markup`.
	#[must_use]
	pub fn from_html(markup: &str) -> Self {
		let body = MemoryElement::from_parsed("body".to_owned(), Vec::new(), markup::parse_fragment(markup.trim()));
		Self { body }
	}

	#[must_use]
	pub fn body(&self) -> &MemoryElement {
		&self.body
	}

	/// Inclusive: an element contains itself.
	#[must_use]
	pub fn contains(&self, ancestor: &MemoryElement, node: &MemoryElement) -> bool {
		let mut current = Some(node.clone());
		while let Some(element) = current {
			if Rc::ptr_eq(&element.0, &ancestor.0) {
				return true;
			}
			current = element.parent_element();
		}
		false
	}

	/// The serialized contents of `<body>`.
	#[must_use]
	pub fn inner_html(&self) -> String {
		let html = self.body.outer_html();
		match html.strip_prefix("<body>").and_then(|html| html.strip_suffix("</body>")) {
			Some(inner) => inner.to_owned(),
			None => html,
		}
	}
}

impl Document for MemoryDocument {
	type Element = MemoryElement;

	fn element_by_id(&self, html_id: &str) -> Option<MemoryElement> {
		self.body.find_by_id(html_id)
	}

	fn parse_fragment(&self, markup: &str) -> Result<Option<MemoryElement>, HostError> {
		Ok(markup::parse_fragment(markup.trim()).into_iter().find_map(|node| match node {
			ParsedNode::Element { name, attributes, children } => Some(MemoryElement::from_parsed(name, attributes, children)),
			ParsedNode::Text(_) => None,
		}))
	}

	fn parent(&self, element: &MemoryElement) -> Option<MemoryElement> {
		element.parent_element()
	}

	fn insert_before(&self, parent: &MemoryElement, node: &MemoryElement, reference: Option<&MemoryElement>) -> Result<(), HostError> {
		if self.contains(node, parent) {
			return Err(HostError("HierarchyRequestError: the new child contains the parent".to_owned()));
		}
		if let Some(reference) = reference {
			if !reference.parent_element().map_or(false, |p| Rc::ptr_eq(&p.0, &parent.0)) {
				return Err(HostError("NotFoundError: the reference node is not a child of the parent".to_owned()));
			}
			if Rc::ptr_eq(&reference.0, &node.0) {
				return Ok(());
			}
		}

		node.detach();
		let index = match reference {
			Some(reference) => reference
				.position_in(parent)
				.ok_or_else(|| HostError("NotFoundError: the reference node vanished".to_owned()))?,
			None => parent.0.children.borrow().len(),
		};
		parent.0.children.borrow_mut().insert(index, Child::Element(node.clone()));
		*node.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
		trace!(parent = ?parent, node = ?node, index, "Inserted element.");
		Ok(())
	}

	fn remove(&self, element: &MemoryElement) -> Result<(), HostError> {
		element.detach();
		Ok(())
	}

	fn replace_child(&self, parent: &MemoryElement, new: &MemoryElement, old: &MemoryElement) -> Result<(), HostError> {
		if self.contains(new, parent) {
			return Err(HostError("HierarchyRequestError: the new child contains the parent".to_owned()));
		}
		if old.position_in(parent).is_none() {
			return Err(HostError("NotFoundError: the old node is not a child of the parent".to_owned()));
		}
		if Rc::ptr_eq(&new.0, &old.0) {
			return Ok(());
		}

		new.detach();
		let index = old
			.position_in(parent)
			.ok_or_else(|| HostError("NotFoundError: the old node vanished".to_owned()))?;
		parent.0.children.borrow_mut()[index] = Child::Element(new.clone());
		*new.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
		*old.0.parent.borrow_mut() = Weak::new();
		Ok(())
	}
}
