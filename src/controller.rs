//! Behavioural controllers attached to inserted elements, and the id-keyed table that owns them.
//!
//! The registry only holds handles. Dropping a handle is the whole teardown as far as this crate is concerned;
//! controllers that need more must hook into the element's lifecycle themselves.

use crate::{error::ControllerError, host::Element};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use serde_json::Value;
use tracing::trace;

/// An attached controller, held opaquely.
pub type ControllerHandle = Box<dyn Any>;

pub trait ControllerFactory<E: Element> {
	fn attach(&mut self, html_id: &str, element: &E, options: &Value) -> Result<ControllerHandle, ControllerError>;
}

impl<E, F> ControllerFactory<E> for F
where
	E: Element,
	F: FnMut(&str, &E, &Value) -> Result<ControllerHandle, ControllerError>,
{
	fn attach(&mut self, html_id: &str, element: &E, options: &Value) -> Result<ControllerHandle, ControllerError> {
		self(html_id, element, options)
	}
}

/// Which INSERT props trigger a factory: a truthy `init_flag`, with options taken from `options_key`.
pub struct ControllerBinding<E: Element> {
	pub init_flag: String,
	pub options_key: String,
	pub factory: Box<dyn ControllerFactory<E>>,
}

impl<E: Element> Debug for ControllerBinding<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ControllerBinding")
			.field("init_flag", &self.init_flag)
			.field("options_key", &self.options_key)
			.finish_non_exhaustive()
	}
}

/// An attachment scheduled by INSERT that hasn't run yet.
pub(crate) struct PendingAttachment<E> {
	pub html_id: String,
	/// The element as inserted. The attachment is stale once the id resolves to anything else.
	pub element: E,
	pub binding: usize,
	pub options: Value,
}

#[derive(Default)]
pub struct ControllerRegistry {
	instances: HashMap<String, ControllerHandle>,
}

impl Debug for ControllerRegistry {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.instances.keys()).finish()
	}
}

impl ControllerRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handle` for `html_id`, dropping any handle previously registered for it.
	pub fn register(&mut self, html_id: impl Into<String>, handle: ControllerHandle) {
		let html_id = html_id.into();
		if self.instances.insert(html_id.clone(), handle).is_some() {
			trace!(html_id = html_id.as_str(), "Replaced controller.");
		}
	}

	pub fn deregister(&mut self, html_id: &str) -> Option<ControllerHandle> {
		self.instances.remove(html_id)
	}

	#[must_use]
	pub fn get(&self, html_id: &str) -> Option<&dyn Any> {
		self.instances.get(html_id).map(|handle| &**handle)
	}

	#[must_use]
	pub fn contains(&self, html_id: &str) -> bool {
		self.instances.contains_key(html_id)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Drops every controller for which `connected` returns `false`. Returns how many were dropped.
	pub fn retain_connected(&mut self, mut connected: impl FnMut(&str) -> bool) -> usize {
		let before = self.instances.len();
		self.instances.retain(|html_id, _| connected(html_id));
		before - self.instances.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::rc::Rc;

	#[test]
	fn register_replaces_and_drops_previous() {
		let first = Rc::new(());
		let mut registry = ControllerRegistry::new();
		registry.register("a", Box::new(Rc::clone(&first)));
		assert_eq!(Rc::strong_count(&first), 2);

		registry.register("a", Box::new(7_u8));
		assert_eq!(Rc::strong_count(&first), 1);
		assert_eq!(registry.get("a").and_then(|handle| handle.downcast_ref::<u8>()), Some(&7));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn retain_connected_drops_the_rest() {
		let mut registry = ControllerRegistry::new();
		for id in ["a", "b", "c"] {
			registry.register(id, Box::new(()));
		}
		assert_eq!(registry.retain_connected(|id| id != "b"), 1);
		assert!(registry.contains("a") && !registry.contains("b") && registry.contains("c"));
		assert!(registry.deregister("a").is_some());
		assert!(registry.deregister("a").is_none());
	}
}
