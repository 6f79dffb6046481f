use crate::{
	config::{ApplierConfig, DeferMode},
	controller::{ControllerBinding, ControllerFactory, ControllerRegistry, PendingAttachment},
	error::PatchError,
	host::{Document, Element},
	patch::{is_truthy, Action, InsertData, MoveData, Patch, PropertyDelta, ReplaceData, UpdateData},
	reconcile::PropertyReconciler,
};
use core::{
	fmt::{self, Debug, Formatter},
	mem,
};
use serde_json::Value;
use tracing::{debug, error, instrument, trace, trace_span, warn, Level};

/// Running totals, for spotting producer/consumer drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
	pub applied: usize,
	pub failed: usize,
	pub missing_targets: usize,
	pub missing_parents: usize,
	pub empty_markup: usize,
	pub unknown_actions: usize,
	pub malformed_payloads: usize,
	/// A `before_id` was given but didn't name a child of the parent, so the element was appended instead.
	pub before_fallbacks: usize,
	pub controllers_attached: usize,
	/// Deferred attachments dropped because their element was removed or replaced before they ran.
	pub stale_attachments_skipped: usize,
}

impl Diagnostics {
	fn record(&mut self, error: &PatchError) {
		self.failed += 1;
		match error {
			PatchError::MissingTarget { .. } => self.missing_targets += 1,
			PatchError::MissingParent { .. } => self.missing_parents += 1,
			PatchError::EmptyMarkup { .. } => self.empty_markup += 1,
			PatchError::UnknownAction { .. } => self.unknown_actions += 1,
			PatchError::MalformedPayload(_) => self.malformed_payloads += 1,
			PatchError::Host(_) | PatchError::Controller(_) => (),
		}
	}
}

/// Applies patch batches to a host [`Document`] it owns.
///
/// Elements are located through the document's id index on every patch, and moved or updated in place;
/// only INSERT creates elements and only REMOVE and REPLACE discard them.
///
/// # Failure isolation
///
/// A patch that fails (see [`PatchError`]) is logged and skipped. The rest of the batch is still applied.
pub struct PatchApplier<D: Document> {
	document: D,
	reconciler: PropertyReconciler<D>,
	bindings: Vec<ControllerBinding<D::Element>>,
	controllers: ControllerRegistry,
	pending: Vec<PendingAttachment<D::Element>>,
	config: ApplierConfig,
	diagnostics: Diagnostics,
}

impl<D: Document + Debug> Debug for PatchApplier<D> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("PatchApplier")
			.field("document", &self.document)
			.field("reconciler", &self.reconciler)
			.field("bindings", &self.bindings)
			.field("controllers", &self.controllers)
			.field("pending", &self.pending.len())
			.field("config", &self.config)
			.field("diagnostics", &self.diagnostics)
			.finish()
	}
}

impl<D: Document + 'static> PatchApplier<D> {
	#[must_use]
	pub fn new(document: D) -> Self {
		Self::with_config(document, ApplierConfig::default())
	}

	#[must_use]
	pub fn with_config(document: D, config: ApplierConfig) -> Self {
		Self {
			document,
			reconciler: PropertyReconciler::with_defaults(),
			bindings: Vec::new(),
			controllers: ControllerRegistry::new(),
			pending: Vec::new(),
			config,
			diagnostics: Diagnostics::default(),
		}
	}

	pub fn document(&self) -> &D {
		&self.document
	}

	pub fn into_document(self) -> D {
		self.document
	}

	/// The property handler table, open for extension.
	pub fn reconciler_mut(&mut self) -> &mut PropertyReconciler<D> {
		&mut self.reconciler
	}

	pub fn controllers(&self) -> &ControllerRegistry {
		&self.controllers
	}

	pub fn config(&self) -> &ApplierConfig {
		&self.config
	}

	pub fn diagnostics(&self) -> Diagnostics {
		self.diagnostics
	}

	/// Deferred controller attachments that haven't run yet.
	pub fn pending_attachments(&self) -> usize {
		self.pending.len()
	}

	/// Attaches `factory` to inserted elements whose props carry a truthy `init_flag`.
	/// The factory receives `props[options_key]`, or `{}` if that's absent.
	pub fn bind_controller(
		&mut self,
		init_flag: impl Into<String>,
		options_key: impl Into<String>,
		factory: impl ControllerFactory<D::Element> + 'static,
	) -> &mut Self {
		self.bindings.push(ControllerBinding {
			init_flag: init_flag.into(),
			options_key: options_key.into(),
			factory: Box::new(factory),
		});
		self
	}

	/// Applies `patches` in order.
	///
	/// With [`DeferMode::PostBatch`], controller attachments scheduled by this batch run afterwards.
	#[instrument(skip_all, fields(patches = patches.len()))]
	pub fn apply(&mut self, patches: &[Patch]) {
		for patch in patches {
			let span = trace_span!("Applying patch", action = patch.action.as_str(), html_id = patch.html_id.as_str());
			let _enter = span.enter();
			match self.apply_patch(patch) {
				Ok(()) => self.diagnostics.applied += 1,
				Err(error) => {
					self.diagnostics.record(&error);
					log_failure(patch, &error);
				}
			}
		}

		self.drop_detached_controllers();
		if self.config.defer == DeferMode::PostBatch {
			self.run_deferred();
		}
	}

	/// Decodes a JSON array of patches and applies it.
	///
	/// Entries that aren't patches are skipped individually.
	#[instrument(skip_all)]
	pub fn apply_json(&mut self, json: &str) {
		let values: Vec<Value> = match serde_json::from_str(json) {
			Ok(values) => values,
			Err(error) => return error!(%error, "Patches must be a JSON array."),
		};

		let mut patches = Vec::with_capacity(values.len());
		for value in values {
			match serde_json::from_value::<Patch>(value) {
				Ok(patch) => patches.push(patch),
				Err(error) => {
					let error = PatchError::from(error);
					self.diagnostics.record(&error);
					error!(%error, "Skipping undecodable patch.");
				}
			}
		}
		self.apply(&patches);
	}

	/// Runs the deferred controller attachments. Returns how many controllers were attached.
	///
	/// Attachments whose element is no longer the one its id resolves to are skipped.
	#[instrument(skip(self), fields(pending = self.pending.len()))]
	pub fn run_deferred(&mut self) -> usize {
		let mut attached = 0;
		for PendingAttachment { html_id, element, binding, options } in mem::take(&mut self.pending) {
			let current = self.document.element_by_id(&html_id);
			if !current.map_or(false, |current| current.is_same_node(&element)) {
				debug!(html_id = html_id.as_str(), "Element is gone; skipping controller attachment.");
				self.diagnostics.stale_attachments_skipped += 1;
				continue;
			}

			let binding = match self.bindings.get_mut(binding) {
				Some(binding) => binding,
				None => continue,
			};
			match binding.factory.attach(&html_id, &element, &options) {
				Ok(handle) => {
					trace!(html_id = html_id.as_str(), init_flag = binding.init_flag.as_str(), "Attached controller.");
					self.controllers.register(html_id, handle);
					self.diagnostics.controllers_attached += 1;
					attached += 1;
				}
				Err(error) => {
					let error = PatchError::from(error);
					self.diagnostics.record(&error);
					error!(html_id = html_id.as_str(), %error, "Failed to attach controller.");
				}
			}
		}
		attached
	}

	fn apply_patch(&mut self, patch: &Patch) -> Result<(), PatchError> {
		let html_id = patch.html_id.as_str();
		match patch.action()? {
			Action::Insert => self.insert(html_id, patch.payload()?),
			Action::Remove => self.remove(html_id),
			Action::Update => self.update(html_id, patch.payload()?),
			Action::Move => self.move_element(html_id, patch.payload()?),
			Action::Replace => self.replace(html_id, patch.payload()?),
		}
	}

	fn target(&self, html_id: &str) -> Result<D::Element, PatchError> {
		self.document
			.element_by_id(html_id)
			.ok_or_else(|| PatchError::MissingTarget { html_id: html_id.to_owned() })
	}

	fn parent(&self, html_id: &str, parent_html_id: &str) -> Result<D::Element, PatchError> {
		self.document.element_by_id(parent_html_id).ok_or_else(|| PatchError::MissingParent {
			html_id: html_id.to_owned(),
			parent_html_id: parent_html_id.to_owned(),
		})
	}

	/// Resolves `before_id` to a child of `parent`, or `None` to append.
	fn reference_child(&mut self, parent: &D::Element, before_id: Option<&str>) -> Option<D::Element> {
		let before_id = before_id.filter(|before_id| !before_id.is_empty())?;
		let reference = self
			.document
			.element_by_id(before_id)
			.filter(|before| self.document.parent(before).map_or(false, |p| p.is_same_node(parent)));
		if reference.is_none() {
			debug!(before_id, "Reference element is not a child of the parent; appending instead.");
			self.diagnostics.before_fallbacks += 1;
		}
		reference
	}

	fn insert(&mut self, html_id: &str, data: InsertData) -> Result<(), PatchError> {
		let InsertData {
			parent_html_id,
			html,
			props,
			before_id,
		} = data;

		let parent = self.parent(html_id, &parent_html_id)?;
		let element = self
			.document
			.parse_fragment(&html)?
			.ok_or_else(|| PatchError::EmptyMarkup { html_id: html_id.to_owned() })?;

		if element.html_id().as_deref() != Some(html_id) {
			warn!(markup_id = ?element.html_id(), "Inserted markup doesn't carry the target id.");
		}
		if self.document.element_by_id(html_id).is_some() {
			warn!("An element with the target id is already present.");
		}

		let reference = self.reference_child(&parent, before_id.as_deref());
		self.document.insert_before(&parent, &element, reference.as_ref())?;
		trace!(parent_html_id = parent_html_id.as_str(), "Inserted element.");

		match props {
			Some(props) => {
				self.schedule_controllers(html_id, &element, &props);
				self.reconciler.reconcile(&self.document, &element, &props, None, &self.config)
			}
			None => Ok(()),
		}
	}

	fn schedule_controllers(&mut self, html_id: &str, element: &D::Element, props: &PropertyDelta) {
		for (binding, ControllerBinding { init_flag, options_key, .. }) in self.bindings.iter().enumerate() {
			if !props.get(init_flag).map_or(false, is_truthy) {
				continue;
			}
			trace!(init_flag = init_flag.as_str(), "Scheduling controller attachment.");
			self.pending.push(PendingAttachment {
				html_id: html_id.to_owned(),
				element: element.clone(),
				binding,
				options: props.get(options_key).cloned().unwrap_or_else(|| Value::Object(serde_json::Map::new())),
			});
		}
	}

	fn remove(&mut self, html_id: &str) -> Result<(), PatchError> {
		let element = self.target(html_id)?;
		self.document.remove(&element)?;
		trace!("Removed element.");
		self.release_controllers(html_id);
		Ok(())
	}

	fn update(&mut self, html_id: &str, data: UpdateData) -> Result<(), PatchError> {
		let element = self.target(html_id)?;
		self.reconciler
			.reconcile(&self.document, &element, &data.props, data.old_props.as_ref(), &self.config)
	}

	fn move_element(&mut self, html_id: &str, data: MoveData) -> Result<(), PatchError> {
		let element = self.target(html_id)?;
		let parent = self.parent(html_id, &data.parent_html_id)?;
		let reference = self.reference_child(&parent, data.before_id.as_deref());
		self.document.insert_before(&parent, &element, reference.as_ref())?;
		trace!(parent_html_id = data.parent_html_id.as_str(), "Moved element.");
		Ok(())
	}

	fn replace(&mut self, html_id: &str, data: ReplaceData) -> Result<(), PatchError> {
		let old = self.target(html_id)?;
		let parent = self.document.parent(&old).ok_or_else(|| PatchError::MissingTarget { html_id: html_id.to_owned() })?;
		let new = self
			.document
			.parse_fragment(&data.new_html)?
			.ok_or_else(|| PatchError::EmptyMarkup { html_id: html_id.to_owned() })?;

		self.document.replace_child(&parent, &new, &old)?;
		trace!("Replaced element.");
		self.release_controllers(html_id);

		if let Some(new_props) = &data.new_props {
			self.reconciler.reconcile(&self.document, &new, new_props, None, &self.config)?;
		}
		Ok(())
	}

	/// Drops the controller of `html_id` and cancels its pending attachments.
	fn release_controllers(&mut self, html_id: &str) {
		if self.controllers.deregister(html_id).is_some() {
			trace!("Dropped controller.");
		}
		self.pending.retain(|pending| pending.html_id != html_id);
	}

	/// Drops controllers whose element left the tree some other way,
	/// e.g. as a descendant of a removed element or through a text content write on an ancestor.
	fn drop_detached_controllers(&mut self) {
		let document = &self.document;
		let dropped = self.controllers.retain_connected(|id| document.element_by_id(id).is_some());
		if dropped > 0 {
			debug!(dropped, "Dropped controllers of detached elements.");
		}
	}
}

fn log_failure(patch: &Patch, error: &PatchError) {
	if cfg!(feature = "dangerous-logging") {
		if error.level() == Level::ERROR {
			error!(?patch, %error, "Failed to process patch.")
		} else {
			warn!(?patch, %error, "Patch had no effect.")
		}
	} else {
		let (action, html_id) = (patch.action.as_str(), patch.html_id.as_str());
		if error.level() == Level::ERROR {
			error!(action, html_id, %error, "Failed to process patch.")
		} else {
			warn!(action, html_id, %error, "Patch had no effect.")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryDocument;
	use serde_json::json;

	fn applier(html: &str) -> PatchApplier<MemoryDocument> {
		PatchApplier::new(MemoryDocument::from_html(html))
	}

	#[test]
	fn before_fallback_is_counted() {
		let mut applier = applier(r#"<div id="root"><p id="a"></p></div><p id="elsewhere"></p>"#);
		applier.apply(&[
			Patch::new(Action::Insert, "b", json!({ "parent_html_id": "root", "html": "<p id=\"b\"></p>", "before_id": "elsewhere" })),
			Patch::new(Action::Insert, "c", json!({ "parent_html_id": "root", "html": "<p id=\"c\"></p>", "before_id": "a" })),
			Patch::new(Action::Insert, "d", json!({ "parent_html_id": "root", "html": "<p id=\"d\"></p>", "before_id": "" })),
		]);

		assert_eq!(
			applier.document().inner_html(),
			r#"<div id="root"><p id="c"></p><p id="a"></p><p id="b"></p><p id="d"></p></div><p id="elsewhere"></p>"#
		);
		assert_eq!(applier.diagnostics().before_fallbacks, 1);
		assert_eq!(applier.diagnostics().applied, 3);
	}

	#[test]
	fn failures_are_counted_by_kind() {
		let mut applier = applier(r#"<div id="root"></div>"#);
		applier.apply(&[
			Patch::new(Action::Update, "nope", json!({ "props": {} })),
			Patch::new(Action::Insert, "x", json!({ "parent_html_id": "nope", "html": "<p id=\"x\"></p>" })),
			Patch::new(Action::Insert, "x", json!({ "parent_html_id": "root", "html": "text only" })),
			Patch::new(Action::Insert, "x", json!({ "parent_html_id": "root" })),
			Patch {
				action: "SPLICE".into(),
				html_id: "x".into(),
				data: Value::Null,
			},
		]);

		let diagnostics = applier.diagnostics();
		assert_eq!(
			diagnostics,
			Diagnostics {
				failed: 5,
				missing_targets: 1,
				missing_parents: 1,
				empty_markup: 1,
				unknown_actions: 1,
				malformed_payloads: 1,
				..Diagnostics::default()
			}
		);
		assert_eq!(applier.document().inner_html(), r#"<div id="root"></div>"#);
	}

	#[test]
	fn move_into_own_subtree_fails_without_damage() {
		let mut applier = applier(r#"<div id="outer"><div id="inner"></div></div>"#);
		applier.apply(&[Patch::new(Action::Move, "outer", json!({ "parent_html_id": "inner" }))]);

		assert_eq!(applier.diagnostics().failed, 1);
		assert_eq!(applier.document().inner_html(), r#"<div id="outer"><div id="inner"></div></div>"#);
	}

	#[test]
	fn move_before_itself_keeps_position() {
		let mut applier = applier(r#"<ul id="l"><li id="a"></li><li id="b"></li></ul>"#);
		applier.apply(&[Patch::new(Action::Move, "a", json!({ "parent_html_id": "l", "before_id": "a" }))]);

		assert_eq!(applier.document().inner_html(), r#"<ul id="l"><li id="a"></li><li id="b"></li></ul>"#);
		assert_eq!(applier.diagnostics().applied, 1);
	}

	#[test]
	fn json_batches_skip_bad_entries() {
		let mut applier = applier(r#"<div id="root"></div>"#);
		applier.apply_json(
			r#"[
				{ "action": "INSERT", "html_id": "a", "data": { "parent_html_id": "root", "html": "<i id=\"a\">1</i>" } },
				{ "html_id": "no-action" },
				{ "action": "UPDATE", "html_id": "a", "data": { "props": { "data": 2 } } }
			]"#,
		);
		assert_eq!(applier.document().inner_html(), r#"<div id="root"><i id="a">2</i></div>"#);
		assert_eq!((applier.diagnostics().applied, applier.diagnostics().malformed_payloads), (2, 1));

		applier.apply_json(r#"{ "action": "REMOVE", "html_id": "a" }"#);
		assert!(applier.document().element_by_id("a").is_some());
	}
}
