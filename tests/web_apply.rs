#![cfg(target_arch = "wasm32")]

use patch_dom::{web::WebDocument, Action, Document, Element, Patch, PatchApplier};
use serde_json::json;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlInputElement};

wasm_bindgen_test_configure!(run_in_browser);

fn fresh_root(id: &str) -> PatchApplier<WebDocument> {
	let _ = tracing_wasm::try_set_as_global_default();
	let document = window().unwrap().document().unwrap();
	let root = document.create_element("div").unwrap();
	root.set_id(id);
	document.body().unwrap().append_child(&root).unwrap();
	PatchApplier::new(WebDocument::new(document))
}

#[wasm_bindgen_test]
fn insert_update_remove() {
	let mut applier = fresh_root("web-root-1");
	applier.apply(&[Patch::new(
		Action::Insert,
		"web-n1",
		json!({ "parent_html_id": "web-root-1", "html": "<div id=\"web-n1\">hi</div>" }),
	)]);
	let root = applier.document().element_by_id("web-root-1").unwrap();
	assert_eq!(root.inner_html(), r#"<div id="web-n1">hi</div>"#);

	applier.apply(&[Patch::new(Action::Update, "web-n1", json!({ "props": { "data": "bye", "css_class": "a" } }))]);
	assert_eq!(root.inner_html(), r#"<div id="web-n1" class="a">bye</div>"#);

	applier.apply(&[Patch::new(Action::Remove, "web-n1", json!({}))]);
	assert_eq!(root.inner_html(), "");
}

#[wasm_bindgen_test]
fn move_keeps_typed_input() {
	let mut applier = fresh_root("web-root-2");
	applier.apply(&[
		Patch::new(Action::Insert, "web-a", json!({ "parent_html_id": "web-root-2", "html": "<section id=\"web-a\"></section>" })),
		Patch::new(Action::Insert, "web-b", json!({ "parent_html_id": "web-root-2", "html": "<section id=\"web-b\"></section>" })),
		Patch::new(Action::Insert, "web-input", json!({ "parent_html_id": "web-a", "html": "<input id=\"web-input\">" })),
	]);

	let input = applier.document().element_by_id("web-input").unwrap();
	input.unchecked_ref::<HtmlInputElement>().set_value("typed");

	applier.apply(&[
		Patch::new(Action::Move, "web-input", json!({ "parent_html_id": "web-b" })),
		Patch::new(Action::Update, "web-input", json!({ "props": { "value": "typed" } })),
	]);

	let moved = applier.document().element_by_id("web-input").unwrap();
	assert!(moved.is_same_node(&input));
	assert_eq!(moved.value().as_deref(), Some("typed"));
	assert_eq!(moved.parent_element().unwrap().id(), "web-b");
}

#[wasm_bindgen_test]
fn replace_swaps_the_node() {
	let mut applier = fresh_root("web-root-3");
	applier.apply(&[Patch::new(Action::Insert, "web-x", json!({ "parent_html_id": "web-root-3", "html": "<span id=\"web-x\"></span>" }))]);
	let old = applier.document().element_by_id("web-x").unwrap();

	applier.apply(&[Patch::new(Action::Replace, "web-x", json!({ "new_html": "<img id=\"web-x\">", "new_props": { "tooltip": "t" } }))]);
	let new = applier.document().element_by_id("web-x").unwrap();
	assert!(!new.is_same_node(&old));
	assert_eq!(new.tag_name(), "IMG");
	assert_eq!(new.get_attribute("title").as_deref(), Some("t"));
}
