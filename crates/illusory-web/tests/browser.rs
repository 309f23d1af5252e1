#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use illusory_core::{Document, Options, illusory};
use illusory_web::WebDocument;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

fn element(style: &str) -> HtmlElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = document
        .create_element("div")
        .unwrap()
        .dyn_into::<HtmlElement>()
        .unwrap();
    element.set_attribute("style", style).unwrap();
    document.body().unwrap().append_child(&element).unwrap();
    element
}

#[wasm_bindgen_test]
fn registry_returns_stable_ids() {
    let doc = WebDocument::new().unwrap();
    let card = element("position:absolute;left:10px;top:20px;width:100px;height:50px");

    let id = doc.node_id(&card);
    assert_eq!(doc.node_id(&card), id);
    assert_eq!(doc.parent(id), Some(doc.root()));

    let rect = doc.bounding_rect(id);
    assert_eq!((rect.width, rect.height), (100.0, 50.0));
    card.remove();
}

#[wasm_bindgen_test]
fn inline_styles_round_trip() {
    let doc = WebDocument::new().unwrap();
    let card = element("width:10px;height:10px");
    let id = doc.node_id(&card);

    doc.set_inline_style(id, "opacity", "0.5");
    assert_eq!(doc.inline_style(id, "opacity"), "0.5");
    assert_eq!(doc.computed_style(id, "opacity"), "0.5");
    doc.set_inline_style(id, "opacity", "");
    assert_eq!(doc.inline_style(id, "opacity"), "");
    card.remove();
}

#[wasm_bindgen_test]
fn attributes_set_and_remove() {
    let doc = WebDocument::new().unwrap();
    let card = element("width:10px;height:10px");
    let id = doc.node_id(&card);

    doc.set_attribute(id, "data-id", "7");
    assert_eq!(doc.attribute(id, "data-id").as_deref(), Some("7"));
    assert!(doc.attribute_names(id).contains(&"data-id".to_string()));
    doc.remove_attribute(id, "data-id");
    doc.remove_attribute(id, "data-missing");
    assert_eq!(doc.attribute(id, "data-id"), None);
    card.remove();
}

#[wasm_bindgen_test]
async fn timers_fire_and_clear() {
    let doc = WebDocument::new().unwrap();
    let fired = Rc::new(RefCell::new(Vec::new()));

    let log = fired.clone();
    let cleared = doc.set_timeout(0.0, Box::new(move || log.borrow_mut().push("cleared")));
    doc.clear_timeout(cleared);

    let (tx, rx) = oneshot::channel();
    let log = fired.clone();
    doc.set_timeout(
        5.0,
        Box::new(move || {
            log.borrow_mut().push("fired");
            let _ = tx.send(());
        }),
    );
    rx.await.unwrap();
    assert_eq!(*fired.borrow(), vec!["fired"]);
}

#[wasm_bindgen_test]
async fn transition_restores_the_page() {
    let doc = WebDocument::new().unwrap();
    let from = element("position:absolute;left:0;top:0;width:100px;height:50px");
    let to = element("position:absolute;left:200px;top:100px;width:50px;height:25px");
    let before = doc.bounding_rect(doc.node_id(&from));
    let children = doc.children(doc.root()).len();

    let result = illusory(
        doc.clone(),
        doc.node_id(&from),
        doc.node_id(&to),
        Options::new().with_duration("40ms"),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(doc.children(doc.root()).len(), children);
    assert_eq!(doc.bounding_rect(doc.node_id(&from)), before);
    assert_eq!(from.style().get_property_value("visibility").unwrap(), "");
    from.remove();
    to.remove();
}
