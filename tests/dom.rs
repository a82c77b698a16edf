use peek_sync::dom::{Document, Element, NodeData};

#[test]
fn insert_move_and_detach() {
	let mut document = Document::new();
	let root = document.root();
	let a = document.create_element(Element::new("P"));
	let b = document.create_element(Element::new("p"));
	let c = document.create_text("c");

	assert!(document.append_child(root, a));
	assert!(document.append_child(root, b));
	assert!(document.insert_before(root, c, Some(b)));
	assert_eq!(document.children(root), &[a, c, b]);
	assert_eq!(document.next_sibling(c), Some(b));
	assert_eq!(document.element(a).unwrap().name(), "p");

	// Moving detaches from the old position first.
	assert!(document.append_child(b, c));
	assert_eq!(document.children(root), &[a, b]);
	assert_eq!(document.parent(c), Some(b));

	assert!(document.detach(b));
	assert!(!document.is_connected(c));
	assert!(document.contains(c));
	assert_eq!(document.children(root), &[a]);
}

#[test]
fn refuses_cycles() {
	let mut document = Document::new();
	let root = document.root();
	let outer = document.create_element(Element::new("div"));
	let inner = document.create_element(Element::new("div"));
	document.append_child(root, outer);
	document.append_child(outer, inner);

	assert!(!document.append_child(inner, outer));
	assert!(!document.append_child(outer, root));
	assert_eq!(document.parent(outer), Some(root));
}

#[test]
fn freed_ids_go_stale() {
	let mut document = Document::new();
	let root = document.root();
	let list = document.create_element(Element::new("ul"));
	let item = document.create_element(Element::new("li"));
	document.append_child(root, list);
	document.append_child(list, item);
	let before = document.len();

	document.remove_subtree(list);
	assert!(!document.contains(list));
	assert!(!document.contains(item));
	assert_eq!(document.len(), before - 2);
	assert!(document.children(list).is_empty());
	assert_eq!(document.parent(item), None);

	// Slots are reused under a new generation.
	let reused = document.create_text("new");
	assert_ne!(reused, list);
	assert_ne!(reused, item);
	assert!(!document.contains(list) && !document.contains(item));
	assert!(document.contains(reused));
}

#[test]
fn attributes_and_style() {
	let mut element = Element::new("div").with_attribute("class", "a peek-mermaid-container b").with_attribute("style", "color: red; height: 10px;");
	assert!(element.has_class("peek-mermaid-container"));
	assert!(!element.has_class("peek"));
	assert_eq!(element.style_property("height"), Some("10px"));
	assert_eq!(element.style_property("HEIGHT"), Some("10px"));

	element.set_style_property("height", "120px");
	assert_eq!(element.style_property("height"), Some("120px"));
	assert_eq!(element.style_property("color"), Some("red"));

	element.set_style_property("height", "");
	element.set_style_property("color", "");
	assert!(!element.has_attribute("style"));

	assert_eq!(element.set_attribute("id", ""), None);
	assert_eq!(element.id(), None);
	assert_eq!(element.remove_attribute("id"), Some(String::new()));
}

#[test]
fn equality_ignores_attribute_order() {
	let mut a = Document::new();
	let mut b = Document::new();
	let x = a.create_element(Element::new("div").with_attribute("id", "x").with_attribute("class", "c"));
	let y = b.create_element(Element::new("div").with_attribute("class", "c").with_attribute("id", "x"));
	let (root_a, root_b) = (a.root(), b.root());
	a.append_child(root_a, x);
	b.append_child(root_b, y);
	assert!(a.is_equal_node(x, &b, y));

	let text = b.create_text("differs");
	b.append_child(y, text);
	assert!(!a.is_equal_node(x, &b, y));
	assert!(!a.is_equal_node(root_a, &b, root_b));
}

#[test]
fn import_and_serialize() {
	let mut source = Document::new();
	let details = source.create_element(Element::new("details").with_attribute("open", ""));
	let summary = source.create_element(Element::new("summary"));
	let text = source.create_text("a < b & \"c\"");
	let br = source.create_element(Element::new("br"));
	let comment = source.create_comment(" note ");
	source.append_child(summary, text);
	source.append_child(details, summary);
	source.append_child(details, br);
	source.append_child(details, comment);

	let mut target = Document::new();
	let copy = target.import(&source, details).unwrap();
	assert_eq!(target.parent(copy), None);
	assert!(target.is_equal_node(copy, &source, details));
	assert_eq!(target.outer_html(copy), r#"<details open=""><summary>a &lt; b &amp; "c"</summary><br><!-- note --></details>"#);

	let root = target.root();
	target.append_child(root, copy);
	assert_eq!(target.inner_html(root), target.outer_html(copy));
	assert!(matches!(target.data(root), Some(NodeData::Root)));
	assert_eq!(target.import(&source, source.root()), None);
}

#[test]
fn descendants_are_pre_order() {
	let mut document = Document::new();
	let root = document.root();
	let a = document.create_element(Element::new("a"));
	let b = document.create_element(Element::new("b"));
	let c = document.create_element(Element::new("c"));
	let d = document.create_element(Element::new("d"));
	document.append_child(root, a);
	document.append_child(a, b);
	document.append_child(a, c);
	document.append_child(root, d);

	assert_eq!(document.descendants(root).collect::<Vec<_>>(), vec![a, b, c, d]);
	assert_eq!(document.descendants(a).collect::<Vec<_>>(), vec![b, c]);
}

#[test]
fn churn_reuses_slots() {
	let mut document = Document::new();
	let root = document.root();
	let before = document.len();

	for _ in 0..1000 {
		let paragraph = document.create_element(Element::new("p"));
		let text = document.create_text("x");
		document.append_child(root, paragraph);
		document.append_child(paragraph, text);
		document.remove_subtree(paragraph);
	}
	assert_eq!(document.len(), before);
	assert!(document.children(root).is_empty());
}
