use futures::{
	future::{self, LocalBoxFuture},
	FutureExt as _,
};
use peek_sync::{
	diagram::{DiagramRegistry, RenderRequest, MERMAID},
	diff::{diagram_key, MergeReport, Reconciler},
	dom::{Document, Element, NodeData, NodeId},
	error::RenderError,
	load::parse_fragment,
};

use fixed_viewport_::init_tracing;

fn registry() -> DiagramRegistry {
	let mut registry = DiagramRegistry::new();
	registry.register(MERMAID, |_: RenderRequest| -> LocalBoxFuture<'static, Result<Option<String>, RenderError>> { future::ready(Ok(None)).boxed_local() });
	registry
}

fn merge(reconciler: &mut Reconciler, document: &mut Document, html: &str, registry: &DiagramRegistry) -> MergeReport {
	reconciler.merge(document, &parse_fragment(html).unwrap(), registry)
}

fn diagram(id: &str, definition: &str) -> String {
	format!(
		r#"<div class="peek-mermaid-container"><div id="{}" data-graph="mermaid" data-graph-definition="{}"><span class="peek-loader"></span></div></div>"#,
		id, definition
	)
}

fn placeholder(document: &Document) -> NodeId {
	let container = document.children(document.root())[0];
	document.children(container)[0]
}

/// Does what a finished render does to a placeholder.
fn render_into(document: &mut Document, placeholder: NodeId) {
	let loader = document.children(placeholder)[0];
	document.remove_subtree(loader);
	let svg = document.create_element(Element::new("svg"));
	document.append_child(placeholder, svg);
	let container = document.parent(placeholder).unwrap();
	document.element_mut(container).unwrap().set_style_property("height", "120px");
}

#[test]
fn into_empty_document() {
	init_tracing();
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	let html = format!(r#"<p data-line-begin="1">Hi</p>{}"#, diagram("m1", "graph TD; A-->B"));
	let report = merge(&mut reconciler, &mut document, &html, &registry);

	assert!(report.child_list_changed);
	assert_eq!(report.kept_diagrams, 0);
	assert_eq!(report.discarded, 0);
	assert_eq!(report.added_diagrams.len(), 1);
	let (kind, added) = report.added_diagrams[0];
	assert_eq!(kind, "mermaid");
	assert_eq!(document.element(added).unwrap().id(), Some("m1"));
	assert_eq!(document.inner_html(document.root()), html.replace("-->", "--&gt;"));
}

#[test]
fn identical_merge_changes_nothing() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();
	let html = r#"<h1 data-line-begin="1">Title</h1><p data-line-begin="3">Text</p>"#;

	merge(&mut reconciler, &mut document, html, &registry);
	let before: Vec<NodeId> = document.descendants(document.root()).collect();
	let report = merge(&mut reconciler, &mut document, html, &registry);

	assert_eq!(report, MergeReport::default());
	assert_eq!(document.descendants(document.root()).collect::<Vec<_>>(), before);
}

#[test]
fn text_edits_keep_nodes() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, r#"<p data-line-begin="1">before</p>"#, &registry);
	let p = document.children(document.root())[0];
	let text = document.children(p)[0];

	let report = merge(&mut reconciler, &mut document, r#"<p data-line-begin="2">after</p>"#, &registry);
	assert!(!report.child_list_changed);
	assert_eq!(document.children(document.root()), &[p]);
	assert_eq!(document.children(p), &[text]);
	assert_eq!(document.data(text), Some(&NodeData::Text("after".to_owned())));
	assert_eq!(document.element(p).unwrap().attribute("data-line-begin"), Some("2"));
}

#[test]
fn removals_are_freed() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, "<p>a</p><p>b</p><ul><li>c</li></ul>", &registry);
	let list = document.children(document.root())[2];
	let report = merge(&mut reconciler, &mut document, "<p>a</p>", &registry);

	assert!(report.child_list_changed);
	assert_eq!(report.discarded, 2);
	assert!(!document.contains(list));
	assert_eq!(document.inner_html(document.root()), "<p>a</p>");
}

#[test]
fn open_toggle_survives_updates() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, "<details><summary>More</summary>one</details>", &registry);
	let details = document.children(document.root())[0];
	// The user expands it.
	document.element_mut(details).unwrap().set_attribute("open", "");

	merge(&mut reconciler, &mut document, "<details><summary>More</summary>two</details>", &registry);
	assert_eq!(document.children(document.root()), &[details]);
	let element = document.element(details).unwrap();
	assert!(element.has_attribute("open"));
	assert_eq!(document.inner_html(details), "<summary>More</summary>two");

	// Unchanged content stays open too.
	merge(&mut reconciler, &mut document, "<details><summary>More</summary>two</details>", &registry);
	assert!(document.element(details).unwrap().has_attribute("open"));
}

#[test]
fn closed_toggle_follows_the_fragment() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, "<details><summary>More</summary></details>", &registry);
	merge(&mut reconciler, &mut document, "<details open><summary>More</summary></details>", &registry);
	let details = document.children(document.root())[0];
	assert!(document.element(details).unwrap().has_attribute("open"));
}

#[test]
fn rendered_diagrams_are_kept() {
	init_tracing();
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, &format!("{}<p>a</p>", diagram("m1", "graph TD; A-->B")), &registry);
	let live = placeholder(&document);
	render_into(&mut document, live);

	let report = merge(&mut reconciler, &mut document, &format!("{}<p>b</p>", diagram("m1", "graph TD; A-->B")), &registry);

	assert!(report.added_diagrams.is_empty());
	assert_eq!(report.kept_diagrams, 1);
	assert!(!report.child_list_changed);
	assert_eq!(placeholder(&document), live);
	assert_eq!(document.inner_html(live), "<svg></svg>");

	let container = document.parent(live).unwrap();
	assert_eq!(document.element(container).unwrap().style_property("height"), Some("120px"));
	assert_eq!(diagram_key(&document, live, &registry).map(|key| key.id), Some("m1".to_owned()));
}

#[test]
fn changed_definition_updates_attributes_only() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, &diagram("m1", "graph TD; A-->B"), &registry);
	let live = placeholder(&document);
	render_into(&mut document, live);

	merge(&mut reconciler, &mut document, &diagram("m1", "graph TD; A-->C"), &registry);
	assert_eq!(placeholder(&document), live);
	assert_eq!(document.element(live).unwrap().attribute("data-graph-definition"), Some("graph TD; A-->C"));
	assert_eq!(document.inner_html(live), "<svg></svg>");
}

#[test]
fn new_id_means_new_placeholder() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	merge(&mut reconciler, &mut document, &diagram("m1", "graph TD; A-->B"), &registry);
	let old = placeholder(&document);
	render_into(&mut document, old);

	let report = merge(&mut reconciler, &mut document, &diagram("m2", "graph TD; A-->B"), &registry);

	assert!(!document.contains(old));
	assert_eq!(report.kept_diagrams, 0);
	assert_eq!(report.discarded, 1);
	let new = placeholder(&document);
	assert_eq!(report.added_diagrams, vec![("mermaid", new)]);
	assert_eq!(document.inner_html(new), r#"<span class="peek-loader"></span>"#);
	assert_eq!(document.children(document.parent(new).unwrap()), &[new]);
}

#[test]
fn placeholders_move_with_their_content() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	let placeholder_html = r#"<div id="m1" data-graph="mermaid" data-graph-definition="graph LR; X-->Y"></div>"#;
	merge(&mut reconciler, &mut document, &format!("<p>a</p>{}", placeholder_html), &registry);
	let live = document.children(document.root())[1];
	let svg = document.create_element(Element::new("svg"));
	document.append_child(live, svg);

	let report = merge(&mut reconciler, &mut document, &format!("<p>new</p><p>a</p>{}", placeholder_html), &registry);

	assert!(report.child_list_changed);
	assert_eq!(report.kept_diagrams, 1);
	assert!(report.added_diagrams.is_empty());
	let children = document.children(document.root());
	assert_eq!(children.len(), 3);
	assert_eq!(children[2], live);
	assert_eq!(document.children(live), &[svg]);
	assert_eq!(document.inner_html(document.root()), r#"<p>new</p><p>a</p><div id="m1" data-graph="mermaid" data-graph-definition="graph LR; X--&gt;Y"><svg></svg></div>"#);
}

#[test]
fn placeholders_move_between_containers() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	let placeholder_html = r#"<div id="m1" data-graph="mermaid" data-graph-definition="a"></div>"#;
	merge(&mut reconciler, &mut document, &format!("<section>{}</section>", placeholder_html), &registry);
	let live = document.children(document.children(document.root())[0])[0];

	let report = merge(&mut reconciler, &mut document, &format!("<blockquote>{}</blockquote>", placeholder_html), &registry);

	assert_eq!(report.kept_diagrams, 1);
	assert!(report.added_diagrams.is_empty());
	let quote = document.children(document.root())[0];
	assert_eq!(document.element(quote).unwrap().name(), "blockquote");
	assert_eq!(document.children(quote), &[live]);
	assert!(document.is_connected(live));
}

#[test]
fn unregistered_kinds_are_plain_elements() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();

	let report = merge(&mut reconciler, &mut document, r#"<div id="x" data-graph="graphviz"></div>"#, &registry);
	assert!(report.added_diagrams.is_empty());
	let node = document.children(document.root())[0];
	assert_eq!(diagram_key(&document, node, &registry), None);
}

#[test]
fn depth_limit_truncates() {
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::with_depth_limit(2);

	merge(&mut reconciler, &mut document, "<div><div><div><p>deep</p></div></div></div>", &registry);
	assert_eq!(document.inner_html(document.root()), "<div><div></div></div>");
}

#[test]
fn unrendered_placeholders_survive_identical_updates() {
	init_tracing();
	let registry = registry();
	let mut document = Document::new();
	let mut reconciler = Reconciler::new();
	let html = format!("{}<p>a</p>", diagram("m1", "graph TD; A-->B"));

	merge(&mut reconciler, &mut document, &html, &registry);
	let live = placeholder(&document);
	let loader = document.children(live)[0];

	let report = merge(&mut reconciler, &mut document, &html, &registry);
	assert_eq!(report.kept_diagrams, 1);
	assert_eq!(report.discarded, 0);
	assert!(report.added_diagrams.is_empty());
	assert!(document.is_connected(live));
	assert_eq!(placeholder(&document), live);
	assert_eq!(document.children(live), &[loader]);
	assert_eq!(document.inner_html(document.root()), html.replace("-->", "--&gt;"));

	// Unrelated edits elsewhere don't disturb it either.
	let report = merge(&mut reconciler, &mut document, &format!("{}<p>b</p>", diagram("m1", "graph TD; A-->B")), &registry);
	assert_eq!(report.kept_diagrams, 1);
	assert_eq!(placeholder(&document), live);
}
