use peek_sync::{block_index::BlockIndex, load::parse_fragment};

const LINE: &str = "data-line-begin";

#[test]
fn windows_pair_each_block_with_its_successor() {
	let document = parse_fragment(r#"<h1 data-line-begin="1">T</h1><div><p data-line-begin="4">a</p><p data-line-begin="9">b</p></div>"#).unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);

	assert_eq!(index.len(), 3);
	let lines: Vec<_> = index.windows().iter().map(|window| (window.current.line_begin, window.next.map(|next| next.line_begin))).collect();
	assert_eq!(lines, vec![(1, Some(4)), (4, Some(9)), (9, None)]);
	for pair in index.windows().windows(2) {
		assert_eq!(pair[0].next, Some(pair[1].current));
	}
}

#[test]
fn nested_anchors_come_in_document_order() {
	let document = parse_fragment(r#"<ul data-line-begin="2"><li data-line-begin="2">a</li><li data-line-begin="3">b</li></ul><p data-line-begin="5">c</p>"#).unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);
	let lines: Vec<_> = index.windows().iter().map(|window| window.current.line_begin).collect();
	assert_eq!(lines, vec![2, 2, 3, 5]);
}

#[test]
fn no_anchors() {
	let document = parse_fragment("<p>plain</p>").unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);
	assert!(index.is_empty());
	assert_eq!(index.floor(1), None);
}

#[test]
fn unparsable_anchors_are_skipped() {
	let document = parse_fragment(r#"<p data-line-begin="x">a</p><p data-line-begin=" 7 ">b</p><p data-line-begin="-1">c</p>"#).unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);
	assert_eq!(index.len(), 1);
	assert_eq!(index.windows()[0].current.line_begin, 7);
}

#[test]
fn floor() {
	let document = parse_fragment(r#"<p data-line-begin="5">a</p><p data-line-begin="10">b</p><p data-line-begin="20">c</p>"#).unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);

	assert_eq!(index.floor(1).unwrap().current.line_begin, 5);
	assert_eq!(index.floor(5).unwrap().current.line_begin, 5);
	assert_eq!(index.floor(19).unwrap().current.line_begin, 10);
	assert_eq!(index.floor(20).unwrap().current.line_begin, 20);
	assert_eq!(index.floor(1000).unwrap().next, None);
}

#[test]
fn goes_stale_when_blocks_are_detached() {
	let mut document = parse_fragment(r#"<p data-line-begin="1">a</p><p data-line-begin="2">b</p>"#).unwrap();
	let index = BlockIndex::rebuild(&document, document.root(), LINE);
	assert!(index.is_current(&document));

	let second = document.children(document.root())[1];
	document.detach(second);
	assert!(!index.is_current(&document));
}
