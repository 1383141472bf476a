use ferrosync::{Scanner, WordHint};

// The two scenarios from the synchronization contract, plus ordering
// guarantees over a slightly larger document.

#[test]
fn edit_query_hits_the_nested_hbox() {
    // One vbox at (0,0), one hbox at (10,20), width 100, height 10, depth 2.
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\n[1,1:0,0:0,0,0\n(1,2:10,20:100,10,2\n)\n]\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    assert!(scanner.edit_query(1, 50.0, 25.0));
    let id = scanner.next_result().unwrap();
    let node = scanner.node(id);
    assert_eq!((node.visible_h(), node.visible_v()), (10.0, 20.0));
    assert_eq!(node.line(), 2);
    assert!(scanner.next_result().is_none(), "single containing box");
}

#[test]
fn edit_query_results_all_contain_the_point() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\n[1,1:0,0:300,400,0\n(1,2:10,20:100,10,2\n(1,3:20,2:30,5,1\n)\n)\n]\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    let (x, y) = (40.0, 24.0);
    assert!(scanner.edit_query(1, x, y));
    let mut areas = Vec::new();
    while let Some(id) = scanner.next_result() {
        let node = scanner.node(id);
        let x0 = node.visible_h().min(node.visible_h() + node.visible_width());
        let x1 = node.visible_h().max(node.visible_h() + node.visible_width());
        let y0 = node.visible_v() - node.visible_depth();
        let y1 = node.visible_v() + node.visible_height();
        assert!(x0 <= x && x <= x1, "containment on h");
        assert!(y0 <= y && y <= y1, "containment on v");
        areas.push((x1 - x0) * (y1 - y0));
    }
    assert_eq!(areas.len(), 3);
    // Smallest-area box ranks first.
    assert!(areas.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn display_query_finds_the_exact_node() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\nt1,5,3:12,20:word\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    assert!(scanner.display_query("main.tex", 5, 3, 0));
    let id = scanner.next_result().unwrap();
    let node = scanner.node(id);
    assert_eq!((node.line(), node.column()), (5, Some(3)));
    assert!(scanner.next_result().is_none());

    // A name missing from the input table matches nothing.
    assert!(!scanner.display_query("other.tex", 5, 3, 0));
    assert!(scanner.next_result().is_none());
}

#[test]
fn display_query_accuracy_never_improves_down_the_list() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\nt1,5,7:1,1:near\nt1,5,3:2,2:exact\ng1,5:3,3\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    assert!(scanner.display_query("main.tex", 5, 3, 0));
    let first = scanner.next_result().unwrap();
    // An exact line+column match exists, so it must come first.
    assert_eq!(scanner.node(first).column(), Some(3));
    let mut remaining = 0;
    while scanner.next_result().is_some() {
        remaining += 1;
    }
    assert_eq!(remaining, 2);
    assert!(scanner.next_result().is_none());
    assert!(scanner.next_result().is_none());
}

#[test]
fn display_query_page_hint_promotes_that_page() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\ng1,5:1,1\n}1\n{2\ng1,5:2,2\n}2\n{3\ng1,5:3,3\n}3\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    assert!(scanner.display_query("main.tex", 5, 0, 2));
    let mut pages = Vec::new();
    while let Some(id) = scanner.next_result() {
        pages.push(scanner.node(id).page());
    }
    assert_eq!(pages, vec![2, 1, 3]);
}

#[test]
fn word_hint_only_reorders_never_filters() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\nt1,5:1,1:alpha beta\nt1,5:2,2:gamma delta\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    let hint = WordHint {
        middle: "gamma".to_string(),
        ..WordHint::default()
    };
    assert!(scanner.display_query_with_hint("main.tex", 5, 0, 0, &hint));
    let first = scanner.next_result().unwrap();
    assert_eq!(scanner.node(first).text(), Some("gamma delta"));
    // The non-matching candidate is still delivered afterwards.
    assert!(scanner.next_result().is_some());
    assert!(scanner.next_result().is_none());
}

#[test]
fn leaf_results_expose_the_enclosing_box() {
    let mut scanner = Scanner::parse_str(
        "SyncTeX Version:1\nInput:1:main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n{1\n(1,2:10,20:100,10,2\nt1,5:15,20:word\n)\n}1\nPostamble:\nPost scriptum:\n",
    )
    .unwrap();
    assert!(scanner.display_query("main.tex", 5, 0, 0));
    let id = scanner.next_result().unwrap();
    let node = scanner.node(id);
    // The text fragment's own origin...
    assert_eq!((node.visible_h(), node.visible_v()), (25.0, 40.0));
    // ...and the hbox it sits in.
    assert_eq!(node.box_visible_h(), 10.0);
    assert_eq!(node.box_visible_width(), 100.0);
    assert_eq!(node.box_visible_height(), 10.0);
    assert_eq!(node.box_visible_depth(), 2.0);
}
