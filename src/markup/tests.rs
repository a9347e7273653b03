use super::*;
use crate::eval::TagKind;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn el(name: &str, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
    let attributes = attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let mut element = Element::new(name, attributes, children);
    element.self_closing = false;
    Node::Tag(element)
}

fn leaf(name: &str, attrs: &[(&str, &str)]) -> Node {
    let attributes = attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    Node::Tag(Element::new(name, attributes, Vec::new()))
}

#[test]
fn parses_nested_tags() {
    let nodes = parse("Hello <uppercase><star/> there</uppercase>!");
    assert_eq!(
        nodes,
        vec![
            Node::text("Hello "),
            el("uppercase", &[], vec![leaf("star", &[]), Node::text(" there")]),
            Node::text("!"),
        ]
    );
}

#[test]
fn resolves_tag_kind_at_parse_time() {
    let nodes = parse("<srai>HI</srai><blink/>");
    assert_eq!(nodes[0].as_element().unwrap().kind, Some(TagKind::Srai));
    assert_eq!(nodes[1].as_element().unwrap().kind, None);
}

#[test]
fn keeps_attribute_order() {
    let nodes = parse(r#"<list name="todo" action="add" index='2'>x</list>"#);
    let e = nodes[0].as_element().unwrap();
    let keys: Vec<&str> = e.attributes.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["name", "action", "index"]);
    assert_eq!(e.attribute("index"), Some("2"));
}

#[test]
fn unclosed_tag_degrades_to_text() {
    assert_eq!(parse("<think>x"), vec![Node::text("<think>x")]);
}

#[test]
fn stray_closer_is_text() {
    assert_eq!(parse("x</b> y"), vec![Node::text("x</b> y")]);
}

#[test]
fn mismatched_closer_degrades_inner_frames() {
    let nodes = parse("<b>x<i>y</b>");
    assert_eq!(nodes, vec![el("b", &[], vec![Node::text("x<i>y")])]);
}

#[test]
fn degraded_frames_keep_complete_children() {
    let nodes = parse("<think><set name=\"a\">1</set>");
    assert_eq!(nodes, vec![Node::text("<think>"), el("set", &[("name", "a")], vec![Node::text("1")])]);
}

#[test]
fn decodes_entities() {
    assert_eq!(parse("a &lt;b&gt; &amp; &#65;&#x42; &bogus;"), vec![Node::text("a <b> & AB &bogus;")]);
}

#[test]
fn drops_comments() {
    assert_eq!(parse("a<!-- note -->b"), vec![Node::text("ab")]);
}

#[test]
fn tree_utilities() {
    let nodes = parse("<random><li>one <star/></li><li>two<star index=\"2\"/></li></random>");
    assert_eq!(find_all(&nodes, "li").len(), 2);
    assert_eq!(find_all(&nodes, "star").len(), 2);
    assert_eq!(find_first(&nodes, "star").unwrap().attribute("index"), None);
    assert!(find_first(&nodes, "get").is_none());
    assert_eq!(flatten_text(&nodes), "one two");
}

#[test]
fn render_round_trips_well_formed_markup() {
    let cases = [
        "Hello <star/>",
        "<condition name=\"mood\"><li value=\"happy\">Great</li><li>Oh</li></condition>",
        "<replace search=\"&lt;b&gt;\" replace='x \"y\"'>a & b</replace>",
        "<think><set name=\"topic\">CATS</set></think>ok",
        "<uniq><subj>a</subj><pred>b</pred><obj></obj></uniq>",
    ];
    for case in cases {
        let first = parse(case);
        let second = parse(&render(&first));
        assert_eq!(first, second, "round trip of {case:?}");
    }
}

#[test]
fn structure_check_reports_violations() {
    let ok = check_structure("<think><set name=\"a\"><star/></set></think>").unwrap();
    assert_eq!(ok.max_depth, 3);
    assert_eq!(ok.element_count, 3);
    assert!(ok.tag_names.contains("set"));

    assert!(check_structure("<think>x").unwrap_err().contains("never closed"));
    assert!(check_structure("<a><b></a></b>").unwrap_err().contains("</a>"));
    assert!(check_structure("x</a>").unwrap_err().contains("no open tag"));
}

proptest! {
    #[test]
    fn parse_is_total(s in "\\PC{0,80}") {
        let _ = parse(&s);
    }

    #[test]
    fn parse_is_total_on_tag_soup(s in "[<>/a-c =\"'&;#x0-9!-]{0,64}") {
        let nodes = parse(&s);
        let reparsed = parse(&render(&nodes));
        prop_assert_eq!(nodes, reparsed);
    }
}
