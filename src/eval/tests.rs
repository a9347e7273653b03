use crate::config::Options;
use crate::engine::{Category, KnowledgeBase};
use crate::eval::RandomSource;
use crate::session::ChatSession;
use crate::variables::Bindings;
use crate::Interpreter;
use pretty_assertions::assert_eq;
use std::collections::VecDeque;

/// Replays a fixed list of choices.
struct Scripted(VecDeque<usize>);

impl RandomSource for Scripted {
    fn pick(&mut self, n: usize) -> usize {
        self.0.pop_front().unwrap_or(0) % n
    }
}

fn kb(categories: Vec<Category>) -> KnowledgeBase {
    KnowledgeBase::new("eval")
        .with_property("name", "Parley")
        .with_property("species", "interpreter")
        .with_variable("mood", "calm")
        .with_categories(categories)
}

fn bot(categories: Vec<Category>) -> Interpreter {
    Interpreter::new(kb(categories), Options::default())
}

fn eval(bot: &Interpreter, template: &str, session: &mut ChatSession) -> String {
    bot.process_template(template, &Bindings::new(), Some(session))
}

fn eval_with_stars(template: &str, stars: &[&str]) -> String {
    bot(vec![]).process_template(template, &Bindings::from_stars(stars.iter().copied()), None)
}

#[test]
fn star_substitution() {
    assert_eq!(eval_with_stars("Hello <star/>", &["World"]), "Hello World");
    assert_eq!(eval_with_stars("<star index=\"2\"/> <star/>", &["a", "b"]), "b a");
    assert_eq!(eval_with_stars("[<star index=\"3\"/>]", &["a"]), "[]");
    assert_eq!(eval_with_stars("<star><index>2</index></star>", &["a", "b"]), "b");
}

#[test]
fn nested_transforms() {
    assert_eq!(eval_with_stars("<uppercase><person>I am happy</person></uppercase>", &[]), "YOU ARE HAPPY");
    assert_eq!(eval_with_stars("<person/>", &["my cat likes me"]), "your cat likes you");
    assert_eq!(eval_with_stars("<gender>he lost his keys</gender>", &[]), "she lost her keys");
    assert_eq!(eval_with_stars("<formal>ada lovelace</formal>", &[]), "Ada Lovelace");
    assert_eq!(eval_with_stars("<lowercase>LOUD</lowercase>", &[]), "loud");
}

#[test]
fn string_operations() {
    let cases = [
        ("<substring start=\"1\" end=\"4\">parley</substring>", "arl"),
        ("<substring start=\"-3\" end=\"99\">abc</substring>", "abc"),
        ("<substring start=\"4\" end=\"2\">abcdef</substring>", ""),
        ("<replace search=\"cat\" replace=\"dog\">cat and cat</replace>", "dog and dog"),
        ("<length>héllo</length>", "5"),
        ("<length mode=\"word\">one two three</length>", "3"),
        ("<count>one two three</count>", "3"),
        ("<count mode=\"sentence\">Hi. How are you? Fine!</count>", "3"),
        ("<count search=\"an\">banana</count>", "2"),
    ];
    for (template, expected) in cases {
        assert_eq!(eval_with_stars(template, &[]), expected, "{template}");
    }
}

#[test]
fn variables_and_properties() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    assert_eq!(eval(&bot, "<bot name=\"name\"/> is an <bot name=\"species\"/>", &mut session), "Parley is an interpreter");
    assert_eq!(eval(&bot, "<get name=\"mood\"/>", &mut session), "calm");
    assert_eq!(eval(&bot, "<set name=\"mood\">  very   happy </set>", &mut session), "");
    assert_eq!(eval(&bot, "<get name=\"mood\"/>", &mut session), "very happy");
    assert_eq!(eval(&bot, "[<get name=\"unset\"/>]", &mut session), "[]");
    assert_eq!(eval(&bot, "<set><name>pet</name>cat</set><get><name>pet</name></get>", &mut session), "cat");
}

#[test]
fn locals_do_not_leak_between_evaluations() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    assert_eq!(eval(&bot, "<set var=\"x\">1</set><get var=\"x\"/>", &mut session), "1");
    assert_eq!(eval(&bot, "[<get var=\"x\"/>]", &mut session), "[]");
    assert_eq!(session.variable("x"), None);
}

#[test]
fn attribute_values_holding_markup_are_evaluated() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    session.set_variable("which", "color");
    session.set_variable("color", "blue");
    let template = "<get name=\"&lt;get name='which'/&gt;\"/>";
    assert_eq!(eval(&bot, template, &mut session), "blue");
    assert_eq!(eval(&bot, "<get><name><get name=\"which\"/></name></get>", &mut session), "blue");
}

#[test]
fn conditions() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    session.set_variable("mood", "happy");

    let cases = [
        ("<condition name=\"mood\" value=\"happy\">yay</condition>", "yay"),
        ("<condition name=\"mood\" value=\"HAPPY\">yay</condition>", "yay"),
        ("<condition name=\"mood\" value=\"sad\">yay</condition>", ""),
        ("<condition name=\"mood\" value=\"*\">set</condition>", "set"),
        ("<condition name=\"nothing\" value=\"*\">set</condition>", ""),
        (
            "<condition name=\"mood\"><li value=\"sad\">s</li><li value=\"happy\">h</li><li>d</li></condition>",
            "h",
        ),
        ("<condition name=\"mood\"><li value=\"sad\">s</li><li>d</li><li>e</li></condition>", "d"),
        ("<condition><li name=\"mood\" value=\"happy\">own</li><li>d</li></condition>", "own"),
        ("<condition name=\"mood\"><li value=\"x\">x</li></condition>", ""),
        ("<condition name=\"mood\"><li>default</li><li value=\"happy\">h</li></condition>", "h"),
        ("<condition name=\"mood\"><li>first</li><li value=\"sad\">s</li><li>second</li></condition>", "first"),
    ];
    for (template, expected) in cases {
        assert_eq!(eval(&bot, template, &mut session), expected, "{template}");
    }
}

#[test]
fn random_uses_the_configured_source() {
    let bot = bot(vec![]).with_random_source(Scripted(VecDeque::from([2, 0, 1])));
    let mut session = ChatSession::new("s");
    let template = "<random><li>a</li><li>b</li><li>c</li></random>";
    assert_eq!(eval(&bot, template, &mut session), "c");
    assert_eq!(eval(&bot, template, &mut session), "a");
    assert_eq!(eval(&bot, template, &mut session), "b");
    assert_eq!(eval(&bot, "<random></random>", &mut session), "");
}

#[test]
fn seeded_random_is_deterministic() {
    let template = "<random><li>a</li><li>b</li><li>c</li><li>d</li></random>";
    let run = || {
        let bot = Interpreter::new(kb(vec![]), Options { random_seed: Some(42), ..Options::default() });
        let mut session = ChatSession::new("s");
        (0..8).map(|_| eval(&bot, template, &mut session)).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn srai_and_sr() {
    let bot = bot(vec![
        Category::new("HELLO", "Hi there."),
        Category::new("HI *", "<srai>HELLO</srai> You said <star/>."),
        Category::new("GREET *", "<sr/>"),
        Category::new("HOWDY", "<sr/>"),
    ]);
    let mut session = ChatSession::new("s");
    assert_eq!(bot.process_input("hi friend", &mut session).as_deref(), Ok("Hi there. You said friend."));
    assert_eq!(bot.process_input("greet hello", &mut session).as_deref(), Ok("Hi there."));
    assert_eq!(bot.process_input("howdy", &mut session).as_deref(), Ok(""));
    assert_eq!(eval(&bot, "[<srai>NOTHING MATCHES</srai>]", &mut session), "[]");
}

#[test]
fn recursion_is_bounded() {
    let bot = Interpreter::new(
        kb(vec![Category::new("LOOP", "x<srai>LOOP</srai>")]),
        Options { max_recursion_depth: 3, ..Options::default() },
    );
    let mut session = ChatSession::new("s");
    assert_eq!(bot.process_input("loop", &mut session).as_deref(), Ok("xxxx"));

    let deep = bot_with_chain(20);
    let mut session = ChatSession::new("s");
    assert_eq!(deep.process_input("STEP 0", &mut session).as_deref(), Ok(""));
}

/// `STEP n` redirects to `STEP n+1` up to `len`, which answers `done`.
fn bot_with_chain(len: usize) -> Interpreter {
    let mut categories: Vec<Category> =
        (0..len).map(|i| Category::new(format!("STEP {i}"), format!("<srai>STEP {}</srai>", i + 1))).collect();
    categories.push(Category::new(format!("STEP {len}"), "done"));
    Interpreter::new(kb(categories), Options::default())
}

#[test]
fn chains_within_the_limit_complete() {
    let bot = bot_with_chain(10);
    let mut session = ChatSession::new("s");
    assert_eq!(bot.process_input("step 0", &mut session).as_deref(), Ok("done"));
}

#[test]
fn evaluation_without_side_effects_is_idempotent() {
    let bot = bot(vec![Category::new("ECHO", "echo")]);
    let mut session = ChatSession::new("s");
    session.set_variable("name", "Ada");
    let template = "<uppercase><get name=\"name\"/></uppercase> <srai>ECHO</srai> <length>abc</length>";
    let first = eval(&bot, template, &mut session);
    let second = eval(&bot, template, &mut session);
    assert_eq!(first, "ADA echo 3");
    assert_eq!(first, second);
}

#[test]
fn think_runs_side_effects_only() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    assert_eq!(eval(&bot, "a<think><set name=\"t\">1</set>hidden</think>b", &mut session), "ab");
    assert_eq!(session.variable("t"), Some("1"));
}

#[test]
fn history_tags() {
    let bot = bot(vec![Category::new("*", "reply to <star/>")]);
    let mut session = ChatSession::new("s");
    bot.process_input("first", &mut session).ok();
    bot.process_input("second. third", &mut session).ok();

    assert_eq!(eval(&bot, "<input/>", &mut session), "third");
    assert_eq!(eval(&bot, "<request index=\"3\"/>", &mut session), "first");
    assert_eq!(eval(&bot, "<response/>", &mut session), "reply to third");
    assert_eq!(eval(&bot, "<response index=\"2\"/>", &mut session), "reply to second");
    assert_eq!(eval(&bot, "<that index=\"3\"/>", &mut session), "reply to first");
    assert_eq!(eval(&bot, "[<response index=\"9\"/>]", &mut session), "[]");
}

#[test]
fn that_selects_sentences() {
    let bot = bot(vec![Category::new("GO", "I see. Do you like cats?")]);
    let mut session = ChatSession::new("s");
    bot.process_input("go", &mut session).ok();
    assert_eq!(eval(&bot, "<that/>", &mut session), "I see. Do you like cats?");
    assert_eq!(eval(&bot, "<that index=\"1,2\"/>", &mut session), "Do you like cats?");
    assert_eq!(eval(&bot, "<that index=\"1,1\"/>", &mut session), "I see.");
    assert_eq!(eval(&bot, "[<that index=\"1,3\"/>]", &mut session), "[]");
}

#[test]
fn lists_and_maps() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    let run = |session: &mut ChatSession, template: &str| eval(&bot, template, session);

    run(&mut session, "<list name=\"pets\" action=\"add\">cat</list><list name=\"pets\" action=\"add\">dog</list>");
    run(&mut session, "<list name=\"pets\" action=\"add\">emu</list>");
    assert_eq!(run(&mut session, "<list name=\"pets\" action=\"size\"/>"), "3");
    assert_eq!(run(&mut session, "<list name=\"pets\" index=\"2\"/>"), "dog");
    assert_eq!(run(&mut session, "<list name=\"pets\"/>"), "cat dog emu");
    run(&mut session, "<list name=\"pets\" action=\"set\" index=\"1\">cow</list>");
    run(&mut session, "<list name=\"pets\" action=\"remove\">dog</list>");
    assert_eq!(session.list("pets"), ["cow", "emu"]);
    run(&mut session, "<list name=\"pets\" action=\"remove\" index=\"1\"/>");
    assert_eq!(session.list("pets"), ["emu"]);
    run(&mut session, "<list name=\"pets\" action=\"clear\"/>");
    assert_eq!(run(&mut session, "<list name=\"pets\" action=\"size\"/>"), "0");

    run(&mut session, "<map name=\"capital\" action=\"set\" key=\"France\">Paris</map>");
    run(&mut session, "<map name=\"capital\" action=\"set\"><key>Peru</key>Lima</map>");
    assert_eq!(run(&mut session, "<map name=\"capital\" key=\"France\"/>"), "Paris");
    assert_eq!(run(&mut session, "<map name=\"capital\" action=\"size\"/>"), "2");
    run(&mut session, "<map name=\"capital\" action=\"remove\" key=\"France\"/>");
    assert_eq!(run(&mut session, "[<map name=\"capital\" key=\"France\"/>]"), "[]");
    run(&mut session, "<map name=\"capital\" action=\"clear\"/>");
    assert_eq!(run(&mut session, "<map name=\"capital\" action=\"size\"/>"), "0");
    assert_eq!(run(&mut session, "[<list name=\"pets\" action=\"juggle\"/>]"), "[]");
}

#[test]
fn triples() {
    let cases = [
        ("<uniq><subj> cat </subj><pred>eats</pred><obj>fish </obj></uniq>", "cat eats fish"),
        ("<uniq><subj> </subj><pred>eats</pred><obj></obj></uniq>", "eats"),
        ("[<uniq><subj/><pred/><obj/></uniq>]", "[]"),
        ("<subj>  padded  </subj>", "padded"),
    ];
    for (template, expected) in cases {
        assert_eq!(eval_with_stars(template, &[]), expected, "{template}");
    }
}

#[test]
fn unknown_tags_pass_through() {
    assert_eq!(eval_with_stars("<b>bold <star/></b>", &["text"]), "<b>bold text</b>");
    assert_eq!(eval_with_stars("a<br/>b", &[]), "a<br/>b");
    assert_eq!(eval_with_stars("x</b>", &[]), "x</b>");
}

#[test]
fn learn_and_unlearn_tags() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    let category = "<category><pattern>PING</pattern><template>pong <star/></template></category>";

    assert_eq!(eval(&bot, &format!("<learn>{category}</learn>done"), &mut session), "done");
    assert_eq!(bot.knowledge().len(), 1);
    assert_eq!(session.learned()[0].category.template, "pong <star/>");

    assert_eq!(eval(&bot, &format!("<unlearn>{category}</unlearn>"), &mut session), "");
    assert!(bot.knowledge().is_empty());
    assert!(session.learned().is_empty());
}

#[test]
fn rejected_learning_is_silent_but_counted() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    let template = "<learn><category><pattern>* *</pattern><template>x</template></category></learn>ok";
    assert_eq!(eval(&bot, template, &mut session), "ok");
    assert!(bot.knowledge().is_empty());
    assert_eq!(session.learning_stats().rejections.get("consecutive_wildcards"), Some(&1));
    assert_eq!(bot.learning_summary().rejected, 1);
}

#[test]
fn eval_inside_learn_is_resolved_at_learn_time() {
    let bot = bot(vec![]);
    let mut session = ChatSession::new("s");
    session.set_variable("color", "<green>");
    let template = concat!(
        "<learn><category><pattern>FAVORITE COLOR</pattern>",
        "<that>WHAT DO YOU LIKE</that>",
        "<template>I like <eval><get name=\"color\"/></eval>, <get name=\"color\"/> now</template>",
        "</category></learn>"
    );
    eval(&bot, template, &mut session);

    let learned = &session.learned()[0].category;
    assert_eq!(learned.that.as_deref(), Some("WHAT DO YOU LIKE"));
    assert_eq!(learned.template, "I like &lt;green&gt;, <get name=\"color\"/> now");
}
