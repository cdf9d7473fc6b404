//! Property tests over the template language: the similarity relation and
//! the parse/render round trip, driven by generated template texts.

use kozue_core::{Similarity, Template};
use quickcheck::{Arbitrary, Gen, QuickCheck};

// A generated, always-parseable segment-template string.
#[derive(Clone, Debug)]
struct TplText(String);

const NAMES: &[&str] = &["id", "slug", "n", "title"];
const REGEXES: &[&str] = &["\\d+", "[a-z]+", "\\w{2,5}", "v\\d{1,3}"];
const LITERALS: &[&str] = &["a", "blog", "img", "v1", "x-y"];

impl Arbitrary for TplText {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut out = String::new();

        if bool::arbitrary(g) {
            out.push('$');
            out.push_str(g.choose(NAMES).unwrap());
            out.push(':');
        }

        let pieces = *g.choose(&[1usize, 2, 3]).unwrap();
        let mut prev_was_capture = false;
        let mut wildcard_used = false;

        for i in 0..pieces {
            let is_last = i == pieces - 1;
            match *g.choose(&[0u8, 1, 2]).unwrap() {
                // Literal run.
                0 => {
                    out.push_str(g.choose(LITERALS).unwrap());
                    prev_was_capture = false;
                }
                // Regex capture; separate adjacent captures with a literal
                // so the generated text stays unambiguous to read.
                1 => {
                    if prev_was_capture {
                        out.push_str(g.choose(LITERALS).unwrap());
                        prev_was_capture = false;
                    } else {
                        out.push('{');
                        out.push_str(g.choose(NAMES).unwrap());
                        out.push(':');
                        out.push_str(g.choose(REGEXES).unwrap());
                        out.push('}');
                        prev_was_capture = true;
                    }
                }
                // Wildcard capture: one per template, and only where the
                // grammar allows it (bounded by a literal or the end).
                _ => {
                    if wildcard_used || prev_was_capture || !is_last {
                        out.push_str(g.choose(LITERALS).unwrap());
                        prev_was_capture = false;
                    } else {
                        out.push('{');
                        out.push_str(g.choose(NAMES).unwrap());
                        out.push('}');
                        wildcard_used = true;
                        prev_was_capture = true;
                    }
                }
            }
        }

        TplText(out)
    }
}

fn parse(text: &str) -> Template {
    Template::parse(text).unwrap_or_else(|e| panic!("generated template {:?} failed: {}", text, e))
}

#[test]
fn similarity_is_reflexive() {
    fn prop(t: TplText) -> bool {
        let tpl = parse(&t.0);
        tpl.similarity(&tpl) == Similarity::TheSame
    }
    QuickCheck::new().tests(500).quickcheck(prop as fn(TplText) -> bool);
}

#[test]
fn similarity_is_symmetric() {
    fn prop(a: TplText, b: TplText) -> bool {
        let (ta, tb) = (parse(&a.0), parse(&b.0));
        ta.similarity(&tb) == tb.similarity(&ta)
    }
    QuickCheck::new()
        .tests(500)
        .quickcheck(prop as fn(TplText, TplText) -> bool);
}

#[test]
fn render_round_trips_to_the_same_template() {
    fn prop(t: TplText) -> bool {
        let tpl = parse(&t.0);
        let back = parse(&tpl.render());
        tpl.similarity(&back) == Similarity::TheSame
    }
    QuickCheck::new().tests(500).quickcheck(prop as fn(TplText) -> bool);
}
