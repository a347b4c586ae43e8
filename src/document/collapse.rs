//! Segment collapsing
//!
//! Optimizes the freshly parsed draft list so that same-language runs become
//! a single program: adjacent literals merge, adjacent same-language
//! scriptlets merge, and a literal that immediately follows a scriptlet is
//! folded into it as literal-output code. A literal never merges forward into
//! a following scriptlet, so pure leading text keeps its direct path to the
//! output sink. The walk reaches a fixpoint in one pass, which makes
//! collapsing idempotent.
//!
//! Merged segments keep the later segment's line/column, preserving the
//! historical convention.

use crate::document::segment::{Draft, DraftKind};
use crate::engine::registry::AdapterRegistry;
use crate::error::{ParseError, ParseResult};

/// Collapse a draft list. In-flow drafts must have been materialized already.
pub(crate) fn collapse(
    document: &str,
    drafts: Vec<Draft>,
    registry: &AdapterRegistry,
) -> ParseResult<Vec<Draft>> {
    let mut out: Vec<Draft> = Vec::with_capacity(drafts.len());

    for next in drafts {
        debug_assert!(
            !matches!(next.kind, DraftKind::InFlow { .. }),
            "in-flow drafts must be materialized before collapsing"
        );
        if let Some(last) = out.last_mut() {
            match (&last.kind, &next.kind) {
                (DraftKind::Literal, DraftKind::Literal) => {
                    last.source.push_str(&next.source);
                    last.pos = next.pos;
                    continue;
                }
                (DraftKind::Code { language: a }, DraftKind::Code { language: b }) if a == b => {
                    last.source.push_str(&next.source);
                    last.pos = next.pos;
                    continue;
                }
                (DraftKind::Code { language }, DraftKind::Literal) => {
                    // Fold trailing literal text into the preceding program.
                    let adapter = registry.get(language).ok_or_else(|| {
                        ParseError::UnknownLanguage {
                            tag: language.clone(),
                            document: document.to_string(),
                            line: next.pos.line,
                            column: next.pos.column,
                        }
                    })?;
                    last.source
                        .push_str(&adapter.literal_output_code(&next.source));
                    continue;
                }
                _ => {}
            }
        }
        out.push(next);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EchoAdapter;
    use crate::document::segment::SourcePos;
    use crate::engine::registry::AdapterCatalog;
    use proptest::prelude::*;

    fn registry() -> AdapterRegistry {
        let catalog = AdapterCatalog::new();
        catalog.register(EchoAdapter::new());
        catalog.register(EchoAdapter::with_tag("other"));
        catalog.snapshot()
    }

    fn at(line: u32, column: u32) -> SourcePos {
        SourcePos { line, column }
    }

    #[test]
    fn adjacent_literals_merge_keeping_later_position() {
        let collapsed = collapse(
            "doc",
            vec![
                Draft::literal("a", at(1, 1)),
                Draft::literal("b", at(2, 4)),
            ],
            &registry(),
        )
        .unwrap();
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].source, "ab");
        assert_eq!(collapsed[0].pos, at(2, 4));
    }

    #[test]
    fn adjacent_same_language_code_merges() {
        let collapsed = collapse(
            "doc",
            vec![
                Draft::code("emit a\n", at(1, 1), "echo"),
                Draft::code("emit b\n", at(1, 20), "echo"),
            ],
            &registry(),
        )
        .unwrap();
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].source, "emit a\nemit b\n");
    }

    #[test]
    fn different_language_code_stays_separate() {
        let collapsed = collapse(
            "doc",
            vec![
                Draft::code("emit a\n", at(1, 1), "echo"),
                Draft::code("emit b\n", at(1, 20), "other"),
            ],
            &registry(),
        )
        .unwrap();
        assert_eq!(collapsed.len(), 2);
    }

    #[test]
    fn literal_after_code_folds_into_the_program() {
        let collapsed = collapse(
            "doc",
            vec![
                Draft::literal("Hello ", at(1, 1)),
                Draft::code("eval 1+1\n", at(1, 7), "echo"),
                Draft::literal(" World", at(1, 17)),
            ],
            &registry(),
        )
        .unwrap();
        // Leading literal is never promoted into a program.
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].source, "Hello ");
        assert_eq!(collapsed[0].kind, DraftKind::Literal);
        assert_eq!(collapsed[1].source, "eval 1+1\n\nemit  World\n");
    }

    #[test]
    fn fold_then_merge_reaches_fixpoint_in_one_pass() {
        let collapsed = collapse(
            "doc",
            vec![
                Draft::code("emit a\n", at(1, 1), "echo"),
                Draft::literal("-", at(1, 10)),
                Draft::code("emit b\n", at(1, 11), "echo"),
            ],
            &registry(),
        )
        .unwrap();
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].source, "emit a\n\nemit -\nemit b\n");
    }

    fn arb_draft() -> impl Strategy<Value = Draft> {
        let source = "[a-z ]{0,6}";
        prop_oneof![
            source.prop_map(|s| Draft::literal(s, SourcePos { line: 1, column: 1 })),
            (source, prop_oneof![Just("echo"), Just("other")])
                .prop_map(|(s, lang)| Draft::code(format!("emit {s}\n"), SourcePos { line: 1, column: 1 }, lang)),
        ]
    }

    proptest! {
        #[test]
        fn collapsing_is_idempotent(drafts in proptest::collection::vec(arb_draft(), 0..12)) {
            let registry = registry();
            let once = collapse("doc", drafts, &registry).unwrap();
            let twice = collapse("doc", once.clone(), &registry).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn same_language_merge_concatenates_sources(
            sources in proptest::collection::vec("[a-z]{0,5}", 1..6)
        ) {
            let registry = registry();
            let drafts: Vec<Draft> = sources
                .iter()
                .map(|s| Draft::code(format!("emit {s}\n"), SourcePos { line: 1, column: 1 }, "echo"))
                .collect();
            let joined: String = drafts.iter().map(|d| d.source.as_str()).collect();
            let collapsed = collapse("doc", drafts, &registry).unwrap();
            prop_assert_eq!(collapsed.len(), 1);
            prop_assert_eq!(collapsed[0].source.clone(), joined);
        }
    }
}
