use proptest::prelude::*;

use weft::adapters::EchoAdapter;
use weft::document::{Executable, ParsingConfig};
use weft::engine::{AdapterCatalog, AdapterRegistry, ExecutionContext};
use weft::util::SharedBuffer;

fn echo_registry() -> AdapterRegistry {
    let catalog = AdapterCatalog::new();
    catalog.register(EchoAdapter::new());
    catalog.snapshot()
}

fn render(source: &str, registry: &AdapterRegistry) -> String {
    let config = ParsingConfig::new("echo");
    let executable = Executable::compile("doc", source, &config, registry).unwrap();
    let buffer = SharedBuffer::new();
    let context = ExecutionContext::new(buffer.clone(), std::io::sink());
    executable.execute(&context).unwrap();
    buffer.contents()
}

proptest! {
    /// Documents containing no delimiter occurrence parse to exactly one
    /// literal segment and render verbatim.
    #[test]
    fn delimiter_free_documents_render_verbatim(text in "[a-zA-Z0-9 .,!\n]{0,80}") {
        let registry = AdapterRegistry::empty();
        let config = ParsingConfig::new("echo");
        let executable = Executable::compile("doc", &text, &config, &registry).unwrap();

        prop_assert!(executable.is_pure_literal());
        prop_assert!(executable.segments().len() <= 1);
        prop_assert!(executable.start_delimiter().is_none());

        let buffer = SharedBuffer::new();
        let context = ExecutionContext::new(buffer.clone(), std::io::sink());
        executable.execute(&context).unwrap();
        prop_assert_eq!(buffer.contents(), text);
    }

    /// Interleaving literal chunks with expression spans renders each piece
    /// in order: splitting and rejoining preserves document semantics.
    #[test]
    fn interleaved_documents_render_in_order(
        pieces in proptest::collection::vec(
            prop_oneof![
                "[a-zA-Z ]{1,12}".prop_map(Piece::Literal),
                (0i64..500, 0i64..500).prop_map(|(a, b)| Piece::Sum(a, b)),
            ],
            0..10,
        )
    ) {
        let registry = echo_registry();
        let mut source = String::new();
        let mut expected = String::new();
        for piece in &pieces {
            match piece {
                Piece::Literal(text) => {
                    source.push_str(text);
                    expected.push_str(text);
                }
                Piece::Sum(a, b) => {
                    source.push_str(&format!("<%= {a}+{b} %>"));
                    expected.push_str(&(a + b).to_string());
                }
            }
        }
        prop_assert_eq!(render(&source, &registry), expected);
    }

    /// Exactly one delimiter style is ever active: whichever start token
    /// appears first wins, and the other style passes through untouched.
    #[test]
    fn only_the_first_detected_style_is_active(lead in "[a-z ]{0,10}") {
        let registry = echo_registry();
        let source = format!("{lead}<%= 2+2 %> and <? not code ?>");
        let expected = format!("{lead}4 and <? not code ?>");
        prop_assert_eq!(render(&source, &registry), expected);
    }
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    Sum(i64, i64),
}
