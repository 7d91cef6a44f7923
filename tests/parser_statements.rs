// tests/parser_statements.rs
use vesicle_kinetics::{
    IdentifierTable, Keyword, Lexer, Parser, ReactionRule, SetupInstruction, TokenKind,
    UnitConversion,
};

fn parser_for(source: &str) -> (Parser, IdentifierTable) {
    let mut lexer = Lexer::new();
    let tokens = lexer.tokenize(source).expect("source should lex");
    (Parser::new(tokens), lexer.into_table())
}

#[test]
fn test_single_reaction() {
    let (mut parser, table) = parser_for("\"E1\" : \"S1\" -> \"P1\" | 200mM - 100;\n");
    let id = |n: &str| table.resolve_id(n).unwrap();

    let (reactions, instructions) = parser.parse().unwrap();
    assert!(instructions.is_empty());
    assert_eq!(reactions.len(), 1, "Should have 1 reaction");

    let r: &ReactionRule = &reactions[0];
    assert_eq!(r.enzyme_id, id("E1"));
    assert_eq!(r.substrate_ids, (id("S1"), None));
    assert_eq!(r.product_ids, (id("P1"), None));
    assert_eq!(r.mm, (200.0, 0.0));
    assert_eq!(r.kcat, 100.0);
    // Probabilities are derived by the simulation, not the parser.
    assert_eq!(r.probabilities.p1, 0.0);
}

#[test]
fn test_two_substrates_two_products_two_concentrations() {
    let (mut parser, table) =
        parser_for("\"E\" : \"A\" + \"B\" -> \"C\" + \"D\" | 200uM, 5mM - 30;");
    let id = |n: &str| table.resolve_id(n).unwrap();

    let r = parser.reaction().unwrap();
    assert_eq!(r.substrate_ids, (id("A"), Some(id("B"))));
    assert_eq!(r.product_ids, (id("C"), Some(id("D"))));
    assert!((r.mm.0 - 0.2).abs() < 1e-12, "200uM is 0.2mM");
    assert_eq!(r.mm.1, 5.0);
}

#[test]
fn test_instructions_are_unit_converted() {
    let source = "init(\"E1\") = 30;\ndiametre(\"E1\") = 5;\nvitesse(\"E1\") = 2;\n";

    let (mut parser, table) = parser_for(source);
    let e1 = table.resolve_id("E1").unwrap();
    let (_, instructions) = parser.parse().unwrap();
    assert_eq!(
        instructions,
        vec![
            SetupInstruction {
                kind: Keyword::Init,
                molecule_id: e1,
                value: 30.0
            },
            SetupInstruction {
                kind: Keyword::Diameter,
                molecule_id: e1,
                value: 50.0
            },
            SetupInstruction {
                kind: Keyword::Speed,
                molecule_id: e1,
                value: 10.0
            },
        ]
    );

    let (parser, _) = parser_for(source);
    let (_, raw) = parser.with_units(UnitConversion::IDENTITY).parse().unwrap();
    assert_eq!(raw[1].value, 5.0);
}

#[test]
fn test_blank_lines_and_comments_are_ignored() {
    let source = "// setup\n\ninit(\"E\") = 1;\n\n// kinetics\n\"E\" : \"S\" -> \"P\" | 1mM - 1;\n";
    let (mut parser, _) = parser_for(source);
    let (reactions, instructions) = parser.parse().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(instructions.len(), 1);
}

#[test]
fn test_parse_stops_at_first_malformed_statement() {
    let (mut parser, _) = parser_for("\"E\" : \"S\" \"P\" | 1mM - 1;\n");
    let err = parser.parse().unwrap_err();
    assert_eq!(err.expected, "'->' after substrates");
    assert_eq!(err.found, Some(TokenKind::Ident));
}

#[test]
fn test_each_grammar_position_has_its_own_label() {
    let cases = [
        ("\"E\" \"S\" -> \"P\" | 1mM - 1;", "':' after enzyme"),
        ("\"E\" : -> \"P\" | 1mM - 1;", "substrate"),
        ("\"E\" : \"S\" -> | 1mM - 1;", "product"),
        ("\"E\" : \"S\" -> \"P\" 1mM - 1;", "'|' after products"),
        ("\"E\" : \"S\" -> \"P\" | mM - 1;", "concentration value"),
        ("\"E\" : \"S\" -> \"P\" | 1 - 1;", "concentration unit"),
        ("\"E\" : \"S\" -> \"P\" | 1mM 1;", "'-' before kcat"),
        ("\"E\" : \"S\" -> \"P\" | 1mM - ;", "kcat"),
        ("\"E\" : \"S\" -> \"P\" | 1mM - 1", "';' after reaction"),
        ("init \"E\") = 1;", "'(' after keyword"),
        ("init(3) = 1;", "instruction target"),
        ("init(\"E\" = 1;", "')' after target"),
        ("init(\"E\") 1;", "'=' after target"),
        ("init(\"E\") = ;", "instruction value"),
        ("init(\"E\") = 1", "';' after instruction"),
    ];
    for (source, label) in cases {
        let (mut parser, _) = parser_for(source);
        let err = parser.parse().unwrap_err();
        assert_eq!(err.expected, label, "wrong label for {source:?}");
    }
}

#[test]
fn test_reactions_series_recovers_from_bad_lines() {
    let source = "\"E1\" : \"S1\" -> \"P1\" | 1mM - 1;\n\
                  \"E2\" : \"S2\" \"P2\" | 1mM - 1;\n\
                  \"E3\" : \"S3\" -> \"P3\" | 1mM - 1;\n";
    let (mut parser, table) = parser_for(source);

    let outcome = parser.reactions_series();
    assert!(!outcome.errors.is_empty(), "the broken line should be reported");
    let enzymes: Vec<u32> = outcome.parsed.iter().map(|r| r.enzyme_id).collect();
    assert_eq!(enzymes.first(), Some(&table.resolve_id("E1").unwrap()));
    assert_eq!(enzymes.last(), Some(&table.resolve_id("E3").unwrap()));
    assert!(!enzymes.contains(&table.resolve_id("E2").unwrap()));
    assert_eq!(parser.remaining(), 1, "only END_OF_FILE is left");
}

#[test]
fn test_instructions_series_recovers_from_bad_lines() {
    let source = "init(\"A\") = 1;\ninit(\"B\") 2;\nvitesse(\"C\") = 3;\n";
    let (mut parser, table) = parser_for(source);

    let outcome = parser.instructions_series();
    let targets: Vec<u32> = outcome.parsed.iter().map(|i| i.molecule_id).collect();
    assert_eq!(
        targets,
        vec![table.resolve_id("A").unwrap(), table.resolve_id("C").unwrap()]
    );
    assert!(!outcome.errors.is_empty());
}
