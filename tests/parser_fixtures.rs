//! Fixtures for the tolerant result parser.
//!
//! Each case is a shape real model output has taken: fenced, cut off at the
//! token limit mid-answer, keyed with an older prompt's field names.

use serde_json::{json, Value};
use studybuddy_client::parser::repair::{Repair, TRUNCATION_PLACEHOLDER};
use studybuddy_client::parser::{prepare, strip_fences};
use studybuddy_client::{
    lookup_alias, parse_tolerant, try_parse, ClientError, FlashcardDeck, ParsedResult,
    PayloadError, ProcessingRequest, UploadConstraints,
};

fn object(v: Value) -> serde_json::Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

// ── Fences ───────────────────────────────────────────────────────────────────

#[test]
fn fenced_json_yields_object() {
    assert_eq!(
        parse_tolerant("```json\n{\"a\":1}\n```", "fixture"),
        Some(json!({"a": 1}))
    );
}

#[test]
fn well_formed_json_is_fence_independent() {
    let docs = [
        r#"{"a":1}"#,
        r#"{"flascard_dict":{"Beginner":[{"section":"S","recto":"Q","verso":"A"}]}}"#,
        r#"[1, 2, {"b": [true, null]}]"#,
    ];
    for doc in docs {
        let fenced = format!("```json\n{doc}\n```");
        let generic = format!("```\n{doc}\n```");
        assert_eq!(try_parse(doc), try_parse(&fenced), "{doc}");
        assert_eq!(try_parse(doc), try_parse(&generic), "{doc}");
        assert_eq!(prepare(doc).1, Repair::Untouched, "{doc}");
    }
}

#[test]
fn code_block_inside_string_value_survives() {
    let envelope = json!({
        "explanation": "Config files look like:\n```json\n{\"debug\": true}\n```\nThat is all.",
        "evaluation": json!({
            "evaluation_dict": {
                "Beginner": [{
                    "question": "What does ```json\n{\"a\": 1}\n``` decode to?",
                    "options": ["a) An object", "b) A list"],
                    "answer": "a"
                }]
            }
        }).to_string(),
        "flashcard_building": "",
        "summary": "S"
    })
    .to_string();

    assert_eq!(try_parse(&envelope).ok(), serde_json::from_str(&envelope).ok());
    let fenced = format!("```json\n{envelope}\n```");
    assert_eq!(try_parse(&fenced), try_parse(&envelope));

    let r = ParsedResult::from_raw(&envelope).expect("envelope");
    assert!(r.explanation.contains("{\"debug\": true}"));
    let eval = r.evaluation.expect("evaluation");
    assert!(eval.levels[0].questions[0].question.contains("```json"));
    assert_eq!(r.summary, "S");
}

#[test]
fn fence_with_surrounding_prose() {
    let raw = "Sure! Here is the quiz:\n\n```json\n{\"evaluation_dict\":{}}\n```\n\nLet me know.";
    assert_eq!(strip_fences(raw), "{\"evaluation_dict\":{}}");
}

// ── Dangling-answer-field repair ─────────────────────────────────────────────

#[test]
fn truncated_evaluation_does_not_fail() {
    let raw = r#"{"evaluation_dict":{"Beginner":[{"question":"Q","options":["a) x"],"answer":"a","verso":"inc"#;
    let v = parse_tolerant(raw, "evaluation").expect("truncated answer is repaired");
    let q = &v["evaluation_dict"]["Beginner"][0];
    assert_eq!(q["verso"], TRUNCATION_PLACEHOLDER);
    assert_eq!(q["answer"], "a");
    assert_eq!(q["options"], json!(["a) x"]));
}

#[test]
fn cut_after_backslash_in_other_field_parses() {
    let raw = r#"{"d":{"L":[{"recto":"C:\\Users\"#;
    let v = parse_tolerant(raw, "fixture").expect("closed");
    assert_eq!(v["d"]["L"][0]["recto"], "C:\\Users");
}

#[test]
fn truncated_flashcards_keep_earlier_cards() {
    let raw = "```json\n{\"flascard_dict\":{\"Beginner\":[\
        {\"section\":\"Intro\",\"recto\":\"Q1\",\"verso\":\"A1\"},\
        {\"section\":\"Intro\",\"recto\":\"Q2\",\"verso\":\"The answer is";
    let v = parse_tolerant(raw, "flashcards").expect("repaired");
    let deck = FlashcardDeck::from_value(&v).unwrap();
    let cards = &deck.levels[0].cards;
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].back, "A1");
    assert_eq!(cards[1].front, "Q2");
    assert_eq!(cards[1].back, TRUNCATION_PLACEHOLDER);
}

#[test]
fn truncation_shapes_all_parse() {
    let shapes = [
        // inside the answer value
        r#"{"d":{"L":[{"recto":"Q","verso":"par"#,
        // right after the colon
        r#"{"d":{"L":[{"recto":"Q","verso": "#,
        // inside the key
        r#"{"d":{"L":[{"recto":"Q","ve"#,
        // other spellings
        r#"{"d":{"L":[{"front":"Q","back":"par"#,
        r#"{"d":{"L":[{"question":"Q","answer":"par"#,
    ];
    for shape in shapes {
        let (text, repair) = prepare(shape);
        assert!(
            matches!(repair, Repair::DanglingAnswer { .. }),
            "{shape} → {repair:?}"
        );
        let v: Value = serde_json::from_str(&text).unwrap_or_else(|e| panic!("{shape}: {e}"));
        assert_eq!(v["d"]["L"][0].as_object().map(|o| o.len()), Some(2), "{shape}");
    }
}

#[test]
fn quotes_inside_strings_do_not_confuse_repair() {
    let raw = r#"{"d":{"L":[{"recto":"What does \"verso\": mean?","verso":"the back"#;
    let v = parse_tolerant(raw, "fixture").expect("repaired");
    assert_eq!(v["d"]["L"][0]["recto"], "What does \"verso\": mean?");
    assert_eq!(v["d"]["L"][0]["verso"], TRUNCATION_PLACEHOLDER);
}

#[test]
fn unrecoverable_text_is_none() {
    assert_eq!(parse_tolerant("I'm sorry, I can't do that.", "fixture"), None);
    assert!(matches!(
        try_parse("{\"a\": }"),
        Err(PayloadError::Syntax { .. })
    ));
}

// ── Aliases ──────────────────────────────────────────────────────────────────

#[test]
fn alias_lookup_ignores_case() {
    let card = object(json!({"Section": "Intro"}));
    assert_eq!(lookup_alias(&card, &["section"]), Some(&json!("Intro")));
}

#[test]
fn legacy_card_spellings_resolve() {
    let v = json!({
        "flashcard_dict": {
            "Advanced": [
                {"Section": "A", "Recto (Question)": "Q1", "Verso (Réponse)": "R1"},
                {"SECTION": "B", "Question": "Q2", "Answer": "R2"},
                {"section": "C"}
            ]
        }
    });
    let deck = FlashcardDeck::from_value(&v).unwrap();
    let cards = &deck.levels[0].cards;
    assert_eq!((cards[0].front.as_str(), cards[0].back.as_str()), ("Q1", "R1"));
    assert_eq!((cards[1].front.as_str(), cards[1].back.as_str()), ("Q2", "R2"));
    assert_eq!(cards[2].front, "(not provided)");
}

// ── Whole results ────────────────────────────────────────────────────────────

#[test]
fn envelope_from_fenced_string() {
    let inner = json!({
        "explanation": "E",
        "evaluation": "not json at all",
        "flashcard_building": {"flascard_dict": {"Beginner": []}},
        "summary": "S"
    });
    let raw = format!("```json\n{inner}\n```");
    let r = ParsedResult::from_raw(&raw).expect("envelope");
    assert_eq!(r.explanation, "E");
    assert!(r.evaluation.is_none());
    assert_eq!(r.flashcards.map(|d| d.levels.len()), Some(1));
}

// ── Upload validation ────────────────────────────────────────────────────────

#[test]
fn non_pdf_is_rejected_before_submission() {
    let constraints = UploadConstraints::default();
    let err = ProcessingRequest::new("notes.txt", b"plain notes".to_vec(), &constraints)
        .unwrap_err();
    assert!(matches!(err, ClientError::UnsupportedFileType { .. }));

    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A];
    let err = ProcessingRequest::new("scan.pdf", png, &constraints).unwrap_err();
    assert!(matches!(
        err,
        ClientError::UnsupportedFileType { ref detected, .. } if detected == "image/png"
    ));
}
