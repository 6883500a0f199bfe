//! Integration tests for CleanerService: end-to-end tree rewrites with a recording translator.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use texclean::application::services::{CleanReport, CleanerService, Pass};
use texclean::config::Settings;
use texclean::domain::{parse_document, write_document, Document, NodeKind, Tag};
use texclean::infrastructure::traits::{MathTranslator, RealFileSystem};
use texclean::infrastructure::TranslatorError;
use texclean::util::testing;

const MML_DECL: &str = r#"xmlns:mml="http://www.w3.org/1998/Math/MathML""#;

const HALF: &str = "<formula type='display'><math xmlns='http://www.w3.org/1998/Math/MathML' mode='display'><mfrac><mn>1</mn><mn>2</mn></mfrac></math></formula>";

type Answer = Box<dyn Fn(&str) -> Result<String, TranslatorError> + Send + Sync>;

/// Translator double recording every request.
struct RecordingTranslator {
    calls: Mutex<Vec<String>>,
    answer: Answer,
}

impl RecordingTranslator {
    fn answering(formula: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            answer: Box::new(move |_| Ok(formula.to_string())),
        })
    }

    fn failing(make: fn() -> TranslatorError) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            answer: Box::new(move |_| Err(make())),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MathTranslator for RecordingTranslator {
    fn translate(&self, latex: &str) -> Result<String, TranslatorError> {
        self.calls.lock().unwrap().push(latex.to_string());
        (self.answer)(latex)
    }
}

fn cleaner_with(translator: Arc<RecordingTranslator>, settings: Settings) -> CleanerService {
    CleanerService::new(translator, Arc::new(RealFileSystem), Arc::new(settings))
}

#[fixture]
fn translator() -> Arc<RecordingTranslator> {
    testing::init_test_setup();
    RecordingTranslator::answering(HALF)
}

fn clean(translator: &Arc<RecordingTranslator>, xml: &str) -> (String, CleanReport) {
    cleaner_with(Arc::clone(translator), Settings::default())
        .clean_xml(xml)
        .expect("clean")
}

// ============================================================
// End-to-end scenarios
// ============================================================

#[rstest]
fn given_lonely_index_par_when_cleaning_then_index_takes_par_position(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(
        &translator,
        r#"<document><section>Intro</section><par><index source="term"/></par><section>End</section></document>"#,
    );

    assert_eq!(
        xml,
        r#"<document><section>Intro</section><index source="term"/><section>End</section></document>"#
    );
    assert_eq!(report.index_repaired, 1);
}

#[rstest]
fn given_quote_with_text_when_cleaning_then_text_wrapped_in_par(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(&translator, "<document><quote>hi</quote></document>");

    assert_eq!(xml, "<document><quote><par>hi</par></quote></document>");
    assert_eq!(report.quotes_wrapped, 1);
}

#[rstest]
fn given_math_with_resolved_symbol_when_cleaning_then_mathit_without_translation(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(
        &translator,
        r#"<document><par>Let <math source="$\alpha$"><alpha unicode="α"/></math> be small</par></document>"#,
    );

    assert_eq!(
        xml,
        r#"<document><par>Let <mathit><alpha unicode="α"/></mathit> be small</par></document>"#
    );
    assert!(translator.calls().is_empty());
    assert_eq!(report.math_simplified, 1);
    assert!(!report.contains_mml);
}

#[rstest]
fn given_displaymath_with_frac_when_cleaning_then_translated_once_into_informalequation(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(
        &translator,
        r#"<document><par>Half: <displaymath source="\[\frac{1}{2}\]"><frac><mn>1</mn><mn>2</mn></frac></displaymath></par></document>"#,
    );

    assert_eq!(translator.calls(), vec![r"\[\frac{1}{2}\]".to_string()]);
    assert!(report.contains_mml);
    assert_eq!(report.math_translated, 1);
    assert_eq!(
        xml,
        format!(
            "<document {}><par>Half: <informalequation><mml:math mode=\"display\"><mml:mfrac><mml:mn>1</mml:mn><mml:mn>2</mml:mn></mml:mfrac></mml:math></informalequation></par></document>",
            MML_DECL
        )
    );
}

#[rstest]
#[case("math", "inlineequation")]
#[case("displaymath", "informalequation")]
#[case("eqnarray", "informalequation")]
#[case("eqnarray-star", "informalequation")]
fn given_math_container_when_translated_then_wrapper_matches(
    translator: Arc<RecordingTranslator>,
    #[case] container: &str,
    #[case] wrapper: &str,
) {
    let input = format!(
        r#"<document><par>x <{c} source="src"><sum/></{c}></par></document>"#,
        c = container
    );

    let (xml, _) = clean(&translator, &input);

    assert!(
        xml.contains(&format!("<{}><mml:math", wrapper)),
        "got: {xml}"
    );
}

// ============================================================
// Rule behaviour
// ============================================================

#[rstest]
#[case::itemize(
    "<document><par><itemize><item>a</item></itemize> tail</par></document>",
    "<document><itemize><item>a</item></itemize> tail</document>"
)]
#[case::text_first(
    "<document><par>text <itemize><item>a</item></itemize></par></document>",
    "<document><par>text <itemize><item>a</item></itemize></par></document>"
)]
#[case::inline_first(
    "<document><par><emph>x</emph> y</par></document>",
    "<document><par><emph>x</emph> y</par></document>"
)]
#[case::empty("<document><par/></document>", "<document><par/></document>")]
fn given_par_when_cleaning_then_block_content_is_hoisted(
    translator: Arc<RecordingTranslator>,
    #[case] input: &str,
    #[case] expected: &str,
) {
    let (xml, _) = clean(&translator, input);
    assert_eq!(xml, expected);
}

#[rstest]
#[case::next(
    "<document><par><index/></par><par>Real text</par></document>",
    "<document><par><index/>Real text</par></document>"
)]
#[case::previous(
    "<document><par>Real text</par><par><index/></par></document>",
    "<document><par>Real text<index/></par></document>"
)]
#[case::next_wins(
    "<document><par>before</par><par><index/></par><par>after</par></document>",
    "<document><par>before</par><par><index/>after</par></document>"
)]
#[case::blank_neighbour(
    "<document><par> </par><par><index/></par></document>",
    "<document><par> </par><index/></document>"
)]
fn given_index_only_par_when_cleaning_then_merged_into_legitimate_neighbour(
    translator: Arc<RecordingTranslator>,
    #[case] input: &str,
    #[case] expected: &str,
) {
    let (xml, report) = clean(&translator, input);
    assert_eq!(xml, expected);
    assert_eq!(report.index_repaired, 1);
}

#[rstest]
fn given_index_in_par_with_text_when_cleaning_then_left_alone(
    translator: Arc<RecordingTranslator>,
) {
    let input = "<document><par>Words<index/></par></document>";
    let (xml, report) = clean(&translator, input);
    assert_eq!(xml, input);
    assert_eq!(report.index_repaired, 0);
}

#[rstest]
fn given_figure_with_par_when_cleaning_then_par_unwrapped(translator: Arc<RecordingTranslator>) {
    let (xml, report) = clean(
        &translator,
        "<document><figure><par><graphic/></par><caption>c</caption></figure></document>",
    );

    assert_eq!(
        xml,
        "<document><figure><graphic/><caption>c</caption></figure></document>"
    );
    assert_eq!(report.figures_unwrapped, 1);
}

#[rstest]
fn given_label_with_colons_when_cleaning_then_sanitized(translator: Arc<RecordingTranslator>) {
    let (xml, report) = clean(
        &translator,
        r#"<document><section label="sec:intro:a">x</section></document>"#,
    );

    assert_eq!(
        xml,
        r#"<document><section source="sec..intro..a" label="sec..intro..a">x</section></document>"#
    );
    assert_eq!(report.labels_sanitized, 1);
}

#[rstest]
fn given_quote_opening_with_block_when_cleaning_then_wrapper_survives(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, _) = clean(
        &translator,
        "<document><quotation><itemize><item>a</item></itemize></quotation></document>",
    );

    assert_eq!(
        xml,
        "<document><quotation><par><itemize><item>a</item></itemize></par></quotation></document>"
    );
}

#[rstest]
fn given_quote_whose_first_par_opens_with_block_when_cleaning_then_par_unpacked_and_rewrapped(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(
        &translator,
        "<document><quote><par><itemize/></par><par>text</par></quote></document>",
    );

    assert_eq!(
        xml,
        "<document><quote><par><itemize/><par>text</par></par></quote></document>"
    );
    assert_eq!(report.pars_unpacked, 1);
    assert_eq!(report.quotes_wrapped, 1);
}

#[rstest]
fn given_empty_quote_when_cleaning_then_untouched(translator: Arc<RecordingTranslator>) {
    let (xml, report) = clean(&translator, "<document><exercise/></document>");
    assert_eq!(xml, "<document><exercise/></document>");
    assert_eq!(report, CleanReport::default());
}

// ============================================================
// Translation failures
// ============================================================

#[rstest]
#[case::timeout(|| TranslatorError::Timeout(Duration::from_millis(5)))]
#[case::stream_closed(|| TranslatorError::StreamClosed)]
#[case::too_many_errors(|| TranslatorError::TooManyErrors { count: 4, last: "Error x".into() })]
fn given_failing_translation_when_cleaning_then_falls_back_to_mathit(
    #[case] make: fn() -> TranslatorError,
) {
    testing::init_test_setup();
    let translator = RecordingTranslator::failing(make);

    let (xml, report) = clean(
        &translator,
        r#"<document><par><math source="$\frac12$"><frac>12</frac></math></par></document>"#,
    );

    assert_eq!(
        xml,
        "<document><par><mathit><frac>12</frac></mathit></par></document>"
    );
    assert_eq!(report.math_failed, 1);
    assert!(!report.contains_mml);
}

#[test]
fn given_missing_engine_when_cleaning_then_aborts() {
    testing::init_test_setup();
    let translator =
        RecordingTranslator::failing(|| TranslatorError::ExecutableNotFound(PathBuf::from("tralics")));

    let result = cleaner_with(translator, Settings::default()).clean_xml(
        r#"<document><math source="$\int x$"><int/>x</math></document>"#,
    );

    let err = result.expect_err("configuration errors are fatal");
    assert!(!err.is_local_to_math());
}

#[rstest]
fn given_complex_math_without_source_when_cleaning_then_falls_back(
    translator: Arc<RecordingTranslator>,
) {
    let (xml, report) = clean(
        &translator,
        "<document><par><math><cases/></math></par></document>",
    );

    assert!(translator.calls().is_empty());
    assert_eq!(xml, "<document><par><mathit><cases/></mathit></par></document>");
    assert_eq!(report.math_failed, 1);
}

#[rstest]
fn given_garbage_formula_when_cleaning_then_falls_back() {
    testing::init_test_setup();
    let translator = RecordingTranslator::answering("<formula type='inline'/>");

    let (_, report) = clean(
        &translator,
        r#"<document><par><math source="x"><foo unicode=""/></math></par></document>"#,
    );

    assert_eq!(translator.calls(), vec!["x".to_string()]);
    assert_eq!(report.math_failed, 1);
}

// ============================================================
// Whole-tree properties
// ============================================================

const MIXED: &str = r#"<document>
<par>Intro <math source="$x$">x</math> and <displaymath source="\[\sum_i i\]"><sum/>i</displaymath></par>
<quote>Quoted <math source="$y$"><foo unicode=""/></math></quote>
<par><index source="idx"/></par>
<par><itemize><item>one</item></itemize></par>
<figure label="fig:one"><par><graphic/></par></figure>
<eqnarray-star source="a &amp;= b"><frac/></eqnarray-star>
</document>"#;

fn assert_clean(doc: &Document) {
    for (id, node) in doc.iter() {
        let Some(tag) = node.tag() else { continue };
        assert!(!tag.is_math(), "residual math node {}", tag);
        if let Some(label) = node.attribute("label") {
            assert!(!label.contains(':'), "label {label} still has colons");
        }
        let Some(first) = doc.first_child(id) else { continue };
        let first = doc.node(first).unwrap();
        if tag.is_quote_like() {
            assert!(first.is_element(&Tag::Par), "{} must open with par", tag);
        }
        if *tag == Tag::Par {
            match &first.kind {
                NodeKind::Text(_) => {}
                NodeKind::Element(t) | NodeKind::Symbol { tag: t, .. } => {
                    assert!(!t.is_block(), "par opens with {}", t)
                }
            }
        }
    }
}

#[rstest]
fn given_mixed_document_when_cleaning_then_tree_is_legal(translator: Arc<RecordingTranslator>) {
    let cleaner = cleaner_with(Arc::clone(&translator), Settings::default());
    let mut doc = parse_document(MIXED).unwrap();

    let report = cleaner.clean(&mut doc).unwrap();

    assert_clean(&doc);
    assert!(report.contains_mml);
    assert_eq!(report.math_simplified, 1);
    assert_eq!(report.math_translated, 3, "layout and unresolved symbols go to the engine");
    assert_eq!(report.math_failed, 0);
    assert_eq!(report.quotes_wrapped, 1);
    assert_eq!(report.index_repaired, 1);
    assert_eq!(report.labels_sanitized, 1);
    assert_eq!(translator.calls().len(), 3);
}

#[rstest]
fn given_cleaned_document_when_cleaning_again_then_nothing_changes(
    translator: Arc<RecordingTranslator>,
) {
    let (first, _) = clean(&translator, MIXED);
    let calls = translator.calls().len();

    let (second, report) = clean(&translator, &first);

    assert_eq!(first, second);
    assert_eq!(report.changes(), 0, "{report}");
    assert_eq!(translator.calls().len(), calls);
}

#[rstest]
fn given_single_pass_when_running_repair_only_then_math_untouched(
    translator: Arc<RecordingTranslator>,
) {
    let cleaner = cleaner_with(Arc::clone(&translator), Settings::default());
    let mut doc = parse_document(MIXED).unwrap();
    let mut report = CleanReport::default();

    cleaner.run_pass(&mut doc, Pass::Repair, &mut report).unwrap();

    assert!(doc.iter().any(|(_, n)| n.is_element(&Tag::Math)));
    assert!(translator.calls().is_empty());
    assert_eq!(report.labels_sanitized, 1);
    assert_eq!(report.figures_unwrapped, 1);
}

#[rstest]
fn given_dump_dir_when_cleaning_then_before_and_after_written(
    translator: Arc<RecordingTranslator>,
) {
    let dumps = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.dump.dir = Some(dumps.path().join("nested"));
    let cleaner = cleaner_with(Arc::clone(&translator), settings);

    let (xml, _) = cleaner.clean_xml(MIXED).unwrap();

    let before = std::fs::read_to_string(dumps.path().join("nested/texclean.before")).unwrap();
    let after = std::fs::read_to_string(dumps.path().join("nested/texclean.after")).unwrap();
    assert!(before.contains("<displaymath"));
    assert!(!after.contains("<displaymath"));
    assert!(after.contains(MML_DECL));
    assert_eq!(after, xml);
}

#[rstest]
fn given_cleaned_tree_when_serialized_then_parses_back(translator: Arc<RecordingTranslator>) {
    let (xml, _) = clean(&translator, MIXED);
    let doc = parse_document(&xml).unwrap();
    assert_eq!(write_document(&doc, true).unwrap(), xml);
}
