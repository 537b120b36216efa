//! Integration tests that exercise the public API without a model.
//!
//! Conversion runs before the provider is resolved, so every failure here
//! happens before any network call and the tests run anywhere. Replies are
//! scripted with `MockProvider` where the inference stage is under test.

use cv_extract::{
    degraded_mapping, extract, extract_mapping, extract_markdown, extract_to_file, load_document,
    Advisory, DocumentFormat, ExtractError, ExtractionConfig, ExtractionProgressCallback,
    FailureKind, MonthYear, PromptStyle, Stage,
};
use edgequake_llm::MockProvider;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};

fn config(style: PromptStyle) -> ExtractionConfig {
    ExtractionConfig::builder()
        .prompt_style(style)
        .build()
        .unwrap()
}

fn temp_with(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file
}

// ── Degraded mapping ─────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_pdf_example_style_reports_parse_failure() {
    let mapping = extract_mapping("missing.pdf", &config(PromptStyle::ExampleShape)).await;
    assert_eq!(mapping, json!({ "error": "Failed to parse PDF" }));
}

#[tokio::test]
async fn missing_pdf_schema_style_reports_convert_failure() {
    let mapping = extract_mapping("missing.pdf", &config(PromptStyle::FieldSchema)).await;
    let obj = mapping.as_object().unwrap();
    assert_eq!(obj.len(), 1, "only the error key: {mapping}");
    assert_eq!(obj["error"], "Failed to convert file");
}

#[tokio::test]
async fn unsupported_format_degrades_like_conversion_failure() {
    let file = temp_with(".png", b"\x89PNG\r\n");
    let mapping = extract_mapping(
        file.path().to_str().unwrap(),
        &config(PromptStyle::FieldSchema),
    )
    .await;
    assert_eq!(mapping, json!({ "error": "Failed to convert file" }));
}

#[test]
fn degraded_mapping_for_unreachable_model() {
    let err = ExtractError::InferenceUnreachable {
        provider: "ollama".into(),
        detail: "connection refused".into(),
    };
    assert_eq!(degraded_mapping(&err, PromptStyle::ExampleShape), json!({}));
    let mapping = degraded_mapping(&err, PromptStyle::FieldSchema);
    assert!(mapping["error"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

// ── Typed errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_is_conversion_error() {
    let err = extract("missing.pdf", &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::FileNotFound { .. }));
    assert_eq!(err.kind(), FailureKind::Conversion);
}

#[tokio::test]
async fn empty_text_file_is_empty_document() {
    let file = temp_with(".txt", b"\n   \n");
    let err = extract(file.path().to_str().unwrap(), &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyDocument { .. }));
}

#[tokio::test]
async fn failed_extraction_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("cv.json");
    let err = extract_to_file("missing.pdf", &out, &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Conversion);
    assert!(!out.exists());
}

// ── Loading without a model ──────────────────────────────────────────────────

#[tokio::test]
async fn load_markdown_file() {
    let file = temp_with(
        ".md",
        "# Ada Lovelace\n\nada@example.com\n\n## Experience\n• Analyst, 2020 – Present\n".as_bytes(),
    );
    let doc = load_document(file.path().to_str().unwrap(), &ExtractionConfig::default())
        .await
        .unwrap();
    assert_eq!(doc.info.format, DocumentFormat::Text);
    assert!(doc.markdown.starts_with("# Ada Lovelace"));
    assert!(doc.markdown.contains("- Analyst, 2020 – Present"));
    assert!(doc.markdown.ends_with('\n'));
}

#[tokio::test]
async fn load_docx_file() {
    let mut file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
    {
        let mut zip = zip::ZipWriter::new(&mut file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<w:document><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Grace Hopper</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr/></w:pPr><w:r><w:t>COBOL</w:t></w:r></w:p>
</w:body></w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();
    }
    let doc = load_document(file.path().to_str().unwrap(), &ExtractionConfig::default())
        .await
        .unwrap();
    assert_eq!(doc.info.format, DocumentFormat::Docx);
    assert_eq!(doc.markdown, "# Grace Hopper\n\n- COBOL\n");
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_stage(&self, _source: &str, stage: Stage) {
        self.events.lock().unwrap().push(stage.to_string());
    }

    fn on_failed(&self, source: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("failed:{source}"));
    }
}

#[tokio::test]
async fn conversion_failure_stops_after_converting_stage() {
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let _ = extract("missing.pdf", &config).await;
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["converting", "failed:missing.pdf"]
    );
}

// ── Scripted model replies ───────────────────────────────────────────────────

const CV_MARKDOWN: &str = "# Ada Lovelace\n\n## Experience\n- Data Scientist, 03-2021 to Present\n";

async fn mock_config(style: PromptStyle, reply: &str) -> ExtractionConfig {
    let mock = MockProvider::new();
    mock.add_response(reply).await;
    ExtractionConfig::builder()
        .prompt_style(style)
        .current_date(MonthYear::new(12, 2025).unwrap())
        .provider(Arc::new(mock))
        .build()
        .unwrap()
}

#[tokio::test]
async fn non_json_reply_degrades_to_empty_mapping() {
    let file = temp_with(".md", CV_MARKDOWN.as_bytes());
    let config = mock_config(PromptStyle::ExampleShape, "this is not json").await;
    let mapping = extract_mapping(file.path().to_str().unwrap(), &config).await;
    assert_eq!(mapping, json!({}));
}

#[tokio::test]
async fn schema_violation_degrades_to_error_mapping() {
    let file = temp_with(".md", CV_MARKDOWN.as_bytes());
    let reply = "```json\n{\"name\": \"Ada Lovelace\", \"employed\": \"yes\"}\n```";
    let config = mock_config(PromptStyle::FieldSchema, reply).await;
    let mapping = extract_mapping(file.path().to_str().unwrap(), &config).await;

    let obj = mapping.as_object().unwrap();
    assert_eq!(obj.len(), 1, "only the error key: {mapping}");
    let message = obj["error"].as_str().unwrap();
    assert!(message.contains("schema validation"), "{message}");
    assert!(message.contains("employed"), "{message}");
}

#[tokio::test]
async fn fenced_valid_reply_is_decoded() {
    let reply = "Here you go:\n```json\n{\"name\": \"Ada Lovelace\", \"skills\": [\"SQL\", \"SQL\"]}\n```";
    let config = mock_config(PromptStyle::ExampleShape, reply).await;
    let output = extract_markdown(CV_MARKDOWN, &config).await.unwrap();
    assert_eq!(output.record.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(output.record.skills, vec!["SQL".to_string()]);
}

#[tokio::test]
async fn open_role_with_employed_false_is_reported_not_rewritten() {
    let reply = r#"{
        "name": "Ada Lovelace",
        "experience": [
            {"title": "Data Scientist", "start_date": "03-2021", "end_date": "12-2025"}
        ],
        "employed": false
    }"#;
    let config = mock_config(PromptStyle::ExampleShape, reply).await;
    let output = extract_markdown(CV_MARKDOWN, &config).await.unwrap();

    assert_eq!(output.record.employed, Some(false));
    assert!(output.advisories.contains(&Advisory::EmploymentMismatch {
        employed: Some(false),
        expected: true,
    }));
}

#[tokio::test]
async fn successful_extraction_walks_every_stage() {
    let file = temp_with(".md", CV_MARKDOWN.as_bytes());
    let recorder = Arc::new(Recorder::default());
    let mock = MockProvider::new();
    mock.add_response(r#"{"name": "Ada Lovelace"}"#).await;
    let config = ExtractionConfig::builder()
        .provider(Arc::new(mock))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let output = extract(file.path().to_str().unwrap(), &config).await.unwrap();
    assert_eq!(output.record.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(output.document.unwrap().format, DocumentFormat::Text);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["converting", "composing prompt", "inferring"]
    );
}
