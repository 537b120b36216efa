//! CLI binary for cv-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use cv_extract::{
    degraded_mapping, extract, load_document, record_to_value, write_atomic, ExtractionConfig,
    ExtractionProgressCallback, MonthYear, ProgressCallback, PromptStyle, Stage, TechStackPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner per document, replaced by a
/// result line when the document finishes.
struct CliProgressCallback {
    bar: Mutex<Option<(ProgressBar, Instant)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn spinner(source: &str) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix(source.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    /// Clear the spinner and return the seconds it was shown.
    fn finish(&self) -> f64 {
        match self.bar.lock().ok().and_then(|mut slot| slot.take()) {
            Some((bar, started)) => {
                bar.finish_and_clear();
                started.elapsed().as_secs_f64()
            }
            None => 0.0,
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage(&self, source: &str, stage: Stage) {
        if let Ok(mut slot) = self.bar.lock() {
            let (bar, _) = slot.get_or_insert_with(|| (Self::spinner(source), Instant::now()));
            bar.set_message(format!("{stage}…"));
        }
    }

    fn on_done(&self, source: &str, fields_found: usize) {
        let secs = self.finish();
        eprintln!(
            "  {} {}  {}  {}",
            green("✓"),
            source,
            dim(&format!("{fields_found} fields")),
            dim(&format!("{secs:.1}s")),
        );
    }

    fn on_failed(&self, source: &str, error: &str) {
        let secs = self.finish();
        let first_line = error.lines().next().unwrap_or(error);
        // Truncate very long error messages to keep output tidy.
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };
        eprintln!(
            "  {} {}  {}  {}",
            red("✗"),
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one CV (stdout)
  cv2json cv.pdf

  # Write the record to a file
  cv2json cv.docx -o candidate.json

  # Bias extraction towards a domain
  cv2json -t "Data Science" -t Management cv.pdf

  # Validated schema prompt, fixed sentinel date
  cv2json --style schema --current-date 12-2025 cv.pdf

  # Several CVs, one JSON array
  cv2json a.pdf b.docx c.md > candidates.json

  # Show the Markdown handed to the model (no LLM needed)
  cv2json --markdown-only cv.pdf

  # Fail with a non-zero exit code instead of printing {"error": ...}
  cv2json --strict cv.pdf

SUPPORTED INPUTS:
  .pdf                 text layer via pdfium (scanned PDFs have no text)
  .docx                Word body; headings and list items are kept
  .txt .md .markdown   passed through as-is
  http(s)://...        downloaded to a temporary directory first

DEGRADED OUTPUT (without --strict):
  Style     Conversion failure                   Model/decode failure
  ───────   ───────────────────────────────────  ─────────────────────
  example   {"error": "Failed to parse PDF"}     {}
  schema    {"error": "Failed to convert file"}  {"error": "<message>"}

ENVIRONMENT VARIABLES:
  EDGEQUAKE_LLM_PROVIDER  Provider when --provider is not given (default: ollama)
  EDGEQUAKE_MODEL         Model when --model is not given (default: llama3.2)
  OLLAMA_HOST             Ollama endpoint (default: http://localhost:11434)
  PDFIUM_LIB_PATH         Directory or file of the pdfium shared library
  CV2JSON_*               Any flag, e.g. CV2JSON_STYLE=schema, CV2JSON_STRICT=true

SETUP:
  1. Start a model:   ollama pull llama3.2 && ollama serve
  2. Extract:         cv2json cv.pdf
"#;

/// Extract structured candidate data from CVs with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "cv2json",
    version,
    about = "Extract structured candidate data from CVs with a local LLM",
    long_about = "Convert CVs (PDF, DOCX, TXT or Markdown; local files or URLs) to Markdown and \
extract a fixed JSON record with a zero-temperature LLM call. Defaults to a local Ollama model; \
any provider supported by edgequake-llm can be selected.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Context-focus tag (repeatable), e.g. "Data Science".
    #[arg(short = 't', long = "context", env = "CV2JSON_CONTEXT", value_delimiter = ',')]
    context: Vec<String>,

    /// Prompt style: example (lenient) or schema (validated).
    #[arg(long, env = "CV2JSON_STYLE", value_enum, default_value = "example")]
    style: StyleArg,

    /// Per-role tech stack: evidence (named only) or inferred.
    #[arg(long, env = "CV2JSON_TECH_STACK", value_enum, default_value = "evidence")]
    tech_stack: TechStackArg,

    /// LLM model ID (e.g. llama3.2, qwen2.5:7b).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: ollama, lmstudio, openai, anthropic, gemini, …
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Sentinel for open-ended roles, MM-YYYY. Default: the current month.
    #[arg(long, env = "CV2JSON_CURRENT_DATE", value_parser = parse_month_year)]
    current_date: Option<MonthYear>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "CV2JSON_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "CV2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries after transport failures.
    #[arg(long, env = "CV2JSON_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// LLM call timeout in seconds. Default: no timeout.
    #[arg(long, env = "CV2JSON_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "CV2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "CV2JSON_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the built-in extraction rules.
    #[arg(long, env = "CV2JSON_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Write JSON to this file instead of stdout (single input only).
    #[arg(short, long, env = "CV2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the converted Markdown only, no LLM call.
    #[arg(long)]
    markdown_only: bool,

    /// Exit non-zero on any failure instead of printing a degraded mapping.
    #[arg(long, env = "CV2JSON_STRICT")]
    strict: bool,

    /// Disable progress spinner.
    #[arg(long, env = "CV2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CV2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CV2JSON_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StyleArg {
    Example,
    Schema,
}

impl From<StyleArg> for PromptStyle {
    fn from(v: StyleArg) -> Self {
        match v {
            StyleArg::Example => PromptStyle::ExampleShape,
            StyleArg::Schema => PromptStyle::FieldSchema,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum TechStackArg {
    Evidence,
    Inferred,
}

impl From<TechStackArg> for TechStackPolicy {
    fn from(v: TechStackArg) -> Self {
        match v {
            TechStackArg::Evidence => TechStackPolicy::EvidenceOnly,
            TechStackArg::Inferred => TechStackPolicy::Inferred,
        }
    }
}

fn parse_month_year(s: &str) -> std::result::Result<MonthYear, String> {
    s.parse::<MonthYear>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; library INFO logs
    // would only interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output accepts a single input (got {})", cli.inputs.len());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    if cli.markdown_only {
        return run_markdown_only(&cli, &config).await;
    }

    // ── Run extraction, one input at a time ──────────────────────────────
    let mut records: Vec<Value> = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;
    let (mut tokens_in, mut tokens_out, mut total_ms) = (0usize, 0usize, 0u64);

    for input in &cli.inputs {
        match extract(input, &config).await {
            Ok(output) => {
                tokens_in += output.stats.input_tokens;
                tokens_out += output.stats.output_tokens;
                total_ms += output.stats.total_ms;
                if !cli.quiet {
                    for advisory in &output.advisories {
                        eprintln!("  {} {}", cyan("⚠"), dim(&advisory.to_string()));
                    }
                }
                records.push(record_to_value(&output));
            }
            Err(e) => {
                failures += 1;
                if !show_progress {
                    eprintln!("{} {}: {}", red("✗"), input, e);
                }
                if !cli.strict {
                    records.push(degraded_mapping(&e, config.prompt_style));
                }
            }
        }
    }

    // Strict mode drops failed inputs, so a single failed input prints nothing.
    let json = if cli.inputs.len() == 1 {
        records.pop()
    } else {
        Some(Value::Array(records))
    };

    if let Some(json) = json {
        let text = serde_json::to_string_pretty(&json).context("Failed to serialise output")?;
        emit(&cli, &text).await?;
    }

    if !cli.quiet {
        let ok = cli.inputs.len() - failures;
        eprintln!(
            "{}  {}/{} extracted  {}ms",
            if failures == 0 { green("✔") } else { cyan("⚠") },
            bold(&ok.to_string()),
            cli.inputs.len(),
            total_ms,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&tokens_in.to_string()),
            dim(&tokens_out.to_string()),
        );
    }

    if cli.strict && failures > 0 {
        anyhow::bail!("{} of {} inputs failed", failures, cli.inputs.len());
    }
    Ok(())
}

/// `--markdown-only`: print what the model would see.
async fn run_markdown_only(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let mut parts = Vec::with_capacity(cli.inputs.len());
    let mut failures = 0usize;

    for input in &cli.inputs {
        match load_document(input, config).await {
            Ok(doc) => {
                if !cli.quiet {
                    eprintln!(
                        "{} {}  {}",
                        green("✓"),
                        input,
                        dim(&format!(
                            "{}, {} chars",
                            doc.info.format, doc.info.markdown_chars
                        )),
                    );
                }
                if cli.inputs.len() > 1 {
                    parts.push(format!("<!-- {} -->\n\n{}", input, doc.markdown));
                } else {
                    parts.push(doc.markdown);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", red("✗"), input, e);
            }
        }
    }

    if !parts.is_empty() {
        emit(cli, parts.join("\n").trim_end()).await?;
    }

    if failures > 0 && (cli.strict || parts.is_empty()) {
        anyhow::bail!("{} of {} inputs failed", failures, cli.inputs.len());
    }
    Ok(())
}

/// Write `text` to `--output` (atomically) or stdout, with a trailing newline.
async fn emit(cli: &Cli, text: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        write_atomic(path, format!("{text}\n").as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{} {}", green("→"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .prompt_style(cli.style.clone().into())
        .tech_stack(cli.tech_stack.clone().into())
        .context_tags(cli.context.iter().cloned())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let rules = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(rules);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(date) = cli.current_date {
        builder = builder.current_date(date);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
