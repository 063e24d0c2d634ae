//! CLI binary for famcert.
//!
//! A thin shim over the library crate that checks the shared password, maps
//! CLI flags to `ConversionConfig` and writes the resulting document or zip.

use anyhow::{Context, Result};
use clap::Parser;
use famcert::{
    convert_batch, write_output, BatchProgressCallback, ConversionConfig, OcrBackend, OcrConfig,
    TextractBackend, TranslatorAttestation,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the batch, one log line per certificate.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
    records: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Translating");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            records: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|s| *s)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total_files} certificate(s)…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, records: usize) {
        self.records.fetch_add(records, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{records:>2} members")),
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} File {:>3}/{:<3}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
        ));
        self.bar.abandon();
    }

    fn on_batch_complete(&self, total_files: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} certificate(s) translated, {} family members",
            green("✔"),
            bold(&total_files.to_string()),
            self.records.load(Ordering::SeqCst)
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One certificate → Certificato_di_Famiglia_<dd-mm-YYYY>.docx
  famcert certifikata.pdf

  # Several certificates → certificati_tradotti_<YYYY-mm-dd>.zip
  famcert scans/*.pdf scans/*.jpg

  # Signed by a sworn translator
  famcert certifikata.pdf --translator-name "Mira Kola" \
      --translator-cert-number 1234 --translator-cert-date 31.07.2024

  # Inspect what was read, without writing documents
  famcert --json certifikata.pdf > certificate.json

ENVIRONMENT VARIABLES:
  APP_PASSWORD            Shared password; unset means nobody gets in
  FAMCERT_PASSWORD        Password presented by this session
  AWS_REGION              Textract region (default us-east-2)
  AWS_ACCESS_KEY_ID       \
  AWS_SECRET_ACCESS_KEY    } Standard AWS credential chain
  AWS_PROFILE             /
  PDFIUM_LIB_PATH         Directory containing libpdfium (multi-page PDFs)
  RUST_LOG                Override log filter (e.g. famcert=debug)
"#;

/// Translate Albanian family certificates into Italian DOCX documents.
#[derive(Parser, Debug)]
#[command(
    name = "famcert",
    version,
    about = "Translate Albanian family certificates into Italian DOCX documents",
    long_about = "Read scanned Albanian family certificates (PDF, JPEG or PNG) with AWS Textract, \
extract the family table, translate it into Italian and render a certificate ready for a sworn \
translator's signature.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Certificates to translate (.pdf, .jpg, .jpeg, .png).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the document (or zip) here instead of the dated default name.
    #[arg(short, long, env = "FAMCERT_OUTPUT")]
    output: Option<PathBuf>,

    /// Shared password for this session.
    #[arg(long, env = "FAMCERT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print the extracted certificates as JSON instead of writing documents.
    #[arg(long, env = "FAMCERT_JSON")]
    json: bool,

    /// Fail when a table value has no Italian translation.
    #[arg(long, env = "FAMCERT_STRICT")]
    strict: bool,

    /// Rasterisation DPI for multi-page PDFs (72–600).
    #[arg(long, env = "FAMCERT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// AWS region of the Textract endpoint.
    #[arg(long, env = "AWS_REGION", default_value = famcert::config::DEFAULT_REGION)]
    region: String,

    /// Custom Textract endpoint (e.g. a local mock).
    #[arg(long, env = "FAMCERT_TEXTRACT_ENDPOINT")]
    endpoint_url: Option<String>,

    /// Flag image shown in the document header.
    #[arg(long, env = "FAMCERT_FLAG_IMAGE")]
    flag_image: Option<PathBuf>,

    /// Sworn translator's full name; adds the attestation and signature.
    #[arg(long, env = "FAMCERT_TRANSLATOR_NAME")]
    translator_name: Option<String>,

    /// Translator's Ministry of Justice certificate number.
    #[arg(long, env = "FAMCERT_TRANSLATOR_CERT_NUMBER", requires = "translator_name")]
    translator_cert_number: Option<String>,

    /// Date of the translator's certificate (e.g. 31.07.2024).
    #[arg(long, env = "FAMCERT_TRANSLATOR_CERT_DATE", requires = "translator_name")]
    translator_cert_date: Option<String>,

    /// Use feminine agreement in the attestation.
    #[arg(long, env = "FAMCERT_TRANSLATOR_FEMININE")]
    translator_feminine: bool,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "FAMCERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FAMCERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FAMCERT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Build config ─────────────────────────────────────────────────────
    let mut config = build_config(&cli)?;

    // ── Access gate ──────────────────────────────────────────────────────
    // The shared password comes from the environment only, never argv.
    config
        .authorize(cli.password.as_deref().unwrap_or_default())
        .context("Access denied")?;

    let backend: Arc<dyn OcrBackend> = Arc::new(TextractBackend::from_config(&config.ocr).await);
    config.ocr_backend = Some(backend);
    if show_progress {
        config.progress_callback =
            Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>);
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let batch = convert_batch(&cli.inputs, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&batch.files).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&batch.file_name));
    write_output(&path, &batch.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if !cli.quiet {
        let stats = batch.total_stats();
        eprintln!(
            "{}  {} file(s)  {} members  {}ms  →  {}",
            green("✔"),
            batch.files.len(),
            stats.records,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
        if stats.untranslated > 0 {
            eprintln!(
                "   {} value(s) left untranslated; see the log for details",
                cyan(&stats.untranslated.to_string())
            );
        }
        if stats.rasterised {
            eprintln!("   {}", dim("some PDFs were read page by page as images"));
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`. The Textract client is attached
/// after the access gate.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let ocr = OcrConfig {
        region: cli.region.clone(),
        endpoint_url: cli.endpoint_url.clone(),
        ..OcrConfig::default()
    };

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .ocr(ocr)
        .app_password_from_env()
        .strict_translation(cli.strict);

    if let Some(ref name) = cli.translator_name {
        let (Some(number), Some(date)) = (&cli.translator_cert_number, &cli.translator_cert_date)
        else {
            anyhow::bail!(
                "--translator-name also needs --translator-cert-number and --translator-cert-date"
            );
        };
        builder = builder.attestation(TranslatorAttestation {
            name: name.clone(),
            certificate_number: number.clone(),
            certificate_date: date.clone(),
            feminine: cli.translator_feminine,
        });
    }
    if let Some(ref flag) = cli.flag_image {
        builder = builder.flag_image(flag);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(dir);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shared_password_cannot_be_passed_as_a_flag() {
        let err = Cli::try_parse_from([
            "famcert",
            "--app-password",
            "letmein",
            "--password",
            "letmein",
            "certifikata.pdf",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
