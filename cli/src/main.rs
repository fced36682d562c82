use std::fmt::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use pdf2zh_core::{run, AppSettings, ProgressEvent, RunRequest};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(version, about = "Translate a PDF while preserving its visual layout")]
struct Args {
    /// Path to the source PDF.
    input_path: PathBuf,

    /// Pages to translate, e.g. "1-5" or "3"; omit to translate every page.
    #[arg(long, short('r'))]
    page_range: Option<String>,

    /// Destination path for the translated PDF.
    #[arg(long, short('o'))]
    output: PathBuf,

    /// Path to a TOML settings file (translatorType, targetLanguage, ...).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path to the DocLayout-style ONNX layout model.
    #[arg(long, env = "PDF2ZH_LAYOUT_MODEL_PATH")]
    layout_model_path: PathBuf,

    /// Regular TTF covering the target language's script.
    #[arg(long, env = "PDF2ZH_FONT_REGULAR")]
    font_regular: Option<PathBuf>,

    /// Optional bold TTF, used for titles.
    #[arg(long, env = "PDF2ZH_FONT_BOLD")]
    font_bold: Option<PathBuf>,

    /// Overrides the settings file's customPrompt for this run.
    #[arg(long)]
    custom_prompt: Option<String>,
}

fn parse_page_range(range_str: &str) -> anyhow::Result<Vec<usize>> {
    if let Some((start, end)) = range_str.split_once('-') {
        let start: usize = start.trim().parse()?;
        let end: usize = end.trim().parse()?;
        if start > 0 && end >= start {
            Ok((start..=end).collect())
        } else {
            anyhow::bail!("invalid page range: start must be > 0 and end must be >= start")
        }
    } else {
        let page: usize = range_str.trim().parse()?;
        if page > 0 {
            Ok(vec![page])
        } else {
            anyhow::bail!("page number must be greater than 0")
        }
    }
}

fn setup_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
            .unwrap()
            .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap()
            })
            .progress_chars("#>-"),
    );
    pb
}

fn init_tracing() {
    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            AppSettings::from_toml_str(&text)?
        }
        None => AppSettings::default(),
    };

    let selected_pages = args
        .page_range
        .as_deref()
        .map(parse_page_range)
        .transpose()?;

    let abort_flag = Arc::new(AtomicBool::new(false));

    let pb = setup_progress_bar();
    let pbc = pb.clone();

    let request = RunRequest {
        input_path: args.input_path,
        output_path: args.output,
        settings,
        selected_pages,
        custom_prompt: args.custom_prompt,
        abort_flag,
        model_path: args.layout_model_path,
        font_regular_path: args.font_regular,
        font_bold_path: args.font_bold,
    };

    let result = run(request, move |event: ProgressEvent| {
        pbc.set_position(event.percent.round() as u64);
        pbc.set_message(format!(
            "{} (page {}/{})",
            event.stage, event.current_page, event.total_pages
        ));
    })
    .await;

    match result {
        Ok(run_result) => {
            pb.finish_with_message("done");
            println!(
                "translated with usage: input_tokens={} output_tokens={} total_cost={:.4}",
                run_result.usage.input_tokens, run_result.usage.output_tokens, run_result.usage.total_cost
            );
            Ok(())
        }
        Err(err) => {
            pb.abandon_with_message("failed");
            tracing::error!(%err, "translation run failed");
            Err(err.into())
        }
    }
}
