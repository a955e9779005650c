use anyhow::Context;
use clap::Parser;
use logpt::client::{ClientConfig, OpenAiClient};
use logpt::pipeline::{Pipeline, PipelineConfig};
use logpt::{dataset, dedupe, evaluate, store};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

fn init_parallelism() {
    static START: Once = Once::new();
    START.call_once(|| {
        let n = num_cpus::get();
        let _ = rayon::ThreadPoolBuilder::new().num_threads(n).build_global();
    });
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser, Debug)]
#[command(name = "logpt", version, about = "LLM-assisted log template extraction")]
struct Cli {
    /// Dataset (project) name, e.g. HDFS or OpenSSH
    #[arg(long = "dataset")]
    dataset: String,

    /// Directory holding <project>/<project>_2k.log_structured_corrected.csv
    #[arg(long = "data-dir", default_value = "loghub")]
    data_dir: PathBuf,

    /// Where result_<dataset>.json is written and read
    #[arg(long = "output-dir", default_value = "results")]
    output_dir: PathBuf,

    /// Print a previously written result instead of running
    #[arg(long = "read", default_value_t = false)]
    read: bool,

    #[arg(long = "verbose", short = 'v', default_value_t = false)]
    verbose: bool,

    /// Reject templates that do not render back to their log line
    #[arg(long = "validate", default_value_t = false)]
    validate: bool,

    /// Reject replies with placeholders that have no value
    #[arg(long = "strict", default_value_t = false)]
    strict: bool,

    /// Ask the model to generalise each new template against its matches
    #[arg(long = "refine", default_value_t = false)]
    refine: bool,

    #[arg(long = "max-passes", default_value_t = 5)]
    max_passes: usize,

    /// Cap on completion requests for the whole run
    #[arg(long = "max-calls")]
    max_calls: Option<usize>,

    /// SQLite template store to append discovered templates to
    #[arg(long = "store")]
    store: Option<PathBuf>,

    /// Report templates that subsume each other
    #[arg(long = "duplicates", default_value_t = false)]
    duplicates: bool,

    /// Score templates against the dataset's ground truth
    #[arg(long = "evaluate", default_value_t = false)]
    evaluate: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    init_parallelism();

    let artifact = store::artifact_path(&cli.output_dir, &cli.dataset);

    if cli.read {
        let groups = store::load_run(&artifact)
            .with_context(|| format!("reading {}", artifact.display()))?;
        if cli.duplicates {
            let templates: Vec<&str> = groups.keys().map(String::as_str).collect();
            println!("{}", serde_json::to_string_pretty(&dedupe::find_duplicates(&templates))?);
        } else {
            let out: Vec<_> = groups.values().collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        return Ok(());
    }

    let records = dataset::load_dataset(&cli.data_dir, &cli.dataset)?;
    let logs = dataset::unique_logs(&records);
    tracing::info!(dataset = %cli.dataset, records = records.len(), unique = logs.len(), "loaded logs");

    let client = OpenAiClient::new(ClientConfig::from_env()?)?;
    let config = PipelineConfig {
        max_passes: cli.max_passes,
        max_calls: cli.max_calls,
        validate: cli.validate,
        strict: cli.strict,
        refine: cli.refine,
        ..Default::default()
    };

    let running = Arc::new(AtomicBool::new(false));
    {
        let r = running.clone();
        let _ = ctrlc::set_handler(move || { r.store(true, Ordering::SeqCst); });
    }

    let run = Pipeline::new(&client, config).with_stop_flag(&running).run(logs);

    store::save_run(&artifact, &run)?;
    tracing::info!(path = %artifact.display(), "wrote result");
    if !run.residual.is_empty() {
        let residual = store::residual_path(&cli.output_dir, &cli.dataset);
        store::save_residual(&residual, &run.residual)?;
        tracing::info!(path = %residual.display(), lines = run.residual.len(), "wrote residual lines");
    }

    if let Some(path) = cli.store.as_ref() {
        let db = store::TemplateStore::open(path)?;
        let added = db.record_run(&run)?;
        tracing::info!(path = %path.display(), added, "updated template store");
    }

    let mut summary = serde_json::json!({
        "dataset": cli.dataset,
        "templates": run.groups.len(),
        "matched": run.matched_lines(),
        "residual": run.residual.len(),
        "passes": run.passes,
        "calls": run.calls,
        "stop": run.stop,
    });
    if cli.evaluate {
        let eval = evaluate::evaluate(&records, &run.groups);
        summary["accuracy"] = serde_json::json!(eval.accuracy);
        summary["correct"] = serde_json::json!(eval.correct);
        summary["unparsed"] = serde_json::json!(eval.unparsed);
    }
    if cli.duplicates {
        summary["duplicates"] = serde_json::to_value(dedupe::find_duplicates(&run.templates()))?;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
