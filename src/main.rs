//! Mathscribe - live natural-language math to LaTeX.
//!
//! # Usage
//!
//! ```bash
//! mathscribe notes.txt
//! mathscribe --watch notes.txt
//! mathscribe --offline --json notes.txt
//! echo '{"input": "*squareroot(2x)*"}' | mathscribe --request
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use mathscribe::api;
use mathscribe::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use mathscribe::convert::{ConversionCache, Provider, ServiceConfig};
use mathscribe::export::{CompilerChain, DEFAULT_ENGINE, LocalCompiler, RemoteCompiler};
use mathscribe::perf;
use mathscribe::session::{ExportTarget, Session};

/// Convert `*instructions*` in a text file to LaTeX
#[derive(Parser, Debug)]
#[command(name = "mathscribe", version, about, long_about = None)]
struct Cli {
    /// Text file containing `*instructions*`
    #[arg(value_name = "FILE", required_unless_present_any = ["request", "save", "clear"])]
    file: Option<PathBuf>,

    /// Watch the file and re-convert after each edit
    #[arg(short, long)]
    watch: bool,

    /// Print `{ "segments": [...] }` instead of the text preview
    #[arg(long)]
    json: bool,

    /// Never call the remote service; use the local converter only
    #[arg(long)]
    offline: bool,

    /// Read one `{ "input": ... }` request from stdin and answer on stdout
    #[arg(long, conflicts_with = "watch")]
    request: bool,

    /// Enable performance logging
    #[arg(long)]
    perf: bool,

    /// Compile the converted document to a PDF at PATH
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,

    /// Local TeX engine used for --export
    #[arg(long, value_name = "PROG")]
    compiler: Option<String>,

    /// Remote compile service tried after the local engine
    #[arg(long, value_name = "URL")]
    compile_url: Option<String>,

    /// Quiet period after an edit before converting
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Write detailed session events to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn export_target(flags: &ConfigFlags) -> Result<Option<ExportTarget>> {
    let Some(path) = flags.export.clone() else {
        return Ok(None);
    };
    let engine = flags.compiler.as_deref().unwrap_or(DEFAULT_ENGINE);
    let mut compilers = CompilerChain::new().with(LocalCompiler::new(engine));
    if let Some(url) = &flags.compile_url {
        compilers = compilers.with(RemoteCompiler::new(url.as_str(), Duration::from_secs(60))?);
    }
    Ok(Some(ExportTarget { path, compilers }))
}

fn answer_request(provider: &Provider) -> Result<()> {
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("Failed to read request from stdin")?;
    let mut cache = ConversionCache::new();
    println!("{}", api::respond(&body, &mut cache, provider));
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = effective
        .debug_log
        .clone()
        .or_else(|| std::env::var_os("MATHSCRIBE_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize debug log {}: {}",
            debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    let service = if effective.offline {
        None
    } else {
        ServiceConfig::from_env()
    };
    if service.is_none() && !effective.offline {
        tracing::info!("no conversion service configured; converting offline");
    }
    let provider = Provider::from_config(service).context("Failed to set up conversion service")?;

    if cli.request {
        return answer_request(&provider);
    }

    let Some(file) = cli.file else {
        // Only --save or --clear was requested.
        return Ok(());
    };
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let session = Session::new(file)
        .with_provider(provider)
        .with_debounce_ms(effective.debounce_ms())
        .with_json_output(effective.json)
        .with_export(export_target(&effective)?);

    if effective.watch {
        session.run_watch().context("Session error")
    } else {
        session.run_once().map(|_| ()).context("Session error")
    }
}
