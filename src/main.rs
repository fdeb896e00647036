use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use snatch::pipeline::{self, PipelineConfig};
use snatch::plugin::PluginHost;

/// Bitmap-font processing pipeline: extract, transform, export.
#[derive(Parser, Debug)]
#[command(name = "snatch", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Extra plugin directory, searched before the standard locations.
    #[arg(long, value_name = "DIR")]
    plugin_dir: Option<PathBuf>,

    /// Extractor plugin name (inferred from the input extension when
    /// omitted).
    #[arg(long, value_name = "NAME")]
    extractor: Option<String>,

    /// Comma-separated key=value parameters for the extractor; must
    /// include input=<path>.
    #[arg(long, value_name = "KVS", default_value = "")]
    extractor_parameters: String,

    /// Transformer plugin name; the transform stage runs only when given.
    #[arg(long, value_name = "NAME")]
    transformer: Option<String>,

    /// Comma-separated key=value parameters for the transformer.
    #[arg(long, value_name = "KVS", default_value = "")]
    transformer_parameters: String,

    /// Exporter plugin name or alias (bin, c).
    #[arg(long, value_name = "NAME")]
    exporter: Option<String>,

    /// Comma-separated key=value parameters for the exporter; must
    /// include output=<path>.
    #[arg(long, value_name = "KVS", default_value = "")]
    exporter_parameters: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            return ExitCode::from(1);
        }
        Err(err) => {
            // --help / --version output.
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
    };

    let config = PipelineConfig {
        plugin_dir: cli.plugin_dir,
        extractor: cli.extractor,
        extractor_parameters: cli.extractor_parameters,
        transformer: cli.transformer,
        transformer_parameters: cli.transformer_parameters,
        exporter: cli.exporter,
        exporter_parameters: cli.exporter_parameters,
    };

    let mut host = PluginHost::with_builtins();
    let dirs = pipeline::plugin_search_dirs(config.plugin_dir.as_deref());
    host.load_from_dirs_in_order(&dirs);

    match pipeline::run(&host, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("snatch: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
