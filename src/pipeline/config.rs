//! User intent for one pipeline run, as collected from the command line.

use std::path::PathBuf;

/// Stage names and raw parameter strings for one run.
///
/// Parameter strings are comma-separated `key=value` lists; they stay
/// unparsed here so the orchestrator can extract the reserved `input` /
/// `output` keys before forwarding the rest.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Extra plugin directory from `--plugin-dir`, searched first.
    pub plugin_dir: Option<PathBuf>,
    /// Extractor plugin name; inferred from the input extension when
    /// absent.
    pub extractor: Option<String>,
    pub extractor_parameters: String,
    /// Transformer plugin name; the transform stage runs iff set.
    pub transformer: Option<String>,
    pub transformer_parameters: String,
    /// Exporter name or shorthand alias.
    pub exporter: Option<String>,
    pub exporter_parameters: String,
}
