//! The staged pipeline run.

use std::env;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::PipelineError;
use crate::font::Font;
use crate::options::OptionBag;
use crate::pipeline::PipelineConfig;
use crate::plugin::{PluginHost, PluginKind, PluginRecord, Stage};

/// Environment variable naming an additional plugin directory, searched
/// after `--plugin-dir`.
pub const PLUGIN_DIR_ENV: &str = "SNATCH_PLUGIN_DIR";

/// Compile-time default plugin directory.
pub const DEFAULT_PLUGIN_DIR: &str = "/usr/local/lib/snatch/plugins";

/// Extensions routed to the scalable-font extractor.
const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Extensions routed to the image-sheet extractor.
const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "gif", "tga", "webp"];

/// Plugin directory search order: CLI flag, environment variable,
/// compile-time default, then the user directory under `$HOME`.
pub fn plugin_search_dirs(cli_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = cli_dir {
        dirs.push(dir.to_path_buf());
    }
    if let Ok(dir) = env::var(PLUGIN_DIR_ENV) {
        if !dir.is_empty() {
            dirs.push(PathBuf::from(dir));
        }
    }
    dirs.push(PathBuf::from(DEFAULT_PLUGIN_DIR));
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            dirs.push(PathBuf::from(home).join(".snatch").join("plugins"));
        }
    }
    dirs
}

/// Picks the extractor plugin name from the input file's extension.
fn infer_extractor(input: &Path) -> Result<&'static str, PipelineError> {
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if FONT_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(crate::extract::ttf::PLUGIN_NAME);
    }
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(crate::extract::image_sheet::PLUGIN_NAME);
    }
    Err(PipelineError::Orchestration(format!(
        "cannot infer an extractor for input extension '{extension}'; use --extractor"
    )))
}

/// Maps case-insensitive exporter shorthand onto concrete plugin names.
/// The bare token `asm` is ambiguous and rejected.
fn resolve_exporter_name(token: &str) -> Result<String, PipelineError> {
    let lowered = token.to_lowercase();
    match lowered.as_str() {
        "asm" => Err(PipelineError::Orchestration(
            "exporter alias 'asm' is ambiguous; use partner_sdcc_asm_tiny or partner_sdcc_asm_bitmap"
                .to_string(),
        )),
        "bin" => Ok(crate::export::raw_bin::PLUGIN_NAME.to_string()),
        "c" => Ok(crate::export::raw_c::PLUGIN_NAME.to_string()),
        _ => Ok(token.to_string()),
    }
}

fn find_stage<'h>(
    host: &'h PluginHost,
    name: &str,
    kind: PluginKind,
) -> Result<&'h PluginRecord, PipelineError> {
    host.find_by_name_and_kind(name, kind).ok_or_else(|| {
        PipelineError::Orchestration(format!("no {kind} plugin named '{name}'"))
    })
}

/// Splits a stage parameter string, pulling out a required path key.
fn split_path_parameter(
    parameters: &str,
    key: &str,
    missing_message: &str,
) -> Result<(PathBuf, OptionBag), PipelineError> {
    let mut options = OptionBag::parse(parameters);
    let path = options
        .take(key)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PipelineError::Orchestration(missing_message.to_string()))?;
    Ok((PathBuf::from(path), options))
}

/// Runs one extract -> (transform) -> export pipeline.
///
/// Stage completions are reported on standard output; failures carry the
/// stage-specific exit code.
pub fn run(host: &PluginHost, config: &PipelineConfig) -> Result<(), PipelineError> {
    let (input, extract_options) = split_path_parameter(
        &config.extractor_parameters,
        "input",
        "extractor input path is required (pass input=<path> in --extractor-parameters)",
    )?;

    let extractor_name = match &config.extractor {
        Some(name) if !name.is_empty() => name.clone(),
        _ => infer_extractor(&input)?.to_string(),
    };

    let exporter_token = config
        .exporter
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            PipelineError::Orchestration("an exporter must be specified (--exporter)".to_string())
        })?;
    let exporter_name = resolve_exporter_name(exporter_token)?;

    let (output, export_options) = split_path_parameter(
        &config.exporter_parameters,
        "output",
        "exporter output path is required (pass output=<path> in --exporter-parameters)",
    )?;

    // Resolve every stage before the first one runs.
    let extractor = find_stage(host, &extractor_name, PluginKind::Extractor)?;
    let transformer = match &config.transformer {
        Some(name) if !name.is_empty() => {
            Some(find_stage(host, name, PluginKind::Transformer)?)
        }
        _ => None,
    };
    let exporter = find_stage(host, &exporter_name, PluginKind::Exporter)?;

    debug!(
        "pipeline: extract={} transform={:?} export={}",
        extractor.meta.name,
        transformer.map(|t| t.meta.name.as_str()),
        exporter.meta.name
    );

    let mut font: Font = match &extractor.stage {
        Stage::Extract(stage) => stage
            .extract(&input, &extract_options)
            .map_err(PipelineError::Extract)?,
        _ => unreachable!("extractor resolved by kind"),
    };
    println!("extracted with plugin: {}", extractor.meta.name);

    if let Some(transformer) = transformer {
        let options = OptionBag::parse(&config.transformer_parameters);
        match &transformer.stage {
            Stage::Transform(stage) => stage
                .transform(&mut font, &options)
                .map_err(PipelineError::Transform)?,
            _ => unreachable!("transformer resolved by kind"),
        }
        println!("transformed with plugin: {}", transformer.meta.name);
    }

    match &exporter.stage {
        Stage::Export(stage) => stage
            .export(&font, &output, &export_options)
            .map_err(PipelineError::Export)?,
        _ => unreachable!("exporter resolved by kind"),
    }
    println!("exported with plugin: {}", exporter.meta.name);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_inference_by_extension() {
        assert_eq!(infer_extractor(Path::new("face.ttf")).unwrap(), "ttf_extractor");
        assert_eq!(infer_extractor(Path::new("face.OTF")).unwrap(), "ttf_extractor");
        assert_eq!(infer_extractor(Path::new("sheet.png")).unwrap(), "image_extractor");
        assert_eq!(infer_extractor(Path::new("sheet.webp")).unwrap(), "image_extractor");
        let err = infer_extractor(Path::new("font.xyz")).unwrap_err();
        assert!(err.to_string().contains("'xyz'"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn exporter_alias_table() {
        assert_eq!(resolve_exporter_name("bin").unwrap(), "raw_bin");
        assert_eq!(resolve_exporter_name("C").unwrap(), "raw_c");
        assert_eq!(resolve_exporter_name("png").unwrap(), "png");
        assert_eq!(
            resolve_exporter_name("partner_sdcc_asm_tiny").unwrap(),
            "partner_sdcc_asm_tiny"
        );
        let err = resolve_exporter_name("ASM").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn search_dirs_follow_priority_order() {
        let dirs = plugin_search_dirs(Some(Path::new("/opt/plugins")));
        assert_eq!(dirs[0], PathBuf::from("/opt/plugins"));
        assert!(dirs.contains(&PathBuf::from(DEFAULT_PLUGIN_DIR)));
        // The CLI directory always sorts before the compile-time default.
        let cli_pos = dirs.iter().position(|d| d == Path::new("/opt/plugins")).unwrap();
        let default_pos = dirs
            .iter()
            .position(|d| d == Path::new(DEFAULT_PLUGIN_DIR))
            .unwrap();
        assert!(cli_pos < default_pos);
    }

    #[test]
    fn missing_input_parameter() {
        let err = split_path_parameter("first_ascii=65", "input", "extractor input path is required")
            .unwrap_err();
        assert!(err.to_string().contains("extractor input path is required"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn path_parameter_is_removed_from_options() {
        let (path, options) =
            split_path_parameter("input=/tmp/a.png,columns=4", "input", "missing").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/a.png"));
        assert_eq!(options.get("input"), None);
        assert_eq!(options.get("columns"), Some("4"));
    }

    #[test]
    fn run_reports_unknown_plugins() {
        let host = PluginHost::with_builtins();
        let config = PipelineConfig {
            extractor: Some("no_such_extractor".to_string()),
            extractor_parameters: "input=/tmp/x.png".to_string(),
            exporter: Some("bin".to_string()),
            exporter_parameters: "output=/tmp/x.bin".to_string(),
            ..Default::default()
        };
        let err = run(&host, &config).unwrap_err();
        assert!(err.to_string().contains("no extractor plugin named 'no_such_extractor'"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn run_requires_exporter() {
        let host = PluginHost::with_builtins();
        let config = PipelineConfig {
            extractor_parameters: "input=/tmp/x.png".to_string(),
            ..Default::default()
        };
        let err = run(&host, &config).unwrap_err();
        assert!(err.to_string().contains("an exporter must be specified"));
    }
}
