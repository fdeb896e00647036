//! The plugin host: discovery, validation, retention, and release.
//!
//! Built-in stages are registered at construction; shared objects found in
//! plugin directories are loaded on top. A plugin that fails validation is
//! skipped with a warning, so one bad file never prevents loading the rest.

use std::env;
use std::ffi::CStr;
use std::path::{Path, PathBuf};

use libloading::Library;
use log::{debug, warn};

use crate::plugin::abi::{
    RawPluginGetFn, RawPluginInfo, PLUGIN_ENTRY_SYMBOL, SNATCH_PLUGIN_ABI_VERSION,
    SNATCH_PLUGIN_KIND_EXPORTER, SNATCH_PLUGIN_KIND_EXTRACTOR, SNATCH_PLUGIN_KIND_TRANSFORMER,
};
use crate::plugin::external::{ExternalExporter, ExternalExtractor, ExternalTransformer};
use crate::plugin::{PluginKind, PluginMeta, PluginOrigin, PluginRecord, Stage};

/// Environment variable enabling loader tracing when set non-empty and
/// not `"0"`.
pub const DEBUG_PLUGINS_ENV: &str = "SNATCH_DEBUG_PLUGINS";

/// Owns every loaded plugin record and shared-object handle.
///
/// Handles are closed when the host is dropped, in reverse load order,
/// which must happen strictly after the last pipeline invocation.
#[derive(Default)]
pub struct PluginHost {
    records: Vec<PluginRecord>,
    libraries: Vec<Library>,
    trace: bool,
}

impl PluginHost {
    /// An empty host with loader tracing read from the environment.
    pub fn new() -> Self {
        let trace = env::var(DEBUG_PLUGINS_ENV)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        Self {
            records: Vec::new(),
            libraries: Vec::new(),
            trace,
        }
    }

    /// A host pre-seeded with every built-in stage.
    pub fn with_builtins() -> Self {
        let mut host = Self::new();
        for record in crate::builtin_plugins() {
            host.register(record);
        }
        host
    }

    /// Registers a record directly. Built-ins go through here; dynamic
    /// loads arrive via the `load_*` family.
    pub fn register(&mut self, record: PluginRecord) {
        if self.trace {
            debug!(
                "registered {} plugin '{}' ({:?})",
                record.meta.kind, record.meta.name, record.origin
            );
        }
        self.records.push(record);
    }

    pub fn plugins(&self) -> &[PluginRecord] {
        &self.records
    }

    /// First record with the given name, in registration order.
    pub fn find_by_name(&self, name: &str) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.meta.name == name)
    }

    /// First record matching both name and kind.
    pub fn find_by_name_and_kind(&self, name: &str, kind: PluginKind) -> Option<&PluginRecord> {
        self.records
            .iter()
            .find(|r| r.meta.name == name && r.meta.kind == kind)
    }

    /// First record of the given kind.
    pub fn find_first_by_kind(&self, kind: PluginKind) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.meta.kind == kind)
    }

    /// Scans `dir` for shared objects and loads every valid plugin.
    /// Returns the number of plugins this call contributed.
    pub fn load_from_dir(&mut self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                if self.trace {
                    debug!("plugin dir {} not scanned: {}", dir.display(), err);
                }
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_library = path
                .extension()
                .map(|ext| ext == env::consts::DLL_EXTENSION)
                .unwrap_or(false);
            if !is_library {
                continue;
            }
            if self.load_plugin(&path) {
                loaded += 1;
            }
        }
        loaded
    }

    /// Tries `dir/name.<ext>` for each requested name. Returns how many
    /// resolved.
    pub fn load_named_from_dir(&mut self, dir: &Path, names: &[&str]) -> usize {
        let mut loaded = 0;
        for name in names {
            let path = dir.join(format!("{}.{}", name, env::consts::DLL_EXTENSION));
            if path.is_file() && self.load_plugin(&path) {
                loaded += 1;
            }
        }
        loaded
    }

    /// Walks `dirs` in order, stopping at the first directory that
    /// contributes at least one valid plugin.
    pub fn load_from_dirs_in_order(&mut self, dirs: &[PathBuf]) -> usize {
        for dir in dirs {
            let loaded = self.load_from_dir(dir);
            if loaded > 0 {
                return loaded;
            }
        }
        0
    }

    /// Walks `dirs` in order, stopping at the first directory in which
    /// every requested name resolves.
    pub fn load_named_from_dirs_in_order(&mut self, dirs: &[PathBuf], names: &[&str]) -> usize {
        for dir in dirs {
            let loaded = self.load_named_from_dir(dir, names);
            if loaded == names.len() {
                return loaded;
            }
        }
        0
    }

    /// Opens, validates, and retains one shared object. Returns false
    /// (after logging) on any validation failure.
    fn load_plugin(&mut self, path: &Path) -> bool {
        if self.trace {
            debug!("loading plugin candidate {}", path.display());
        }

        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(err) => {
                warn!("failed to open {}: {}", path.display(), err);
                return false;
            }
        };

        let entry: RawPluginGetFn = match unsafe { library.get::<RawPluginGetFn>(PLUGIN_ENTRY_SYMBOL) } {
            Ok(symbol) => *symbol,
            Err(err) => {
                warn!(
                    "no snatch_plugin_get symbol in {}: {}",
                    path.display(),
                    err
                );
                return false;
            }
        };

        let mut info_ptr: *const RawPluginInfo = std::ptr::null();
        let rc = unsafe { entry(&mut info_ptr) };
        if rc != 0 || info_ptr.is_null() {
            warn!("plugin get() failed for {} (rc {})", path.display(), rc);
            return false;
        }
        let info = unsafe { &*info_ptr };

        match self.validate(info, path) {
            Some((meta, stage)) => {
                if self.trace {
                    debug!("accepted plugin '{}' from {}", meta.name, path.display());
                }
                self.records.push(PluginRecord {
                    meta,
                    stage,
                    origin: PluginOrigin::Dynamic(path.to_path_buf()),
                });
                self.libraries.push(library);
                true
            }
            None => false,
        }
    }

    /// Checks the metadata block invariants and wraps the kind-appropriate
    /// entry point.
    fn validate(&self, info: &RawPluginInfo, path: &Path) -> Option<(PluginMeta, Stage)> {
        if info.abi_version != SNATCH_PLUGIN_ABI_VERSION {
            warn!(
                "ABI mismatch in {} (plugin {}, host {})",
                path.display(),
                info.abi_version,
                SNATCH_PLUGIN_ABI_VERSION
            );
            return None;
        }

        let name = unsafe { read_string(info.name) };
        if name.is_empty() {
            warn!("plugin {} has an empty name", path.display());
            return None;
        }

        let (kind, stage) = match info.kind {
            SNATCH_PLUGIN_KIND_EXTRACTOR => match info.extract {
                Some(entry) => (
                    PluginKind::Extractor,
                    Stage::Extract(Box::new(ExternalExtractor::new(entry))),
                ),
                None => {
                    warn!("extractor '{}' is missing its entry point", name);
                    return None;
                }
            },
            SNATCH_PLUGIN_KIND_TRANSFORMER => match info.transform {
                Some(entry) => (
                    PluginKind::Transformer,
                    Stage::Transform(Box::new(ExternalTransformer::new(entry))),
                ),
                None => {
                    warn!("transformer '{}' is missing its entry point", name);
                    return None;
                }
            },
            SNATCH_PLUGIN_KIND_EXPORTER => match info.export {
                Some(entry) => (
                    PluginKind::Exporter,
                    Stage::Export(Box::new(ExternalExporter::new(entry))),
                ),
                None => {
                    warn!("exporter '{}' is missing its entry point", name);
                    return None;
                }
            },
            other => {
                warn!("plugin '{}' declares unknown kind {}", name, other);
                return None;
            }
        };

        let format = unsafe { read_string(info.format) };
        let standard = unsafe { read_string(info.standard) };
        if kind == PluginKind::Exporter && (format.is_empty() || standard.is_empty()) {
            warn!("exporter '{}' is missing format/standard tags", name);
            return None;
        }

        Some((
            PluginMeta {
                name,
                description: unsafe { read_string(info.description) },
                author: unsafe { read_string(info.author) },
                format,
                standard,
                abi_version: info.abi_version,
                kind,
            },
            stage,
        ))
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        // Stage adapters hold raw entry points into the libraries; tear
        // them down first, then close handles in reverse load order.
        self.records.clear();
        while let Some(library) = self.libraries.pop() {
            drop(library);
        }
    }
}

unsafe fn read_string(ptr: *const std::os::raw::c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_discoverable() {
        let host = PluginHost::with_builtins();
        assert!(host.find_by_name("raw_bin").is_some());
        assert!(host
            .find_by_name_and_kind("raw_c", PluginKind::Exporter)
            .is_some());
        assert!(host
            .find_by_name_and_kind("raw_c", PluginKind::Extractor)
            .is_none());
        assert_eq!(
            host.find_first_by_kind(PluginKind::Extractor).unwrap().meta.kind,
            PluginKind::Extractor
        );
    }

    #[test]
    fn exporters_carry_format_and_standard() {
        let host = PluginHost::with_builtins();
        for record in host.plugins() {
            if record.meta.kind == PluginKind::Exporter {
                assert!(!record.meta.format.is_empty(), "{}", record.meta.name);
                assert!(!record.meta.standard.is_empty(), "{}", record.meta.name);
            }
            assert_eq!(record.meta.abi_version, crate::plugin::ABI_VERSION);
        }
    }

    #[test]
    fn missing_dir_loads_nothing() {
        let mut host = PluginHost::new();
        assert_eq!(host.load_from_dir(Path::new("/nonexistent/snatch-plugins")), 0);
        assert!(host.plugins().is_empty());
    }

    #[test]
    fn non_library_files_are_ignored() {
        let dir = std::env::temp_dir().join(format!("snatch_host_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("notes.txt"), b"not a plugin").unwrap();
        let mut host = PluginHost::new();
        assert_eq!(host.load_from_dir(&dir), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_library_file_is_skipped() {
        let dir = std::env::temp_dir().join(format!("snatch_host_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("bogus.{}", env::consts::DLL_EXTENSION));
        std::fs::write(&path, b"definitely not a shared object").unwrap();
        let mut host = PluginHost::new();
        assert_eq!(host.load_from_dir(&dir), 0);
        assert!(host.plugins().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn dirs_in_order_stop_at_first_hit() {
        // With no real plugin fixtures the walk simply exhausts the list.
        let mut host = PluginHost::new();
        let dirs = vec![PathBuf::from("/nonexistent/a"), PathBuf::from("/nonexistent/b")];
        assert_eq!(host.load_from_dirs_in_order(&dirs), 0);
        assert_eq!(host.load_named_from_dirs_in_order(&dirs, &["ttf_extractor"]), 0);
    }
}
