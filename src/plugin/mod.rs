//! The plugin system: stage traits, metadata, the stable C ABI, and the
//! host that discovers and retains plugins.
//!
//! Built-in stages implement the [`Extract`] / [`Transform`] / [`Export`]
//! traits directly; externally built shared objects speak the flat C
//! contract in [`abi`] and are wrapped into the same traits by
//! [`external`], so past the host boundary the two are indistinguishable.

pub mod abi;
pub mod external;
pub mod host;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::font::Font;
use crate::options::OptionBag;

pub use host::PluginHost;

/// ABI version shared by the host and every plugin; the sole
/// compatibility gate.
pub const ABI_VERSION: u32 = 1;

/// The three stage kinds a plugin can contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Extractor,
    Transformer,
    Exporter,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Extractor => "extractor",
            PluginKind::Transformer => "transformer",
            PluginKind::Exporter => "exporter",
        };
        f.write_str(name)
    }
}

/// Static metadata describing a plugin.
#[derive(Debug, Clone)]
pub struct PluginMeta {
    /// Short identifier used for lookup, e.g. `raw_bin`.
    pub name: String,
    pub description: String,
    pub author: String,
    /// Exporter profile tag, e.g. `bin`.
    pub format: String,
    /// Exporter standard tag, e.g. `raw-1bpp`.
    pub standard: String,
    pub abi_version: u32,
    pub kind: PluginKind,
}

/// A stage failure: a stable integer code plus human-readable text.
///
/// Built-in stages construct these directly; for external plugins the code
/// is the function's return value and the text comes from the error
/// buffer.
#[derive(Debug, Clone)]
pub struct StageError {
    pub code: i32,
    pub message: String,
}

impl StageError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for StageError {}

/// An extractor stage: builds a fresh font value from an input file.
pub trait Extract {
    fn extract(&self, input: &Path, options: &OptionBag) -> Result<Font, StageError>;
}

/// A transformer stage: mutates the font value in place.
pub trait Transform {
    fn transform(&self, font: &mut Font, options: &OptionBag) -> Result<(), StageError>;
}

/// An exporter stage: consumes the font value and writes a file.
pub trait Export {
    fn export(&self, font: &Font, output: &Path, options: &OptionBag) -> Result<(), StageError>;
}

/// The kind-appropriate entry point of a loaded plugin.
pub enum Stage {
    Extract(Box<dyn Extract>),
    Transform(Box<dyn Transform>),
    Export(Box<dyn Export>),
}

impl Stage {
    pub fn kind(&self) -> PluginKind {
        match self {
            Stage::Extract(_) => PluginKind::Extractor,
            Stage::Transform(_) => PluginKind::Transformer,
            Stage::Export(_) => PluginKind::Exporter,
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage::{:?}", self.kind())
    }
}

/// Where a plugin record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginOrigin {
    /// Compiled into the host binary.
    Builtin,
    /// Loaded from a shared object at this path.
    Dynamic(PathBuf),
}

/// A retained plugin: metadata plus its stage implementation.
#[derive(Debug)]
pub struct PluginRecord {
    pub meta: PluginMeta,
    pub stage: Stage,
    pub origin: PluginOrigin,
}

impl PluginRecord {
    /// Convenience constructor for built-in stages.
    pub fn builtin(meta: PluginMeta, stage: Stage) -> Self {
        Self {
            meta,
            stage,
            origin: PluginOrigin::Builtin,
        }
    }
}
