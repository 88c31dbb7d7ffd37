use std::path::{Path, PathBuf};

/// GPU validation diagnostics: on in debug builds unless the `no-validation`
/// feature is enabled. Only startup cost and verbosity change.
pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions) && !cfg!(feature = "no-validation");

pub const DEFAULT_TITLE: &str = "BOREAL APP";
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
pub const VERTEX_SHADER_FILE: &str = "vert.spv";
pub const FRAGMENT_SHADER_FILE: &str = "frag.spv";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_shader_dir("shaders")
    }
}

impl EngineConfig {
    /// Default window settings with both shader blobs looked up in `dir`.
    pub fn with_shader_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            title: DEFAULT_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            vertex_shader: dir.join(VERTEX_SHADER_FILE),
            fragment_shader: dir.join(FRAGMENT_SHADER_FILE),
        }
    }
}
