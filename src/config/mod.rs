// Configuration management module
// Required secrets come from the environment, tunables from an optional TOML file

pub mod settings;


pub use settings::{
    ApiKey, Config, ConfigError, GeminiConfig, QdrantConfig, RetrievalConfig,
};

pub const CONFIG_DIR_VARIABLE: &str = "DOC_RAG_CONFIG_DIR";

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn config_dir_from<F>(lookup: F) -> Result<std::path::PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(CONFIG_DIR_VARIABLE).filter(|d| !d.trim().is_empty()) {
        return Ok(std::path::PathBuf::from(dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join("doc-rag"))
        .ok_or(ConfigError::DirectoryError)
}
