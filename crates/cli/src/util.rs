use anyhow::Result;
use docs_og_core::config::Config;
use typed_path::Utf8NativePathBuf;

pub const DEFAULT_CONFIG: &str = "config.yml";

// For argp::FromArgs
pub fn native_path(value: &str) -> Result<Utf8NativePathBuf, String> {
    Ok(Utf8NativePathBuf::from(value))
}

pub fn load_config(path: Option<&Utf8NativePathBuf>) -> Result<Config> {
    Config::load(path.map_or(DEFAULT_CONFIG, |p| p.as_str()))
}
