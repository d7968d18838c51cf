use confy::ConfyError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "promptdex";

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptdexConfig {
    /// Root directory of the prompt library. `None` until configured.
    pub prompts_path: Option<String>,
    /// Copy rendered output to the clipboard by default.
    pub copy_on_render: bool,
}

impl Default for PromptdexConfig {
    fn default() -> Self {
        let prompts_path = std::env::home_dir()
            .map(|p| p.join("promptdex").join("prompts").display().to_string());
        Self {
            prompts_path,
            copy_on_render: false,
        }
    }
}

pub fn load_config() -> PromptdexConfig {
    let config: Result<PromptdexConfig, ConfyError> = confy::load(APP_NAME, None);
    match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: problem loading config ({e}). Exiting...");
            std::process::exit(exitcode::CONFIG);
        }
    }
}

/// The prompts root to use: the `--prompts-path` flag wins over the
/// configured path.
pub fn resolve_root(flag: Option<String>, config: &PromptdexConfig) -> PathBuf {
    let path = flag.or_else(|| config.prompts_path.clone());
    match path {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => {
            eprintln!(
                "Error: no prompts directory configured. Pass --prompts-path or set prompts_path in the config file."
            );
            std::process::exit(exitcode::CONFIG);
        }
    }
}
