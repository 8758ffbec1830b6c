use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::fields::WeekdayLocale;

pub const DEFAULT_CONFIG_FILE: &str = "hr-docfill.toml";
pub const CONFIG_ENV: &str = "HR_DOCFILL_CONFIG";

/// Optional TOML config. Every value can also come from the environment, which wins.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub sharepoint: SharePointSection,
    #[serde(default)]
    pub azure_openai: AzureOpenAiSection,
    #[serde(default)]
    pub service: ServiceSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct SharePointSection {
    #[serde(default)]
    pub site_hostname: Option<String>,
    #[serde(default)]
    pub site_path: Option<String>,
    /// Library folder below the site, e.g. `Shared Documents/Hr Documents`.
    #[serde(default)]
    pub library_path: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AzureOpenAiSection {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub deployment: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceSection {
    #[serde(default)]
    pub output_folder: Option<PathBuf>,
    #[serde(default)]
    pub schedule_locale: Option<WeekdayLocale>,
    #[serde(default)]
    pub bind_addr: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SharePointSettings {
    pub site_hostname: String,
    pub site_path: String,
    pub library_path: String,
    pub client_id: String,
    pub client_secret: String,
}

impl SharePointSettings {
    pub fn site_url(&self) -> String {
        format!("https://{}{}", self.site_hostname, self.site_path)
    }

    /// Server-relative folder holding the templates.
    pub fn folder_path(&self) -> String {
        format!(
            "{}/{}",
            self.site_path.trim_end_matches('/'),
            self.library_path.trim_matches('/')
        )
    }
}

#[derive(Clone, Debug)]
pub struct AzureOpenAiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub sharepoint: SharePointSettings,
    pub azure_openai: AzureOpenAiSettings,
    pub output_folder: PathBuf,
    pub schedule_locale: WeekdayLocale,
    pub bind_addr: String,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
        return Some(p);
    }
    let cwd = std::env::current_dir().ok()?;
    find_file_upwards(&cwd, DEFAULT_CONFIG_FILE, 8)
}

pub fn load_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse config toml: {}", path.display()))
}

impl Settings {
    /// Reads the config file (explicit path, `HR_DOCFILL_CONFIG`, or `hr-docfill.toml`
    /// upwards from the working directory) and applies environment overrides.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let file_cfg = match config_path.map(Path::to_path_buf).or_else(find_default_config) {
            Some(p) if p.exists() => load_config(&p)?,
            Some(p) if config_path.is_some() => {
                return Err(anyhow!("config file not found: {}", p.display()));
            }
            _ => FileConfig::default(),
        };
        Self::resolve(file_cfg, |key| std::env::var(key).ok())
    }

    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let pick = |key: &str, from_file: Option<String>| -> Option<String> {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or(from_file)
                .map(|v| v.trim().to_string())
        };
        let required = |key: &str, from_file: Option<String>| -> anyhow::Result<String> {
            pick(key, from_file).ok_or_else(|| anyhow!("missing required setting {key}"))
        };

        let sp = file.sharepoint;
        let sharepoint = SharePointSettings {
            site_hostname: pick("SHAREPOINT_SITE_HOSTNAME", sp.site_hostname)
                .unwrap_or_else(|| "nihilent.sharepoint.com".to_string()),
            site_path: pick("SHAREPOINT_SITE_PATH", sp.site_path)
                .unwrap_or_else(|| "/sites/Demo_Connect".to_string()),
            library_path: pick("DOCUMENT_LIBRARY_PATH", sp.library_path)
                .unwrap_or_else(|| "Shared Documents/Hr Documents".to_string()),
            client_id: required("CLIENT_ID", sp.client_id)?,
            client_secret: required("CLIENT_SECRET", sp.client_secret)?,
        };

        let ai = file.azure_openai;
        let azure_openai = AzureOpenAiSettings {
            endpoint: required("AZURE_OPENAI_ENDPOINT", ai.endpoint)?,
            api_key: required("AZURE_OPENAI_API_KEY", ai.api_key)?,
            deployment: required("AZURE_OPENAI_DEPLOYMENT_NAME", ai.deployment)?,
            api_version: required("AZURE_OPENAI_API_VERSION", ai.api_version)?,
        };

        let svc = file.service;
        let output_folder = pick(
            "LOCAL_OUTPUT_FOLDER",
            svc.output_folder.map(|p| p.to_string_lossy().into_owned()),
        )
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("outputs"));
        let schedule_locale = match env("SCHEDULE_LOCALE").filter(|v| !v.trim().is_empty()) {
            Some(v) => v.parse().context("SCHEDULE_LOCALE")?,
            None => svc.schedule_locale.unwrap_or_default(),
        };
        let bind_addr =
            pick("BIND_ADDR", svc.bind_addr).unwrap_or_else(|| "0.0.0.0:8000".to_string());

        Ok(Self {
            sharepoint,
            azure_openai,
            output_folder,
            schedule_locale,
            bind_addr,
        })
    }
}
