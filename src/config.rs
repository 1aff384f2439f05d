use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub llm: LlmConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_material_pipeline: bool,
    pub enable_token_backfill: bool,
}

/// 学习引擎可调参数。常量缺省值见 `constants`，此处允许按环境覆盖。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub desired_retention: f32,
    pub known_stability_days: f32,
    pub min_sentences_per_word: usize,
    pub pipeline_cap: usize,
    pub session_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            desired_retention: crate::constants::DESIRED_RETENTION,
            known_stability_days: crate::constants::KNOWN_STABILITY_DAYS,
            min_sentences_per_word: crate::constants::MIN_SENTENCES_PER_WORD,
            pipeline_cap: crate::constants::PIPELINE_CAP,
            session_limit: crate::constants::DEFAULT_SESSION_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub mock: bool,
    pub providers: Vec<LlmProviderConfig>,
    pub timeout_secs: u64,
    pub max_generation_retries: u32,
    pub verify_mappings: bool,
}

#[derive(Clone)]
pub struct LlmProviderConfig {
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("cors_origin", &self.cors_origin)
            .field("worker", &self.worker)
            .field("llm", &self.llm)
            .field("engine", &self.engine)
            .finish()
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider_names: Vec<&str> =
            self.providers.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("LlmConfig")
            .field("enabled", &self.enabled)
            .field("mock", &self.mock)
            .field("providers", &provider_names)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_generation_retries", &self.max_generation_retries)
            .field("verify_mappings", &self.verify_mappings)
            .finish()
    }
}

impl fmt::Debug for LlmProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("model", &self.model)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: normalized_sled_path(&env_or("SLED_PATH", "./data/arabic.sled")),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_material_pipeline: env_or_bool("ENABLE_MATERIAL_PIPELINE", true),
                enable_token_backfill: env_or_bool("ENABLE_TOKEN_BACKFILL", true),
            },
            llm: LlmConfig {
                enabled: env_or_bool("LLM_ENABLED", false),
                mock: env_or_bool("LLM_MOCK", true),
                providers: parse_providers(),
                timeout_secs: env_or_parse("LLM_TIMEOUT_SECS", 120_u64),
                max_generation_retries: env_or_parse("LLM_MAX_GENERATION_RETRIES", 2_u32),
                verify_mappings: env_or_bool("LLM_VERIFY_MAPPINGS", false),
            },
            engine: EngineConfig {
                desired_retention: env_or_parse(
                    "ENGINE_DESIRED_RETENTION",
                    crate::constants::DESIRED_RETENTION,
                ),
                known_stability_days: env_or_parse(
                    "ENGINE_KNOWN_STABILITY_DAYS",
                    crate::constants::KNOWN_STABILITY_DAYS,
                ),
                min_sentences_per_word: env_or_parse(
                    "ENGINE_MIN_SENTENCES_PER_WORD",
                    crate::constants::MIN_SENTENCES_PER_WORD,
                ),
                pipeline_cap: env_or_parse(
                    "ENGINE_PIPELINE_CAP",
                    crate::constants::PIPELINE_CAP,
                ),
                session_limit: env_or_parse(
                    "ENGINE_SESSION_LIMIT",
                    crate::constants::DEFAULT_SESSION_LIMIT,
                ),
            },
        }
    }
}

/// LLM_PROVIDERS 为逗号分隔的有序列表，例如 "gemini,openai,anthropic"。
/// 每个名称从 {NAME}_API_URL / {NAME}_API_KEY / {NAME}_MODEL 读取细节，
/// URL 与 model 有内置缺省值，key 缺失的 provider 会被跳过（mock 模式除外）。
fn parse_providers() -> Vec<LlmProviderConfig> {
    let raw = env_or("LLM_PROVIDERS", "gemini,openai,anthropic");
    let mock = env_or_bool("LLM_MOCK", true);
    let mut providers = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let upper = name.to_ascii_uppercase();
        let (default_url, default_model) = match name {
            "gemini" => (
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                "gemini-2.5-flash",
            ),
            "openai" => ("https://api.openai.com/v1/chat/completions", "gpt-4o-mini"),
            "anthropic" => ("https://api.anthropic.com/v1/messages", "claude-haiku-4-5"),
            _ => ("", ""),
        };
        let api_key = env_or(&format!("{upper}_API_KEY"), "");
        if api_key.is_empty() && !mock {
            tracing::warn!(provider = name, "Skipping LLM provider without API key");
            continue;
        }
        providers.push(LlmProviderConfig {
            name: name.to_string(),
            api_url: env_or(&format!("{upper}_API_URL"), default_url),
            api_key,
            model: env_or(&format!("{upper}_MODEL"), default_model),
        });
    }
    providers
}

fn normalized_sled_path(raw: &str) -> String {
    let path = Path::new(raw);
    if path.is_absolute() {
        return path.to_string_lossy().to_string();
    }

    let project_root = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    project_root.join(path).to_string_lossy().to_string()
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "LLM_ENABLED",
            "LLM_MOCK",
            "LLM_TIMEOUT_SECS",
            "LLM_PROVIDERS",
            "ENGINE_PIPELINE_CAP",
            "ENGINE_SESSION_LIMIT",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.llm.enabled);
        assert_eq!(cfg.engine.pipeline_cap, 300);
        assert_eq!(cfg.engine.session_limit, 10);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("LLM_TIMEOUT_SECS", "42");
        env::set_var("ENGINE_PIPELINE_CAP", "50");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.llm.timeout_secs, 42);
        assert_eq!(cfg.engine.pipeline_cap, 50);
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("ENGINE_SESSION_LIMIT", "x");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.engine.session_limit, 10);
    }

    #[test]
    fn provider_order_is_preserved() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("LLM_MOCK", "true");
        env::set_var("LLM_PROVIDERS", "openai, gemini");

        let cfg = Config::from_env();
        let names: Vec<&str> = cfg.llm.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["openai", "gemini"]);
    }

    #[test]
    fn debug_redacts_api_keys() {
        let provider = LlmProviderConfig {
            name: "gemini".to_string(),
            api_url: "https://example.test".to_string(),
            api_key: "super-secret".to_string(),
            model: "m".to_string(),
        };
        let rendered = format!("{provider:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
