use std::path::Path;

use crate::error::ConfigError;
use crate::models::ai::AIConfig;
use crate::models::scan::FetchMode;
use crate::models::settings::{AppSettings, DataSource};

/// AI 数据源的 API key 环境变量（配置文件留空时使用）
pub const AI_API_KEY_ENV: &str = "GARP_AI_API_KEY";

/// 命令行覆盖项，未指定的保持配置文件中的值
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub max_peg: Option<f64>,
    pub max_pe: Option<f64>,
    pub min_growth: Option<f64>,
    pub min_roe: Option<f64>,
    pub wave_size: Option<usize>,
    pub sequential: bool,
    pub pacing_ms: Option<u64>,
    pub source: Option<DataSource>,
    pub refresh_interval_secs: Option<u64>,
}

/// 读取配置文件；不传路径时使用默认配置。配置只读，从不回写。
pub fn load_settings(path: Option<&Path>) -> Result<AppSettings, ConfigError> {
    let Some(path) = path else {
        return Ok(AppSettings::default());
    };

    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let settings = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: display.clone(),
        source,
    })?;
    log::debug!("已加载配置: {}", display);
    Ok(settings)
}

pub fn apply_overrides(settings: &mut AppSettings, overrides: &SettingsOverrides) -> Result<(), ConfigError> {
    let thresholds = [
        ("max-peg", overrides.max_peg),
        ("max-pe", overrides.max_pe),
        ("min-growth", overrides.min_growth),
        ("min-roe", overrides.min_roe),
    ];
    for (flag, value) in thresholds {
        if value.map_or(false, |v| !v.is_finite()) {
            return Err(ConfigError::Invalid(format!("--{} must be a finite number", flag)));
        }
    }
    if overrides.wave_size == Some(0) {
        return Err(ConfigError::Invalid("--wave-size must be at least 1".to_string()));
    }

    let filters = &mut settings.filters;
    if let Some(v) = overrides.max_peg { filters.max_peg = v; }
    if let Some(v) = overrides.max_pe { filters.max_pe = v; }
    if let Some(v) = overrides.min_growth { filters.min_growth_rate = v; }
    if let Some(v) = overrides.min_roe { filters.min_roe = v; }

    if let Some(v) = overrides.wave_size { settings.scan.wave_size = v; }
    if let Some(v) = overrides.pacing_ms { settings.scan.pacing_ms = v; }
    if overrides.sequential {
        settings.scan.fetch_mode = FetchMode::Sequential;
    }

    if let Some(source) = overrides.source {
        settings.data_source = source;
    }
    if let Some(v) = overrides.refresh_interval_secs {
        settings.refresh_interval_secs = v.max(1);
    }
    Ok(())
}

/// 配置文件没给 key 时从环境变量补齐；选了 AI 数据源但没有任何配置时使用默认配置
pub fn resolve_ai_config(settings: &mut AppSettings, env_key: Option<String>) {
    let env_key = env_key.filter(|k| !k.trim().is_empty());

    if settings.ai.is_none() && (settings.data_source == DataSource::AiResearch || env_key.is_some()) {
        settings.ai = Some(AIConfig::default());
    }
    if let (Some(ai), Some(key)) = (settings.ai.as_mut(), env_key) {
        if ai.api_key.trim().is_empty() {
            ai.api_key = key.trim().to_string();
        }
    }
}

/// 加载 + 覆盖 + 补齐，命令行入口统一使用
pub fn effective_settings(path: Option<&Path>, overrides: &SettingsOverrides) -> Result<AppSettings, ConfigError> {
    let mut settings = load_settings(path)?;
    apply_overrides(&mut settings, overrides)?;
    resolve_ai_config(&mut settings, std::env::var(AI_API_KEY_ENV).ok());
    Ok(settings)
}

/// 打印用：API key 打码
pub fn redacted_json(settings: &AppSettings) -> Result<String, serde_json::Error> {
    let mut shown = settings.clone();
    if let Some(ai) = shown.ai.as_mut() {
        if !ai.api_key.is_empty() {
            ai.api_key = "***".to_string();
        }
    }
    serde_json::to_string_pretty(&shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut settings = AppSettings::default();
        let overrides = SettingsOverrides {
            max_peg: Some(1.5),
            min_roe: Some(0.2),
            wave_size: Some(3),
            sequential: true,
            ..Default::default()
        };
        apply_overrides(&mut settings, &overrides).unwrap();
        assert_eq!(settings.filters.max_peg, 1.5);
        assert_eq!(settings.filters.max_pe, 40.0);
        assert_eq!(settings.filters.min_roe, 0.2);
        assert_eq!(settings.scan.wave_size, 3);
        assert_eq!(settings.scan.fetch_mode, FetchMode::Sequential);
        assert_eq!(settings.scan.pacing_ms, 500);
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let mut settings = AppSettings::default();
        let zero_wave = SettingsOverrides { wave_size: Some(0), ..Default::default() };
        assert!(matches!(apply_overrides(&mut settings, &zero_wave), Err(ConfigError::Invalid(_))));
        let nan = SettingsOverrides { max_pe: Some(f64::NAN), ..Default::default() };
        assert!(matches!(apply_overrides(&mut settings, &nan), Err(ConfigError::Invalid(_))));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_missing_path_gives_defaults_and_bad_file_errors() {
        assert_eq!(load_settings(None).unwrap(), AppSettings::default());

        let missing = std::env::temp_dir().join(format!("garp-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(load_settings(Some(&missing)), Err(ConfigError::Read { .. })));

        let broken = std::env::temp_dir().join(format!("garp-broken-{}.json", uuid::Uuid::new_v4()));
        std::fs::File::create(&broken).unwrap().write_all(b"{ not json").unwrap();
        assert!(matches!(load_settings(Some(&broken)), Err(ConfigError::Parse { .. })));
        let _ = std::fs::remove_file(&broken);
    }

    #[test]
    fn test_file_values_are_loaded() {
        let path = std::env::temp_dir().join(format!("garp-settings-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"filters": {"max_peg": 1.2}, "scan": {"fetch_mode": "sequential"}}"#).unwrap();
        let settings = load_settings(Some(&path)).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(settings.filters.max_peg, 1.2);
        assert_eq!(settings.filters.min_growth_rate, 0.10);
        assert_eq!(settings.scan.fetch_mode, FetchMode::Sequential);
    }

    #[test]
    fn test_env_key_fills_empty_ai_key() {
        let mut settings = AppSettings { data_source: DataSource::AiResearch, ..Default::default() };
        resolve_ai_config(&mut settings, Some("sk-env".to_string()));
        assert_eq!(settings.ai.as_ref().unwrap().api_key, "sk-env");

        let mut explicit = AppSettings {
            ai: Some(AIConfig { api_key: "sk-file".to_string(), ..Default::default() }),
            ..Default::default()
        };
        resolve_ai_config(&mut explicit, Some("sk-env".to_string()));
        assert_eq!(explicit.ai.unwrap().api_key, "sk-file");

        let mut untouched = AppSettings::default();
        resolve_ai_config(&mut untouched, None);
        assert!(untouched.ai.is_none());
    }

    #[test]
    fn test_redacted_json_hides_key() {
        let settings = AppSettings {
            ai: Some(AIConfig { api_key: "sk-secret".to_string(), ..Default::default() }),
            ..Default::default()
        };
        let json = redacted_json(&settings).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("***"));
    }
}
