//! Configuration loading and config-driven gateway construction

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use turbogate::prelude::*;
use turbogate::{ConfigError, GatewayError};

fn config_file(extension: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_toml() {
    let file = config_file(
        ".toml",
        r#"
[[plugins]]
name = "budget"
enabled = true
version = "1.2.0"
config = { limit = 100 }

[[plugins]]
name = "trace-logger"
enabled = false

[pool]
prewarm = 4
max_idle = 32

[telemetry]
service_name = "edge"
format = "pretty"
"#,
    );

    let config = GatewayConfig::from_file(file.path()).unwrap();

    assert_eq!(config.plugins.len(), 2);
    assert_eq!(config.plugins[0].name, "budget");
    assert_eq!(config.plugins[0].version.as_deref(), Some("1.2.0"));
    assert_eq!(config.plugins[0].config.as_ref().unwrap()["limit"], 100);
    assert!(!config.plugins[1].enabled);
    assert_eq!(
        config.pool,
        PoolConfig {
            prewarm: 4,
            max_idle: 32
        }
    );
    assert!(config.observability.enabled);
    assert_eq!(config.telemetry.service_name, "edge");
    assert_eq!(config.telemetry.format, turbogate_telemetry::LogFormat::Pretty);
}

#[test]
fn loads_json_and_yaml() {
    let json = config_file(
        ".json",
        r#"{"plugins": [{"name": "budget", "enabled": true}], "observability": {"enabled": false}}"#,
    );
    let config = GatewayConfig::from_file(json.path()).unwrap();
    assert_eq!(config.plugins[0].name, "budget");
    assert!(!config.observability.enabled);

    let yaml = config_file(
        ".yaml",
        "pool:\n  prewarm: 2\n  max_idle: 8\nplugins:\n  - name: budget\n    enabled: true\n",
    );
    let config = GatewayConfig::from_file(yaml.path()).unwrap();
    assert_eq!(config.pool.max_idle, 8);
    assert_eq!(config.plugins.len(), 1);
}

#[test]
fn rejects_unknown_extension() {
    let file = config_file(".ini", "[pool]\nprewarm = 1\n");
    let err = GatewayConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat));
}

#[test]
fn environment_overrides_file() {
    let file = config_file(".toml", "[pool]\nprewarm = 1\nmax_idle = 16\n");

    // Unique prefix so parallel tests never see this variable
    // SAFETY: no other test reads TGCFGTEST_* variables
    unsafe {
        std::env::set_var("TGCFGTEST_POOL__MAX_IDLE", "512");
    }
    let config = GatewayConfig::from_file_with_prefix(file.path(), "TGCFGTEST").unwrap();
    unsafe {
        std::env::remove_var("TGCFGTEST_POOL__MAX_IDLE");
    }

    assert_eq!(config.pool.prewarm, 1);
    assert_eq!(config.pool.max_idle, 512);
}

#[derive(Debug)]
struct Echo;

#[async_trait]
impl Provider for Echo {
    async fn invoke(
        &self,
        _ctx: &RequestContext,
        request: DomainRequest,
    ) -> Result<DomainResponse, DomainError> {
        Ok(DomainResponse::for_request(&request, serde_json::Value::Null))
    }
}

#[derive(Debug)]
struct Budget {
    limit: u64,
}

#[async_trait]
impl Plugin for Budget {
    fn name(&self) -> &str {
        "budget"
    }

    async fn pre_hook(
        &self,
        _ctx: &RequestContext,
        _request: &DomainRequest,
    ) -> PluginResult<PreHookOutcome> {
        if self.limit == 0 {
            return Ok(PreHookOutcome::reject(
                DomainError::new("budget exhausted")
                    .with_status(429)
                    .with_fallbacks(false),
            ));
        }
        Ok(PreHookOutcome::proceed())
    }
}

#[derive(Debug)]
struct NeedsDatabase;

#[async_trait]
impl Plugin for NeedsDatabase {
    fn name(&self) -> &str {
        "semantic-cache"
    }

    async fn initialize(&self, _config: Option<&serde_json::Value>) -> PluginResult<()> {
        Err(PluginError::initialization("vector store unreachable"))
    }
}

fn factory() -> PluginFactory {
    PluginFactory::with_builtins()
        .with("budget", |config| {
            let limit = config
                .config
                .as_ref()
                .and_then(|blob| blob.get("limit"))
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| anyhow::anyhow!("budget needs a numeric 'limit'"))?;
            let plugin: Arc<dyn Plugin> = Arc::new(Budget { limit });
            Ok(plugin)
        })
        .with("semantic-cache", |_| {
            let plugin: Arc<dyn Plugin> = Arc::new(NeedsDatabase);
            Ok(plugin)
        })
}

#[tokio::test]
async fn from_config_builds_plugins_in_order() {
    let config = GatewayConfig::builder()
        .plugin(PluginConfig::enabled("budget").with_config(serde_json::json!({"limit": 0})))
        .plugin(PluginConfig::enabled("trace-logger"))
        .build();

    let gateway = Gateway::from_config(&config, &factory(), Arc::new(Echo))
        .await
        .unwrap();

    assert_eq!(gateway.registry().names(), vec!["budget", "trace-logger"]);
    let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o");
    let error = gateway.invoke(request).await.unwrap_err();
    assert_eq!(error.http_status(), 429);
    assert!(!error.allows_fallback());
}

#[tokio::test]
async fn plugin_failing_to_initialize_is_skipped() {
    let config = GatewayConfig::builder()
        .plugin(PluginConfig::enabled("semantic-cache"))
        .plugin(PluginConfig::enabled("trace-logger"))
        .plugin(PluginConfig::enabled("budget").with_config(serde_json::json!({"limit": 5})))
        .build();

    let gateway = Gateway::from_config(&config, &factory(), Arc::new(Echo))
        .await
        .unwrap();

    assert_eq!(gateway.registry().names(), vec!["trace-logger", "budget"]);
    let failed = gateway.registry().status("semantic-cache").unwrap();
    assert_eq!(failed.status, PluginState::Error);
    assert!(
        failed
            .logs
            .iter()
            .any(|line| line.contains("vector store unreachable"))
    );

    let request = DomainRequest::new(RequestKind::ChatCompletion, "openai", "gpt-4o");
    assert!(gateway.invoke(request).await.is_ok());
}

#[tokio::test]
async fn unknown_or_broken_plugins_are_skipped_with_error_status() {
    let config = GatewayConfig::builder()
        .plugin(PluginConfig::enabled("vector-search"))
        .plugin(PluginConfig::enabled("budget"))
        .plugin(PluginConfig::enabled("trace-logger"))
        .build();

    let gateway = Gateway::from_config(&config, &factory(), Arc::new(Echo))
        .await
        .unwrap();

    assert_eq!(gateway.registry().names(), vec!["trace-logger"]);
    let missing = gateway.registry().status("vector-search").unwrap();
    assert_eq!(missing.status, PluginState::Error);
    let broken = gateway.registry().status("budget").unwrap();
    assert_eq!(broken.status, PluginState::Error);
    assert!(broken.logs.iter().any(|line| line.contains("limit")));
}

#[tokio::test]
async fn duplicate_plugin_names_fail_construction() {
    let config = GatewayConfig::builder()
        .plugin(PluginConfig::enabled("trace-logger"))
        .plugin(PluginConfig::enabled("trace-logger"))
        .build();

    let result = Gateway::from_config(&config, &factory(), Arc::new(Echo)).await;

    assert!(matches!(result, Err(GatewayError::Plugin(_))));
}
