//! Argument vector construction for the local engine binary.

use crate::config::{ExecutionConfig, StorageMode};
use serde_json::json;

/// Builds the engine argument vector for `query` in a fixed order:
/// verb, query text, then flag/value pairs.
///
/// Output is always requested as JSON; every other rendering is derived
/// client-side.
pub fn build_args(query: &str, config: &ExecutionConfig) -> Vec<String> {
    let mut args: Vec<String> = vec!["exec".into(), query.into(), "--output".into(), "json".into()];

    if config.backend_storage_mode == StorageMode::File {
        let dsn = json!({
            "dsn": format!("file:{}", config.backend_file_storage_location.display())
        });
        push_flag(&mut args, "sqlBackend", dsn.to_string());
    }

    if let Some(app_root) = &config.app_root {
        push_flag(&mut args, "approot", app_root.display().to_string());
    }

    push_flag(
        &mut args,
        "execution.concurrency.limit",
        config.execution_concurrency_limit,
    );
    push_flag(
        &mut args,
        "dataflow.dependency.max",
        config.dataflow_dependency_max,
    );
    push_flag(
        &mut args,
        "dataflow.components.max",
        config.dataflow_components_max,
    );

    if !config.auth.is_empty() {
        let auth: serde_json::Map<String, serde_json::Value> = config
            .auth
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        push_flag(&mut args, "auth", serde_json::Value::Object(auth));
    }

    if let Some(registry) = &config.custom_registry {
        push_flag(&mut args, "registry", json!({ "url": registry }).to_string());
    }

    push_flag(&mut args, "http.response.maxResults", config.max_results);
    push_flag(&mut args, "http.response.pageLimit", config.page_limit);
    push_flag(&mut args, "indirect.depth.max", config.max_depth);
    push_flag(&mut args, "apirequesttimeout", config.api_timeout);

    if config.http_debug {
        args.push("--http.log.enabled".into());
    }

    if let Some(proxy) = &config.proxy {
        push_flag(&mut args, "http.proxy.host", &proxy.host);
        push_flag(&mut args, "http.proxy.port", proxy.port);
        if let Some(user) = &proxy.user {
            push_flag(&mut args, "http.proxy.user", user);
        }
        if let Some(password) = &proxy.password {
            push_flag(&mut args, "http.proxy.password", password);
        }
        push_flag(&mut args, "http.proxy.scheme", proxy.scheme.as_str());
    }

    args
}

fn push_flag(args: &mut Vec<String>, name: &str, value: impl ToString) {
    args.push(format!("--{name}"));
    args.push(value.to_string());
}
