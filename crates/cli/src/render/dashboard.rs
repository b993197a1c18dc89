//! Grafana dashboard for a deployed application

use portal_lib::AppProfile;
use serde_json::{json, Value};

use super::RenderError;

/// Selector matching every pod of the application
fn pod_selector(profile: &AppProfile) -> String {
    format!(r#"namespace="{}", pod=~"{}.*""#, profile.namespace, profile.name)
}

fn timeseries_panel(title: &str, expr: String) -> Value {
    json!({
        "title": title,
        "type": "timeseries",
        "targets": [{ "expr": expr }],
    })
}

/// Dashboard with request rate and CPU panels
pub fn dashboard(profile: &AppProfile) -> Value {
    let selector = pod_selector(profile);

    json!({
        "dashboard": {
            "title": format!("App: {} - Performance", profile.name),
            "panels": [
                timeseries_panel(
                    "Requests Per Second (RPS)",
                    format!("sum(rate(http_requests_total{{{}}}[2m])) by (pod)", selector),
                ),
                timeseries_panel(
                    "CPU Utilization",
                    format!(
                        "sum(node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate{{{}}})",
                        selector
                    ),
                ),
            ],
        },
    })
}

/// Dashboard as pretty-printed JSON
pub fn dashboard_json(profile: &AppProfile) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(&dashboard(profile))?)
}
