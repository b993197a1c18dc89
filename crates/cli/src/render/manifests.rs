//! Kubernetes manifests built from a deployment plan

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    MetricIdentifier, MetricSpec, MetricTarget, PodsMetricSource, ResourceMetricSource,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    Service, ServicePort, ServiceSpec, TCPSocketAction,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use portal_lib::runtime::HealthProbe;
use portal_lib::{DeploymentPlan, ScalingMetric};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::RenderError;

/// Named container and service port
const PORT_NAME: &str = "http";

/// Label Prometheus Operator selects ServiceMonitors by
const PROMETHEUS_RELEASE: &str = "prometheus";

const SCRAPE_INTERVAL: &str = "15s";

const PROXY_READ_TIMEOUT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/proxy-read-timeout";

/// Kubernetes counts in i32; larger values saturate
fn to_i32<T: TryInto<i32>>(value: T) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

fn metadata(plan: &DeploymentPlan) -> ObjectMeta {
    ObjectMeta {
        name: Some(plan.profile.name.clone()),
        namespace: Some(plan.profile.namespace.clone()),
        labels: Some(plan.labels.clone()),
        ..Default::default()
    }
}

fn app_selector(plan: &DeploymentPlan) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), plan.profile.name.clone())])
}

fn tcp_probe(port: u16) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(i32::from(port)),
            host: None,
        }),
        ..Default::default()
    }
}

fn health_probe(port: u16, settings: HealthProbe) -> Probe {
    Probe {
        initial_delay_seconds: Some(to_i32(settings.initial_delay_seconds)),
        period_seconds: Some(to_i32(settings.period_seconds)),
        ..tcp_probe(port)
    }
}

fn quantities(cpu: String, memory: String) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu)),
        ("memory".to_string(), Quantity(memory)),
    ])
}

pub fn deployment(plan: &DeploymentPlan) -> Deployment {
    let port = plan.network.container_port;
    let resources = &plan.resources;
    let env: Vec<EnvVar> = plan
        .container_env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    let container = Container {
        name: plan.profile.name.clone(),
        image: Some(plan.profile.image_repo.clone()),
        ports: Some(vec![ContainerPort {
            name: Some(PORT_NAME.to_string()),
            container_port: i32::from(port),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(quantities(
                resources.cpu_request_quantity(),
                resources.memory_request_quantity(),
            )),
            limits: Some(quantities(
                resources.cpu_limit_quantity(),
                resources.memory_limit_quantity(),
            )),
            ..Default::default()
        }),
        env: (!env.is_empty()).then_some(env),
        startup_probe: Some(Probe {
            failure_threshold: Some(to_i32(plan.probes.startup.failure_threshold)),
            period_seconds: Some(to_i32(plan.probes.startup.period_seconds)),
            ..tcp_probe(port)
        }),
        readiness_probe: Some(health_probe(port, plan.probes.readiness)),
        liveness_probe: Some(health_probe(port, plan.probes.liveness)),
        ..Default::default()
    };

    let annotations = &plan.monitoring_annotations;
    Deployment {
        metadata: metadata(plan),
        spec: Some(DeploymentSpec {
            replicas: Some(to_i32(plan.deployment.replicas)),
            selector: LabelSelector {
                match_labels: Some(app_selector(plan)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(plan.labels.clone()),
                    annotations: (!annotations.is_empty()).then(|| annotations.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(i64::from(
                        plan.deployment.termination_grace_period_secs,
                    )),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service(plan: &DeploymentPlan) -> Service {
    Service {
        metadata: metadata(plan),
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            external_traffic_policy: Some(plan.network.external_traffic_policy.as_str().to_string()),
            selector: Some(app_selector(plan)),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port: i32::from(plan.network.service_port),
                target_port: Some(IntOrString::Int(i32::from(plan.network.container_port))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn ingress(plan: &DeploymentPlan) -> Ingress {
    let mut meta = metadata(plan);
    meta.annotations = Some(BTreeMap::from([(
        PROXY_READ_TIMEOUT_ANNOTATION.to_string(),
        plan.network.timeout_secs.to_string(),
    )]));

    Ingress {
        metadata: meta,
        spec: Some(IngressSpec {
            rules: Some(vec![IngressRule {
                host: Some(plan.network.ingress_host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: plan.profile.name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(i32::from(plan.network.service_port)),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn metric_spec(metric: &ScalingMetric) -> MetricSpec {
    match metric {
        ScalingMetric::CpuUtilization { average_utilization } => MetricSpec {
            type_: "Resource".to_string(),
            resource: Some(ResourceMetricSource {
                name: "cpu".to_string(),
                target: MetricTarget {
                    type_: "Utilization".to_string(),
                    average_utilization: Some(to_i32(*average_utilization)),
                    ..Default::default()
                },
            }),
            ..Default::default()
        },
        ScalingMetric::PodsAverageValue {
            metric_name,
            average_value,
        } => MetricSpec {
            type_: "Pods".to_string(),
            pods: Some(PodsMetricSource {
                metric: MetricIdentifier {
                    name: metric_name.clone(),
                    selector: None,
                },
                target: MetricTarget {
                    type_: "AverageValue".to_string(),
                    average_value: Some(Quantity(average_value.to_string())),
                    ..Default::default()
                },
            }),
            ..Default::default()
        },
    }
}

pub fn horizontal_pod_autoscaler(plan: &DeploymentPlan) -> HorizontalPodAutoscaler {
    HorizontalPodAutoscaler {
        metadata: metadata(plan),
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: plan.profile.name.clone(),
            },
            min_replicas: Some(to_i32(plan.autoscaling.min_replicas)),
            max_replicas: to_i32(plan.autoscaling.max_replicas),
            metrics: Some(plan.autoscaling.metrics.iter().map(metric_spec).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Prometheus Operator ServiceMonitor, or `None` when monitoring is disabled
pub fn service_monitor(plan: &DeploymentPlan) -> Option<Value> {
    if !plan.profile.monitoring_enabled {
        return None;
    }

    Some(json!({
        "apiVersion": "monitoring.coreos.com/v1",
        "kind": "ServiceMonitor",
        "metadata": {
            "name": plan.profile.name,
            "namespace": plan.profile.namespace,
            "labels": { "release": PROMETHEUS_RELEASE },
        },
        "spec": {
            "selector": { "matchLabels": app_selector(plan) },
            "endpoints": [{
                "port": PORT_NAME,
                "path": plan.network.metrics_path,
                "interval": SCRAPE_INTERVAL,
            }],
        },
    }))
}

fn to_yaml<T: Serialize>(object: &T) -> Result<String, RenderError> {
    Ok(serde_yaml::to_string(object)?)
}

/// All manifests for the plan as one multi-document YAML stream
pub fn combined_manifest(plan: &DeploymentPlan) -> Result<String, RenderError> {
    let mut documents = vec![
        to_yaml(&deployment(plan))?,
        to_yaml(&service(plan))?,
        to_yaml(&ingress(plan))?,
        to_yaml(&horizontal_pod_autoscaler(plan))?,
    ];
    if let Some(monitor) = service_monitor(plan) {
        documents.push(to_yaml(&monitor)?);
    }

    Ok(documents.join("\n---\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_lib::{AppLanguage, AppProfile, CapacitySnapshot, ClusterCapacity, PolicyConfig, Tier};
    use serde::Deserialize;

    fn plan(profile: AppProfile) -> DeploymentPlan {
        let snapshot = CapacitySnapshot::live(ClusterCapacity::FALLBACK);
        DeploymentPlan::build(profile, snapshot, &PolicyConfig::default()).unwrap()
    }

    fn documents(yaml: &str) -> Vec<serde_yaml::Value> {
        serde_yaml::Deserializer::from_str(yaml)
            .map(|doc| serde_yaml::Value::deserialize(doc).unwrap())
            .collect()
    }

    fn kinds(yaml: &str) -> Vec<String> {
        documents(yaml)
            .iter()
            .map(|doc| doc["kind"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_combined_manifest_kinds() {
        let yaml = combined_manifest(&plan(AppProfile::new("checkout", 500))).unwrap();
        assert_eq!(
            kinds(&yaml),
            ["Deployment", "Service", "Ingress", "HorizontalPodAutoscaler", "ServiceMonitor"]
        );
        assert!(yaml.contains("\n---\n"));
    }

    #[test]
    fn test_no_monitoring_skips_service_monitor() {
        let mut profile = AppProfile::new("checkout", 500);
        profile.monitoring_enabled = false;
        let plan = plan(profile);

        let yaml = combined_manifest(&plan).unwrap();
        assert_eq!(kinds(&yaml), ["Deployment", "Service", "Ingress", "HorizontalPodAutoscaler"]);

        let template = deployment(&plan).spec.unwrap().template;
        assert!(template.metadata.unwrap().annotations.is_none());
    }

    #[test]
    fn test_deployment_resources_and_replicas() {
        let deployment = deployment(&plan(AppProfile::new("checkout", 500)));
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(3));

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.termination_grace_period_seconds, Some(60));

        let container = &pod.containers[0];
        let resources = container.resources.as_ref().unwrap();
        let requests = resources.requests.as_ref().unwrap();
        let limits = resources.limits.as_ref().unwrap();
        assert_eq!(requests["cpu"], Quantity("800m".to_string()));
        assert_eq!(limits["cpu"], Quantity("1600m".to_string()));
        assert_eq!(requests["memory"], Quantity("2400Mi".to_string()));
        assert_eq!(limits["memory"], Quantity("2400Mi".to_string()));

        let env = container.env.as_ref().unwrap();
        assert_eq!(env[0].name, "JAVA_OPTS");
        assert_eq!(
            container.startup_probe.as_ref().unwrap().failure_threshold,
            Some(30)
        );
    }

    #[test]
    fn test_go_container_has_no_env() {
        let profile = AppProfile::new("ledger", 100).with_language(AppLanguage::Go);
        let deployment = deployment(&plan(profile));
        let container = &deployment.spec.unwrap().template.spec.unwrap().containers[0];
        assert!(container.env.is_none());
        assert_eq!(
            container.readiness_probe.as_ref().unwrap().initial_delay_seconds,
            Some(2)
        );
    }

    #[test]
    fn test_service_traffic_policy_by_tier() {
        let prod = service(&plan(AppProfile::new("checkout", 500)));
        let spec = prod.spec.unwrap();
        assert_eq!(spec.external_traffic_policy.as_deref(), Some("Local"));
        assert_eq!(spec.ports.unwrap()[0].port, 80);

        let dev = service(&plan(AppProfile::new("checkout", 500).with_tier(Tier::Development)));
        assert_eq!(dev.spec.unwrap().external_traffic_policy.as_deref(), Some("Cluster"));
    }

    #[test]
    fn test_ingress_timeout_annotation() {
        let dev = ingress(&plan(AppProfile::new("checkout", 500).with_tier(Tier::Development)));
        let annotations = dev.metadata.annotations.unwrap();
        assert_eq!(annotations[PROXY_READ_TIMEOUT_ANNOTATION], "30");

        let rule = &dev.spec.unwrap().rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("api.example.com"));
    }

    #[test]
    fn test_hpa_metrics() {
        let yaml = combined_manifest(&plan(AppProfile::new("checkout", 1000))).unwrap();
        let docs = documents(&yaml);
        let hpa = &docs[3];

        assert_eq!(hpa["apiVersion"].as_str(), Some("autoscaling/v2"));
        assert_eq!(hpa["spec"]["minReplicas"].as_i64(), Some(5));
        assert_eq!(hpa["spec"]["maxReplicas"].as_i64(), Some(10));
        assert_eq!(
            hpa["spec"]["metrics"][0]["resource"]["target"]["averageUtilization"].as_i64(),
            Some(70)
        );
        assert_eq!(
            hpa["spec"]["metrics"][1]["pods"]["metric"]["name"].as_str(),
            Some("http_requests_per_second")
        );
        assert_eq!(
            hpa["spec"]["metrics"][1]["pods"]["target"]["averageValue"].as_str(),
            Some("1000")
        );
    }

    #[test]
    fn test_service_monitor_endpoint() {
        let monitor = service_monitor(&plan(AppProfile::new("checkout", 500))).unwrap();
        assert_eq!(monitor["metadata"]["labels"]["release"], "prometheus");
        assert_eq!(monitor["spec"]["selector"]["matchLabels"]["app"], "checkout");
        assert_eq!(monitor["spec"]["endpoints"][0]["path"], "/metrics");
    }
}
