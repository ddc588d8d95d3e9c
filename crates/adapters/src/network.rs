//! Services and Ingresses.

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use mirror_core::ResourceKind;
use mirror_store::spec::{IngressPathSummary, IngressSpec, ServicePortSummary, ServiceSpec};
use mirror_store::{MirrorRow, RowSpec};

use crate::ResourceAdapter;
use crate::meta;

/// Legacy annotation naming the ingress controller.
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(n) => n.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

pub struct ServiceAdapter;

impl ResourceAdapter for ServiceAdapter {
    type Source = Service;
    const KIND: ResourceKind = ResourceKind::Service;

    fn project(source: &Service) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let selector = spec.and_then(|s| s.selector.clone()).unwrap_or_default();
        let app = match meta::app(&source.metadata) {
            app if app.is_empty() => selector.get("app").cloned().unwrap_or_default(),
            app => app,
        };
        let row = ServiceSpec {
            service_type: spec
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
            app,
            selector,
            ports: spec
                .and_then(|s| s.ports.as_ref())
                .into_iter()
                .flatten()
                .map(|p| ServicePortSummary {
                    name: p.name.clone().unwrap_or_default(),
                    protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                    port: p.port,
                    target_port: p
                        .target_port
                        .as_ref()
                        .map_or_else(|| p.port.to_string(), int_or_string),
                    node_port: p.node_port,
                })
                .collect(),
        };
        meta::build_row(&source.metadata, RowSpec::Service(row), None)
    }
}

pub struct IngressAdapter;

impl ResourceAdapter for IngressAdapter {
    type Source = Ingress;
    const KIND: ResourceKind = ResourceKind::Ingress;

    fn project(source: &Ingress) -> Option<MirrorRow> {
        let spec = source.spec.as_ref();
        let ip = source
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|list| list.first())
            .and_then(|i| i.ip.clone().or_else(|| i.hostname.clone()))
            .unwrap_or_default();
        let class = spec
            .and_then(|s| s.ingress_class_name.clone())
            .or_else(|| {
                meta::annotation(&source.metadata, INGRESS_CLASS_ANNOTATION).map(String::from)
            })
            .unwrap_or_default();
        let paths = spec
            .and_then(|s| s.rules.as_ref())
            .into_iter()
            .flatten()
            .flat_map(|rule| {
                let host = rule.host.clone().unwrap_or_default();
                rule.http
                    .iter()
                    .flat_map(|http| http.paths.iter())
                    .map(move |p| {
                        let backend = p.backend.service.as_ref();
                        let port = backend.and_then(|b| b.port.as_ref());
                        IngressPathSummary {
                            host: host.clone(),
                            path: p.path.clone().unwrap_or_else(|| "/".to_string()),
                            service: backend.map(|b| b.name.clone()).unwrap_or_default(),
                            port: port
                                .and_then(|p| p.number.map(|n| n.to_string()).or_else(|| p.name.clone()))
                                .unwrap_or_default(),
                        }
                    })
            })
            .collect();
        let row = IngressSpec {
            ip,
            class,
            tls_hosts: spec
                .and_then(|s| s.tls.as_ref())
                .into_iter()
                .flatten()
                .flat_map(|t| t.hosts.clone().unwrap_or_default())
                .collect(),
            paths,
        };
        meta::build_row(&source.metadata, RowSpec::Ingress(row), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_projection() -> Result<(), Box<dyn std::error::Error>> {
        let svc: Service = serde_json::from_value(json!({
            "metadata": {"name": "web", "namespace": "shop"},
            "spec": {
                "type": "NodePort",
                "clusterIP": "10.96.0.10",
                "selector": {"app": "web"},
                "ports": [{"port": 80, "targetPort": 8080, "nodePort": 30080}]
            }
        }))?;
        let row = ServiceAdapter::project(&svc).ok_or("service skipped")?;
        let columns = row.spec.columns();
        assert_eq!(columns.get("type").map(String::as_str), Some("NodePort"));
        assert_eq!(columns.get("cluster_ip").map(String::as_str), Some("10.96.0.10"));
        assert_eq!(columns.get("app").map(String::as_str), Some("web"));
        assert_eq!(row.status(), "");
        let RowSpec::Service(spec) = row.spec else {
            return Err("not a service row".into());
        };
        assert_eq!(spec.ports.first().map(|p| p.target_port.as_str()), Some("8080"));
        Ok(())
    }

    #[test]
    fn test_ingress_projection() -> Result<(), Box<dyn std::error::Error>> {
        let ing: Ingress = serde_json::from_value(json!({
            "metadata": {
                "name": "shop",
                "namespace": "shop",
                "annotations": {"kubernetes.io/ingress.class": "nginx"}
            },
            "spec": {
                "rules": [{
                    "host": "shop.example.com",
                    "http": {"paths": [{
                        "path": "/api",
                        "pathType": "Prefix",
                        "backend": {"service": {"name": "api", "port": {"number": 8080}}}
                    }]}
                }],
                "tls": [{"hosts": ["shop.example.com"]}]
            },
            "status": {"loadBalancer": {"ingress": [{"ip": "203.0.113.7"}]}}
        }))?;
        let row = IngressAdapter::project(&ing).ok_or("ingress skipped")?;
        let columns = row.spec.columns();
        assert_eq!(columns.get("ip").map(String::as_str), Some("203.0.113.7"));
        assert_eq!(columns.get("class").map(String::as_str), Some("nginx"));
        let RowSpec::Ingress(spec) = row.spec else {
            return Err("not an ingress row".into());
        };
        assert_eq!(spec.paths.len(), 1);
        assert_eq!(spec.paths.first().map(|p| p.port.as_str()), Some("8080"));
        assert_eq!(spec.tls_hosts, vec!["shop.example.com".to_string()]);
        Ok(())
    }
}
