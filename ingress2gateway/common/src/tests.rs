use super::*;
use ingress2gateway_core::{
    field::ErrorType,
    k8s::{
        gateway::{BackendObjectReference, HttpPathMatch},
        HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressServiceBackend,
        IngressSpec, IngressTLS, ObjectMeta, ServiceBackendPort,
    },
    NamespacedName,
};
use maplit::btreemap;

fn mk_ingress(name: &str, host: &str, paths: Vec<HTTPIngressPath>) -> Ingress {
    Ingress {
        metadata: ObjectMeta {
            namespace: Some("default".to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some("nginx".to_string()),
            rules: Some(vec![IngressRule {
                host: Some(host.to_string()).filter(|h| !h.is_empty()),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_path(path: &str, path_type: &str, service: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service.to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(port),
                    name: None,
                }),
            }),
            resource: None,
        },
    }
}

fn mk_named_port_path(path: &str, service: &str, port: &str) -> HTTPIngressPath {
    let mut p = mk_path(path, "Prefix", service, 0);
    p.backend.service.as_mut().unwrap().port = Some(ServiceBackendPort {
        number: None,
        name: Some(port.to_string()),
    });
    p
}

fn options() -> Options {
    Options {
        default_ingress_class: "nginx".to_string(),
        implementation_specific_path_match: None,
    }
}

#[test]
fn groups_rules_by_host_into_one_route() {
    let ingresses = vec![
        mk_ingress(
            "web",
            "example.com",
            vec![
                mk_path("/", "Prefix", "web", 80),
                mk_path("/api", "Prefix", "api", 8080),
            ],
        ),
        mk_ingress("other", "example.com", vec![mk_path("/", "Prefix", "web-v2", 80)]),
    ];

    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(ir.http_routes.len(), 1);

    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-example-com")];
    assert!(ctx.is_consistent());
    assert_eq!(ctx.route.spec.hostnames, vec!["example.com".to_string()]);
    assert_eq!(ctx.route.spec.parent_refs[0].name, "nginx");

    let rules = ctx.rules();
    assert_eq!(rules.len(), 2);
    assert_eq!(
        rules[0].matches[0].path,
        Some(HttpPathMatch::PathPrefix {
            value: "/".to_string()
        })
    );
    assert_eq!(rules[0].backend_refs.len(), 2);
    assert_eq!(ctx.rule_backend_sources[0].len(), 2);
    assert_eq!(
        ctx.rule_backend_sources[0][1].ingress.metadata.name.as_deref(),
        Some("other")
    );
    assert_eq!(rules[1].backend_refs[0].inner.name, "api");
    assert_eq!(rules[1].backend_refs[0].inner.port, Some(8080));
}

#[test]
fn builds_listeners_per_host() {
    let mut secure = mk_ingress("secure", "secure.example.com", vec![mk_path("/", "Prefix", "web", 80)]);
    secure.spec.as_mut().unwrap().tls = Some(vec![IngressTLS {
        hosts: Some(vec!["secure.example.com".to_string()]),
        secret_name: Some("secure-cert".to_string()),
    }]);
    let ingresses = vec![
        mk_ingress("web", "example.com", vec![mk_path("/", "Prefix", "web", 80)]),
        secure,
    ];

    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(ir.gateways.len(), 1);

    let gateway = &ir.gateways[&NamespacedName::new("default", "nginx")];
    assert_eq!(gateway.spec.gateway_class_name, "nginx");
    let names = gateway
        .spec
        .listeners
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "example-com-http",
            "secure-example-com-http",
            "secure-example-com-https"
        ]
    );

    let https = &gateway.spec.listeners[2];
    assert_eq!(https.port, 443);
    assert_eq!(https.protocol, "HTTPS");
    let tls = https.tls.as_ref().unwrap();
    assert_eq!(tls.mode.as_deref(), Some("Terminate"));
    assert_eq!(tls.certificate_refs[0].name, "secure-cert");
}

#[test]
fn resolves_named_service_ports() {
    let ingresses = vec![mk_ingress(
        "web",
        "example.com",
        vec![mk_named_port_path("/", "web", "http")],
    )];
    let service_ports = btreemap! {
        NamespacedName::new("default", "web") => btreemap! { "http".to_string() => 8080 },
    };

    let (ir, errors) = to_ir(&ingresses, &service_ports, &options());
    assert!(errors.is_empty(), "{errors:?}");
    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-example-com")];
    assert_eq!(ctx.rules()[0].backend_refs[0].inner.port, Some(8080));
}

#[test]
fn unresolved_named_port_is_invalid() {
    let ingresses = vec![mk_ingress(
        "web",
        "example.com",
        vec![mk_named_port_path("/", "web", "http")],
    )];

    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::Invalid);
    assert_eq!(
        errors[0].field.to_string(),
        "spec.rules[0].http.paths[0].backend.service.port.name"
    );
    assert!(errors[0].to_string().starts_with("Ingress default/web: "));

    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-example-com")];
    assert!(ctx.rules().is_empty());
    assert!(ctx.is_consistent());
}

#[test]
fn implementation_specific_paths_use_provider_hook() {
    let ingresses = vec![mk_ingress(
        "web",
        "example.com",
        vec![mk_path("/api/.*", "ImplementationSpecific", "web", 80)],
    )];

    let (_, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::NotSupported);

    fn regex(path: &str, sources: &[BackendSource<'_>]) -> HttpPathMatch {
        assert_eq!(sources.len(), 1);
        HttpPathMatch::RegularExpression {
            value: path.to_string(),
        }
    }
    let options = Options {
        implementation_specific_path_match: Some(regex),
        ..options()
    };
    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options);
    assert!(errors.is_empty(), "{errors:?}");
    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-example-com")];
    assert_eq!(
        ctx.rules()[0].matches[0].path,
        Some(HttpPathMatch::RegularExpression {
            value: "/api/.*".to_string()
        })
    );
}

#[test]
fn default_backend_gets_its_own_route() {
    let mut ingress = mk_ingress("web", "example.com", vec![mk_path("/", "Prefix", "web", 80)]);
    ingress.spec.as_mut().unwrap().default_backend = Some(IngressBackend {
        service: Some(IngressServiceBackend {
            name: "fallback".to_string(),
            port: Some(ServiceBackendPort {
                number: Some(8080),
                name: None,
            }),
        }),
        resource: None,
    });
    let ingresses = vec![ingress];

    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert!(errors.is_empty(), "{errors:?}");
    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-default-backend")];
    assert!(ctx.route.spec.hostnames.is_empty());
    assert_eq!(
        ctx.rules()[0].backend_refs[0].inner,
        BackendObjectReference {
            name: "fallback".to_string(),
            port: Some(8080),
            ..Default::default()
        }
    );
    assert!(ctx.rule_backend_sources[0][0].default_backend.is_some());

    let gateway = &ir.gateways[&NamespacedName::new("default", "nginx")];
    assert!(gateway.spec.listeners.iter().any(|l| l.name == "http"));
}

#[test]
fn classless_ingresses_use_default_class() {
    let mut ingress = mk_ingress("web", "", vec![mk_path("/", "Prefix", "web", 80)]);
    ingress.spec.as_mut().unwrap().ingress_class_name = None;
    assert_eq!(ingress_class(&ingress), None);
    let ingresses = vec![ingress];

    let (ir, errors) = to_ir(&ingresses, &Default::default(), &options());
    assert!(errors.is_empty(), "{errors:?}");
    let ctx = &ir.http_routes[&NamespacedName::new("default", "web-all-hosts")];
    assert_eq!(ctx.route.spec.parent_refs[0].name, "nginx");
    assert!(ctx.route.spec.hostnames.is_empty());
}
