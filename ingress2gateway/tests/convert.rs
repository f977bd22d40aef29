use serde::Deserialize;
use serde_yaml::Value;
use std::process::{Command, Output};

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn convert(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ingress2gateway"))
        .args(args)
        .env("INGRESS2GATEWAY_LOG", "off")
        .output()
        .expect("ingress2gateway must run")
}

fn documents(output: &Output) -> Vec<Value> {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout must be UTF-8");
    serde_yaml::Deserializer::from_str(&stdout)
        .map(|doc| Value::deserialize(doc).expect("stdout must be YAML"))
        .filter(|doc| !doc.is_null())
        .collect()
}

fn find<'d>(docs: &'d [Value], kind: &str, name: &str) -> &'d Value {
    docs.iter()
        .find(|doc| {
            doc["kind"].as_str() == Some(kind) && doc["metadata"]["name"].as_str() == Some(name)
        })
        .unwrap_or_else(|| panic!("no {kind} {name} in {docs:#?}"))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn splits_traffic_to_canaries() {
    let output = convert(&["--input-file", &fixture("canary.yaml")]);
    assert!(output.status.success(), "{}", stderr(&output));
    let docs = documents(&output);

    let gateway = find(&docs, "Gateway", "nginx");
    let listeners = gateway["spec"]["listeners"].as_sequence().unwrap();
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0]["name"].as_str(), Some("example-com-http"));

    let route = find(&docs, "HTTPRoute", "web-example-com");
    let backends = route["spec"]["rules"][0]["backendRefs"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|b| {
            (
                b["name"].as_str().unwrap().to_string(),
                b["port"].as_i64().unwrap(),
                b["weight"].as_i64().unwrap(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        backends,
        vec![
            ("web".to_string(), 8080, 70),
            ("web-v2".to_string(), 80, 30),
        ]
    );

    // Ingresses of other classes are not converted.
    assert!(!docs
        .iter()
        .any(|doc| doc["metadata"]["name"].as_str() == Some("other-other-example-com")));
}

#[test]
fn applies_annotations_with_standard_filters() {
    let output = convert(&["--input-file", &fixture("features.yaml")]);
    assert!(output.status.success(), "{}", stderr(&output));
    let docs = documents(&output);

    let route = find(&docs, "HTTPRoute", "app-app-example-com");
    assert_eq!(
        route["spec"]["parentRefs"][0]["sectionName"].as_str(),
        Some("app-example-com-https")
    );
    let rule = &route["spec"]["rules"][0];
    assert_eq!(rule["matches"][0]["path"]["type"].as_str(), Some("PathPrefix"));
    assert_eq!(rule["matches"][0]["path"]["value"].as_str(), Some("/api"));
    assert_eq!(rule["timeouts"]["backendRequest"].as_str(), Some("2m"));

    let filters = rule["filters"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|f| f["type"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(filters, vec!["URLRewrite", "CORS"]);

    let redirect = find(&docs, "HTTPRoute", "app-app-example-com-ssl-redirect");
    assert_eq!(
        redirect["spec"]["rules"][0]["filters"][0]["requestRedirect"]["scheme"].as_str(),
        Some("https")
    );

    let stderr = stderr(&output);
    assert!(stderr.contains("[WARNING]"), "{stderr}");
    assert!(stderr.contains("[INFO]"), "{stderr}");
}

#[test]
fn emits_envoy_gateway_policies() {
    let output = convert(&[
        "--input-file",
        &fixture("features.yaml"),
        "--emitter",
        "envoy-gateway",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let docs = documents(&output);

    let route = find(&docs, "HTTPRoute", "app-app-example-com");
    assert_eq!(route["spec"]["rules"][0]["name"].as_str(), Some("rule-0"));

    let security = find(&docs, "SecurityPolicy", "app-app-example-com-rule-0");
    assert_eq!(
        security["apiVersion"].as_str(),
        Some("gateway.envoyproxy.io/v1alpha1")
    );
    let cidrs = security["spec"]["authorization"]["rules"][0]["principal"]["clientCIDRs"]
        .as_sequence()
        .unwrap();
    assert_eq!(cidrs.len(), 2);
    assert!(security["spec"]["cors"]["allowOrigins"].is_sequence());

    let traffic = find(&docs, "BackendTrafficPolicy", "app-app-example-com-rule-0");
    assert_eq!(
        traffic["spec"]["timeout"]["tcp"]["connectTimeout"].as_str(),
        Some("5s")
    );
    assert_eq!(traffic["spec"]["requestBuffer"]["limit"].as_str(), Some("8M"));
}

#[test]
fn fails_on_invalid_annotations() {
    let output = convert(&["--input-file", &fixture("invalid.json")]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = stderr(&output);
    assert!(stderr.contains("proxy-body-size"), "{stderr}");
    assert!(stderr.contains("--allow-errors"), "{stderr}");
}

#[test]
fn allow_errors_writes_a_partial_conversion() {
    let output = convert(&[
        "--input-file",
        &fixture("invalid.json"),
        "--allow-errors",
        "--output",
        "json",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let list: Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(list["kind"].as_str(), Some("List"));
    let items = list["items"].as_sequence().unwrap();
    assert!(items
        .iter()
        .any(|item| item["metadata"]["name"].as_str() == Some("broken-broken-example-com")));
}

#[test]
fn filters_by_namespace() {
    let output = convert(&[
        "--input-file",
        &fixture("canary.yaml"),
        "--input-file",
        &fixture("features.yaml"),
        "--namespace",
        "shop",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let docs = documents(&output);
    assert!(docs
        .iter()
        .all(|doc| doc["metadata"]["namespace"].as_str() == Some("shop")));
}
