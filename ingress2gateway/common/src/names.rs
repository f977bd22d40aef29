use regex::Regex;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("should compile"));

/// Derives a resource-name fragment from a hostname.
///
/// Runs of characters that are not alphanumeric become `-` and leading dashes
/// are dropped. Empty and wildcard-only hosts map to `all-hosts`.
pub fn name_from_host(host: &str) -> String {
    if host.is_empty() || host == "*" {
        return "all-hosts".to_string();
    }
    NON_ALPHANUMERIC
        .replace_all(host, "-")
        .trim_start_matches('-')
        .to_string()
}

/// The name of the HTTPRoute built for an Ingress host.
pub fn route_name(ingress_name: &str, host: &str) -> String {
    format!("{ingress_name}-{}", name_from_host(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_from_hosts() {
        assert_eq!(name_from_host("example.com"), "example-com");
        assert_eq!(name_from_host("*.example.com"), "example-com");
        assert_eq!(name_from_host("foo--bar.example.com"), "foo-bar-example-com");
        assert_eq!(name_from_host(""), "all-hosts");
        assert_eq!(name_from_host("*"), "all-hosts");
    }

    #[test]
    fn route_names() {
        assert_eq!(route_name("web", "example.com"), "web-example-com");
        assert_eq!(route_name("web", ""), "web-all-hosts");
    }
}
