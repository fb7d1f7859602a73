// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("glbc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.domain, DEFAULT_DOMAIN);
        assert!(!config.enable_custom_hosts);
        assert!(!config.tls_enabled);
        assert!(!config.edge_proxy_enabled);
        assert_eq!(config.dns_provider, DnsProviderKind::Fake);
        assert_eq!(config.host_resolver, HostResolverKind::Dns);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.metrics_bind_address.port(), 8080);
        assert!(config.zones().is_empty());
        assert!(config.tsig_key().unwrap().is_none());
    }

    #[test]
    fn test_zones_are_comma_separated_and_repeatable() {
        let config = parse(&["--dns-zone", "a.example.com,b.example.com", "--dns-zone", " "]);

        let ids: Vec<String> = config.zones().into_iter().map(|z| z.id).collect();
        assert_eq!(ids, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_settings() {
        let config = parse(&["--domain", "apps.example.com", "--enable-custom-hosts"]);
        let settings = config.settings();

        assert_eq!(settings.domain, "apps.example.com");
        assert!(settings.custom_hosts_enabled);
    }

    #[test]
    fn test_rfc2136_provider_options() {
        let config = parse(&[
            "--dns-provider",
            "rfc2136",
            "--rfc2136-server",
            "192.0.2.53:53",
            "--tsig-key-name",
            "glbc-key",
            "--tsig-secret",
            "c2VjcmV0",
        ]);

        assert_eq!(config.dns_provider, DnsProviderKind::Rfc2136);
        assert_eq!(config.rfc2136_server, Some("192.0.2.53:53".parse().unwrap()));
        let key = config.tsig_key().unwrap().unwrap();
        assert_eq!(key.name, "glbc-key");
        assert_eq!(key.algorithm, "hmac-sha256");
    }

    #[test]
    fn test_tsig_key_requires_secret() {
        let config = parse(&["--tsig-key-name", "glbc-key"]);
        assert!(config.tsig_key().is_err());
    }

    #[test]
    fn test_config_map_ref() {
        let config = parse(&[
            "--host-resolver",
            "config-map",
            "--host-resolver-config-map",
            "glbc/hosts",
        ]);
        assert_eq!(config.host_resolver, HostResolverKind::ConfigMap);
        assert_eq!(
            config.config_map_ref().unwrap(),
            ("glbc".to_string(), "hosts".to_string())
        );

        let invalid = parse(&["--host-resolver-config-map", "hosts"]);
        assert!(invalid.config_map_ref().is_err());
        assert!(parse(&[]).config_map_ref().is_err());
    }
}
