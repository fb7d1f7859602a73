// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_certificate_name() {
        assert_eq!(certificate_name("root:org", "default", "web"), "root-org-default-web");
        assert_eq!(certificate_name("", "Default", "Web_App"), "default-web-app");
        assert_eq!(certificate_name("-x-", "ns", "name."), "x--ns-name");
    }

    #[test]
    fn test_certificate_name_is_bounded() {
        let long = "a".repeat(400);
        assert_eq!(certificate_name("c", "ns", &long).len(), 253);
    }

    #[tokio::test]
    async fn test_fake_provider_records_requests() {
        let provider = FakeCertificateProvider::new();
        let request = CertificateRequest::new(
            "c-ns-web",
            "abc.hcpapps.net",
            BTreeMap::from([("app".to_string(), "web".to_string())]),
            BTreeMap::new(),
        );

        provider.initialize().await.unwrap();
        provider.create(&request).await.unwrap();
        provider.delete(&request).await.unwrap();

        assert_eq!(provider.initialize_calls(), 1);
        assert_eq!(provider.created(), vec![request.clone()]);
        assert_eq!(provider.deleted()[0].host(), "abc.hcpapps.net");
        assert_eq!(request.labels().get("app").map(String::as_str), Some("web"));
    }
}
