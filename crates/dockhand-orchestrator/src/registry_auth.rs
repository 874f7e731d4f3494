use crate::image_ref::ImageReference;
use dockhand_common::RegistryCredentials;
use std::collections::HashMap;
use tracing::debug;

pub const GHCR_HOST: &str = "ghcr.io";

/// Maps private registry hosts to the credentials used when pulling from them.
/// Images on any other registry are pulled anonymously.
#[derive(Debug, Clone, Default)]
pub struct RegistryAuthResolver {
    registries: HashMap<String, RegistryCredentials>,
}

impl RegistryAuthResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, credentials: RegistryCredentials) -> Self {
        self.insert(credentials);
        self
    }

    pub fn insert(&mut self, credentials: RegistryCredentials) {
        self.registries
            .insert(credentials.server_address.to_ascii_lowercase(), credentials);
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    pub fn resolve(&self, image: &ImageReference) -> Option<RegistryCredentials> {
        let host = image.registry_host()?.to_ascii_lowercase();
        let credentials = self.registries.get(&host).cloned();
        debug!(
            registry = %host,
            authenticated = credentials.is_some(),
            "Resolved registry credentials"
        );
        credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ghcr() -> RegistryCredentials {
        RegistryCredentials {
            server_address: GHCR_HOST.to_string(),
            username: "deploy-bot".to_string(),
            password: "token".to_string(),
        }
    }

    #[test]
    fn test_private_registry_gets_credentials() {
        let resolver = RegistryAuthResolver::new().with_registry(ghcr());
        let image = ImageReference::parse("ghcr.io/org/app:v3").unwrap().latest();

        let creds = resolver.resolve(&image).unwrap();
        assert_eq!(creds.server_address, "ghcr.io");
        assert_eq!(creds.username, "deploy-bot");
    }

    #[test]
    fn test_public_images_are_anonymous() {
        let resolver = RegistryAuthResolver::new().with_registry(ghcr());

        for raw in ["nginx:1.25", "myrepo/app:v1", "quay.io/org/app:v1"] {
            let image = ImageReference::parse(raw).unwrap();
            assert!(resolver.resolve(&image).is_none(), "{raw} should be anonymous");
        }
    }

    #[test]
    fn test_host_prefix_alone_does_not_match() {
        // Hosts that merely start with "ghcr.io" never see the ghcr.io password.
        let resolver = RegistryAuthResolver::new().with_registry(ghcr());
        let image = ImageReference::parse("ghcr.io.evil.com/org/app").unwrap();
        assert!(resolver.resolve(&image).is_none());
    }

    #[test]
    fn test_additional_registries() {
        let resolver = RegistryAuthResolver::new()
            .with_registry(ghcr())
            .with_registry(RegistryCredentials {
                server_address: "Registry.Example.com:5000".to_string(),
                username: "ci".to_string(),
                password: "pw".to_string(),
            });
        assert_eq!(resolver.len(), 2);

        let image = ImageReference::parse("registry.example.com:5000/team/api:2").unwrap();
        assert_eq!(resolver.resolve(&image).unwrap().username, "ci");
    }
}
