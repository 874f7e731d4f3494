use dockhand_common::{DockhandError, Result};
use std::fmt;

/// Tag every recreate pulls, whatever the container was started from.
pub const REPLACEMENT_TAG: &str = "latest";

/// An image string split into repository and optional tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub tag: Option<String>,
}

impl ImageReference {
    /// Splits at the last `:` after the last `/`, so `host:5000/name` keeps its port.
    /// A `@digest` suffix is dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let undigested = raw.split_once('@').map_or(raw, |(name, _)| name);
        let name_start = undigested.rfind('/').map_or(0, |slash| slash + 1);

        let (repository, tag) = match undigested[name_start..].rfind(':') {
            Some(offset) => {
                let colon = name_start + offset;
                (&undigested[..colon], Some(&undigested[colon + 1..]))
            }
            None => (undigested, None),
        };

        if repository.is_empty() {
            return Err(DockhandError::InvalidImage(format!(
                "image '{raw}' has no repository"
            )));
        }
        // Containers started from a bare image ID have no repository to pull
        if repository == "sha256" {
            return Err(DockhandError::InvalidImage(format!(
                "image '{raw}' is an image ID, not a repository"
            )));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.filter(|t| !t.is_empty()).map(str::to_string),
        })
    }

    /// The same repository at the replacement tag.
    pub fn latest(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            tag: Some(REPLACEMENT_TAG.to_string()),
        }
    }

    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or(REPLACEMENT_TAG)
    }

    /// Registry host, when the first path component names one.
    pub fn registry_host(&self) -> Option<&str> {
        let (first, _) = self.repository.split_once('/')?;
        let is_host = first.contains('.') || first.contains(':') || first == "localhost";
        is_host.then_some(first)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}", self.repository, tag),
            None => f.write_str(&self.repository),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_tag() {
        let image = ImageReference::parse("nginx").unwrap();
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, None);
        assert_eq!(image.latest().to_string(), "nginx:latest");
    }

    #[test]
    fn test_old_tag_replaced() {
        let image = ImageReference::parse("myrepo/app:v1").unwrap();
        assert_eq!(image.repository, "myrepo/app");
        assert_eq!(image.tag.as_deref(), Some("v1"));
        assert_eq!(image.latest().to_string(), "myrepo/app:latest");
    }

    #[test]
    fn test_registry_port_is_not_a_tag() {
        let image = ImageReference::parse("registry.example.com:5000/repo:oldtag").unwrap();
        assert_eq!(image.repository, "registry.example.com:5000/repo");
        assert_eq!(image.latest().to_string(), "registry.example.com:5000/repo:latest");

        let untagged = ImageReference::parse("registry.example.com:5000/repo").unwrap();
        assert_eq!(untagged.repository, "registry.example.com:5000/repo");
        assert_eq!(untagged.tag, None);
    }

    #[test]
    fn test_digest_dropped() {
        let image = ImageReference::parse("ghcr.io/org/app@sha256:abcdef").unwrap();
        assert_eq!(image.repository, "ghcr.io/org/app");
        assert_eq!(image.tag, None);
    }

    #[test]
    fn test_empty_repository_rejected() {
        assert!(matches!(
            ImageReference::parse(":v1"),
            Err(DockhandError::InvalidImage(_))
        ));
        assert!(matches!(
            ImageReference::parse(""),
            Err(DockhandError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_image_id_rejected() {
        assert!(matches!(
            ImageReference::parse("sha256:4bcff63911fcb4448bd4fdacec207030997caf25e9bea4045fa6c8c44de311d1"),
            Err(DockhandError::InvalidImage(_))
        ));
        // A repository that merely ends in sha256 is still pullable
        let namespaced = ImageReference::parse("myorg/sha256:v2").unwrap();
        assert_eq!(namespaced.repository, "myorg/sha256");
    }

    #[test]
    fn test_registry_host() {
        let ghcr = ImageReference::parse("ghcr.io/org/app:1.2").unwrap();
        assert_eq!(ghcr.registry_host(), Some("ghcr.io"));

        let local = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(local.registry_host(), Some("localhost:5000"));

        let hub = ImageReference::parse("myrepo/app:v1").unwrap();
        assert_eq!(hub.registry_host(), None);

        let official = ImageReference::parse("redis:7").unwrap();
        assert_eq!(official.registry_host(), None);
    }
}
