// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, and type safety properties.

use nestkeeper::types::*;
use proptest::prelude::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("docker").unwrap();
        assert_eq!(img.name(), "docker");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("docker:27-dind").unwrap();
        assert_eq!(img.name(), "docker");
        assert_eq!(img.tag(), Some("27-dind"));
    }

    #[test]
    fn parse_with_registry_and_org() {
        let img = ImageRef::parse("quay.io/podman/stable:v5").unwrap();
        assert_eq!(img.registry(), Some("quay.io"));
        assert_eq!(img.name(), "podman/stable");
        assert_eq!(img.tag(), Some("v5"));
    }

    #[test]
    fn docker_hub_org_is_not_a_registry() {
        let img = ImageRef::parse("library/docker:dind").unwrap();
        assert!(img.registry().is_none());
        assert_eq!(img.name(), "library/docker");
    }

    #[test]
    fn localhost_registry_with_port() {
        let img = ImageRef::parse("localhost:5000/dind").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "dind");
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn parse_with_digest() {
        let img = ImageRef::parse("docker@sha256:abc123").unwrap();
        assert_eq!(img.digest(), Some("sha256:abc123"));
        assert!(img.tag().is_none());
        assert!(img.is_pinned());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("   ").is_err());
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("/leading").is_err());
    }

    #[test]
    fn display_round_trips_explicit_reference() {
        let img = ImageRef::parse("ghcr.io/org/dind:v1").unwrap();
        assert_eq!(img.to_string(), "ghcr.io/org/dind:v1");
    }
}

mod container_name_tests {
    use super::*;

    #[test]
    fn accepts_engine_valid_names() {
        for name in ["ci-docker", "build_1", "a.b", "9lives"] {
            assert!(ContainerName::new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(ContainerName::new(""), Err(ContainerNameError::Empty));
    }

    #[test]
    fn rejects_bad_first_char() {
        assert_eq!(
            ContainerName::new("-dind"),
            Err(ContainerNameError::InvalidStart)
        );
        assert_eq!(
            ContainerName::new(".dind"),
            Err(ContainerNameError::InvalidStart)
        );
    }

    #[test]
    fn rejects_spaces_and_slashes() {
        assert_eq!(
            ContainerName::new("my dind"),
            Err(ContainerNameError::InvalidChar(' '))
        );
        assert_eq!(
            ContainerName::new("a/b"),
            Err(ContainerNameError::InvalidChar('/'))
        );
    }

    #[test]
    fn rejects_overlong() {
        assert_eq!(
            ContainerName::new(&"a".repeat(129)),
            Err(ContainerNameError::TooLong)
        );
        assert!(ContainerName::new(&"a".repeat(128)).is_ok());
    }

    proptest! {
        #[test]
        fn generated_valid_names_are_accepted(name in "[a-zA-Z0-9][a-zA-Z0-9_.-]{0,60}") {
            let parsed = ContainerName::new(&name).unwrap();
            prop_assert_eq!(parsed.as_str(), name.as_str());
        }

        #[test]
        fn random_names_are_always_valid(prefix in "[a-z][a-z0-9-]{0,10}") {
            let name = ContainerName::random(&prefix).unwrap();
            prop_assert!(name.as_str().starts_with(&prefix));
        }
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn container_id_stores_value() {
        let id = ContainerId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn image_id_stores_value() {
        let id = ImageId::new("sha256:abc".to_string());
        assert_eq!(id.as_str(), "sha256:abc");
    }

    #[test]
    fn short_truncates_long_ids() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(ContainerId::new("abc").short(), "abc");
    }
}
