//! Tests for credential handling and token stores.

use super::*;

mod credential {
    use super::*;

    /// Verify the token never appears in Debug output.
    #[test]
    fn test_debug_is_redacted() {
        let credential = Credential::new("ghp_secret123");
        let debug = format!("{:?}", credential);

        assert!(!debug.contains("ghp_secret123"));
        assert!(debug.contains("REDACTED"));
    }

    /// Verify whitespace is trimmed and blank tokens fail validation.
    #[test]
    fn test_blank_tokens_rejected() {
        assert_eq!(Credential::new("  abc \n").expose(), "abc");
        assert!(Credential::new("   ").is_blank());
        assert_eq!(
            Credential::new("").validate(),
            Err(ValidationError::Required {
                field: "token".to_string()
            })
        );
        assert!(Credential::new("abc").validate().is_ok());
    }
}

mod file_store {
    use super::*;

    /// Verify a saved token loads back and clearing removes it.
    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&Credential::new("ghp_abc")).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.expose(), "ghp_abc");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    /// Verify clearing a store that holds nothing succeeds.
    #[tokio::test]
    async fn test_clear_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));

        assert!(store.clear().await.is_ok());
        assert!(store.clear().await.is_ok());
    }

    /// Verify an empty token file reads as no credential.
    #[tokio::test]
    async fn test_blank_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "\n").unwrap();

        let store = FileTokenStore::new(path.clone());
        assert!(store.load().await.unwrap().is_none());
    }

    /// Verify the token file is readable only by its owner.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token"));
        store.save(&Credential::new("ghp_abc")).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    /// Verify rewriting a loosely-permissioned token file tightens it.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_file_permissions_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "ghp_previous_and_longer").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileTokenStore::new(path.clone());
        store.save(&Credential::new("ghp_new")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ghp_new");
    }
}

mod memory_store {
    use super::*;

    /// Verify the in-memory store round-trips and clears.
    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::with_credential(Credential::new("one"));
        assert_eq!(store.load().await.unwrap().unwrap().expose(), "one");

        store.save(&Credential::new("two")).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().expose(), "two");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
