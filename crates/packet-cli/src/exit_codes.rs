//! Process exit codes. Part of the CLI contract.

use packet_core::PacketError;

pub const SUCCESS: i32 = 0;
pub const CONFIG_ERROR: i32 = 1; // Bad config, bad pattern, nothing collected
pub const ARCHIVE_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const VERSION_ERROR: i32 = 4; // Also: no matching archive
pub const PARTIAL_FAILURE: i32 = 5;

/// Map a top-level error to its exit code. Errors not raised by the library
/// (argument validation, missing working directory) count as configuration errors.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PacketError>())
        .map(PacketError::exit_code)
        .unwrap_or(CONFIG_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet_core::TransferFailures;

    #[test]
    fn test_library_errors_keep_their_code() {
        let not_found = PacketError::NotFound {
            name: "app".into(),
            constraint: String::new(),
        };
        assert_eq!(for_error(&anyhow::Error::new(not_found)), VERSION_ERROR);

        let partial = PacketError::from(TransferFailures::new(Vec::new(), 2));
        assert_eq!(for_error(&anyhow::Error::new(partial)), PARTIAL_FAILURE);
    }

    #[test]
    fn test_context_does_not_hide_code() {
        let err = anyhow::Error::new(PacketError::Io {
            path: "x".into(),
            source: std::io::Error::other("disk full"),
        })
        .context("while building");
        assert_eq!(for_error(&err), ARCHIVE_ERROR);
    }

    #[test]
    fn test_foreign_errors_are_config_errors() {
        assert_eq!(for_error(&anyhow::anyhow!("no remote given")), CONFIG_ERROR);
        assert_ne!(SUCCESS, CONFIG_ERROR);
        assert_ne!(TRANSPORT_ERROR, PARTIAL_FAILURE);
    }
}
