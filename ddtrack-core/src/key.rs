use crate::models::ServerKey;

/// Derive the stable key of a server from its address list.
///
/// The master server does not keep address order stable between polls, and a
/// server listening on several interfaces reports several addresses. The
/// smallest address is the same for any ordering of the same set.
pub fn server_key<S: AsRef<str>>(addresses: &[S]) -> ServerKey {
    addresses
        .iter()
        .map(AsRef::as_ref)
        .min()
        .map(ServerKey::new)
        .unwrap_or_else(ServerKey::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let a = ["tw-0.6+udp://10.0.0.2:8303", "tw-0.6+udp://10.0.0.1:8303"];
        let b = ["tw-0.6+udp://10.0.0.1:8303", "tw-0.6+udp://10.0.0.2:8303"];
        assert_eq!(server_key(&a), server_key(&b));
        assert_eq!(server_key(&a).as_str(), "tw-0.6+udp://10.0.0.1:8303");
    }

    #[test]
    fn test_key_with_duplicates_and_mixed_families() {
        let addrs = [
            "tw-0.7+udp://[2001:db8::1]:8303",
            "tw-0.6+udp://10.0.0.1:8303",
            "tw-0.6+udp://10.0.0.1:8303",
        ];
        assert_eq!(server_key(&addrs).as_str(), "tw-0.6+udp://10.0.0.1:8303");
    }

    #[test]
    fn test_empty_addresses_yield_unknown() {
        let empty: [&str; 0] = [];
        assert_eq!(server_key(&empty), ServerKey::unknown());
    }
}
