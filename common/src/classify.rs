//! DNS traffic classification
//!
//! Runs on every outbound send on the host, so it must stay a pair of
//! integer compares.

use crate::constants::DNS_PORT;

/// Returns true if either port is the DNS port
///
/// Both ports must be in host byte order.
#[inline(always)]
pub fn is_dns_traffic(sport: u16, dport: u16) -> bool {
    sport == DNS_PORT || dport == DNS_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_response_match() {
        assert!(is_dns_traffic(41234, 53));
        assert!(is_dns_traffic(53, 41234));
        assert!(is_dns_traffic(53, 53));
    }

    #[test]
    fn test_other_ports_rejected() {
        assert!(!is_dns_traffic(41234, 443));
        assert!(!is_dns_traffic(0, 0));
        assert!(!is_dns_traffic(5353, 853));
    }

    #[test]
    fn test_network_order_port_is_not_dns() {
        // 53 read raw from skc_dport on a little-endian host
        let raw = 53u16.to_be();
        if cfg!(target_endian = "little") {
            assert!(!is_dns_traffic(41234, raw));
        }
        assert!(is_dns_traffic(41234, u16::from_be(raw)));
    }
}
