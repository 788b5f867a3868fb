//! Gateway source-address check.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

use crate::domain::Environment;

/// Outcome of checking where a callback came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCheck {
    Allowed,
    Rejected { reason: String },
}

/// Parse CIDR strings, failing on the first bad entry.
pub fn parse_ranges<S: AsRef<str>>(ranges: &[S]) -> Result<Vec<IpNetwork>, String> {
    ranges
        .iter()
        .map(|r| {
            let r = r.as_ref().trim();
            r.parse::<IpNetwork>().map_err(|e| format!("{r}: {e}"))
        })
        .collect()
}

/// Allow-list of gateway address ranges, applied in production only.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    ranges: Vec<IpNetwork>,
}

impl SourceFilter {
    pub fn new(ranges: Vec<IpNetwork>) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &[IpNetwork] {
        &self.ranges
    }

    /// Non-production traffic is always allowed. In production the address
    /// must parse and fall inside a configured range.
    pub fn check(&self, addr: Option<&str>, environment: Environment) -> SourceCheck {
        if !environment.is_production() {
            return SourceCheck::Allowed;
        }
        let Some(raw) = addr else {
            return SourceCheck::Rejected {
                reason: "source address unknown".to_string(),
            };
        };
        let Ok(ip) = raw.trim().parse::<IpAddr>() else {
            return SourceCheck::Rejected {
                reason: format!("unparseable source address '{raw}'"),
            };
        };
        if self.ranges.iter().any(|net| net.contains(ip)) {
            SourceCheck::Allowed
        } else {
            SourceCheck::Rejected {
                reason: format!("{ip} is outside the gateway ranges"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filter() -> SourceFilter {
        SourceFilter::new(parse_ranges(&["196.201.214.0/24", "196.201.215.0/24"]).unwrap())
    }

    #[rstest]
    #[case::dev(Environment::Dev)]
    #[case::staging(Environment::Staging)]
    fn non_production_always_allowed(#[case] env: Environment) {
        assert_eq!(filter().check(Some("127.0.0.1"), env), SourceCheck::Allowed);
        assert_eq!(filter().check(None, env), SourceCheck::Allowed);
    }

    #[rstest]
    #[case::in_range("196.201.214.7", true)]
    #[case::second_range("196.201.215.200", true)]
    #[case::outside("196.201.216.1", false)]
    #[case::loopback("127.0.0.1", false)]
    #[case::ipv6("::1", false)]
    #[case::garbage("not-an-ip", false)]
    fn production_checks_ranges(#[case] addr: &str, #[case] allowed: bool) {
        let check = filter().check(Some(addr), Environment::Production);
        assert_eq!(check == SourceCheck::Allowed, allowed, "{check:?}");
    }

    #[test]
    fn missing_address_is_rejected_in_production() {
        assert!(matches!(
            filter().check(None, Environment::Production),
            SourceCheck::Rejected { .. }
        ));
    }

    #[test]
    fn bad_cidr_is_reported() {
        let err = parse_ranges(&["196.201.214.0/24", "10.0.0.0/99"]).unwrap_err();
        assert!(err.starts_with("10.0.0.0/99"));
    }
}
