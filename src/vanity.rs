use serde::Deserialize;

/// A matcher over the lowercase `0x`-prefixed hex form of a derived address.
///
/// Implementations must be deterministic and free of side effects; the search evaluates them
/// from many threads at once.
pub(crate) trait VanityPredicate: Sync {
    fn matches(&self, address: &str) -> bool;
}

impl<F> VanityPredicate for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn matches(&self, address: &str) -> bool {
        self(address)
    }
}

/// Byte patterns an acceptable address must contain, as configured in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct VanityPattern {
    /// Hex digits the address must start with
    #[serde(default)]
    pub(crate) prefix: Option<String>,
    /// Hex digits the address must end with
    #[serde(default)]
    pub(crate) suffix: Option<String>,
    /// Hex digits that must appear anywhere in the address
    #[serde(default)]
    pub(crate) contains: Option<String>,
}

impl VanityPattern {
    /// Returns a copy with every part lowercased and stripped of any `0x` prefix.
    pub(crate) fn normalized(&self) -> Self {
        let normalize = |part: &Option<String>| {
            part.as_deref().map(|s| {
                let s = s.trim();
                s.strip_prefix("0x").unwrap_or(s).to_ascii_lowercase()
            })
        };
        Self {
            prefix: normalize(&self.prefix),
            suffix: normalize(&self.suffix),
            contains: normalize(&self.contains),
        }
    }

    /// Collects every problem with the pattern.
    pub(crate) fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let parts = [("prefix", &self.prefix), ("suffix", &self.suffix), ("contains", &self.contains)];
        if parts.iter().all(|(_, part)| part.as_deref().is_none_or(str::is_empty)) {
            problems.push("Vanity pattern is empty".to_string());
        }
        for (name, part) in parts {
            let Some(part) = part else { continue };
            if part.len() > 40 {
                problems.push(format!("Vanity {name} longer than an address ({part})"));
            }
            if !part.chars().all(|c| c.is_ascii_hexdigit()) {
                problems.push(format!("Vanity {name} is not hex ({part})"));
            }
        }
        problems
    }
}

impl VanityPredicate for VanityPattern {
    fn matches(&self, address: &str) -> bool {
        let hex = address.strip_prefix("0x").unwrap_or(address);
        self.prefix.as_deref().is_none_or(|p| hex.starts_with(p))
            && self.suffix.as_deref().is_none_or(|s| hex.ends_with(s))
            && self.contains.as_deref().is_none_or(|c| hex.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(prefix: Option<&str>, suffix: Option<&str>) -> VanityPattern {
        VanityPattern {
            prefix: prefix.map(str::to_string),
            suffix: suffix.map(str::to_string),
            contains: None,
        }
        .normalized()
    }

    #[test]
    fn test_prefix_and_suffix() {
        let address = "0x0000c0ffee000000000000000000000000dead";
        assert!(pattern(Some("0x0000"), None).matches(address));
        assert!(pattern(None, Some("DEAD")).matches(address));
        assert!(pattern(Some("0000c0"), Some("dead")).matches(address));
        assert!(!pattern(Some("0001"), Some("dead")).matches(address));
        assert!(!pattern(None, Some("beef")).matches(address));
    }

    #[test]
    fn test_contains() {
        let mut pattern = VanityPattern {
            contains: Some("C0FFEE".into()),
            ..Default::default()
        };
        pattern = pattern.normalized();
        assert!(pattern.matches("0x0000c0ffee000000000000000000000000dead"));
        assert!(!pattern.matches("0x0000000000000000000000000000000000dead"));
    }

    #[test]
    fn test_closures_are_predicates() {
        let ends_in_dead = |address: &str| address.ends_with("dead");
        assert!(ends_in_dead.matches("0xabcdead"));
    }

    #[test]
    fn test_problems() {
        assert_eq!(VanityPattern::default().problems(), vec!["Vanity pattern is empty"]);
        assert_eq!(pattern(Some("zz"), None).problems(), vec!["Vanity prefix is not hex (zz)"]);
        assert!(pattern(None, Some("dead")).problems().is_empty());
    }
}
