//! Canonical `"<vendor> <version>"` extraction from free-text OS descriptors.

use std::sync::LazyLock;

use regex::Regex;

/// Everything after the first delimiter (install paths, device names) is ignored.
const DELIMITER: char = '|';

struct OsRule {
    name: &'static str,
    pattern: Regex,
    template: &'static str,
}

impl OsRule {
    fn new(name: &'static str, pattern: &str, template: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(&format!("(?i){pattern}")).expect("OS rule pattern is a valid regex"),
            template,
        }
    }
}

/// Evaluated in order; the first match wins. Windows Server must precede
/// the generic Windows rule.
static OS_RULES: LazyLock<Vec<OsRule>> = LazyLock::new(|| {
    vec![
        OsRule::new("Debian", r"(Debian).*?(\d+)", "${1} ${2}"),
        OsRule::new("Ubuntu", r"(Ubuntu).*?(\d{2}\.\d{2})", "${1} ${2}"),
        OsRule::new("CentOS", r"(CentOS).*?(\d{1})", "${1} ${2}"),
        OsRule::new("Oracle", r"(Oracle).*?(\d{1})", "${1} ${2}"),
        OsRule::new("Windows Server", r"(Windows Server \d{4})", "${1}"),
        OsRule::new("Windows", r"(Windows).*?(\d{2})", "${1} ${2}"),
        OsRule::new("XCP-ng", r"(XCP-ng).*?(\d{1}\.\d{1})", "${1} ${2}"),
    ]
});

/// Extract a canonical OS string such as `Debian 12` or `Windows Server 2019`.
///
/// Empty input yields an empty string. Unmatched input is returned trimmed.
pub fn extract_os_pattern(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let descriptor = text.split(DELIMITER).next().unwrap_or_default();

    for rule in OS_RULES.iter() {
        if let Some(caps) = rule.pattern.captures(descriptor) {
            let mut out = String::new();
            caps.expand(rule.template, &mut out);
            tracing::info!(rule = rule.name, input = %descriptor, result = %out, "Matched OS rule");
            return out;
        }
    }

    tracing::warn!(input = %descriptor, "No OS rule matched");
    descriptor.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_descriptors() {
        let cases = [
            (
                r"Microsoft Windows Server 2019 Standard|C:\Windows|\Device\Harddisk0\Partition4",
                "Windows Server 2019",
            ),
            ("Debian GNU/Linux 12 (bookworm)", "Debian 12"),
            ("XCP-ng 8.2.1 LTS", "XCP-ng 8.2"),
            ("CentOS Linux 8", "CentOS 8"),
            ("Ubuntu Linux Server 20.04 LTS", "Ubuntu 20.04"),
            ("Oracle Linux Server 7.9", "Oracle 7"),
            ("Microsoft Windows 10 Pro", "Windows 10"),
        ];
        for (input, expected) in cases {
            assert_eq!(extract_os_pattern(input), expected, "input: {input}");
        }
    }

    #[test]
    fn canonical_strings_are_fixed_points() {
        for canonical in ["Debian 12", "Ubuntu 22.04", "CentOS 7", "Windows Server 2022", "Windows 11", "XCP-ng 8.3"] {
            assert_eq!(extract_os_pattern(canonical), canonical);
        }
    }

    #[test]
    fn server_rule_beats_generic_windows() {
        assert_eq!(extract_os_pattern("Windows Server 2019 Standard"), "Windows Server 2019");
    }

    #[test]
    fn matching_is_case_insensitive_and_keeps_input_casing() {
        assert_eq!(extract_os_pattern("debian 11"), "debian 11");
        assert_eq!(extract_os_pattern("xcp-ng 8.2.1"), "xcp-ng 8.2");
    }

    #[test]
    fn empty_and_unmatched_inputs() {
        assert_eq!(extract_os_pattern(""), "");
        assert_eq!(extract_os_pattern("  FreeBSD 14.0  "), "FreeBSD 14.0");
        assert_eq!(extract_os_pattern("  Arch Linux |/boot"), "Arch Linux");
        assert_eq!(extract_os_pattern("|C:\\Windows"), "");
    }
}
