use crate::error::ReconcileError;

/// Parse `"<major>.<minor>[...]"` into `(major, minor)`.
///
/// Minor defaults to 0 when absent. Components past the second are ignored.
pub fn parse_version(version: &str) -> Result<(i64, i64), ReconcileError> {
    let invalid = || ReconcileError::InvalidVersionFormat(version.to_string());

    let mut parts = version.split('.');
    let major = parts
        .next()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .ok_or_else(invalid)?;
    let minor = match parts.next() {
        Some(p) => p.trim().parse::<i64>().map_err(|_| invalid())?,
        None => 0,
    };
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_and_minor() {
        assert_eq!(parse_version("3006.9").unwrap(), (3006, 9));
        assert_eq!(parse_version("3007.1.2").unwrap(), (3007, 1));
        assert_eq!(parse_version(" 2019 . 2 ").unwrap(), (2019, 2));
    }

    #[test]
    fn signed_components_parse() {
        assert_eq!(parse_version("-1.0").unwrap(), (-1, 0));
        assert_eq!(parse_version("+2.-3").unwrap(), (2, -3));
    }

    #[test]
    fn minor_defaults_to_zero() {
        assert_eq!(parse_version("3006").unwrap(), (3006, 0));
    }

    #[test]
    fn rejects_non_numeric_components() {
        for bad in ["", ".", "abc", "3006.x", "v3006.9", "3006.", "1.5e3"] {
            let err = parse_version(bad).unwrap_err();
            match err {
                ReconcileError::InvalidVersionFormat(s) => assert_eq!(s, bad),
                other => panic!("unexpected error for {bad:?}: {other}"),
            }
        }
    }
}
