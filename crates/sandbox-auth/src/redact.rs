/// Bounded prefix of a credential, the only fragment of a secret that may
/// ever appear in a diagnostic message (§4.1 "only a short prefix (≤ 10
/// chars) of the credential may appear").
#[must_use]
pub fn credential_prefix(credential: &str) -> String {
    let prefix: String = credential.chars().take(10).collect();
    if credential.chars().count() > 10 {
        format!("{prefix}…")
    } else {
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_truncated_to_ten_chars() {
        let long = "sk-ant-REDACTED";
        let prefix = credential_prefix(long);
        assert_eq!(prefix, "sk-ant-api…");
    }

    #[test]
    fn short_credential_is_returned_whole() {
        assert_eq!(credential_prefix("abc"), "abc");
    }
}
