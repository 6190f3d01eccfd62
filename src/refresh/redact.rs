use crate::config::Secret;

pub const MASK: &str = "********";

/// Replaces known secret values in text bound for logs or error messages
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new<'a, I>(secrets: I) -> Self
    where
        I: IntoIterator<Item = &'a Secret>,
    {
        let mut values: Vec<String> = secrets
            .into_iter()
            .map(|s| s.expose().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        // longest first so a secret containing another is masked whole
        values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        values.dedup();
        Self { secrets: values }
    }

    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_every_occurrence() {
        let secrets = [Secret::new("tiger"), Secret::new("")];
        let redactor = Redactor::new(secrets.iter());
        assert_eq!(
            redactor.redact("scott/\"tiger\"@PDB and tiger again"),
            "scott/\"********\"@PDB and ******** again"
        );
    }

    #[test]
    fn test_longer_secret_wins() {
        let secrets = [Secret::new("abc"), Secret::new("abcdef")];
        let redactor = Redactor::new(secrets.iter());
        assert_eq!(redactor.redact("x abcdef y"), "x ******** y");
    }

    #[test]
    fn test_empty_redactor_is_identity() {
        let redactor = Redactor::default();
        assert!(redactor.is_empty());
        assert_eq!(redactor.redact("plain"), "plain");
    }
}
