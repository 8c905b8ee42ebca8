//! Stock detectors for contact details.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use parley_core::{NluError, Result};
use regex::Regex;
use serde_json::Value;

use crate::detector::{Detector, DetectorOptions, ValueExtractor};
use crate::resolver::EntityResolver;

const EMAIL_PATTERN: &str = r"[\w.%+-]+@[\w-]+(?:\.[\w-]+)*\.[a-z]{2,}";
const PHONE_PATTERN: &str = r"(?:\+\d{1,3}[ -]?)?\d{3}[ -]?\d{3}[ -]?\d{3,4}";
const URL_PATTERN: &str = r#"(?:https?://|www\.)[^\s<>"']*[^\s<>"'.,;:!?)]"#;

static PHONE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s().-]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Email,
    Phone,
    Url,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [Builtin::Email, Builtin::Phone, Builtin::Url];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Email => "email",
            Builtin::Phone => "phone",
            Builtin::Url => "url",
        }
    }

    pub fn detector(self) -> Detector {
        Detector::regex(match self {
            Builtin::Email => EMAIL_PATTERN,
            Builtin::Phone => PHONE_PATTERN,
            Builtin::Url => URL_PATTERN,
        })
    }

    pub fn options(self) -> DetectorOptions {
        let options = DetectorOptions {
            replace_diacritics: false,
            ..DetectorOptions::default()
        };
        match self {
            Builtin::Email => options.anonymized(),
            Builtin::Phone => options
                .anonymized()
                .extract(ValueExtractor::function(phone_value)),
            Builtin::Url => options,
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Builtin {
    type Err = NluError;

    fn from_str(s: &str) -> Result<Self> {
        Builtin::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NluError::UnknownDetector(s.to_string()))
    }
}

/// Digits with separators removed; a leading `+` is kept.
fn phone_value(text: &str) -> Value {
    Value::String(PHONE_SEPARATOR_RE.replace_all(text, "").into_owned())
}

pub fn register_builtins(resolver: &mut EntityResolver, builtins: &[Builtin]) -> Result<()> {
    for builtin in builtins {
        resolver.set_entity_detector(builtin.name(), builtin.detector(), builtin.options())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> EntityResolver {
        let mut resolver = EntityResolver::new();
        register_builtins(&mut resolver, &Builtin::ALL).unwrap();
        resolver
    }

    #[tokio::test]
    async fn phone_is_anonymized() {
        let result = resolver().resolve("call me 721481142", &[]).await;
        assert_eq!(result.text, "call me @PHONE");
        assert_eq!(result.entities[0].entity, "phone");
        assert_eq!(result.entities[0].value, json!("721481142"));
    }

    #[tokio::test]
    async fn contacts_are_detected_and_normalized() {
        let text = "napište na jan.novak@example.cz nebo +420 721 481 142, web https://example.cz/kontakt.";
        let result = resolver().resolve(text, &[]).await;
        let found: Vec<(&str, Value)> = result
            .entities
            .iter()
            .map(|e| (e.entity.as_str(), e.value.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("email", json!("jan.novak@example.cz")),
                ("phone", json!("+420721481142")),
                ("url", json!("https://example.cz/kontakt")),
            ]
        );
        assert_eq!(
            result.text,
            "napište na @EMAIL nebo @PHONE, web https://example.cz/kontakt."
        );
    }

    #[tokio::test]
    async fn anonymized_tokens_are_not_detected_again() {
        let resolver = resolver();
        let first = resolver.resolve("mail me at a@b.cz or 721481142", &[]).await;
        assert_eq!(first.text, "mail me at @EMAIL or @PHONE");
        let second = resolver.resolve(&first.text, &[]).await;
        assert!(second.entities.is_empty());
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn builtin_names_parse() {
        assert_eq!("Phone".parse::<Builtin>().unwrap(), Builtin::Phone);
        assert!("fax".parse::<Builtin>().is_err());
    }
}
