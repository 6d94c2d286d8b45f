//! # Key Transformations
//!
//! Renames secret keys before they are written, e.g. `CLIENT_ID` to `clientId`.

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyTransform {
    #[default]
    Identity,
    Camel,
    LowerCamel,
    Kebab,
    ScreamingKebab,
    Snake,
    ScreamingSnake,
}

impl KeyTransform {
    /// Apply the transformation to one key.
    ///
    /// The camel variants lower-case their input first, so `SCREAMING_SNAKE`
    /// keys come out as `ScreamingSnake` rather than `SCREAMINGSNAKE`.
    pub fn apply(self, key: &str) -> String {
        match self {
            Self::Identity => key.to_string(),
            Self::Camel => key.to_lowercase().to_upper_camel_case(),
            Self::LowerCamel => key.to_lowercase().to_lower_camel_case(),
            Self::Kebab => key.to_kebab_case(),
            Self::ScreamingKebab => key.to_shouty_kebab_case(),
            Self::Snake => key.to_snake_case(),
            Self::ScreamingSnake => key.to_shouty_snake_case(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Camel => "camel",
            Self::LowerCamel => "lower-camel",
            Self::Kebab => "kebab",
            Self::ScreamingKebab => "screaming-kebab",
            Self::Snake => "snake",
            Self::ScreamingSnake => "screaming-snake",
        }
    }
}

impl fmt::Display for KeyTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key transformation '{0}'")]
pub struct UnknownKeyTransform(pub String);

impl FromStr for KeyTransform {
    type Err = UnknownKeyTransform;

    /// Accepts both the short names (`lower-camel`) and the function-style
    /// names used by older deployments (`ToLowerCamel`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .trim_start_matches("To")
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "" | "identity" | "none" => Ok(Self::Identity),
            "camel" => Ok(Self::Camel),
            "lowercamel" => Ok(Self::LowerCamel),
            "kebab" => Ok(Self::Kebab),
            "screamingkebab" => Ok(Self::ScreamingKebab),
            "snake" => Ok(Self::Snake),
            "screamingsnake" => Ok(Self::ScreamingSnake),
            _ => Err(UnknownKeyTransform(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel() {
        for input in ["UhH_OHH", "UHH-OHH", "UHH-ohh", "uHH-ohh"] {
            assert_eq!(KeyTransform::Camel.apply(input), "UhhOhh", "input {input}");
        }
    }

    #[test]
    fn test_lower_camel() {
        for input in ["UhH_OHH", "UHH-OHH", "UHH-ohh", "uHH-ohh"] {
            assert_eq!(KeyTransform::LowerCamel.apply(input), "uhhOhh", "input {input}");
        }
    }

    #[test]
    fn test_kebab_and_snake() {
        assert_eq!(KeyTransform::Kebab.apply("clientId"), "client-id");
        assert_eq!(KeyTransform::ScreamingKebab.apply("clientId"), "CLIENT-ID");
        assert_eq!(KeyTransform::Snake.apply("clientId"), "client_id");
        assert_eq!(KeyTransform::ScreamingSnake.apply("client-id"), "CLIENT_ID");
        assert_eq!(KeyTransform::Identity.apply("Client_ID"), "Client_ID");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("".parse::<KeyTransform>().unwrap(), KeyTransform::Identity);
        assert_eq!("ToCamel".parse::<KeyTransform>().unwrap(), KeyTransform::Camel);
        assert_eq!("ToLowerCamel".parse::<KeyTransform>().unwrap(), KeyTransform::LowerCamel);
        assert_eq!("lower-camel".parse::<KeyTransform>().unwrap(), KeyTransform::LowerCamel);
        assert_eq!("ToScreamingKebab".parse::<KeyTransform>().unwrap(), KeyTransform::ScreamingKebab);
        assert_eq!("screaming_snake".parse::<KeyTransform>().unwrap(), KeyTransform::ScreamingSnake);
        assert!("ToPascal".parse::<KeyTransform>().is_err());
    }
}
