//! User profile handed to the scene story generator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How far the user is comfortable walking to points of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mobility {
    #[default]
    Standard,
    Limited,
}

impl FromStr for Mobility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Mobility::Standard),
            "limited" => Ok(Mobility::Limited),
            other => Err(format!(
                "Invalid mobility '{other}'. Expected 'standard' or 'limited'"
            )),
        }
    }
}

impl fmt::Display for Mobility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mobility::Standard => write!(f, "standard"),
            Mobility::Limited => write!(f, "limited"),
        }
    }
}

/// Listener profile: interests (highest priority first), mobility and locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub interests: Vec<String>,
    #[serde(default)]
    pub mobility: Mobility,
    pub locale: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            interests: vec!["engineering_cars".to_string(), "history".to_string()],
            mobility: Mobility::Standard,
            locale: "en-US".to_string(),
        }
    }
}

impl UserProfile {
    /// Parse a comma-separated interest list, dropping blanks.
    pub fn parse_interests(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = UserProfile::default();
        assert_eq!(profile.locale, "en-US");
        assert_eq!(profile.interests, vec!["engineering_cars", "history"]);
        assert_eq!(profile.mobility, Mobility::Standard);
    }

    #[test]
    fn test_profile_json_shape() {
        let json = serde_json::to_value(UserProfile::default()).unwrap();
        assert_eq!(json["mobility"], "standard");
        assert_eq!(json["locale"], "en-US");
    }

    #[test]
    fn test_parse_interests() {
        assert_eq!(
            UserProfile::parse_interests(" art, ,history ,food"),
            vec!["art", "history", "food"]
        );
    }

    #[test]
    fn test_mobility_from_str() {
        assert_eq!("LIMITED".parse::<Mobility>().unwrap(), Mobility::Limited);
        assert!("wheels".parse::<Mobility>().is_err());
    }
}
