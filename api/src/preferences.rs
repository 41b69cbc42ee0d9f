//! Theme and language preferences, resolved per request from cookies and headers.

use axum::extract::FromRequestParts;
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::session::cookie_value;

pub const THEME_COOKIE: &str = "email-system-theme";
pub const LANGUAGE_COOKIE: &str = "email-system-language";

/// Preference cookies live for 30 days.
const PREFERENCE_MAX_AGE: u32 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(format!("unsupported theme {other:?}")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::ZhCn, Language::EnUs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::ZhCn => "zh-CN",
            Language::EnUs => "en-US",
        }
    }

    fn primary_subtag(&self) -> &'static str {
        match self {
            Language::ZhCn => "zh",
            Language::EnUs => "en",
        }
    }

    /// The first supported language in an `Accept-Language` value. Tags are
    /// taken in the order given; quality weights are not considered.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let tags: Vec<&str> = header
            .split(',')
            .filter_map(|tag| tag.split(';').next())
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect();

        tags.iter()
            .find_map(|tag| {
                Self::ALL
                    .into_iter()
                    .find(|lang| lang.as_str().eq_ignore_ascii_case(tag))
            })
            .or_else(|| {
                tags.iter().find_map(|tag| {
                    let primary = tag.split('-').next().unwrap_or(tag);
                    Self::ALL
                        .into_iter()
                        .find(|lang| lang.primary_subtag().eq_ignore_ascii_case(primary))
                })
            })
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str() == s)
            .ok_or_else(|| format!("unsupported language {s:?}"))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub language: Language,
}

impl Preferences {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let theme = cookie_value(headers, THEME_COOKIE)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();

        let language = cookie_value(headers, LANGUAGE_COOKIE)
            .and_then(|value| value.parse().ok())
            .or_else(|| {
                headers
                    .get(ACCEPT_LANGUAGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(Language::from_accept_language)
            })
            .unwrap_or_default();

        Self { theme, language }
    }

    /// `Set-Cookie` values persisting these preferences.
    pub fn cookies(&self) -> [String; 2] {
        [
            format!(
                "{THEME_COOKIE}={}; Path=/; Max-Age={PREFERENCE_MAX_AGE}; SameSite=Strict",
                self.theme
            ),
            format!(
                "{LANGUAGE_COOKIE}={}; Path=/; Max-Age={PREFERENCE_MAX_AGE}; SameSite=Strict",
                self.language
            ),
        ]
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Preferences {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Preferences::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn test_defaults() {
        let prefs = Preferences::from_headers(&HeaderMap::new());
        assert_eq!(prefs.theme, Theme::System);
        assert_eq!(prefs.language, Language::ZhCn);
    }

    #[test]
    fn test_cookie_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("email-system-language=en-US; email-system-theme=dark"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN"));

        let prefs = Preferences::from_headers(&headers);
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.language, Language::EnUs);
    }

    #[test]
    fn test_invalid_cookie_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("email-system-language=fr-FR; email-system-theme=neon"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.8"));

        let prefs = Preferences::from_headers(&headers);
        assert_eq!(prefs.theme, Theme::System);
        assert_eq!(prefs.language, Language::EnUs);
    }

    #[test]
    fn test_accept_language() {
        assert_eq!(
            Language::from_accept_language("fr-FR, en-US;q=0.7, zh-CN;q=0.9"),
            Some(Language::EnUs)
        );
        assert_eq!(
            Language::from_accept_language("fr-FR, zh-TW;q=0.5"),
            Some(Language::ZhCn)
        );
        assert_eq!(Language::from_accept_language("de, fr"), None);
        assert_eq!(Language::from_accept_language(""), None);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(serde_json::to_value(Language::EnUs).unwrap(), "en-US");
        assert_eq!(serde_json::to_value(Theme::Light).unwrap(), "light");
        assert!("EN-us".parse::<Language>().is_err());
    }
}
