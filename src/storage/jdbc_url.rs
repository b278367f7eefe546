//! JDBC-style storage URL parsing.
//!
//! `[jdbc:]scheme://host[:port]/database[?user=<u>&password=<p>]` — the
//! `jdbc:` prefix, when present, stays part of the emitted protocol name.
//! Unknown query parameters are ignored.

use url::Url;

use crate::error::ValueError;

const JDBC_PREFIX: &str = "jdbc:";

/// Parsed storage URL components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdbcUrl {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl JdbcUrl {
    /// Parses a JDBC URL, failing on a missing scheme, host, or database.
    pub fn parse(url: &str) -> Result<Self, ValueError> {
        let (prefix, stripped) = match url.strip_prefix(JDBC_PREFIX) {
            Some(stripped) => (JDBC_PREFIX, stripped),
            None => ("", url),
        };
        let invalid = |part| ValueError::InvalidUrl {
            url: stripped.to_string(),
            part,
        };

        let parsed = Url::parse(stripped).map_err(|_| invalid("protocol"))?;
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("host"))?
            .to_string();
        let database = parsed.path().trim_start_matches('/');
        if database.is_empty() {
            return Err(invalid("database"));
        }

        let mut user = None;
        let mut password = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "user" => user = Some(value.into_owned()),
                "password" => password = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(JdbcUrl {
            protocol: format!("{prefix}{}", parsed.scheme()),
            host,
            port: parsed.port(),
            database: database.to_string(),
            user,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let params =
            JdbcUrl::parse("jdbc:mariadb://127.0.0.1:3306/spider-storage?user=spider&password=pw")
                .unwrap();
        assert_eq!(params.protocol, "jdbc:mariadb");
        assert_eq!(params.host, "127.0.0.1");
        assert_eq!(params.port, Some(3306));
        assert_eq!(params.database, "spider-storage");
        assert_eq!(params.user.as_deref(), Some("spider"));
        assert_eq!(params.password.as_deref(), Some("pw"));
    }

    #[test]
    fn prefix_is_optional_and_preserved() {
        let with = JdbcUrl::parse("jdbc:mariadb://db.example.com/spider").unwrap();
        assert_eq!(with.protocol, "jdbc:mariadb");

        let without = JdbcUrl::parse("mariadb://db.example.com/spider").unwrap();
        assert_eq!(without.protocol, "mariadb");
        assert_eq!(without.port, None);
        assert_eq!(without.user, None);
    }

    #[test]
    fn unknown_query_parameters_are_ignored() {
        let params =
            JdbcUrl::parse("mariadb://db/spider?sslMode=verify-full&user=u&retries=3").unwrap();
        assert_eq!(params.user.as_deref(), Some("u"));
        assert_eq!(params.password, None);
    }

    #[test]
    fn missing_components_fail() {
        let err = JdbcUrl::parse("not a url").unwrap_err();
        assert!(err.to_string().contains("Missing protocol"));

        let err = JdbcUrl::parse("mariadb:///spider").unwrap_err();
        assert!(err.to_string().contains("Missing host"));

        let err = JdbcUrl::parse("mariadb://db.example.com").unwrap_err();
        assert!(err.to_string().contains("Missing database"));

        let err = JdbcUrl::parse("mariadb://db.example.com/").unwrap_err();
        assert!(err.to_string().contains("Missing database"));
    }
}
