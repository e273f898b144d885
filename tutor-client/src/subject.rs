//! Subject keys partitioning conversation logs and backend routes.

use std::fmt;

use tutor_common::{Error, Result};

/// Topic key such as `math` or `physics`.
///
/// Used verbatim as a URL path segment and as a storage key suffix, so it
/// may not contain whitespace or URL delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject(String);

impl Subject {
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid("Please select a subject first"));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%'))
        {
            return Err(Error::invalid(format!(
                "Subject '{name}' contains unsupported character {bad:?}"
            )));
        }
        // `.` and `..` are removed by URL normalization
        if name.chars().all(|c| c == '.') {
            return Err(Error::invalid(format!(
                "Subject '{name}' cannot be made of dots only"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key of this subject's conversation log.
    pub fn history_key(&self) -> String {
        format!("chat_history_{}", self.0)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Subject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn trims_and_keys() {
        let subject = Subject::parse("  math ").unwrap();
        assert_eq!(subject.as_str(), "math");
        assert_eq!(subject.history_key(), "chat_history_math");
        assert_eq!(subject.to_string(), "math");
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("math/../admin" ; "path separator")]
    #[test_case("linear algebra" ; "inner space")]
    #[test_case("math?x=1" ; "query")]
    #[test_case(".." ; "parent segment")]
    #[test_case("." ; "current segment")]
    #[test_case("..." ; "dots only")]
    fn rejects(name: &str) {
        let err = Subject::parse(name).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn accepts_inner_dots() {
        assert_eq!(Subject::parse("cs.algorithms").unwrap().as_str(), "cs.algorithms");
    }

    #[test]
    fn accepts_non_ascii() {
        assert_eq!(Subject::parse("数学").unwrap().history_key(), "chat_history_数学");
    }
}
