// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Topic name and topic filter parsing and matching (spec §4.1).
//!
//! A concrete topic contains no wildcards. A filter may contain `+` (exactly
//! one level) or `#` (zero or more trailing levels, only as the final
//! token). Matching never panics and runs in `O(|topic| + |filter|)`.

use std::fmt;

const MAX_LEVELS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    Empty,
    TooManyLevels,
    ControlCharacter,
    NonTerminalMultiWildcard,
    WildcardInConcreteTopic,
}

impl fmt::Display for TopicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Empty => "topic filter is empty",
            Self::TooManyLevels => "topic filter exceeds the configured level bound",
            Self::ControlCharacter => "topic level contains a control character",
            Self::NonTerminalMultiWildcard => "'#' must be the final level of a filter",
            Self::WildcardInConcreteTopic => "published topic must not contain wildcards",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for TopicError {}

/// One level of a parsed filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Level {
    /// A literal level, including the empty string (`a//b` has an empty
    /// middle level) and `$`-prefixed system levels.
    Literal(String),
    /// `+`
    SingleWildcard,
    /// `#`, only valid as the last level.
    MultiWildcard,
}

impl Level {
    fn parse(raw: &str) -> Result<Self, TopicError> {
        if raw.contains(|c: char| c.is_control()) {
            return Err(TopicError::ControlCharacter);
        }
        Ok(match raw {
            "+" => Self::SingleWildcard,
            "#" => Self::MultiWildcard,
            _ => Self::Literal(raw.to_string()),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::SingleWildcard => "+",
            Self::MultiWildcard => "#",
        }
    }
}

/// A parsed, validated topic filter (may contain wildcards).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    raw: String,
    levels: Vec<Level>,
}

impl Filter {
    /// Parses and validates a subscription filter.
    ///
    /// Fails with `NonTerminalMultiWildcard` if `#` is not the last level,
    /// `ControlCharacter` if any level contains one, or `TooManyLevels` if
    /// the level count exceeds the configured bound.
    pub fn parse(input: &str) -> Result<Self, TopicError> {
        if input.is_empty() {
            return Err(TopicError::Empty);
        }
        let raw_levels: Vec<&str> = input.split('/').collect();
        if raw_levels.len() > MAX_LEVELS {
            return Err(TopicError::TooManyLevels);
        }
        let mut levels = Vec::with_capacity(raw_levels.len());
        for (index, raw) in raw_levels.iter().enumerate() {
            let level = Level::parse(raw)?;
            if matches!(level, Level::MultiWildcard) && index != raw_levels.len() - 1 {
                return Err(TopicError::NonTerminalMultiWildcard);
            }
            levels.push(level);
        }
        Ok(Self {
            raw: input.to_string(),
            levels,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.levels
            .iter()
            .any(|l| matches!(l, Level::SingleWildcard | Level::MultiWildcard))
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self.levels.first(), Some(Level::Literal(s)) if s.starts_with('$'))
    }

    /// Returns the shared-subscription group name and the underlying filter
    /// for `$share/<group>/<filter>`, or `None` for a non-shared filter.
    #[must_use]
    pub fn shared_group(&self) -> Option<(&str, &str)> {
        let mut parts = self.raw.splitn(3, '/');
        if parts.next() != Some("$share") {
            return None;
        }
        let group = parts.next()?;
        let rest = parts.next()?;
        if group.is_empty() || rest.is_empty() {
            return None;
        }
        Some((group, rest))
    }

    /// Tests whether `topic` matches this filter per the MQTT 3.1.1/5.0
    /// rules: `+` matches exactly one level (including empty), `#` matches
    /// the remainder (including zero levels), and `$`-prefixed topics never
    /// match a filter whose first level is `+` or `#`.
    #[must_use]
    pub fn matches(&self, topic: &Topic) -> bool {
        if topic.is_system()
            && matches!(
                self.levels.first(),
                Some(Level::SingleWildcard | Level::MultiWildcard)
            )
        {
            return false;
        }

        let mut filter_levels = self.levels.iter();
        let mut topic_levels = topic.levels().iter();

        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some(Level::MultiWildcard), _) => return true,
                (Some(Level::SingleWildcard), Some(_)) => continue,
                (Some(Level::SingleWildcard), None) => return false,
                (Some(Level::Literal(f)), Some(t)) => {
                    if f != t {
                        return false;
                    }
                }
                (Some(Level::Literal(_)), None) => return false,
                (None, Some(_)) => return false,
                (None, None) => return true,
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A parsed, concrete (wildcard-free) topic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    raw: String,
    levels: Vec<String>,
}

impl Topic {
    pub fn parse(input: &str) -> Result<Self, TopicError> {
        if input.is_empty() {
            return Err(TopicError::Empty);
        }
        let levels: Vec<&str> = input.split('/').collect();
        if levels.len() > MAX_LEVELS {
            return Err(TopicError::TooManyLevels);
        }
        for level in &levels {
            if level.contains(|c: char| c.is_control()) {
                return Err(TopicError::ControlCharacter);
            }
            if level.contains('+') || level.contains('#') {
                return Err(TopicError::WildcardInConcreteTopic);
            }
        }
        Ok(Self {
            raw: input.to_string(),
            levels: levels.into_iter().map(str::to_string).collect(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.levels.first().is_some_and(|s| s.starts_with('$'))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(filter: &str, topic: &str) -> bool {
        Filter::parse(filter)
            .unwrap()
            .matches(&Topic::parse(topic).unwrap())
    }

    #[test]
    fn single_level_wildcard() {
        assert!(matches("a/+/c", "a/b/c"));
        assert!(!matches("a/+/c", "a/c"));
        assert!(matches("a/+/c", "a//c"));
    }

    #[test]
    fn multi_level_wildcard() {
        assert!(matches("a/#", "a"));
        assert!(matches("a/#", "a/b/c"));
    }

    #[test]
    fn dollar_topics_excluded_from_rooted_wildcards() {
        assert!(!matches("+/x", "$SYS/x"));
        assert!(!matches("#", "$SYS/brokers/1/uptime"));
    }

    #[test]
    fn non_terminal_hash_rejected() {
        assert!(Filter::parse("a/#/b").is_err());
    }

    #[test]
    fn control_character_rejected() {
        assert!(Filter::parse("a/\u{0001}/b").is_err());
    }

    #[test]
    fn exact_match() {
        assert!(matches("room/1/temp", "room/1/temp"));
        assert!(!matches("room/1/temp", "room/2/temp"));
    }

    #[test]
    fn shared_group_parsing() {
        let f = Filter::parse("$share/g/j/#").unwrap();
        assert_eq!(f.shared_group(), Some(("g", "j/#")));
        let f = Filter::parse("j/#").unwrap();
        assert_eq!(f.shared_group(), None);
    }

    #[test]
    fn wildcard_in_concrete_topic_rejected() {
        assert!(Topic::parse("a/+/b").is_err());
        assert!(Topic::parse("a/#").is_err());
    }

    #[test]
    fn total_function_never_panics_on_ragged_inputs() {
        assert!(!matches("a/b", "a"));
        assert!(matches("#", "a/b/c"));
        assert!(matches("a/b/#", "a/b"));
    }
}
