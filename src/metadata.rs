// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test-case metadata: the immutable bag of properties a test program
//! reports for each of its cases when listed (`program -l`).

use crate::errors::MetadataParseError;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::time::Duration;

/// Default test-case timeout, used when a test program doesn't override
/// `timeout` in its metadata.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Which user a test case must run as.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequiredUser {
    Root,
    Unprivileged,
}

/// The immutable metadata bag associated with a test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Metadata {
    pub description: String,
    pub has_cleanup: bool,
    pub timeout: Duration,
    pub allowed_architectures: BTreeSet<String>,
    pub allowed_platforms: BTreeSet<String>,
    pub required_configs: BTreeSet<String>,
    pub required_files: BTreeSet<Utf8PathBuf>,
    pub required_programs: BTreeSet<String>,
    pub required_user: Option<RequiredUser>,
    pub user_metadata: IndexMap<String, String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            has_cleanup: false,
            timeout: DEFAULT_TIMEOUT,
            allowed_architectures: BTreeSet::new(),
            allowed_platforms: BTreeSet::new(),
            required_configs: BTreeSet::new(),
            required_files: BTreeSet::new(),
            required_programs: BTreeSet::new(),
            required_user: None,
            user_metadata: IndexMap::new(),
        }
    }
}

fn split_words(value: &str) -> BTreeSet<String> {
    value
        .split_whitespace()
        .map(str::to_owned)
        .filter(|s| !s.is_empty())
        .collect()
}

impl Metadata {
    /// Builds a `Metadata` from the raw `key: value` properties a test
    /// program emits for a single case when listed.
    ///
    /// Unknown keys are rejected unless prefixed `X-`, in which case they
    /// are stashed verbatim into `user_metadata`.
    pub fn from_properties<'a, I>(properties: I) -> Result<Self, MetadataParseError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut metadata = Metadata::default();

        for (key, value) in properties {
            match key {
                "descr" | "description" => metadata.description = value.to_owned(),
                "has.cleanup" => {
                    metadata.has_cleanup = parse_bool(key, value)?;
                }
                "timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| MetadataParseError::InvalidValue {
                            property: key.to_owned(),
                            value: value.to_owned(),
                        })?;
                    metadata.timeout = Duration::from_secs(secs);
                }
                "require.arch" => metadata.allowed_architectures = split_words(value),
                "require.machine" | "require.platform" => {
                    metadata.allowed_platforms = split_words(value);
                }
                "require.config" => metadata.required_configs = split_words(value),
                "require.files" => {
                    metadata.required_files = split_words(value).into_iter().map(Utf8PathBuf::from).collect();
                }
                "require.progs" => metadata.required_programs = split_words(value),
                "require.user" => {
                    metadata.required_user = Some(match value {
                        "root" => RequiredUser::Root,
                        "unprivileged" => RequiredUser::Unprivileged,
                        other => {
                            return Err(MetadataParseError::InvalidRequiredUser(other.to_owned()));
                        }
                    });
                }
                "require.memory" => {
                    // Advertised only; not enforced at skip time. See
                    // the open question preserved from the original
                    // implementation.
                }
                other if other.starts_with("X-") => {
                    metadata.user_metadata.insert(other.to_owned(), value.to_owned());
                }
                other => return Err(MetadataParseError::UnknownProperty(other.to_owned())),
            }
        }

        Ok(metadata)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, MetadataParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(MetadataParseError::InvalidValue {
            property: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let metadata = Metadata::default();
        assert_eq!(metadata.timeout, DEFAULT_TIMEOUT);
        assert!(!metadata.has_cleanup);
        assert!(metadata.allowed_architectures.is_empty());
    }

    #[test]
    fn parses_known_properties() {
        let metadata = Metadata::from_properties([
            ("descr", "does a thing"),
            ("has.cleanup", "true"),
            ("timeout", "60"),
            ("require.arch", "amd64 i386"),
            ("require.config", "unprivileged-user"),
        ])
        .unwrap();

        assert_eq!(metadata.description, "does a thing");
        assert!(metadata.has_cleanup);
        assert_eq!(metadata.timeout, Duration::from_secs(60));
        assert!(metadata.allowed_architectures.contains("amd64"));
        assert!(metadata.required_configs.contains("unprivileged-user"));
    }

    #[test]
    fn keeps_custom_x_prefixed_properties() {
        let metadata = Metadata::from_properties([("X-my-tag", "hello")]).unwrap();
        assert_eq!(metadata.user_metadata.get("X-my-tag").map(String::as_str), Some("hello"));
    }

    #[test]
    fn rejects_unknown_property() {
        let err = Metadata::from_properties([("bogus", "value")]).unwrap_err();
        assert_eq!(err, MetadataParseError::UnknownProperty("bogus".to_owned()));
    }

    #[test]
    fn rejects_invalid_required_user() {
        let err = Metadata::from_properties([("require.user", "nobody")]).unwrap_err();
        assert_eq!(err, MetadataParseError::InvalidRequiredUser("nobody".to_owned()));
    }
}
