use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref ID_PATTERN: Regex = Regex::new(
        r"^(?:(?P<base>https?://\S+?)/)?(?P<type>[A-Z][A-Za-z]*)(?:/(?P<id>[A-Za-z0-9\-.]{1,64})(?:/_history/(?P<version>[A-Za-z0-9\-.]{1,64}))?)?$"
    )
    .expect("id pattern is valid");
}

/// Resource identifier: `[base/]Type[/id[/_history/version]]`.
///
/// An id with only a resource type names the whole type, e.g. for
/// type-level operations without a body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdType {
    base_url: Option<String>,
    resource_type: String,
    id_part: Option<String>,
    version: Option<String>,
}

impl IdType {
    pub fn new(resource_type: impl Into<String>, id_part: impl Into<String>) -> Self {
        Self {
            base_url: None,
            resource_type: resource_type.into(),
            id_part: Some(id_part.into()),
            version: None,
        }
    }

    pub fn type_only(resource_type: impl Into<String>) -> Self {
        Self {
            base_url: None,
            resource_type: resource_type.into(),
            id_part: None,
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn parse(value: &str) -> Result<Self> {
        let captures = ID_PATTERN
            .captures(value.trim())
            .ok_or_else(|| Error::InvalidRequest(format!("Invalid resource id: {}", value)))?;

        Ok(Self {
            base_url: captures.name("base").map(|m| m.as_str().to_string()),
            resource_type: captures["type"].to_string(),
            id_part: captures.name("id").map(|m| m.as_str().to_string()),
            version: captures.name("version").map(|m| m.as_str().to_string()),
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id_part(&self) -> Option<&str> {
        self.id_part.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_type_only(&self) -> bool {
        self.id_part.is_none()
    }

    /// `Type/id` without base or version.
    pub fn to_unqualified_versionless(&self) -> IdType {
        Self {
            base_url: None,
            resource_type: self.resource_type.clone(),
            id_part: self.id_part.clone(),
            version: None,
        }
    }
}

impl FromStr for IdType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        IdType::parse(value)
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(base) = &self.base_url {
            write!(f, "{}/", base)?;
        }
        f.write_str(&self.resource_type)?;
        if let Some(id) = &self.id_part {
            write!(f, "/{}", id)?;
            if let Some(version) = &self.version {
                write!(f, "/_history/{}", version)?;
            }
        }
        Ok(())
    }
}
