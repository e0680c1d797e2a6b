//! Legacy inline property encoding.

use crate::catalog::PropertyDef;
use crate::error::{SchemaError, SchemaResult};

/// Parsed form of `[+]<Tag>[!][(<format>)][:<default>]`.
///
/// `+` marks the property not-null and `!` marks it unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPropertySpec {
    /// Type tag.
    pub tag: String,
    /// Required.
    pub not_null: bool,
    /// Unique.
    pub unique: bool,
    /// Format between the parentheses.
    pub format: Option<String>,
    /// Default value after the colon.
    pub default_value: Option<String>,
}

impl RawPropertySpec {
    /// Parse a raw encoding; `owner` and `name` only label errors.
    pub fn parse(owner: &str, name: &str, raw: &str) -> SchemaResult<Self> {
        let mut rest = raw.trim();

        let not_null = rest.starts_with('+');
        if not_null {
            rest = &rest[1..];
        }

        let tag_end = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if tag.is_empty() {
            return Err(SchemaError::invalid_property(
                owner,
                name,
                format!("missing type tag in '{raw}'"),
            ));
        }
        rest = &rest[tag_end..];

        let unique = rest.starts_with('!');
        if unique {
            rest = &rest[1..];
        }

        let mut format = None;
        if rest.starts_with('(') {
            let close = rest.rfind(')').ok_or_else(|| {
                SchemaError::invalid_property(owner, name, format!("unbalanced format in '{raw}'"))
            })?;
            format = Some(rest[1..close].to_string());
            rest = &rest[close + 1..];
        }

        let default_value = match rest.strip_prefix(':') {
            Some(value) => Some(value.to_string()),
            None if rest.trim().is_empty() => None,
            None => {
                return Err(SchemaError::invalid_property(
                    owner,
                    name,
                    format!("unexpected '{rest}' in '{raw}'"),
                ))
            }
        };

        Ok(Self {
            tag: tag.to_string(),
            not_null,
            unique,
            format,
            default_value,
        })
    }

    /// First-class property definition for `owner`.
    pub fn into_property(self, owner: &str, name: &str) -> PropertyDef {
        let mut prop = PropertyDef::new(name, self.tag).owned_by(owner);
        prop.not_null = self.not_null;
        prop.unique = self.unique;
        prop.format = self.format;
        prop.default_value = self.default_value;
        prop
    }
}
