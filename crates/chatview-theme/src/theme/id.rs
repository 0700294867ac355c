use std::fmt;
use std::str::FromStr;

use chatview_common::ThemeError;

/// Theme identifier of the form `<type>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThemeId {
    theme_type: String,
    name: String,
}

impl ThemeId {
    pub fn parse(id: &str) -> Result<Self, ThemeError> {
        let invalid = || ThemeError::InvalidId(id.to_string());
        let (theme_type, name) = id.split_once('/').ok_or_else(invalid)?;
        if !is_segment(theme_type) || !is_segment(name) {
            return Err(invalid());
        }
        Ok(Self {
            theme_type: theme_type.to_string(),
            name: name.to_string(),
        })
    }

    /// The part before the slash; selects the adapter.
    pub fn theme_type(&self) -> &str {
        &self.theme_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.theme_type, self.name)
    }
}

impl FromStr for ThemeId {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
