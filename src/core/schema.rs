// Table names and table descriptors with the store's naming rules.
use std::collections::BTreeSet;
use std::fmt;

use crate::core::error::{ApiResult, Error, ErrorKind};

pub const DEFAULT_MAX_VERSIONS: u32 = 1;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TableName(String);

impl TableName {
    /// Accepts `qualifier` or `namespace:qualifier`, each part drawn from `[A-Za-z0-9_.-]`.
    pub fn new(name: impl Into<String>) -> ApiResult<Self> {
        let name = name.into();
        let (namespace, qualifier) = match name.split_once(':') {
            Some((namespace, qualifier)) => (Some(namespace), qualifier),
            None => (None, name.as_str()),
        };
        if let Some(namespace) = namespace {
            validate_name_part(namespace, &name)?;
        }
        validate_name_part(qualifier, &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_name_part(part: &str, full: &str) -> ApiResult<()> {
    if part.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("table name must not be empty")
            .with_table(full));
    }
    if part.starts_with('.') || part.starts_with('-') {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("table name must not start with '.' or '-'")
            .with_table(full));
    }
    let legal = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if !part.chars().all(legal) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("table name may only contain [A-Za-z0-9_.-]")
            .with_table(full));
    }
    Ok(())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnFamily {
    name: String,
    max_versions: u32,
}

impl ColumnFamily {
    pub fn new(name: impl Into<String>) -> ApiResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("column family name must not be empty"));
        }
        if name.contains(':') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("column family `{name}` must not contain ':'")));
        }
        if name.starts_with('.') || name.chars().any(char::is_control) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("column family `{name}` is not a legal name")));
        }
        Ok(Self {
            name,
            max_versions: DEFAULT_MAX_VERSIONS,
        })
    }

    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = max_versions.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_versions(&self) -> u32 {
        self.max_versions
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableDescriptor {
    name: TableName,
    families: Vec<ColumnFamily>,
}

impl TableDescriptor {
    /// Family names must be non-empty and distinct; declaration order is kept here
    /// but stores are free to reorder.
    pub fn new(name: TableName, families: Vec<ColumnFamily>) -> ApiResult<Self> {
        if families.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("a table needs at least one column family")
                .with_table(name.as_str()));
        }
        let mut seen = BTreeSet::new();
        for family in &families {
            if !seen.insert(family.name()) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("duplicate column family `{}`", family.name()))
                    .with_table(name.as_str()));
            }
        }
        Ok(Self { name, families })
    }

    pub fn from_names(name: &str, families: &[&str]) -> ApiResult<Self> {
        let name = TableName::new(name)?;
        let families = families
            .iter()
            .map(|family| ColumnFamily::new(*family))
            .collect::<ApiResult<Vec<_>>>()
            .map_err(|err| err.or_table(name.as_str()))?;
        Self::new(name, families)
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    pub fn families(&self) -> &[ColumnFamily] {
        &self.families
    }

    pub fn family(&self, name: &[u8]) -> Option<&ColumnFamily> {
        self.families
            .iter()
            .find(|family| family.name().as_bytes() == name)
    }
}
