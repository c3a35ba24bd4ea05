// JSON bodies of the REST gateway protocol. Byte fields travel as standard base64.
use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::cell::{Cell, Row};
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::core::filter::{CompareOp, Conjunction, FilterList, MissingPolicy, Predicate};
use crate::core::schema::{ColumnFamily, DEFAULT_MAX_VERSIONS, TableDescriptor, TableName};

pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> ApiResult<Bytes> {
    BASE64_STANDARD
        .decode(text)
        .map(Bytes::from)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("invalid base64 in gateway payload")
                .with_source(err)
        })
}

/// `family:qualifier` as the gateway spells a column.
pub fn column_spec(family: &[u8], qualifier: &[u8]) -> Vec<u8> {
    let mut column = Vec::with_capacity(family.len() + 1 + qualifier.len());
    column.extend_from_slice(family);
    column.push(b':');
    column.extend_from_slice(qualifier);
    column
}

pub fn split_column(column: &[u8]) -> ApiResult<(Bytes, Bytes)> {
    let at = column.iter().position(|byte| *byte == b':').ok_or_else(|| {
        Error::new(ErrorKind::Internal).with_message("gateway column lacks a family separator")
    })?;
    Ok((
        Bytes::copy_from_slice(&column[..at]),
        Bytes::copy_from_slice(&column[at + 1..]),
    ))
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct CellSetModel {
    #[serde(rename = "Row", default)]
    pub rows: Vec<RowModel>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct RowModel {
    pub key: String,
    #[serde(rename = "Cell", default)]
    pub cells: Vec<CellModel>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct CellModel {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(rename = "$")]
    pub value: String,
}

impl CellSetModel {
    pub fn single(row: &[u8], family: &[u8], qualifier: &[u8], value: &[u8]) -> Self {
        Self {
            rows: vec![RowModel {
                key: encode(row),
                cells: vec![CellModel {
                    column: encode(&column_spec(family, qualifier)),
                    timestamp: None,
                    value: encode(value),
                }],
            }],
        }
    }

    pub fn from_rows(rows: &[Row]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| RowModel {
                    key: encode(row.key()),
                    cells: row
                        .cells()
                        .iter()
                        .map(|cell| CellModel {
                            column: encode(&column_spec(&cell.family, &cell.qualifier)),
                            timestamp: Some(cell.timestamp),
                            value: encode(&cell.value),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn into_rows(self) -> ApiResult<Vec<Row>> {
        self.rows.into_iter().map(RowModel::into_row).collect()
    }
}

impl RowModel {
    pub fn into_row(self) -> ApiResult<Row> {
        let key = decode(&self.key)?;
        let cells = self
            .cells
            .into_iter()
            .map(|cell| -> ApiResult<Cell> {
                let (family, qualifier) = split_column(&decode(&cell.column)?)?;
                Ok(Cell {
                    row: key.clone(),
                    family,
                    qualifier,
                    value: decode(&cell.value)?,
                    timestamp: cell.timestamp.unwrap_or_default(),
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;
        Ok(Row::new(key, cells))
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct TableSchemaModel {
    pub name: String,
    #[serde(rename = "ColumnSchema", default)]
    pub columns: Vec<ColumnSchemaModel>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct ColumnSchemaModel {
    pub name: String,
    #[serde(rename = "VERSIONS", default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<String>,
}

impl TableSchemaModel {
    pub fn from_descriptor(descriptor: &TableDescriptor) -> Self {
        Self {
            name: descriptor.name().to_string(),
            columns: descriptor
                .families()
                .iter()
                .map(|family| ColumnSchemaModel {
                    name: family.name().to_string(),
                    versions: Some(family.max_versions().to_string()),
                })
                .collect(),
        }
    }

    pub fn into_descriptor(self) -> ApiResult<TableDescriptor> {
        let name = TableName::new(self.name)?;
        let families = self
            .columns
            .into_iter()
            .map(|column| -> ApiResult<ColumnFamily> {
                let versions = match column.versions.as_deref() {
                    Some(text) => text.parse::<u32>().map_err(|err| {
                        Error::new(ErrorKind::Usage)
                            .with_message("VERSIONS must be a number")
                            .with_source(err)
                    })?,
                    None => DEFAULT_MAX_VERSIONS,
                };
                Ok(ColumnFamily::new(column.name)?.with_max_versions(versions))
            })
            .collect::<ApiResult<Vec<_>>>()?;
        TableDescriptor::new(name, families)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannerModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_row: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_row: Option<String>,
    /// `FilterModel` serialized to a JSON string, as the gateway expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterModel {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_missing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<ComparatorModel>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct ComparatorModel {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

const FILTER_LIST: &str = "FilterList";
const SINGLE_COLUMN_VALUE: &str = "SingleColumnValueFilter";
const BINARY_COMPARATOR: &str = "BinaryComparator";

fn op_name(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Less => "LESS",
        CompareOp::LessOrEqual => "LESS_OR_EQUAL",
        CompareOp::Equal => "EQUAL",
        CompareOp::NotEqual => "NOT_EQUAL",
        CompareOp::GreaterOrEqual => "GREATER_OR_EQUAL",
        CompareOp::Greater => "GREATER",
    }
}

fn parse_op(name: &str) -> ApiResult<CompareOp> {
    Ok(match name {
        "LESS" => CompareOp::Less,
        "LESS_OR_EQUAL" => CompareOp::LessOrEqual,
        "EQUAL" => CompareOp::Equal,
        "NOT_EQUAL" => CompareOp::NotEqual,
        "GREATER_OR_EQUAL" => CompareOp::GreaterOrEqual,
        "GREATER" => CompareOp::Greater,
        other => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported compare op `{other}`")));
        }
    })
}

fn required<'a>(field: &'a Option<String>, name: &str) -> ApiResult<&'a str> {
    field.as_deref().ok_or_else(|| {
        Error::new(ErrorKind::Usage).with_message(format!("filter is missing `{name}`"))
    })
}

impl FilterModel {
    pub fn from_filter_list(list: &FilterList) -> Self {
        let op = match list.conjunction() {
            Conjunction::All => "MUST_PASS_ALL",
            Conjunction::Any => "MUST_PASS_ONE",
        };
        Self {
            kind: FILTER_LIST.to_string(),
            op: Some(op.to_string()),
            filters: list.predicates().iter().map(Self::from_predicate).collect(),
            family: None,
            qualifier: None,
            if_missing: None,
            latest_version: None,
            comparator: None,
        }
    }

    fn from_predicate(predicate: &Predicate) -> Self {
        Self {
            kind: SINGLE_COLUMN_VALUE.to_string(),
            op: Some(op_name(predicate.op).to_string()),
            filters: Vec::new(),
            family: Some(encode(&predicate.family)),
            qualifier: Some(encode(&predicate.qualifier)),
            if_missing: Some(predicate.missing == MissingPolicy::FilterRow),
            latest_version: Some(true),
            comparator: Some(ComparatorModel {
                kind: BINARY_COMPARATOR.to_string(),
                value: encode(&predicate.value),
            }),
        }
    }

    /// Accepts the shapes `from_filter_list` produces; nested lists are rejected.
    pub fn into_filter_list(self) -> ApiResult<FilterList> {
        match self.kind.as_str() {
            FILTER_LIST => {
                let conjunction = match self.op.as_deref() {
                    Some("MUST_PASS_ALL") | None => Conjunction::All,
                    Some("MUST_PASS_ONE") => Conjunction::Any,
                    Some(other) => {
                        return Err(Error::new(ErrorKind::Usage)
                            .with_message(format!("unsupported filter list op `{other}`")));
                    }
                };
                let predicates = self
                    .filters
                    .iter()
                    .map(FilterModel::to_predicate)
                    .collect::<ApiResult<Vec<_>>>()?;
                Ok(FilterList::new(conjunction, predicates))
            }
            SINGLE_COLUMN_VALUE => Ok(FilterList::all(vec![self.to_predicate()?])),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported filter type `{other}`"))),
        }
    }

    fn to_predicate(&self) -> ApiResult<Predicate> {
        if self.kind != SINGLE_COLUMN_VALUE {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported nested filter `{}`", self.kind)));
        }
        let comparator = self.comparator.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("filter is missing `comparator`")
        })?;
        if comparator.kind != BINARY_COMPARATOR {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported comparator `{}`", comparator.kind)));
        }
        let missing = if self.if_missing.unwrap_or(false) {
            MissingPolicy::FilterRow
        } else {
            MissingPolicy::PassRow
        };
        Ok(Predicate::new(
            decode(required(&self.family, "family")?)?,
            decode(required(&self.qualifier, "qualifier")?)?,
            parse_op(required(&self.op, "op")?)?,
            decode(&comparator.value)?,
        )
        .with_missing(missing))
    }
}
