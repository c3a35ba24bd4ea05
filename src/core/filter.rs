// Column-value predicates, filter lists, and the scan request handed to drivers.
use std::cmp::Ordering;

use bytes::Bytes;

use crate::core::cell::Row;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
}

impl CompareOp {
    /// `ordering` is the stored value compared against the expected value.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
            CompareOp::Greater => ordering == Ordering::Greater,
        }
    }
}

/// What a predicate decides for a row that lacks the compared column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MissingPolicy {
    #[default]
    FilterRow,
    PassRow,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Predicate {
    pub family: Bytes,
    pub qualifier: Bytes,
    pub op: CompareOp,
    pub value: Bytes,
    pub missing: MissingPolicy,
}

impl Predicate {
    pub fn new(
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        op: CompareOp,
        value: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            family: Bytes::copy_from_slice(family.as_ref()),
            qualifier: Bytes::copy_from_slice(qualifier.as_ref()),
            op,
            value: Bytes::copy_from_slice(value.as_ref()),
            missing: MissingPolicy::default(),
        }
    }

    pub fn equals(family: impl AsRef<[u8]>, qualifier: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Self {
        Self::new(family, qualifier, CompareOp::Equal, value)
    }

    pub fn with_missing(mut self, missing: MissingPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Compares the latest version of the column; values compare as raw bytes.
    pub fn matches(&self, row: &Row) -> bool {
        match row.latest(&self.family, &self.qualifier) {
            Some(cell) => self.op.holds(cell.value.as_ref().cmp(self.value.as_ref())),
            None => self.missing == MissingPolicy::PassRow,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Conjunction {
    #[default]
    All,
    Any,
}

/// An empty list places no constraint on rows, whatever the conjunction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterList {
    conjunction: Conjunction,
    predicates: Vec<Predicate>,
}

impl FilterList {
    pub fn new(conjunction: Conjunction, predicates: Vec<Predicate>) -> Self {
        Self {
            conjunction,
            predicates,
        }
    }

    pub fn all(predicates: Vec<Predicate>) -> Self {
        Self::new(Conjunction::All, predicates)
    }

    pub fn any(predicates: Vec<Predicate>) -> Self {
        Self::new(Conjunction::Any, predicates)
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        if self.predicates.is_empty() {
            return true;
        }
        match self.conjunction {
            Conjunction::All => self.predicates.iter().all(|predicate| predicate.matches(row)),
            Conjunction::Any => self.predicates.iter().any(|predicate| predicate.matches(row)),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanSpec {
    pub start_row: Option<Bytes>,
    pub stop_row: Option<Bytes>,
    pub filter: FilterList,
    pub batch: Option<usize>,
}

impl ScanSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterList) -> Self {
        self.filter = filter;
        self
    }

    /// Inclusive lower bound.
    pub fn with_start_row(mut self, row: impl AsRef<[u8]>) -> Self {
        self.start_row = Some(Bytes::copy_from_slice(row.as_ref()));
        self
    }

    /// Exclusive upper bound.
    pub fn with_stop_row(mut self, row: impl AsRef<[u8]>) -> Self {
        self.stop_row = Some(Bytes::copy_from_slice(row.as_ref()));
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch.max(1));
        self
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        if let Some(start) = &self.start_row {
            if key < start.as_ref() {
                return false;
            }
        }
        if let Some(stop) = &self.stop_row {
            if key >= stop.as_ref() {
                return false;
            }
        }
        true
    }

    pub fn is_past_stop(&self, key: &[u8]) -> bool {
        self.stop_row
            .as_ref()
            .is_some_and(|stop| key >= stop.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::{CompareOp, FilterList, MissingPolicy, Predicate, ScanSpec};
    use crate::core::cell::{Cell, Row};
    use bytes::Bytes;

    fn row(key: &str, columns: &[(&str, &str)]) -> Row {
        let cells = columns
            .iter()
            .map(|(qualifier, value)| Cell {
                row: Bytes::copy_from_slice(key.as_bytes()),
                family: Bytes::from_static(b"info"),
                qualifier: Bytes::copy_from_slice(qualifier.as_bytes()),
                value: Bytes::copy_from_slice(value.as_bytes()),
                timestamp: 1,
            })
            .collect();
        Row::new(Bytes::copy_from_slice(key.as_bytes()), cells)
    }

    #[test]
    fn missing_column_follows_policy() {
        let r = row("r4", &[("age", "18")]);
        let strict = Predicate::equals("info", "gender", "girl");
        assert!(!strict.matches(&r));

        let lenient = strict.with_missing(MissingPolicy::PassRow);
        assert!(lenient.matches(&r));
    }

    #[test]
    fn compare_ops_use_byte_order() {
        let r = row("r1", &[("age", "18")]);
        let check = |op, value: &str| Predicate::new("info", "age", op, value).matches(&r);
        assert!(check(CompareOp::Less, "19"));
        assert!(!check(CompareOp::Less, "18"));
        assert!(check(CompareOp::LessOrEqual, "18"));
        assert!(check(CompareOp::NotEqual, "20"));
        assert!(check(CompareOp::GreaterOrEqual, "18"));
        assert!(check(CompareOp::Greater, "100"));
    }

    #[test]
    fn conjunction_combines_predicates() {
        let r = row("r2", &[("age", "18"), ("gender", "boy")]);
        let age = Predicate::equals("info", "age", "18");
        let girl = Predicate::equals("info", "gender", "girl");

        assert!(!FilterList::all(vec![age.clone(), girl.clone()]).matches(&r));
        assert!(FilterList::any(vec![age, girl]).matches(&r));
        assert!(FilterList::any(Vec::new()).matches(&r));
    }

    #[test]
    fn scan_bounds_are_half_open() {
        let spec = ScanSpec::new().with_start_row("r2").with_stop_row("r4");
        assert!(!spec.contains_key(b"r1"));
        assert!(spec.contains_key(b"r2"));
        assert!(spec.contains_key(b"r3"));
        assert!(!spec.contains_key(b"r4"));
        assert!(spec.is_past_stop(b"r5"));
        assert!(!ScanSpec::new().is_past_stop(b"zzz"));
    }
}
