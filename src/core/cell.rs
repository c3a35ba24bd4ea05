// Cells, rows, and the mutation shapes sent to drivers.
use bytes::Bytes;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cell {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
    pub timestamp: u64,
}

/// Cells ordered by (family, qualifier), holding only the latest version of each column.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Row {
    key: Bytes,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(key: impl Into<Bytes>, mut cells: Vec<Cell>) -> Self {
        cells.sort_by(|a, b| (&a.family, &a.qualifier).cmp(&(&b.family, &b.qualifier)));
        Self {
            key: key.into(),
            cells,
        }
    }

    pub fn empty(key: impl Into<Bytes>) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn latest(&self, family: &[u8], qualifier: &[u8]) -> Option<&Cell> {
        self.cells
            .iter()
            .filter(|cell| cell.family == family && cell.qualifier == qualifier)
            .max_by_key(|cell| cell.timestamp)
    }

    /// (qualifier, value) pairs in row order.
    pub fn pairs(&self) -> Vec<(Bytes, Bytes)> {
        self.cells
            .iter()
            .map(|cell| (cell.qualifier.clone(), cell.value.clone()))
            .collect()
    }

    pub(crate) fn extend(&mut self, cells: Vec<Cell>) {
        self.cells.extend(cells);
        self.cells
            .sort_by(|a, b| (&a.family, &a.qualifier).cmp(&(&b.family, &b.qualifier)));
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PutCell {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeleteScope {
    /// Every family, column, and version under the row key.
    Row,
    /// Every column and version under one family.
    Family(Bytes),
    /// Every version of one column.
    Column { family: Bytes, qualifier: Bytes },
    /// The latest version of one column.
    LatestVersion { family: Bytes, qualifier: Bytes },
    /// The one version of a column written at `timestamp`.
    Version {
        family: Bytes,
        qualifier: Bytes,
        timestamp: u64,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteCells {
    pub row: Bytes,
    pub scope: DeleteScope,
}
