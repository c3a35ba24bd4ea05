//! Purpose: Destinations for (row, qualifier, value) triples produced by reads and scans.
//! Exports: `CellSink`, `CellTriple`, `LineSink`.
//! Role: Keeps the facade free of presentation; callers choose where cells go.
use std::io::Write;

use bstr::ByteSlice;
use bytes::Bytes;

use crate::core::error::{ApiResult, Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CellTriple {
    pub row: Bytes,
    pub qualifier: Bytes,
    pub value: Bytes,
}

pub trait CellSink {
    fn accept(&mut self, row: &Bytes, qualifier: &Bytes, value: &Bytes) -> ApiResult<()>;
}

impl CellSink for Vec<CellTriple> {
    fn accept(&mut self, row: &Bytes, qualifier: &Bytes, value: &Bytes) -> ApiResult<()> {
        self.push(CellTriple {
            row: row.clone(),
            qualifier: qualifier.clone(),
            value: value.clone(),
        });
        Ok(())
    }
}

impl<S: CellSink + ?Sized> CellSink for &mut S {
    fn accept(&mut self, row: &Bytes, qualifier: &Bytes, value: &Bytes) -> ApiResult<()> {
        (**self).accept(row, qualifier, value)
    }
}

/// Writes one `row-qualifier:value` line per cell.
pub struct LineSink<W: Write> {
    writer: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CellSink for LineSink<W> {
    fn accept(&mut self, row: &Bytes, qualifier: &Bytes, value: &Bytes) -> ApiResult<()> {
        writeln!(
            self.writer,
            "{}-{}:{}",
            row.as_bstr(),
            qualifier.as_bstr(),
            value.as_bstr()
        )
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to write cell to sink")
                .with_source(err)
        })
    }
}
