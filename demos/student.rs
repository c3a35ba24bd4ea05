//! Purpose: Walk the `student` table through create, put, read, scan, delete, and drop.
//! Role: Composition root; picks a connector, builds one `StoreHandle`, shuts it down at exit.
//! Invariants: With `WIDECOLUMN_QUORUM` set this talks to a REST gateway; otherwise it
//! runs against the in-process store.

use std::io;

use widecolumn::api::{
    LineSink, MemoryStore, Outcome, RestConnector, ScanSpec, StoreConfig, StoreHandle, TableClient,
};
use widecolumn::logging::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let handle = if std::env::var_os("WIDECOLUMN_QUORUM").is_some() {
        StoreHandle::new(RestConnector::new(), StoreConfig::from_env()?)
    } else {
        StoreHandle::new(MemoryStore::new(), StoreConfig::default())
    };
    let client = TableClient::new(handle.clone());
    let result = run(&client);
    handle.shutdown();
    result
}

fn run(client: &TableClient) -> Result<(), Box<dyn std::error::Error>> {
    if client.create_table("student", &["info"])? == Outcome::AlreadyExists {
        println!("table student already exists");
    }

    for (row, name, gender, age) in [
        ("1001", "Nick", "girl", "18"),
        ("1002", "Tom", "boy", "18"),
        ("1003", "Lucy", "girl", "20"),
    ] {
        for (column, value) in [("name", name), ("gender", gender), ("age", age)] {
            report("put", client.put_cell("student", row, "info", column, value)?);
        }
    }

    let mut out = LineSink::new(io::stdout());

    println!("-- get 1001");
    report("get", client.get_row_into("student", "1001", &mut out)?);

    println!("-- scan gender=girl, age=18");
    match client.scan_with_predicates("student", "info", &[("gender", "girl"), ("age", "18")])? {
        Outcome::Applied(scan) => {
            let rows = scan.drain_into(&mut out)?;
            println!("{rows} row(s)");
        }
        other => report("scan", other.map(|_| ())),
    }

    report("delete cell", client.delete_cell("student", "1001", "info", "age")?);
    report("delete row", client.delete_row("student", "1002")?);

    println!("-- scan all after deletes");
    report("scan", client.scan_into("student", ScanSpec::new(), &mut out)?);

    report("drop", client.drop_table("student")?);
    Ok(())
}

fn report<T>(what: &str, outcome: Outcome<T>) {
    match outcome {
        Outcome::Applied(_) => {}
        Outcome::NotFound => println!("{what}: table student not found"),
        Outcome::AlreadyExists => println!("{what}: table student already exists"),
    }
}
