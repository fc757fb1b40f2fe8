// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sample data, sources and stages for testing pipelines.
use futures_util::{Stream, StreamExt, stream};
use serde_json::{Value, json};

use crate::error::StageError;
use crate::record::{Mode, Record};
use crate::source::Source;
use crate::stage::{self, Stage};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

const LOG: [&str; 5] = [
    "Nov 23 11:27:43.436 [notice] Tor v0.2.8.9 running on Darwin with Libevent 2.0.22-stable, OpenSSL 1.0.2j and Zlib 1.2.8.\n",
    "Nov 23 11:27:43.437 [notice] Tor can't help you if you use it wrong! Learn how to be safe at https://www.torproject.org/download/download#warning\n",
    "Nov 23 11:27:43.438 [notice] Configuration file \"/usr/local/etc/tor/torrc\" not present, using reasonable defaults.\n",
    "Nov 23 11:27:43.446 [warn] Warning from libevent: kq_init: detected broken kqueue; not using.: Invalid argument\n",
    "Nov 23 11:27:43.446 [notice] Opening Socks listener on 127.0.0.1:9050\n",
];

const CHUNKS: [&str; 2] = ["newline\nseparated\nwords", "with\nno\nspaces"];

pub fn records(texts: &[&str]) -> Vec<Record> {
    texts.iter().map(|text| Record::from(*text)).collect()
}

/// Five log lines of which only the fourth one is a warning.
pub fn log_lines() -> Vec<Record> {
    records(&LOG)
}

pub fn sample_log() -> Source {
    Source::from_records(Mode::Raw, log_lines())
}

/// Two raw chunks with line breaks inside.
pub fn sample_chunks() -> Source {
    Source::from_records(Mode::Raw, records(&CHUNKS))
}

/// Structured entries typed "warning", "notice" and "warning".
pub fn entries() -> Vec<Value> {
    vec![
        json!({ "type": "warning", "message": "something went wrong" }),
        json!({ "type": "notice", "message": "connecting" }),
        json!({ "type": "warning", "message": "connection failed" }),
    ]
}

pub fn sample_entries() -> Source {
    Source::structured(stream::iter(entries()))
}

pub fn record_stream(records: Vec<Record>) -> impl Stream<Item = Result<Record, StageError>> {
    stream::iter(records).map(Ok::<Record, StageError>)
}

pub fn capitalize() -> impl Stage + Send + 'static {
    stage::map(Mode::Raw, |record| {
        Record::from(record.to_text().to_uppercase())
    })
}

pub fn remove_char(removed: char) -> impl Stage + Send + 'static {
    stage::map(Mode::Raw, move |record| {
        Record::from(record.to_text().replace(removed, ""))
    })
}

/// Merges the fields of `data` into every record of type "warning".
pub fn append_to_warnings(data: Value) -> impl Stage + Send + 'static {
    stage::map(Mode::Structured, move |record| match record {
        Record::Structured(Value::Object(mut entry))
            if entry.get("type").is_some_and(|kind| kind == "warning") =>
        {
            if let Value::Object(fields) = &data {
                entry.extend(fields.clone());
            }
            Record::Structured(Value::Object(entry))
        }
        record => record,
    })
}
