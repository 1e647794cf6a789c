//! Tests for the local cluster running real jobs


use std::sync::Mutex;

use crate::traits::OutputSink;

/// Sink that just remembers what it was given
#[derive(Default)]
pub(crate) struct CollectingSink {
    records: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub(crate) fn records(&self) -> Vec<String> {
        self.records.lock().unwrap().clone()
    }
}

impl OutputSink for CollectingSink {
    fn on_record(&self, record: String) {
        self.records.lock().unwrap().push(record);
    }
}
