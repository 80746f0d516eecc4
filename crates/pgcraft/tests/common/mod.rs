//! A recording stub of the driver boundary.

#![allow(dead_code)]

use pgcraft::{ConnectionSource, DriverError, GenericClient, Record};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every statement it is given and answers from a script.
///
/// Unscripted statements succeed with no rows. Clones (and reserved
/// connections) share the same log and script.
#[derive(Clone, Default)]
pub struct RecordingClient {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    statements: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<(Option<String>, Result<Vec<Record>, DriverError>)>>,
    reserve_error: Mutex<Option<DriverError>>,
    reservations: AtomicUsize,
    discards: AtomicUsize,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next statement with `rows` (a JSON array of objects).
    pub fn returns(self, rows: Value) -> Self {
        self.push(None, Ok(records(rows)));
        self
    }

    /// Fail the next statement with `err`.
    pub fn fails(self, err: DriverError) -> Self {
        self.push(None, Err(err));
        self
    }

    /// Fail the next statement equal to `sql`; others pass through.
    pub fn fails_on(self, sql: &str, err: DriverError) -> Self {
        self.push(Some(sql.to_string()), Err(err));
        self
    }

    pub fn reserve_fails(self, err: DriverError) -> Self {
        *self.inner.reserve_error.lock().unwrap() = Some(err);
        self
    }

    fn push(&self, sql: Option<String>, response: Result<Vec<Record>, DriverError>) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back((sql, response));
    }

    pub fn statements(&self) -> Vec<String> {
        self.inner.statements.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.inner.statements.lock().unwrap().len()
    }

    pub fn reservations(&self) -> usize {
        self.inner.reservations.load(Ordering::SeqCst)
    }

    /// Reserved connections given up instead of released.
    pub fn discards(&self) -> usize {
        self.inner.discards.load(Ordering::SeqCst)
    }

    fn answer(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        self.inner.statements.lock().unwrap().push(sql.to_string());
        let mut responses = self.inner.responses.lock().unwrap();
        match responses.front() {
            Some((Some(expected), _)) if expected != sql => Ok(Vec::new()),
            Some(_) => responses.pop_front().map_or(Ok(Vec::new()), |(_, r)| r),
            None => Ok(Vec::new()),
        }
    }
}

impl GenericClient for RecordingClient {
    async fn query(&self, sql: &str) -> Result<Vec<Record>, DriverError> {
        self.answer(sql)
    }
}

impl ConnectionSource for RecordingClient {
    type Reserved = RecordingClient;

    async fn reserve(&self) -> Result<Self::Reserved, DriverError> {
        if let Some(err) = self.inner.reserve_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.inner.reservations.fetch_add(1, Ordering::SeqCst);
        Ok(self.clone())
    }

    fn discard(conn: Self::Reserved) {
        conn.inner.discards.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn records(rows: Value) -> Vec<Record> {
    match rows {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect(),
        other => panic!("rows must be an array, got {other}"),
    }
}
