//! An in-memory, in-process SQL engine used to exercise and test the core
//! without a real database (spec.md §1, §4.2: concrete engines are external
//! collaborators, but the core needs at least one real implementation of
//! the [`Driver`]/[`DriverHandle`] contract to be testable at all).
//!
//! This is a toy interpreter, not a SQL parser: it recognizes exactly the
//! handful of statement shapes the core's own test scenarios need,
//! `CREATE TABLE`, positional-parameter `INSERT`, `SELECT ... [ORDER BY
//! ...]`, and `SELECT COUNT(*)`, and nothing else. Anything it doesn't
//! recognize is a [`Error::driver`] failure, the same as a real engine
//! rejecting malformed SQL.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::driver::{Driver, DriverHandle, RowSink};
use crate::error::{Error, Result};
use crate::row::RowRef;
use crate::value::{Value, ValueRef};

#[derive(Clone, Default)]
struct Table {
    columns: Vec<Arc<str>>,
    rows: Vec<Vec<Value>>,
}

/// The mock engine. Every [`MockDriver::connect`] call hands back a handle
/// with its own private set of tables, no cross-connection shared state,
/// matching how a real file engine's `":memory:"` database behaves per
/// connection.
#[derive(Debug)]
pub struct MockDriver {
    fail_liveness_remaining: Arc<AtomicU32>,
    fail_connects_remaining: Arc<AtomicU32>,
}

impl MockDriver {
    pub fn new() -> Self {
        MockDriver {
            fail_liveness_remaining: Arc::new(AtomicU32::new(0)),
            fail_connects_remaining: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Builds a driver whose handles fail their next `n` liveness checks
    /// before reporting healthy again, for exercising the auto-reconnect
    /// contract (spec.md §4.3).
    pub fn with_liveness_failures(n: u32) -> Self {
        MockDriver {
            fail_liveness_remaining: Arc::new(AtomicU32::new(n)),
            fail_connects_remaining: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Builds a driver whose next `n` `connect` calls fail, for exercising
    /// the pool constructor's rollback-on-partial-failure path
    /// (spec.md §4.5).
    pub fn with_connect_failures(n: u32) -> Self {
        MockDriver {
            fail_liveness_remaining: Arc::new(AtomicU32::new(0)),
            fail_connects_remaining: Arc::new(AtomicU32::new(n)),
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(&self, _conninfo: &str) -> Result<Box<dyn DriverHandle>> {
        let remaining = self.fail_connects_remaining.load(AtomicOrdering::Acquire);
        if remaining > 0 {
            self.fail_connects_remaining.store(remaining - 1, AtomicOrdering::Release);
            return Err(Error::driver("connect failed (injected)"));
        }
        Ok(Box::new(MockHandle {
            tables: HashMap::new(),
            snapshot: None,
            fail_liveness_remaining: self.fail_liveness_remaining.clone(),
            last_error: None,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockHandle {
    tables: HashMap<String, Table>,
    snapshot: Option<HashMap<String, Table>>,
    fail_liveness_remaining: Arc<AtomicU32>,
    last_error: Option<String>,
}

impl MockHandle {
    fn fail(&mut self, message: impl Into<String>) -> Error {
        let message = message.into();
        self.last_error = Some(message.clone());
        Error::driver(message)
    }

    fn create_table(&mut self, sql: &str) -> Result<u64> {
        let open = sql.find('(').ok_or_else(|| Error::driver("malformed CREATE TABLE"))?;
        let close = sql.rfind(')').ok_or_else(|| Error::driver("malformed CREATE TABLE"))?;
        let name = sql["CREATE TABLE".len()..open].trim().to_owned();
        if name.is_empty() {
            return Err(Error::driver("CREATE TABLE missing a table name"));
        }
        let columns: Vec<Arc<str>> = sql[open + 1..close]
            .split(',')
            .map(|col| {
                let col = col.trim();
                let ident = col.split_whitespace().next().unwrap_or(col);
                Arc::<str>::from(ident)
            })
            .collect();
        self.tables.insert(name, Table { columns, rows: Vec::new() });
        Ok(0)
    }

    fn insert(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let values_kw = sql
            .to_ascii_uppercase()
            .find("VALUES")
            .ok_or_else(|| Error::driver("INSERT missing VALUES"))?;
        let name = sql["INSERT INTO".len()..values_kw].trim().to_owned();
        let table = self
            .tables
            .get_mut(&name)
            .ok_or_else(|| Error::driver(format!("no such table: {name}")))?;

        let open = sql[values_kw..]
            .find('(')
            .map(|i| i + values_kw)
            .ok_or_else(|| Error::driver("malformed INSERT VALUES"))?;
        let close = sql.rfind(')').ok_or_else(|| Error::driver("malformed INSERT VALUES"))?;

        let mut row = Vec::with_capacity(table.columns.len());
        for placeholder in sql[open + 1..close].split(',') {
            let placeholder = placeholder.trim();
            let value = if let Some(index) = placeholder.strip_prefix('$') {
                let index: usize = index
                    .parse()
                    .map_err(|_| Error::driver(format!("bad placeholder: {placeholder}")))?;
                params
                    .get(index - 1)
                    .cloned()
                    .ok_or_else(|| Error::Parameter(format!("missing bind for {placeholder}")))?
            } else if placeholder.eq_ignore_ascii_case("null") {
                Value::Null
            } else {
                Value::Text(placeholder.trim_matches('\'').to_owned())
            };
            row.push(value);
        }
        if row.len() != table.columns.len() {
            return Err(Error::driver(format!(
                "column count mismatch: table has {}, insert gave {}",
                table.columns.len(),
                row.len()
            )));
        }
        table.rows.push(row);
        Ok(1)
    }

    fn select(&self, sql: &str, sink: &mut dyn RowSink) -> Result<u64> {
        let upper = sql.to_ascii_uppercase();
        let from = upper.find(" FROM ").ok_or_else(|| Error::driver("SELECT missing FROM"))?;
        let select_list = sql["SELECT".len()..from].trim();

        let rest = sql[from + " FROM ".len()..].trim();
        let (table_name, order_by) = match upper[from..].find("ORDER BY") {
            Some(pos) => {
                let order_pos = from + pos;
                let table_name = sql[from + " FROM ".len()..order_pos].trim();
                let order_col = sql[order_pos + "ORDER BY".len()..].trim();
                let desc = order_col.to_ascii_uppercase().ends_with("DESC");
                let order_col = if desc {
                    order_col[..order_col.len() - "DESC".len()].trim()
                } else {
                    order_col
                }
                .to_owned();
                (table_name, Some((order_col, desc)))
            }
            None => (rest, None),
        };
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| Error::driver(format!("no such table: {table_name}")))?;

        if select_list.eq_ignore_ascii_case("COUNT(*)") {
            let names: Vec<Arc<str>> = vec![Arc::from("count")];
            let values = vec![ValueRef::I64(table.rows.len() as i64)];
            sink.accept(RowRef::new(&names, values))?;
            return Ok(1);
        }

        let wanted: Vec<&str> = if select_list == "*" {
            table.columns.iter().map(|c| c.as_ref()).collect()
        } else {
            select_list.split(',').map(str::trim).collect()
        };
        let indices: Vec<usize> = wanted
            .iter()
            .map(|name| {
                table
                    .columns
                    .iter()
                    .position(|c| c.as_ref() == *name)
                    .ok_or_else(|| Error::driver(format!("no such column: {name}")))
            })
            .collect::<Result<_>>()?;
        let names: Vec<Arc<str>> = indices.iter().map(|&i| table.columns[i].clone()).collect();

        let mut row_indices: Vec<usize> = (0..table.rows.len()).collect();
        if let Some((col, desc)) = &order_by {
            let sort_idx = table
                .columns
                .iter()
                .position(|c| c.as_ref() == col.as_str())
                .ok_or_else(|| Error::driver(format!("no such column: {col}")))?;
            row_indices.sort_by(|&a, &b| {
                let ord = compare_values(&table.rows[a][sort_idx], &table.rows[b][sort_idx]);
                if *desc { ord.reverse() } else { ord }
            });
        }

        let mut count = 0u64;
        for ri in row_indices {
            let values: Vec<ValueRef<'_>> = indices.iter().map(|&ci| table.rows[ri][ci].as_ref()).collect();
            sink.accept(RowRef::new(&names, values))?;
            count += 1;
        }
        Ok(count)
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::I64(a), Value::I64(b)) => a.cmp(b),
        (Value::U64(a), Value::U64(b)) => a.cmp(b),
        (Value::F64(a), Value::F64(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DriverHandle for MockHandle {
    async fn disconnect(&mut self) {
        self.tables.clear();
        self.snapshot = None;
    }

    async fn liveness_check(&mut self) -> Result<()> {
        let remaining = self.fail_liveness_remaining.load(AtomicOrdering::Acquire);
        if remaining > 0 {
            self.fail_liveness_remaining.store(remaining - 1, AtomicOrdering::Release);
            return Err(self.fail("liveness check failed (injected)"));
        }
        Ok(())
    }

    async fn exec(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let upper = sql.trim().to_ascii_uppercase();
        let result = if upper.starts_with("CREATE TABLE") {
            self.create_table(sql)
        } else if upper.starts_with("INSERT INTO") {
            self.insert(sql, params)
        } else {
            Err(Error::driver(format!("unsupported statement: {sql}")))
        };
        if let Err(ref e) = result {
            self.last_error = Some(e.to_string());
        } else {
            self.last_error = None;
        }
        result
    }

    async fn query(&mut self, sql: &str, _params: &[Value], sink: &mut dyn RowSink) -> Result<u64> {
        let result = self.select(sql, sink);
        if let Err(ref e) = result {
            self.last_error = Some(e.to_string());
        } else {
            self.last_error = None;
        }
        result
    }

    async fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(self.fail("transaction already in progress"));
        }
        self.snapshot = Some(self.tables.clone());
        self.last_error = None;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.snapshot.take().is_none() {
            return Err(self.fail("no transaction in progress"));
        }
        self.last_error = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.tables = snapshot;
                self.last_error = None;
                Ok(())
            }
            None => Err(self.fail("no transaction in progress")),
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn handle() -> Box<dyn DriverHandle> {
        MockDriver::new().connect(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn order_by_sorts_ascending_and_descending() {
        let mut h = handle().await;
        h.exec("CREATE TABLE t(id INT, s TEXT)", &[]).await.unwrap();
        h.exec("INSERT INTO t VALUES ($1, $2)", &[Value::I64(2), Value::Text("b".into())])
            .await
            .unwrap();
        h.exec("INSERT INTO t VALUES ($1, $2)", &[Value::I64(1), Value::Text("a".into())])
            .await
            .unwrap();

        let mut ids = Vec::new();
        h.query("SELECT id FROM t ORDER BY id", &[], &mut |row: RowRef<'_>| {
            ids.push(row.get(0).unwrap().to_owned());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(ids, vec![Value::I64(1), Value::I64(2)]);

        ids.clear();
        h.query("SELECT id FROM t ORDER BY id DESC", &[], &mut |row: RowRef<'_>| {
            ids.push(row.get(0).unwrap().to_owned());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(ids, vec![Value::I64(2), Value::I64(1)]);
    }

    #[tokio::test]
    async fn count_star_reports_row_total() {
        let mut h = handle().await;
        h.exec("CREATE TABLE t(id INT)", &[]).await.unwrap();
        h.exec("INSERT INTO t VALUES ($1)", &[Value::I64(1)]).await.unwrap();
        h.exec("INSERT INTO t VALUES ($1)", &[Value::I64(2)]).await.unwrap();

        let mut total = None;
        h.query("SELECT COUNT(*) FROM t", &[], &mut |row: RowRef<'_>| {
            total = row.get(0).map(|v| v.to_owned());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(total, Some(Value::I64(2)));
    }

    #[tokio::test]
    async fn rollback_restores_pre_transaction_state() {
        let mut h = handle().await;
        h.exec("CREATE TABLE t(id INT)", &[]).await.unwrap();
        h.exec("INSERT INTO t VALUES ($1)", &[Value::I64(1)]).await.unwrap();

        h.begin().await.unwrap();
        h.exec("INSERT INTO t VALUES ($1)", &[Value::I64(2)]).await.unwrap();
        h.rollback().await.unwrap();

        let mut total = None;
        h.query("SELECT COUNT(*) FROM t", &[], &mut |row: RowRef<'_>| {
            total = row.get(0).map(|v| v.to_owned());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(total, Some(Value::I64(1)));
    }

    #[tokio::test]
    async fn commit_discards_the_snapshot() {
        let mut h = handle().await;
        h.exec("CREATE TABLE t(id INT)", &[]).await.unwrap();
        h.begin().await.unwrap();
        h.exec("INSERT INTO t VALUES ($1)", &[Value::I64(1)]).await.unwrap();
        h.commit().await.unwrap();
        assert!(matches!(h.rollback().await, Err(Error::Driver { .. })));
    }

    #[tokio::test]
    async fn liveness_check_fails_the_configured_number_of_times() {
        let driver = MockDriver::with_liveness_failures(2);
        let mut h = driver.connect(":memory:").await.unwrap();
        assert!(h.liveness_check().await.is_err());
        assert!(h.liveness_check().await.is_err());
        assert!(h.liveness_check().await.is_ok());
    }
}
