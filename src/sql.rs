use chrono::NaiveDate;
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input. INSERTs require an explicit column
/// list; values are matched to columns by name, not position.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertHomestay {
        id: Ulid,
        name: Option<String>,
    },
    UpdateHomestay {
        id: Ulid,
        name: Option<String>,
    },
    DeleteHomestay {
        id: Ulid,
    },
    InsertRoom {
        id: Ulid,
        homestay_id: Ulid,
        name: Option<String>,
    },
    UpdateRoom {
        id: Ulid,
        name: Option<String>,
    },
    DeleteRoom {
        id: Ulid,
    },
    /// Always enters as pending; the status column is not writable here.
    InsertBooking {
        id: Ulid,
        room_id: Ulid,
        range: DateRange,
        guest: Option<String>,
    },
    BatchInsertBookings {
        bookings: Vec<(Ulid, Ulid, DateRange, Option<String>)>,
    },
    UpdateBookingStatus {
        id: Ulid,
        status: BookingStatus,
    },
    DeleteBooking {
        id: Ulid,
    },
    InsertBlock {
        id: Ulid,
        homestay_id: Ulid,
        room_id: Option<Ulid>,
        range: DateRange,
        reason: Option<String>,
    },
    UpdateBlock {
        id: Ulid,
        range: DateRange,
    },
    DeleteBlock {
        id: Ulid,
    },
    SelectHomestays,
    SelectRooms {
        homestay_id: Option<Ulid>,
    },
    SelectBookings {
        target: TargetId,
        status: Option<BookingStatus>,
    },
    SelectBlocks {
        target: TargetId,
    },
    SelectAvailability {
        target: TargetId,
        window: DateRange,
        min_nights: Option<i64>,
        /// `SELECT is_available` instead of `SELECT *`: one boolean row.
        boolean: bool,
    },
    SelectUnavailable {
        target: TargetId,
        window: Option<DateRange>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

/// One INSERT row with values matched to the column list.
struct Row<'a> {
    table: &'static str,
    cols: Vec<String>,
    vals: &'a [Expr],
}

impl<'a> Row<'a> {
    fn get(&self, col: &str) -> Option<&'a Expr> {
        self.cols.iter().position(|c| c == col).map(|i| &self.vals[i])
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col).ok_or(SqlError::MissingColumn(self.table, col))
    }

    fn check_columns(&self, known: &[&str]) -> Result<(), SqlError> {
        for c in &self.cols {
            if !known.contains(&c.as_str()) {
                return Err(SqlError::UnknownColumn(c.clone()));
            }
        }
        Ok(())
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let cols: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    if cols.is_empty() {
        return Err(SqlError::Parse("INSERT requires a column list".into()));
    }
    let rows = extract_insert_rows(insert)?;
    for row in &rows {
        if row.len() != cols.len() {
            return Err(SqlError::Parse(format!(
                "row has {} values for {} columns",
                row.len(),
                cols.len()
            )));
        }
    }

    match table.as_str() {
        "homestays" => {
            let row = single_row(&rows, "homestays", &cols)?;
            row.check_columns(&["id", "name"])?;
            Ok(Command::InsertHomestay {
                id: parse_ulid_expr(row.require("id")?)?,
                name: opt_string(&row, "name")?,
            })
        }
        "rooms" => {
            let row = single_row(&rows, "rooms", &cols)?;
            row.check_columns(&["id", "homestay_id", "name"])?;
            Ok(Command::InsertRoom {
                id: parse_ulid_expr(row.require("id")?)?,
                homestay_id: parse_ulid_expr(row.require("homestay_id")?)?,
                name: opt_string(&row, "name")?,
            })
        }
        "bookings" => {
            let mut bookings = Vec::with_capacity(rows.len());
            for (i, vals) in rows.iter().enumerate() {
                let row = Row {
                    table: "bookings",
                    cols: cols.clone(),
                    vals,
                };
                row.check_columns(&["id", "room_id", "check_in", "check_out", "guest"])?;
                let parsed = booking_row(&row)
                    .map_err(|e| SqlError::Parse(format!("row {i}: {e}")))?;
                bookings.push(parsed);
            }
            if bookings.len() == 1 {
                let (id, room_id, range, guest) = bookings.remove(0);
                Ok(Command::InsertBooking {
                    id,
                    room_id,
                    range,
                    guest,
                })
            } else {
                Ok(Command::BatchInsertBookings { bookings })
            }
        }
        "blocked_dates" => {
            let row = single_row(&rows, "blocked_dates", &cols)?;
            row.check_columns(&["id", "homestay_id", "room_id", "start", "end", "reason"])?;
            Ok(Command::InsertBlock {
                id: parse_ulid_expr(row.require("id")?)?,
                homestay_id: parse_ulid_expr(row.require("homestay_id")?)?,
                room_id: match row.get("room_id") {
                    Some(expr) => parse_ulid_or_null(expr)?,
                    None => None,
                },
                range: DateRange::new(
                    parse_date_expr(row.require("start")?)?,
                    parse_date_expr(row.require("end")?)?,
                ),
                reason: opt_string(&row, "reason")?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn single_row<'a>(
    rows: &'a [Vec<Expr>],
    table: &'static str,
    cols: &[String],
) -> Result<Row<'a>, SqlError> {
    if rows.len() != 1 {
        return Err(SqlError::Parse(format!(
            "multi-row INSERT is only supported for bookings, not {table}"
        )));
    }
    Ok(Row {
        table,
        cols: cols.to_vec(),
        vals: &rows[0],
    })
}

fn booking_row(row: &Row<'_>) -> Result<(Ulid, Ulid, DateRange, Option<String>), SqlError> {
    Ok((
        parse_ulid_expr(row.require("id")?)?,
        parse_ulid_expr(row.require("room_id")?)?,
        DateRange::new(
            parse_date_expr(row.require("check_in")?)?,
            parse_date_expr(row.require("check_out")?)?,
        ),
        opt_string(row, "guest")?,
    ))
}

fn opt_string(row: &Row<'_>, col: &str) -> Result<Option<String>, SqlError> {
    match row.get(col) {
        Some(expr) => parse_string_or_null(expr),
        None => Ok(None),
    }
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_id(selection)?;

    match table.as_str() {
        "homestays" => Ok(Command::UpdateHomestay {
            id,
            name: assignment_string(assignments, "name")?,
        }),
        "rooms" => Ok(Command::UpdateRoom {
            id,
            name: assignment_string(assignments, "name")?,
        }),
        "bookings" => {
            let expr = find_assignment(assignments, "status")
                .ok_or(SqlError::MissingColumn("bookings", "status"))?;
            Ok(Command::UpdateBookingStatus {
                id,
                status: parse_status_expr(expr)?,
            })
        }
        "blocked_dates" => {
            let start = find_assignment(assignments, "start")
                .ok_or(SqlError::MissingColumn("blocked_dates", "start"))?;
            let end = find_assignment(assignments, "end")
                .ok_or(SqlError::MissingColumn("blocked_dates", "end"))?;
            Ok(Command::UpdateBlock {
                id,
                range: DateRange::new(parse_date_expr(start)?, parse_date_expr(end)?),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn find_assignment<'a>(assignments: &'a [ast::Assignment], col: &str) -> Option<&'a Expr> {
    assignments.iter().find_map(|a| {
        let name = match &a.target {
            ast::AssignmentTarget::ColumnName(name) => object_name_last(name)?,
            _ => return None,
        };
        (name == col).then_some(&a.value)
    })
}

fn assignment_string(
    assignments: &[ast::Assignment],
    col: &'static str,
) -> Result<Option<String>, SqlError> {
    match find_assignment(assignments, col) {
        Some(expr) => parse_string_or_null(expr),
        None => Err(SqlError::MissingColumn("update", col)),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "homestays" => Ok(Command::DeleteHomestay { id }),
        "rooms" => Ok(Command::DeleteRoom { id }),
        "bookings" => Ok(Command::DeleteBooking { id }),
        "blocked_dates" => Ok(Command::DeleteBlock { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

#[derive(Default)]
struct Filters {
    room_id: Option<Ulid>,
    homestay_id: Option<Ulid>,
    status: Option<BookingStatus>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    min_nights: Option<i64>,
}

impl Filters {
    fn target(&self) -> Result<TargetId, SqlError> {
        match (self.room_id, self.homestay_id) {
            (Some(_), Some(_)) => Err(SqlError::Parse(
                "filter by room_id or homestay_id, not both".into(),
            )),
            (Some(r), None) => Ok(TargetId::Room(r)),
            (None, Some(h)) => Ok(TargetId::Homestay(h)),
            (None, None) => Err(SqlError::MissingFilter("room_id or homestay_id")),
        }
    }

    /// Window is all-or-nothing: a lone bound is an error.
    fn window_opt(&self) -> Result<Option<DateRange>, SqlError> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Ok(Some(DateRange::new(s, e))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(SqlError::MissingFilter("end")),
            (None, Some(_)) => Err(SqlError::MissingFilter("start")),
        }
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "homestays" => Ok(Command::SelectHomestays),
        "rooms" => Ok(Command::SelectRooms {
            homestay_id: filters.homestay_id,
        }),
        "bookings" => Ok(Command::SelectBookings {
            target: filters.target()?,
            status: filters.status,
        }),
        "blocked_dates" => Ok(Command::SelectBlocks {
            target: filters.target()?,
        }),
        "availability" => Ok(Command::SelectAvailability {
            target: filters.target()?,
            window: DateRange::new(
                filters.start.ok_or(SqlError::MissingFilter("start"))?,
                filters.end.ok_or(SqlError::MissingFilter("end"))?,
            ),
            min_nights: filters.min_nights,
            boolean: projects_is_available(select),
        }),
        "unavailable" => Ok(Command::SelectUnavailable {
            target: filters.target()?,
            window: filters.window_opt()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn projects_is_available(select: &ast::Select) -> bool {
    matches!(
        select.projection.as_slice(),
        [ast::SelectItem::UnnamedExpr(Expr::Identifier(ident))]
            if ident.value.to_lowercase() == "is_available"
    )
}

fn extract_filters(expr: &Expr, out: &mut Filters) -> Result<(), SqlError> {
    if let Expr::BinaryOp { left, op, right } = expr {
        match op {
            ast::BinaryOperator::And => {
                extract_filters(left, out)?;
                extract_filters(right, out)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("room_id") => out.room_id = Some(parse_ulid_expr(right)?),
                Some("homestay_id") => out.homestay_id = Some(parse_ulid_expr(right)?),
                Some("status") => out.status = Some(parse_status_expr(right)?),
                Some("min_nights") => out.min_nights = Some(parse_i64_expr(right)?),
                _ => {}
            },
            ast::BinaryOperator::GtEq => {
                if expr_column_name(left).as_deref() == Some("start") {
                    out.start = Some(parse_date_expr(right)?);
                }
            }
            ast::BinaryOperator::LtEq => {
                if expr_column_name(left).as_deref() == Some("end") {
                    out.end = Some(parse_date_expr(right)?);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid_expr(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_ulid_expr(expr).map(Some)
}

/// Dates are 'YYYY-MM-DD' string literals.
fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected date string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_status_expr(expr: &Expr) -> Result<BookingStatus, SqlError> {
    if let Some(Value::SingleQuotedString(s)) = extract_value(expr) {
        BookingStatus::parse(s).ok_or_else(|| SqlError::Parse(format!("bad status: {s:?}")))
    } else {
        Err(SqlError::Parse(format!("expected status string, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Null => Ok(None),
            Value::SingleQuotedString(s) => Ok(Some(s.clone())),
            _ => Err(SqlError::Parse(format!(
                "expected string or NULL, got {value:?}"
            ))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_homestay() {
        let sql = format!("INSERT INTO homestays (id, name) VALUES ('{ID}', 'Seaside')");
        match parse_sql(&sql).unwrap() {
            Command::InsertHomestay { id, name } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(name.as_deref(), Some("Seaside"));
            }
            cmd => panic!("expected InsertHomestay, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_homestay_without_name() {
        let sql = format!("INSERT INTO homestays (id) VALUES ('{ID}')");
        match parse_sql(&sql).unwrap() {
            Command::InsertHomestay { name, .. } => assert_eq!(name, None),
            cmd => panic!("expected InsertHomestay, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_room() {
        let sql = format!("INSERT INTO rooms (id, homestay_id, name) VALUES ('{ID}', '{ID}', NULL)");
        match parse_sql(&sql).unwrap() {
            Command::InsertRoom {
                homestay_id, name, ..
            } => {
                assert_eq!(homestay_id.to_string(), ID);
                assert_eq!(name, None);
            }
            cmd => panic!("expected InsertRoom, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out, guest) \
             VALUES ('{ID}', '{ID}', '2026-06-01', '2026-06-05', 'Ana')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking { range, guest, .. } => {
                assert_eq!(range.start.to_string(), "2026-06-01");
                assert_eq!(range.end.to_string(), "2026-06-05");
                assert_eq!(guest.as_deref(), Some("Ana"));
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_with_equal_dates() {
        // check_in == check_out is the engine's InvalidRange, not a parse
        // failure; the range must pass through here without panicking.
        let sql = format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out) \
             VALUES ('{ID}', '{ID}', '2026-06-01', '2026-06-01')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking { range, .. } => assert_eq!(range.start, range.end),
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_rejects_status_column() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out, status) \
             VALUES ('{ID}', '{ID}', '2026-06-01', '2026-06-05', 'confirmed')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(_))));
    }

    #[test]
    fn parse_batch_insert_bookings() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out) VALUES \
             ('{ID}', '{ID}', '2026-06-01', '2026-06-05'), \
             ('{ID}', '{ID}', '2026-06-05', '2026-06-10')"
        );
        match parse_sql(&sql).unwrap() {
            Command::BatchInsertBookings { bookings } => {
                assert_eq!(bookings.len(), 2);
                assert_eq!(bookings[1].2.start.to_string(), "2026-06-05");
            }
            cmd => panic!("expected BatchInsertBookings, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_block_quoted_end() {
        let sql = format!(
            "INSERT INTO blocked_dates (id, homestay_id, room_id, start, \"end\", reason) \
             VALUES ('{ID}', '{ID}', NULL, '2026-07-01', '2026-07-05', 'repairs')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlock {
                room_id,
                range,
                reason,
                ..
            } => {
                assert_eq!(room_id, None);
                assert_eq!(range.end.to_string(), "2026-07-05");
                assert_eq!(reason.as_deref(), Some("repairs"));
            }
            cmd => panic!("expected InsertBlock, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_booking_status() {
        let sql = format!("UPDATE bookings SET status = 'confirmed' WHERE id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::UpdateBookingStatus { status, .. } => {
                assert_eq!(status, BookingStatus::Confirmed);
            }
            cmd => panic!("expected UpdateBookingStatus, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_block_redates() {
        let sql = format!(
            "UPDATE blocked_dates SET start = '2026-08-01', \"end\" = '2026-08-05' WHERE id = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpdateBlock { range, .. } => {
                assert_eq!(range.start.to_string(), "2026-08-01");
            }
            cmd => panic!("expected UpdateBlock, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_homestay_name() {
        let sql = format!("UPDATE homestays SET name = 'New name' WHERE id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::UpdateHomestay { name, .. } => {
                assert_eq!(name.as_deref(), Some("New name"));
            }
            cmd => panic!("expected UpdateHomestay, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_deletes() {
        let cases = [
            ("homestays", "DeleteHomestay"),
            ("rooms", "DeleteRoom"),
            ("bookings", "DeleteBooking"),
            ("blocked_dates", "DeleteBlock"),
        ];
        for (table, _) in cases {
            let sql = format!("DELETE FROM {table} WHERE id = '{ID}'");
            parse_sql(&sql).unwrap();
        }
    }

    #[test]
    fn parse_select_bookings_with_status() {
        let sql = format!("SELECT * FROM bookings WHERE homestay_id = '{ID}' AND status = 'pending'");
        match parse_sql(&sql).unwrap() {
            Command::SelectBookings { target, status } => {
                assert!(matches!(target, TargetId::Homestay(_)));
                assert_eq!(status, Some(BookingStatus::Pending));
            }
            cmd => panic!("expected SelectBookings, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_bookings_requires_target() {
        assert!(matches!(
            parse_sql("SELECT * FROM bookings"),
            Err(SqlError::MissingFilter(_))
        ));
    }

    #[test]
    fn parse_select_availability() {
        let sql = format!(
            "SELECT * FROM availability WHERE room_id = '{ID}' \
             AND start >= '2026-06-01' AND \"end\" <= '2026-06-30' AND min_nights = 3"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability {
                target,
                window,
                min_nights,
                boolean,
            } => {
                assert!(matches!(target, TargetId::Room(_)));
                assert_eq!(window.start.to_string(), "2026-06-01");
                assert_eq!(min_nights, Some(3));
                assert!(!boolean);
            }
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_is_available_boolean() {
        let sql = format!(
            "SELECT is_available FROM availability WHERE homestay_id = '{ID}' \
             AND start >= '2026-06-01' AND \"end\" <= '2026-06-30'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability { boolean, .. } => assert!(boolean),
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_unavailable_window_optional() {
        let sql = format!("SELECT * FROM unavailable WHERE room_id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::SelectUnavailable { window, .. } => assert_eq!(window, None),
            cmd => panic!("expected SelectUnavailable, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_unavailable_lone_bound_rejected() {
        let sql = format!("SELECT * FROM unavailable WHERE room_id = '{ID}' AND start >= '2026-06-01'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("end"))));
    }

    #[test]
    fn parse_bad_date_rejected() {
        let sql = format!(
            "INSERT INTO bookings (id, room_id, check_in, check_out) \
             VALUES ('{ID}', '{ID}', '2026-13-40', '2026-06-05')"
        );
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO guests (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_both_targets_rejected() {
        let sql = format!(
            "SELECT * FROM blocked_dates WHERE room_id = '{ID}' AND homestay_id = '{ID}'"
        );
        assert!(parse_sql(&sql).is_err());
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
