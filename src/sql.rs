use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::admission::ReservationRequest;
use crate::model::Day;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoom {
        id: Ulid,
        name: String,
    },
    UpdateRoom {
        id: Ulid,
        name: String,
    },
    DeleteRoom {
        id: Ulid,
    },
    SelectRooms {
        id: Option<Ulid>,
    },
    InsertReservation {
        id: Ulid,
        request: ReservationRequest,
    },
    /// Dates left out of the SET list keep their stored value.
    UpdateReservation {
        id: Ulid,
        check_in: Option<Day>,
        check_out: Option<Day>,
    },
    DeleteReservation {
        id: Ulid,
    },
    SelectReservations {
        id: Option<Ulid>,
        room_id: Option<Ulid>,
    },
    /// Dry-run admission check; one result row per violation.
    SelectAdmission {
        request: ReservationRequest,
        exclude_id: Option<Ulid>,
    },
}

const ROOM_COLUMNS: &[&str] = &["id", "name"];
const RESERVATION_COLUMNS: &[&str] = &["id", "room_id", "customer_email", "check_in", "check_out"];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
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

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    match table.as_str() {
        "rooms" => {
            let row = insert_row(insert, ROOM_COLUMNS)?;
            Ok(Command::InsertRoom {
                id: parse_ulid_expr(required(&row, "rooms", "id")?)?,
                name: column(&row, "name")
                    .map(parse_text_expr)
                    .transpose()?
                    .flatten()
                    .unwrap_or_default(),
            })
        }
        "reservations" => {
            let row = insert_row(insert, RESERVATION_COLUMNS)?;
            Ok(Command::InsertReservation {
                id: parse_ulid_expr(required(&row, "reservations", "id")?)?,
                request: ReservationRequest {
                    room_id: optional(&row, "room_id", parse_ulid_or_null)?,
                    customer_email: optional(&row, "customer_email", parse_text_expr)?,
                    check_in: optional(&row, "check_in", parse_day_or_null)?,
                    check_out: optional(&row, "check_out", parse_day_or_null)?,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    let id = extract_where_id(selection)?;

    let mut set = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let name = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            AssignmentTarget::Tuple(_) => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        set.push((name, assignment.value.clone()));
    }

    match table.as_str() {
        "rooms" => {
            reject_unknown_columns(&set, &["name"])?;
            let name = column(&set, "name").ok_or(SqlError::MissingColumn("rooms", "name"))?;
            Ok(Command::UpdateRoom {
                id,
                name: parse_text_expr(name)?.unwrap_or_default(),
            })
        }
        "reservations" => {
            reject_unknown_columns(&set, &["check_in", "check_out"])?;
            if set.is_empty() {
                return Err(SqlError::MissingColumn("reservations", "check_in"));
            }
            Ok(Command::UpdateReservation {
                id,
                check_in: optional(&set, "check_in", parse_day_or_null)?,
                check_out: optional(&set, "check_out", parse_day_or_null)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "rooms" => Ok(Command::DeleteRoom { id }),
        "reservations" => Ok(Command::DeleteReservation { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "rooms" => {
            reject_unknown_columns(&filters, &["id"])?;
            Ok(Command::SelectRooms {
                id: optional(&filters, "id", parse_ulid_or_null)?,
            })
        }
        "reservations" => {
            reject_unknown_columns(&filters, &["id", "room_id"])?;
            Ok(Command::SelectReservations {
                id: optional(&filters, "id", parse_ulid_or_null)?,
                room_id: optional(&filters, "room_id", parse_ulid_or_null)?,
            })
        }
        "admission" => {
            reject_unknown_columns(
                &filters,
                &["room_id", "customer_email", "check_in", "check_out", "exclude_id"],
            )?;
            Ok(Command::SelectAdmission {
                request: ReservationRequest {
                    room_id: optional(&filters, "room_id", parse_ulid_or_null)?,
                    customer_email: optional(&filters, "customer_email", parse_text_expr)?,
                    check_in: optional(&filters, "check_in", parse_day_or_null)?,
                    check_out: optional(&filters, "check_out", parse_day_or_null)?,
                },
                exclude_id: optional(&filters, "exclude_id", parse_ulid_or_null)?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = 1 AND (b = 2 AND c = 3)` into `[(a, 1), (b, 2), (c, 3)]`.
fn collect_eq_filters(expr: &Expr, out: &mut Vec<(String, Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                collect_eq_filters(left, out)?;
                collect_eq_filters(right, out)
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
                out.push((col, right.as_ref().clone()));
                Ok(())
            }
            other => Err(SqlError::Unsupported(format!("operator {other} in WHERE"))),
        },
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn column<'a>(row: &'a [(String, Expr)], name: &str) -> Option<&'a Expr> {
    row.iter().find(|(col, _)| col == name).map(|(_, e)| e)
}

fn required<'a>(
    row: &'a [(String, Expr)],
    table: &'static str,
    name: &'static str,
) -> Result<&'a Expr, SqlError> {
    column(row, name).ok_or(SqlError::MissingColumn(table, name))
}

/// An absent column and an explicit NULL both come back as `None`.
fn optional<T>(
    row: &[(String, Expr)],
    name: &str,
    parse: impl Fn(&Expr) -> Result<Option<T>, SqlError>,
) -> Result<Option<T>, SqlError> {
    match column(row, name) {
        Some(expr) => parse(expr),
        None => Ok(None),
    }
}

fn reject_unknown_columns(row: &[(String, Expr)], known: &[&str]) -> Result<(), SqlError> {
    match row.iter().find(|(col, _)| !known.contains(&col.as_str())) {
        Some((col, _)) => Err(SqlError::UnknownColumn(col.clone())),
        None => Ok(()),
    }
}

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
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
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

/// Pair the single VALUES row with its column names. Without a column list
/// the table's declared order applies.
fn insert_row(insert: &ast::Insert, default_columns: &[&str]) -> Result<Vec<(String, Expr)>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let values = match body.body.as_ref() {
        SetExpr::Values(values) => values,
        _ => return Err(SqlError::Parse("expected VALUES".into())),
    };
    let row = match values.rows.as_slice() {
        [] => return Err(SqlError::Parse("empty VALUES".into())),
        [row] => row,
        _ => return Err(SqlError::Unsupported("multi-row INSERT".into())),
    };

    let columns: Vec<String> = if insert.columns.is_empty() {
        default_columns.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if row.len() != columns.len() {
        return Err(SqlError::WrongArity(columns.len(), row.len()));
    }
    reject_unknown_columns(
        &columns.iter().cloned().zip(row.iter().cloned()).collect::<Vec<_>>(),
        default_columns,
    )?;
    Ok(columns.into_iter().zip(row.iter().cloned()).collect())
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid_expr(right),
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
    parse_ulid_or_null(expr)?.ok_or_else(|| SqlError::BadValue("id must not be NULL".into()))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match parse_text_expr(expr)? {
        Some(s) => Ulid::from_string(&s)
            .map(Some)
            .map_err(|e| SqlError::BadValue(format!("bad ULID '{s}': {e}"))),
        None => Ok(None),
    }
}

fn parse_text_expr(expr: &Expr) -> Result<Option<String>, SqlError> {
    let value = extract_value(expr).ok_or_else(|| SqlError::Parse(format!("expected value, got {expr}")))?;
    match value {
        Value::Null => Ok(None),
        Value::SingleQuotedString(s) | Value::EscapedStringLiteral(s) | Value::Number(s, _) => {
            Ok(Some(s.clone()))
        }
        _ => Err(SqlError::BadValue(format!("expected string, got {value}"))),
    }
}

fn parse_day_or_null(expr: &Expr) -> Result<Option<Day>, SqlError> {
    match parse_text_expr(expr)? {
        Some(s) => parse_day(&s)
            .map(Some)
            .ok_or_else(|| SqlError::BadValue(format!("bad date '{s}': expected YYYY-MM-DD"))),
        None => Ok(None),
    }
}

/// A calendar date, or a timestamp truncated to its date.
pub fn parse_day(s: &str) -> Option<Day> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
    /// Syntactically fine, but a literal could not be read as its column type.
    BadValue(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(expected, got) => {
                write!(f, "expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const ROOM: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    fn day(s: &str) -> Day {
        s.parse().unwrap()
    }

    #[test]
    fn parse_insert_room() {
        let sql = format!("INSERT INTO rooms (id, name) VALUES ('{ID}', 'Ocean view')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertRoom { id: ulid(ID), name: "Ocean view".into() }
        );
    }

    #[test]
    fn parse_insert_room_without_column_list() {
        let sql = format!("INSERT INTO rooms VALUES ('{ID}', 'Ocean view')");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::InsertRoom { .. }));
    }

    #[test]
    fn null_room_name_becomes_empty() {
        let sql = format!("INSERT INTO rooms (id, name) VALUES ('{ID}', NULL)");
        match parse_sql(&sql).unwrap() {
            Command::InsertRoom { name, .. } => assert_eq!(name, ""),
            cmd => panic!("expected InsertRoom, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_room() {
        let sql = format!("UPDATE rooms SET name = 'Sea view' WHERE id = '{ID}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpdateRoom { id: ulid(ID), name: "Sea view".into() }
        );
    }

    #[test]
    fn parse_delete_room() {
        let sql = format!("DELETE FROM rooms WHERE id = '{ID}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteRoom { id: ulid(ID) });
    }

    #[test]
    fn parse_select_rooms() {
        assert_eq!(parse_sql("SELECT * FROM rooms").unwrap(), Command::SelectRooms { id: None });
        let sql = format!("SELECT * FROM rooms WHERE id = '{ID}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::SelectRooms { id: Some(ulid(ID)) });
    }

    #[test]
    fn parse_insert_reservation() {
        let sql = format!(
            "INSERT INTO reservations (id, room_id, customer_email, check_in, check_out) \
             VALUES ('{ID}', '{ROOM}', 'guest@example.com', '2026-06-10', '2026-06-12')"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertReservation {
                id: ulid(ID),
                request: ReservationRequest {
                    room_id: Some(ulid(ROOM)),
                    customer_email: Some("guest@example.com".into()),
                    check_in: Some(day("2026-06-10")),
                    check_out: Some(day("2026-06-12")),
                },
            }
        );
    }

    #[test]
    fn reservation_columns_in_any_order_and_optional() {
        let sql = format!(
            "INSERT INTO reservations (check_out, id, check_in, room_id) \
             VALUES ('2026-06-12', '{ID}', '2026-06-10 14:30:00', '{ROOM}')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation { request, .. } => {
                assert_eq!(request.customer_email, None);
                assert_eq!(request.check_in, Some(day("2026-06-10")));
                assert_eq!(request.check_out, Some(day("2026-06-12")));
            }
            cmd => panic!("expected InsertReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_reservation() {
        let sql = format!(
            "UPDATE reservations SET check_in = '2026-06-11', check_out = '2026-06-13' WHERE id = '{ID}'"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpdateReservation {
                id: ulid(ID),
                check_in: Some(day("2026-06-11")),
                check_out: Some(day("2026-06-13")),
            }
        );
    }

    #[test]
    fn update_reservation_cannot_touch_customer() {
        let sql = format!("UPDATE reservations SET customer_email = 'x@y.z' WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownColumn(c)) if c == "customer_email"));
    }

    #[test]
    fn parse_delete_reservation() {
        let sql = format!("DELETE FROM reservations WHERE id = '{ID}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteReservation { id: ulid(ID) });
    }

    #[test]
    fn parse_select_reservations_by_room() {
        let sql = format!("SELECT * FROM reservations WHERE room_id = '{ROOM}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectReservations { id: None, room_id: Some(ulid(ROOM)) }
        );
    }

    #[test]
    fn parse_select_admission() {
        let sql = format!(
            "SELECT * FROM admission WHERE room_id = '{ROOM}' AND customer_email = 'a@x.com' \
             AND (check_in = '2026-06-10' AND check_out = '2026-06-12') AND exclude_id = '{ID}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAdmission { request, exclude_id } => {
                assert_eq!(request.room_id, Some(ulid(ROOM)));
                assert_eq!(request.customer_email.as_deref(), Some("a@x.com"));
                assert_eq!(request.check_out, Some(day("2026-06-12")));
                assert_eq!(exclude_id, Some(ulid(ID)));
            }
            cmd => panic!("expected SelectAdmission, got {cmd:?}"),
        }
    }

    #[test]
    fn or_filters_unsupported() {
        let sql = format!("SELECT * FROM reservations WHERE id = '{ID}' OR room_id = '{ROOM}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn bad_date_is_bad_value() {
        let sql = format!(
            "INSERT INTO reservations VALUES ('{ID}', '{ROOM}', 'a@x.com', 'June 10th', '2026-06-12')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::BadValue(_))));
    }

    #[test]
    fn bad_ulid_is_bad_value() {
        assert!(matches!(
            parse_sql("DELETE FROM rooms WHERE id = 'nope'"),
            Err(SqlError::BadValue(_))
        ));
    }

    #[test]
    fn delete_requires_id_filter() {
        assert!(matches!(
            parse_sql("DELETE FROM rooms"),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn wrong_arity_errors() {
        let sql = format!("INSERT INTO rooms VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::WrongArity(2, 1))));
    }

    #[test]
    fn parse_day_formats() {
        assert_eq!(parse_day("2026-06-10"), Some(day("2026-06-10")));
        assert_eq!(parse_day(" 2026-06-10T23:59:59 "), Some(day("2026-06-10")));
        assert_eq!(parse_day("2026-06-10 08:00:00.250"), Some(day("2026-06-10")));
        assert_eq!(parse_day("2026-06-10T23:00:00+02:00"), Some(day("2026-06-10")));
        assert_eq!(parse_day("2026-02-30"), None);
        assert_eq!(parse_day("tomorrow"), None);
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
