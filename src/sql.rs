use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertCourse {
        course: Course,
    },
    UpdateCourse {
        course: Course,
    },
    DeleteCourse {
        id: Id,
    },
    InsertStudent {
        student: Student,
    },
    DeleteStudent {
        id: Id,
    },
    InsertEnrollment {
        enrollment: Enrollment,
    },
    DeleteEnrollment {
        enrollment: Enrollment,
    },
    SelectCourses {
        teacher_id: Option<Id>,
    },
    SelectStudents,
    SelectEnrollments {
        course_id: Option<Id>,
        student_id: Option<Id>,
    },
    SelectSchedule {
        party: Party,
    },
}

const COURSE_COLUMNS: [&str; 6] = [
    "id",
    "name",
    "teacher_id",
    "start_time",
    "end_time",
    "max_size",
];
const STUDENT_COLUMNS: [&str; 2] = ["id", "name"];
const ENROLLMENT_COLUMNS: [&str; 2] = ["student_id", "course_id"];
const COURSE_UPDATE_COLUMNS: [&str; 5] =
    ["name", "teacher_id", "start_time", "end_time", "max_size"];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let stmt = parse_single(sql)?;
    match &stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table a SELECT reads from, without interpreting its filters. Used to describe
/// result columns of statements whose parameters are still placeholders.
pub fn select_table(sql: &str) -> Option<String> {
    match parse_single(sql).ok()? {
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => select
                .from
                .first()
                .and_then(|from| table_factor_name(&from.relation).ok()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_single(sql: &str) -> Result<Statement, SqlError> {
    let dialect = PostgreSqlDialect {};
    let mut stmts =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    Ok(stmts.swap_remove(0))
}

// ── Writes ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();

    match table.as_str() {
        "courses" => {
            let row = Row::bind("courses", &COURSE_COLUMNS, &columns, &values)?;
            Ok(Command::InsertCourse {
                course: Course {
                    id: parse_i64(row.get("id")?)?,
                    name: parse_string(row.get("name")?)?,
                    teacher_id: parse_i64(row.get("teacher_id")?)?,
                    interval: TimeInterval::new(
                        parse_time(row.get("start_time")?)?,
                        parse_time(row.get("end_time")?)?,
                    ),
                    max_size: parse_u32(row.get("max_size")?)?,
                },
            })
        }
        "students" => {
            let row = Row::bind("students", &STUDENT_COLUMNS, &columns, &values)?;
            Ok(Command::InsertStudent {
                student: Student {
                    id: parse_i64(row.get("id")?)?,
                    name: parse_string(row.get("name")?)?,
                },
            })
        }
        "enrollments" => {
            let row = Row::bind("enrollments", &ENROLLMENT_COLUMNS, &columns, &values)?;
            Ok(Command::InsertEnrollment {
                enrollment: Enrollment::new(
                    parse_i64(row.get("student_id")?)?,
                    parse_i64(row.get("course_id")?)?,
                ),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "courses" {
        return Err(SqlError::Unsupported(format!("UPDATE {table}")));
    }

    let mut columns = Vec::with_capacity(assignments.len());
    let mut values = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            _ => None,
        }
        .ok_or_else(|| SqlError::Unsupported("tuple assignment".into()))?;
        columns.push(column);
        values.push(assignment.value.clone());
    }
    let row = Row::bind("courses", &COURSE_UPDATE_COLUMNS, &columns, &values)?;

    let filters = eq_filters(selection)?;
    known_filters("courses", &filters, &["id"])?;
    let id = filter_i64(&filters, "id")?.ok_or(SqlError::MissingFilter("id"))?;

    Ok(Command::UpdateCourse {
        course: Course {
            id,
            name: parse_string(row.get("name")?)?,
            teacher_id: parse_i64(row.get("teacher_id")?)?,
            interval: TimeInterval::new(
                parse_time(row.get("start_time")?)?,
                parse_time(row.get("end_time")?)?,
            ),
            max_size: parse_u32(row.get("max_size")?)?,
        },
    })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = eq_filters(&delete.selection)?;

    match table.as_str() {
        "courses" => {
            known_filters("courses", &filters, &["id"])?;
            let id = filter_i64(&filters, "id")?.ok_or(SqlError::MissingFilter("id"))?;
            Ok(Command::DeleteCourse { id })
        }
        "students" => {
            known_filters("students", &filters, &["id"])?;
            let id = filter_i64(&filters, "id")?.ok_or(SqlError::MissingFilter("id"))?;
            Ok(Command::DeleteStudent { id })
        }
        "enrollments" => {
            known_filters("enrollments", &filters, &ENROLLMENT_COLUMNS)?;
            Ok(Command::DeleteEnrollment {
                enrollment: Enrollment::new(
                    filter_i64(&filters, "student_id")?
                        .ok_or(SqlError::MissingFilter("student_id"))?,
                    filter_i64(&filters, "course_id")?
                        .ok_or(SqlError::MissingFilter("course_id"))?,
                ),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Reads ─────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = eq_filters(&select.selection)?;

    match table.as_str() {
        "courses" => {
            known_filters("courses", &filters, &["teacher_id"])?;
            Ok(Command::SelectCourses {
                teacher_id: filter_i64(&filters, "teacher_id")?,
            })
        }
        "students" => {
            known_filters("students", &filters, &[])?;
            Ok(Command::SelectStudents)
        }
        "enrollments" => {
            known_filters("enrollments", &filters, &ENROLLMENT_COLUMNS)?;
            Ok(Command::SelectEnrollments {
                course_id: filter_i64(&filters, "course_id")?,
                student_id: filter_i64(&filters, "student_id")?,
            })
        }
        "schedule" => {
            known_filters("schedule", &filters, &["teacher_id", "student_id"])?;
            let teacher = filter_i64(&filters, "teacher_id")?;
            let student = filter_i64(&filters, "student_id")?;
            let party = match (teacher, student) {
                (Some(id), None) => Party::Teacher(id),
                (None, Some(id)) => Party::Student(id),
                (None, None) => return Err(SqlError::MissingFilter("teacher_id or student_id")),
                (Some(_), Some(_)) => {
                    return Err(SqlError::Unsupported(
                        "schedule of a teacher and a student at once".into(),
                    ));
                }
            };
            Ok(Command::SelectSchedule { party })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Row binding ───────────────────────────────────────────────

/// Values of one row keyed by column name. Without an explicit column list the
/// values are taken positionally in `expected` order.
struct Row<'a> {
    table: &'static str,
    cells: Vec<(&'static str, &'a Expr)>,
}

impl<'a> Row<'a> {
    fn bind(
        table: &'static str,
        expected: &[&'static str],
        columns: &[String],
        values: &'a [Expr],
    ) -> Result<Self, SqlError> {
        if columns.is_empty() {
            if values.len() != expected.len() {
                return Err(SqlError::WrongArity(table, expected.len(), values.len()));
            }
            return Ok(Self {
                table,
                cells: expected.iter().copied().zip(values.iter()).collect(),
            });
        }

        if columns.len() != values.len() {
            return Err(SqlError::WrongArity(table, columns.len(), values.len()));
        }
        let mut cells = Vec::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(values) {
            let known = expected
                .iter()
                .copied()
                .find(|c| c == column)
                .ok_or_else(|| SqlError::UnknownColumn(table, column.clone()))?;
            cells.push((known, value));
        }
        Ok(Self { table, cells })
    }

    fn get(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.cells
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| *v)
            .ok_or(SqlError::MissingColumn(self.table, column))
    }
}

/// Flatten `a = 1 AND b = 2` into `[(a, 1), (b, 2)]`.
fn eq_filters(selection: &Option<Expr>) -> Result<Vec<(String, &Expr)>, SqlError> {
    let mut out = Vec::new();
    if let Some(expr) = selection {
        collect_eq(expr, &mut out)?;
    }
    Ok(out)
}

fn collect_eq<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq(left, out)?;
            collect_eq(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, right.as_ref()));
            Ok(())
        }
        Expr::Nested(inner) => collect_eq(inner, out),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

/// Reject filters on columns the statement can't narrow by.
fn known_filters(
    table: &'static str,
    filters: &[(String, &Expr)],
    allowed: &[&str],
) -> Result<(), SqlError> {
    match filters.iter().find(|(c, _)| !allowed.contains(&c.as_str())) {
        Some((column, _)) => Err(SqlError::UnknownColumn(table, column.clone())),
        None => Ok(()),
    }
}

fn filter_i64(filters: &[(String, &Expr)], column: &str) -> Result<Option<i64>, SqlError> {
    filters
        .iter()
        .find(|(c, _)| c == column)
        .map(|(_, v)| parse_i64(v))
        .transpose()
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

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
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

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::InvalidValue(format!("{v} out of range")))
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

/// `'HH:MM[:SS[.mmm]]'`, or a bare number of milliseconds since midnight.
fn parse_time(expr: &Expr) -> Result<Ms, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => parse_time_of_day(s)
            .ok_or_else(|| SqlError::InvalidValue(format!("bad time of day: {s:?}"))),
        Some(Value::Number(..)) => {
            let ms = parse_i64(expr)?;
            if !(0..MS_PER_DAY).contains(&ms) {
                return Err(SqlError::InvalidValue(format!("{ms} ms is not a time of day")));
            }
            Ok(ms)
        }
        Some(value) => Err(SqlError::Parse(format!("expected time, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    MissingColumn(&'static str, &'static str),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    /// Well-formed SQL carrying a value outside its domain.
    InvalidValue(String),
}

impl SqlError {
    /// Bad values are the caller's data, not the statement's shape.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, SqlError::InvalidValue(_))
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing column {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = MS_PER_HOUR;

    #[test]
    fn parse_insert_course() {
        let sql = "INSERT INTO courses (id, name, teacher_id, start_time, end_time, max_size) \
                   VALUES (1, 'Algebra', 7, '09:00', '10:00', 30)";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertCourse {
                course: Course {
                    id: 1,
                    name: "Algebra".into(),
                    teacher_id: 7,
                    interval: TimeInterval::new(9 * H, 10 * H),
                    max_size: 30,
                }
            }
        );
    }

    #[test]
    fn parse_insert_course_columns_in_any_order() {
        let sql = "INSERT INTO courses (max_size, end_time, start_time, teacher_id, name, id) \
                   VALUES (5, '15:00:00', '14:00:00', 8, 'Logic', 2)";
        match parse_sql(sql).unwrap() {
            Command::InsertCourse { course } => {
                assert_eq!(course.id, 2);
                assert_eq!(course.teacher_id, 8);
                assert_eq!(course.interval, TimeInterval::new(14 * H, 15 * H));
                assert_eq!(course.max_size, 5);
            }
            cmd => panic!("expected InsertCourse, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_course_positional() {
        let sql = "INSERT INTO courses VALUES (3, 'Topology', 9, '08:00', '09:00', 12)";
        assert!(matches!(
            parse_sql(sql).unwrap(),
            Command::InsertCourse { course } if course.id == 3 && course.max_size == 12
        ));
    }

    #[test]
    fn parse_insert_course_missing_column() {
        let sql = "INSERT INTO courses (id, name, teacher_id, start_time, end_time) \
                   VALUES (1, 'Algebra', 7, '09:00', '10:00')";
        assert!(matches!(
            parse_sql(sql),
            Err(SqlError::MissingColumn("courses", "max_size"))
        ));
    }

    #[test]
    fn bad_time_is_an_invalid_value() {
        let sql = "INSERT INTO courses VALUES (1, 'Algebra', 7, '25:00', '26:00', 30)";
        let err = parse_sql(sql).unwrap_err();
        assert!(err.is_bad_input(), "{err}");
    }

    #[test]
    fn millisecond_times_must_fall_within_the_day() {
        let sql = "INSERT INTO courses VALUES (1, 'Algebra', 7, 32400000, 36000000, 30)";
        match parse_sql(sql).unwrap() {
            Command::InsertCourse { course } => {
                assert_eq!(course.interval, TimeInterval::new(9 * H, 10 * H));
            }
            cmd => panic!("expected InsertCourse, got {cmd:?}"),
        }

        let past_midnight = "INSERT INTO courses VALUES (1, 'x', 7, 100000000, 103600000, 5)";
        let err = parse_sql(past_midnight).unwrap_err();
        assert!(matches!(err, SqlError::InvalidValue(_)), "{err}");

        let negative = "INSERT INTO courses VALUES (1, 'x', 7, -3600000, 0, 5)";
        assert!(parse_sql(negative).is_err());
    }

    #[test]
    fn parse_update_course() {
        let sql = "UPDATE courses SET name = 'Algebra II', teacher_id = 7, start_time = '11:00', \
                   end_time = '12:00', max_size = 40 WHERE id = 1";
        match parse_sql(sql).unwrap() {
            Command::UpdateCourse { course } => {
                assert_eq!(course.id, 1);
                assert_eq!(course.name, "Algebra II");
                assert_eq!(course.interval, TimeInterval::new(11 * H, 12 * H));
                assert_eq!(course.max_size, 40);
            }
            cmd => panic!("expected UpdateCourse, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_requires_every_column_and_id() {
        let partial = "UPDATE courses SET name = 'x' WHERE id = 1";
        assert!(matches!(parse_sql(partial), Err(SqlError::MissingColumn(..))));

        let no_id = "UPDATE courses SET name = 'x', teacher_id = 7, start_time = '11:00', \
                     end_time = '12:00', max_size = 40";
        assert!(matches!(parse_sql(no_id), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn parse_student_statements() {
        assert_eq!(
            parse_sql("INSERT INTO students (id, name) VALUES (3, 'Ada')").unwrap(),
            Command::InsertStudent {
                student: Student { id: 3, name: "Ada".into() }
            }
        );
        assert_eq!(
            parse_sql("DELETE FROM students WHERE id = 3").unwrap(),
            Command::DeleteStudent { id: 3 }
        );
        assert_eq!(parse_sql("SELECT * FROM students").unwrap(), Command::SelectStudents);
    }

    #[test]
    fn parse_enrollment_statements() {
        assert_eq!(
            parse_sql("INSERT INTO enrollments (course_id, student_id) VALUES (1, 3)").unwrap(),
            Command::InsertEnrollment {
                enrollment: Enrollment::new(3, 1)
            }
        );
        assert_eq!(
            parse_sql("DELETE FROM enrollments WHERE student_id = 3 AND course_id = 1").unwrap(),
            Command::DeleteEnrollment {
                enrollment: Enrollment::new(3, 1)
            }
        );
        assert!(matches!(
            parse_sql("DELETE FROM enrollments WHERE student_id = 3"),
            Err(SqlError::MissingFilter("course_id"))
        ));
    }

    #[test]
    fn parse_selects_with_filters() {
        assert_eq!(
            parse_sql("SELECT * FROM courses").unwrap(),
            Command::SelectCourses { teacher_id: None }
        );
        assert_eq!(
            parse_sql("SELECT * FROM courses WHERE teacher_id = 7").unwrap(),
            Command::SelectCourses { teacher_id: Some(7) }
        );
        assert_eq!(
            parse_sql("SELECT * FROM enrollments WHERE course_id = '1'").unwrap(),
            Command::SelectEnrollments {
                course_id: Some(1),
                student_id: None
            }
        );
    }

    #[test]
    fn filters_on_unknown_columns_are_rejected() {
        assert!(matches!(
            parse_sql("SELECT * FROM courses WHERE id = 5"),
            Err(SqlError::UnknownColumn("courses", col)) if col == "id"
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM students WHERE name = 'Ada'"),
            Err(SqlError::UnknownColumn("students", _))
        ));
        assert!(matches!(
            parse_sql("DELETE FROM courses WHERE id = 1 AND teacher_id = 7"),
            Err(SqlError::UnknownColumn("courses", col)) if col == "teacher_id"
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM schedule WHERE teacher_id = 7 AND room = 3"),
            Err(SqlError::UnknownColumn("schedule", _))
        ));
    }

    #[test]
    fn parse_schedule_needs_exactly_one_party() {
        assert_eq!(
            parse_sql("SELECT * FROM schedule WHERE teacher_id = 7").unwrap(),
            Command::SelectSchedule {
                party: Party::Teacher(7)
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM schedule WHERE student_id = 3").unwrap(),
            Command::SelectSchedule {
                party: Party::Student(3)
            }
        );
        assert!(parse_sql("SELECT * FROM schedule").is_err());
        let both = "SELECT * FROM schedule WHERE teacher_id = 7 AND student_id = 3";
        assert!(parse_sql(both).is_err());
    }

    #[test]
    fn select_table_ignores_placeholders() {
        assert_eq!(
            select_table("SELECT * FROM schedule WHERE teacher_id = $1").as_deref(),
            Some("schedule")
        );
        assert_eq!(select_table("DELETE FROM courses WHERE id = 1"), None);
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("INSERT INTO teachers (id) VALUES (1)"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
