use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{
    AuthSource, DefaultServerParameterProvider, LoginInfo, Password, StartupHandler,
};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::registrar::{RegistrarError, RejectionKind};
use crate::sql::{self, Command, SqlError};
use crate::tenant::{TenantManager, TenantRegistrar};

pub struct UniregHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<UniregQueryParser>,
}

impl UniregHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(UniregQueryParser),
        }
    }

    fn resolve_registrar<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<TenantRegistrar>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager
            .get_or_create(&db)
            .map_err(|e| user_error("08006", format!("tenant error: {e}")))
    }

    /// Parse, execute and record one statement.
    async fn run(&self, registrar: &TenantRegistrar, sql: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(registrar, cmd).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(
        &self,
        registrar: &TenantRegistrar,
        cmd: Command,
    ) -> PgWireResult<Response> {
        match cmd {
            Command::InsertCourse { course } => {
                registrar.add_course(course).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::UpdateCourse { course } => {
                registrar.update_course(course).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::DeleteCourse { id } => {
                registrar.delete_course(id).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertStudent { student } => {
                registrar.add_student(student).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteStudent { id } => {
                registrar.delete_student(id).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::InsertEnrollment { enrollment } => {
                registrar.enroll(enrollment).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::DeleteEnrollment { enrollment } => {
                registrar.withdraw(enrollment).await.map_err(registrar_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectCourses { teacher_id } => {
                let courses = registrar.list_courses().await.map_err(registrar_err)?;
                let schema = Arc::new(courses_schema());
                let rows: Vec<PgWireResult<_>> = courses
                    .into_iter()
                    .filter(|c| teacher_id.is_none_or(|t| c.teacher_id == t))
                    .map(|c| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&c.id)?;
                        encoder.encode_field(&c.name)?;
                        encoder.encode_field(&c.teacher_id)?;
                        encoder.encode_field(&format_time_of_day(c.interval.start))?;
                        encoder.encode_field(&format_time_of_day(c.interval.end))?;
                        encoder.encode_field(&i64::from(c.max_size))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectStudents => {
                let students = registrar.list_students().await.map_err(registrar_err)?;
                let schema = Arc::new(students_schema());
                let rows: Vec<PgWireResult<_>> = students
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id)?;
                        encoder.encode_field(&s.name)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectEnrollments {
                course_id,
                student_id,
            } => {
                let enrollments = registrar.list_enrollments().await.map_err(registrar_err)?;
                let schema = Arc::new(enrollments_schema());
                let rows: Vec<PgWireResult<_>> = enrollments
                    .into_iter()
                    .filter(|e| course_id.is_none_or(|c| e.course_id == c))
                    .filter(|e| student_id.is_none_or(|s| e.student_id == s))
                    .map(|e| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&e.student_id)?;
                        encoder.encode_field(&e.course_id)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
            Command::SelectSchedule { party } => {
                let mut intervals = registrar.schedule(party).await.map_err(registrar_err)?;
                intervals.sort_by_key(|i| (i.start, i.end));
                tracing::debug!("schedule of {party}: {} intervals", intervals.len());
                let schema = Arc::new(schedule_schema());
                let rows: Vec<PgWireResult<_>> = intervals
                    .into_iter()
                    .map(|i| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&format_time_of_day(i.start))?;
                        encoder.encode_field(&format_time_of_day(i.end))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
            }
        }
    }
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn courses_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("name", Type::VARCHAR),
        field("teacher_id", Type::INT8),
        field("start_time", Type::VARCHAR),
        field("end_time", Type::VARCHAR),
        field("max_size", Type::INT8),
    ]
}

fn students_schema() -> Vec<FieldInfo> {
    vec![field("id", Type::INT8), field("name", Type::VARCHAR)]
}

fn enrollments_schema() -> Vec<FieldInfo> {
    vec![field("student_id", Type::INT8), field("course_id", Type::INT8)]
}

fn schedule_schema() -> Vec<FieldInfo> {
    vec![field("start_time", Type::VARCHAR), field("end_time", Type::VARCHAR)]
}

/// Columns a statement returns; empty for anything but a SELECT on a known table.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    match sql::select_table(sql).as_deref() {
        Some("courses") => courses_schema(),
        Some("students") => students_schema(),
        Some("enrollments") => enrollments_schema(),
        Some("schedule") => schedule_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for UniregHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let registrar = self.resolve_registrar(client)?;
        Ok(vec![self.run(&registrar, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct UniregQueryParser;

#[async_trait]
impl QueryParser for UniregQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for UniregHandler {
    type Statement = String;
    type QueryParser = UniregQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let registrar = self.resolve_registrar(client)?;
        let sql = substitute_params(portal);
        self.run(&registrar, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if let Ok(n) = sql[start..i].parse::<usize>() {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// Highest index first, so `$1` never clobbers the prefix of `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute(&portal.statement.statement, &params)
}

/// Inline `$n` parameters in one left-to-right pass. Placeholders inside quoted
/// literals, and any text a parameter brings in, are left alone.
fn substitute(sql: &str, params: &[Option<String>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;
    while let Some((start, c)) = chars.next() {
        if c == '\'' {
            // `''` toggles twice, so escaped quotes need no special case.
            in_literal = !in_literal;
            result.push(c);
            continue;
        }
        if c != '$' || in_literal {
            result.push(c);
            continue;
        }
        let mut end = start + 1;
        while let Some(&(i, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = i + 1;
            chars.next();
        }
        let index = sql[start + 1..end].parse::<usize>().ok();
        match index.and_then(|n| n.checked_sub(1)).and_then(|i| params.get(i)) {
            Some(Some(text)) => {
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            Some(None) => result.push_str("NULL"),
            None => result.push_str(&sql[start..end]),
        }
    }
    result
}

// ── Auth ─────────────────────────────────────────────────────────

/// Single shared password; any user name is accepted.
#[derive(Debug)]
pub struct UniregAuthSource {
    password: String,
}

impl UniregAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for UniregAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

// ── Factory ──────────────────────────────────────────────────────

pub struct UniregFactory {
    handler: Arc<UniregHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<UniregAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl UniregFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = UniregAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(UniregHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for UniregFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls_acceptor: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = UniregFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls_acceptor, factory).await
}

// ── Error translation ────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn sqlstate(e: &RegistrarError) -> &'static str {
    match e.rejection().map(|r| r.kind()) {
        Some(RejectionKind::BadInput) => "22023",
        Some(RejectionKind::NotFound) => "P0002",
        Some(RejectionKind::Conflict) => "23P01",
        None => "XX000",
    }
}

fn registrar_err(e: RegistrarError) -> PgWireError {
    user_error(sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    let code = if e.is_bad_input() { "22023" } else { "42601" };
    user_error(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::{IntervalError, Rejection};
    use crate::store::StoreError;

    #[test]
    fn count_params_finds_highest_index() {
        assert_eq!(count_params("SELECT * FROM courses"), 0);
        assert_eq!(
            count_params("DELETE FROM enrollments WHERE student_id = $2 AND course_id = $1"),
            2
        );
        assert_eq!(count_params("INSERT INTO students VALUES ($10, $1)"), 10);
    }

    #[test]
    fn substitute_quotes_and_escapes() {
        let sql = "INSERT INTO students (id, name) VALUES ($1, $2)";
        let out = substitute(sql, &[Some("3".into()), Some("O'Brien".into())]);
        assert_eq!(out, "INSERT INTO students (id, name) VALUES ('3', 'O''Brien')");

        let out = substitute("SELECT $1, $10", &vec![None; 10]);
        assert_eq!(out, "SELECT NULL, NULL");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let sql = "INSERT INTO students (id, name) VALUES ($1, $2)";
        let out = substitute(sql, &[Some("3".into()), Some("costs $1".into())]);
        assert_eq!(out, "INSERT INTO students (id, name) VALUES ('3', 'costs $1')");

        let out = substitute("SELECT $2, $1", &[Some("$2".into()), Some("x".into())]);
        assert_eq!(out, "SELECT 'x', '$2'");
    }

    #[test]
    fn placeholders_inside_literals_stay_put() {
        let sql = "INSERT INTO students (id, name) VALUES ($1, 'it''s $1')";
        let out = substitute(sql, &[Some("3".into())]);
        assert_eq!(out, "INSERT INTO students (id, name) VALUES ('3', 'it''s $1')");

        // Out of range or bare `$` pass through untouched.
        assert_eq!(substitute("SELECT $3, $", &[None]), "SELECT $3, $");
    }

    #[test]
    fn result_schema_follows_the_table() {
        assert_eq!(result_schema("SELECT * FROM courses").len(), 6);
        assert_eq!(result_schema("SELECT * FROM schedule WHERE student_id = $1").len(), 2);
        assert!(result_schema("DELETE FROM courses WHERE id = 1").is_empty());
    }

    #[test]
    fn rejections_map_to_sqlstates() {
        let bad: RegistrarError = Rejection::InvalidTime(IntervalError::WrongDuration).into();
        let missing: RegistrarError = Rejection::CourseNotFound(4).into();
        let full: RegistrarError = Rejection::CourseFull {
            course_id: 4,
            max_size: 2,
        }
        .into();
        let fault: RegistrarError = StoreError::Wal("disk full".into()).into();

        assert_eq!(sqlstate(&bad), "22023");
        assert_eq!(sqlstate(&missing), "P0002");
        assert_eq!(sqlstate(&full), "23P01");
        assert_eq!(sqlstate(&fault), "XX000");
    }
}
