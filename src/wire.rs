use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
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

use crate::auth::StaydAuthSource;
use crate::engine::Engine;
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct StaydHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<StaydQueryParser>,
}

impl StaydHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(StaydQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn run(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertHomestay { id, name } => {
                engine.create_homestay(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateHomestay { id, name } => {
                engine.update_homestay(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteHomestay { id } => {
                engine.delete_homestay(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertRoom {
                id,
                homestay_id,
                name,
            } => {
                engine
                    .create_room(id, homestay_id, name)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateRoom { id, name } => {
                engine.update_room(id, name).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteRoom { id } => {
                engine.delete_room(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertBooking {
                id,
                room_id,
                range,
                guest,
            } => {
                engine
                    .request_booking(id, room_id, range, guest)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::BatchInsertBookings { bookings } => {
                let count = bookings.len();
                engine
                    .batch_request_bookings(bookings)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(
                    Tag::new("INSERT").with_rows(count),
                )])
            }
            Command::UpdateBookingStatus { id, status } => {
                engine
                    .set_booking_status(id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteBooking { id } => {
                engine.remove_booking(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertBlock {
                id,
                homestay_id,
                room_id,
                range,
                reason,
            } => {
                engine
                    .add_block(id, homestay_id, room_id, range, reason)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateBlock { id, range } => {
                engine.update_block(id, range).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteBlock { id } => {
                engine.remove_block(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SelectHomestays => {
                let homestays = engine.list_homestays().await;
                let schema = Arc::new(homestays_schema());
                let rows: Vec<PgWireResult<_>> = homestays
                    .into_iter()
                    .map(|h| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&h.id.to_string())?;
                        encoder.encode_field(&h.name)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectRooms { homestay_id } => {
                let rooms = engine.list_rooms(homestay_id).await.map_err(engine_err)?;
                let schema = Arc::new(rooms_schema());
                let rows: Vec<PgWireResult<_>> = rooms
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.homestay_id.to_string())?;
                        encoder.encode_field(&r.name)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectBookings { target, status } => {
                let bookings = engine
                    .list_bookings(target, status)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(bookings_schema());
                let rows: Vec<PgWireResult<_>> = bookings
                    .into_iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&b.room_id.to_string())?;
                        encoder.encode_field(&b.check_in.to_string())?;
                        encoder.encode_field(&b.check_out.to_string())?;
                        encoder.encode_field(&b.status.as_str())?;
                        encoder.encode_field(&b.guest)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectBlocks { target } => {
                let blocks = engine.list_blocks(target).await.map_err(engine_err)?;
                let schema = Arc::new(blocks_schema());
                let rows: Vec<PgWireResult<_>> = blocks
                    .into_iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&b.homestay_id.to_string())?;
                        encoder.encode_field(&b.room_id.map(|r| r.to_string()))?;
                        encoder.encode_field(&b.start.to_string())?;
                        encoder.encode_field(&b.end.to_string())?;
                        encoder.encode_field(&b.reason)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAvailability {
                target,
                window,
                min_nights,
                boolean,
            } => {
                if boolean {
                    let free = engine
                        .is_available(target, window)
                        .await
                        .map_err(engine_err)?;
                    let schema = Arc::new(is_available_schema());
                    let mut encoder = DataRowEncoder::new(schema.clone());
                    encoder.encode_field(&free)?;
                    let rows = vec![Ok(encoder.take_row())];
                    Ok(vec![Response::Query(QueryResponse::new(
                        schema,
                        stream::iter(rows),
                    ))])
                } else {
                    let free = engine
                        .availability(target, window, min_nights)
                        .await
                        .map_err(engine_err)?;
                    Ok(vec![range_rows(target, free)?])
                }
            }
            Command::SelectUnavailable { target, window } => {
                let busy = engine
                    .unavailable_ranges(target, window)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![range_rows(target, busy)?])
            }
        }
    }
}

fn range_rows(target: TargetId, ranges: Vec<DateRange>) -> PgWireResult<Response> {
    let schema = Arc::new(ranges_schema());
    let target_str = target.id().to_string();
    let rows: Vec<PgWireResult<_>> = ranges
        .into_iter()
        .map(|r| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&target_str)?;
            encoder.encode_field(&r.start.to_string())?;
            encoder.encode_field(&r.end.to_string())?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(
        schema,
        stream::iter(rows),
    )))
}

// ── Row schemas ──────────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn homestays_schema() -> Vec<FieldInfo> {
    vec![text_field("id"), text_field("name")]
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("homestay_id"),
        text_field("name"),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("room_id"),
        text_field("check_in"),
        text_field("check_out"),
        text_field("status"),
        text_field("guest"),
    ]
}

fn blocks_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("homestay_id"),
        text_field("room_id"),
        text_field("start"),
        text_field("end"),
        text_field("reason"),
    ]
}

/// Dates render as 'YYYY-MM-DD' text.
fn ranges_schema() -> Vec<FieldInfo> {
    vec![
        text_field("target_id"),
        text_field("start"),
        text_field("end"),
    ]
}

fn is_available_schema() -> Vec<FieldInfo> {
    vec![FieldInfo::new(
        "is_available".into(),
        None,
        None,
        Type::BOOL,
        FieldFormat::Text,
    )]
}

/// Best-effort schema for Describe before the statement runs. Checked
/// most specific first: the is_available projection, then the
/// unavailable pseudo-table, then availability, then the real tables.
fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("IS_AVAILABLE") {
        is_available_schema()
    } else if upper.contains("UNAVAILABLE") {
        ranges_schema()
    } else if upper.contains("AVAILABILITY") {
        ranges_schema()
    } else if upper.contains("BLOCKED_DATES") {
        blocks_schema()
    } else if upper.contains("BOOKINGS") {
        bookings_schema()
    } else if upper.contains("ROOMS") {
        rooms_schema()
    } else if upper.contains("HOMESTAYS") {
        homestays_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for StaydHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.run(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct StaydQueryParser;

#[async_trait]
impl QueryParser for StaydQueryParser {
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
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for StaydHandler {
    type Statement = String;
    type QueryParser = StaydQueryParser;

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
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.run(&engine, cmd).await?;
        Ok(responses.remove(0))
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
            schema_for_statement(&target.statement),
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
        Ok(DescribePortalResponse::new(schema_for_statement(
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
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    if n > max {
                        max = n;
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct StaydFactory {
    handler: Arc<StaydHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<StaydAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl StaydFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = StaydAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(StaydHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for StaydFactory {
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

/// Serve one client connection to completion.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(StaydFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
