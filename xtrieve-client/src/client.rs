//! High-level record API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bytes::Bytes;
use xtrieve_protocol::{
    FileSpec, FileStat, LockBias, Operation, PositionBlock, Request, StatusCode,
};

/// Outcome of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub data: Bytes,
    pub key: Bytes,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts a non-success status into [`ClientError::Status`].
    pub fn check(self) -> Result<Self, ClientError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Status(self.status))
        }
    }
}

/// High-level client for an xtrieve engine.
///
/// Every cursor-based call sends the caller's position block and, once the
/// exchange completes, overwrites it with the block the engine returned,
/// whatever the status.
pub struct Client {
    conn: Connection,
}

impl Client {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Connects to the engine at `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        Ok(Self::new(Connection::connect(host, port).await?))
    }

    pub async fn connect_with(
        host: &str,
        port: u16,
        config: ConnectionConfig,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(Connection::connect_with(host, port, config).await?))
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub async fn disconnect(&mut self) {
        self.conn.disconnect().await;
    }

    // =========================================================================
    // Generic call
    // =========================================================================

    /// Executes `request` with `cursor` as its position block.
    pub async fn call(
        &mut self,
        cursor: &mut PositionBlock,
        request: Request,
    ) -> Result<Reply, ClientError> {
        let request = request.with_position_block(*cursor);
        let response = self.conn.execute(&request).await?;
        cursor.replace_with(&response.position_block);
        Ok(Reply {
            status: response.status,
            data: response.data,
            key: response.key,
        })
    }

    // =========================================================================
    // File operations
    // =========================================================================

    /// Opens `path`. `mode` is the open mode (0 normal, -1 accelerated,
    /// -2 read-only, -3 verify, -4 exclusive).
    pub async fn open(
        &mut self,
        cursor: &mut PositionBlock,
        path: &str,
        mode: i16,
    ) -> Result<Reply, ClientError> {
        let request = Request::new(Operation::Open)
            .with_file_path(path)
            .with_key_number(mode);
        self.call(cursor, request).await
    }

    pub async fn close(&mut self, cursor: &mut PositionBlock) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::Close)).await
    }

    /// Creates `path` with the layout described by `spec`.
    pub async fn create(&mut self, path: &str, spec: &FileSpec) -> Result<Reply, ClientError> {
        let data = spec.encode().map_err(ClientError::InvalidRequest)?;
        let request = Request::new(Operation::Create)
            .with_file_path(path)
            .with_data(data);
        let mut scratch = PositionBlock::new();
        self.call(&mut scratch, request).await
    }

    pub async fn stat(&mut self, cursor: &mut PositionBlock) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::Stat)).await
    }

    /// Runs Stat and parses the reply.
    pub async fn file_stat(&mut self, cursor: &mut PositionBlock) -> Result<FileStat, ClientError> {
        let reply = self.stat(cursor).await?.check()?;
        FileStat::parse(&reply.data).map_err(ClientError::Status)
    }

    // =========================================================================
    // Record operations
    // =========================================================================

    pub async fn insert(
        &mut self,
        cursor: &mut PositionBlock,
        record: &[u8],
    ) -> Result<Reply, ClientError> {
        let request = Request::new(Operation::Insert).with_data(Bytes::copy_from_slice(record));
        self.call(cursor, request).await
    }

    /// Replaces the current record.
    pub async fn update(
        &mut self,
        cursor: &mut PositionBlock,
        record: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        let request = Request::new(Operation::Update)
            .with_data(Bytes::copy_from_slice(record))
            .with_key_number(key_number);
        self.call(cursor, request).await
    }

    /// Deletes the current record.
    pub async fn delete(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        let request = Request::new(Operation::Delete).with_key_number(key_number);
        self.call(cursor, request).await
    }

    // =========================================================================
    // Keyed navigation
    // =========================================================================

    async fn keyed(
        &mut self,
        op: Operation,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        let request = Request::new(op)
            .with_key(Bytes::copy_from_slice(key))
            .with_key_number(key_number);
        self.call(cursor, request).await
    }

    pub async fn get_equal(
        &mut self,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetEqual, cursor, key, key_number).await
    }

    pub async fn get_next(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetNext, cursor, &[], key_number).await
    }

    pub async fn get_previous(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetPrevious, cursor, &[], key_number).await
    }

    pub async fn get_greater(
        &mut self,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetGreater, cursor, key, key_number).await
    }

    pub async fn get_greater_or_equal(
        &mut self,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetGreaterOrEqual, cursor, key, key_number)
            .await
    }

    pub async fn get_less(
        &mut self,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetLess, cursor, key, key_number).await
    }

    pub async fn get_less_or_equal(
        &mut self,
        cursor: &mut PositionBlock,
        key: &[u8],
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetLessOrEqual, cursor, key, key_number)
            .await
    }

    pub async fn get_first(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetFirst, cursor, &[], key_number).await
    }

    pub async fn get_last(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        self.keyed(Operation::GetLast, cursor, &[], key_number).await
    }

    // =========================================================================
    // Physical navigation
    // =========================================================================

    pub async fn step_first(&mut self, cursor: &mut PositionBlock) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::StepFirst)).await
    }

    pub async fn step_next(&mut self, cursor: &mut PositionBlock) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::StepNext)).await
    }

    pub async fn step_previous(
        &mut self,
        cursor: &mut PositionBlock,
    ) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::StepPrevious))
            .await
    }

    pub async fn step_last(&mut self, cursor: &mut PositionBlock) -> Result<Reply, ClientError> {
        self.call(cursor, Request::new(Operation::StepLast)).await
    }

    // =========================================================================
    // Transactions and locks
    // =========================================================================

    pub async fn begin_transaction(&mut self, lock_bias: LockBias) -> Result<Reply, ClientError> {
        let mut scratch = PositionBlock::new();
        let request = Request::new(Operation::BeginTransaction).with_lock_bias(lock_bias);
        self.call(&mut scratch, request).await
    }

    pub async fn end_transaction(&mut self) -> Result<Reply, ClientError> {
        let mut scratch = PositionBlock::new();
        self.call(&mut scratch, Request::new(Operation::EndTransaction))
            .await
    }

    pub async fn abort_transaction(&mut self) -> Result<Reply, ClientError> {
        let mut scratch = PositionBlock::new();
        self.call(&mut scratch, Request::new(Operation::AbortTransaction))
            .await
    }

    /// Releases record locks held through `cursor`. `key_number` -1 releases
    /// the current record, -2 releases every multiple-record lock.
    pub async fn unlock(
        &mut self,
        cursor: &mut PositionBlock,
        key_number: i16,
    ) -> Result<Reply, ClientError> {
        let request = Request::new(Operation::Unlock).with_key_number(key_number);
        self.call(cursor, request).await
    }
}
