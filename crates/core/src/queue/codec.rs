//! Binary cache file codec
//!
//! Layout: a `u64` record count followed by one fixed-order record per
//! operation, all encoded with bincode (fixed-width integers, little
//! endian). Each record carries a CRC32 of its body bytes. Authorization
//! header values are never written.

use std::io::Cursor;
use std::str::FromStr;

use bincode::Options;
use resync_domain::constants::{AUTHORIZATION_HEADER, REDACTED_HEADER_VALUE};
use resync_domain::{ApiRequest, HttpMethod, OperationKind, RequestBody, ResponseStatus};
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use crate::client::errors::{ClientError, ClientResult};

#[derive(Debug, Serialize, Deserialize)]
struct OperationRecord {
    kind: u8,
    group_key: String,
    item_key: String,
    method: String,
    uri: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    content_type: Option<String>,
    body: Vec<u8>,
    body_crc: u32,
    expected_status: u16,
    max_attempts: u32,
    attempts_made: u32,
    enqueued_at: u64,
    is_async: bool,
}

impl From<&Operation> for OperationRecord {
    fn from(op: &Operation) -> Self {
        let request = &op.request;
        let headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                    (name.clone(), REDACTED_HEADER_VALUE.to_string())
                } else {
                    (name.clone(), value.clone())
                }
            })
            .collect();
        let (content_type, body) = match &request.body {
            Some(body) => (Some(body.content_type.clone()), body.bytes.clone()),
            None => (None, Vec::new()),
        };

        Self {
            kind: op.kind.tag(),
            group_key: op.group_key.clone(),
            item_key: op.item_key.clone(),
            method: request.method.as_str().to_string(),
            uri: request.uri.clone(),
            query: request.query.clone(),
            headers,
            content_type,
            body_crc: crc32fast::hash(&body),
            body,
            expected_status: op.expected_status.to_wire(),
            max_attempts: op.max_attempts,
            attempts_made: op.attempts_made,
            enqueued_at: op.enqueued_at,
            is_async: op.is_async,
        }
    }
}

impl TryFrom<OperationRecord> for Operation {
    type Error = ClientError;

    fn try_from(record: OperationRecord) -> ClientResult<Self> {
        let kind = OperationKind::from_tag(record.kind)
            .ok_or_else(|| ClientError::cache_format(format!("unknown operation kind {}", record.kind)))?;
        let method = HttpMethod::from_str(&record.method).map_err(ClientError::CacheFormat)?;

        if crc32fast::hash(&record.body) != record.body_crc {
            return Err(ClientError::cache_format(format!(
                "body checksum mismatch for {}/{}",
                record.group_key, record.item_key
            )));
        }
        let body = match record.content_type {
            Some(content_type) => Some(RequestBody { content_type, bytes: record.body }),
            None if record.body.is_empty() => None,
            None => return Err(ClientError::cache_format("body without content type")),
        };

        let request = ApiRequest {
            method,
            uri: record.uri,
            query: record.query,
            headers: record.headers,
            body,
        };

        let mut op = Operation::new(kind, record.group_key, record.item_key, request)
            .expecting(ResponseStatus::from_wire(record.expected_status))
            .with_max_attempts(record.max_attempts)
            .enqueued_at(record.enqueued_at);
        op.attempts_made = record.attempts_made;
        op.is_async = record.is_async;
        Ok(op)
    }
}

fn options() -> impl Options + Copy {
    bincode::DefaultOptions::new().with_fixint_encoding().with_little_endian()
}

/// Encode `operations` in iteration order.
pub fn encode<'a>(operations: impl ExactSizeIterator<Item = &'a Operation>) -> ClientResult<Vec<u8>> {
    let options = options();
    let mut buffer = Vec::new();
    options.serialize_into(&mut buffer, &(operations.len() as u64))?;
    for op in operations {
        options.serialize_into(&mut buffer, &OperationRecord::from(op))?;
    }
    Ok(buffer)
}

/// Decode a whole cache file. Any malformed record fails the entire decode.
pub fn decode(bytes: &[u8]) -> ClientResult<Vec<Operation>> {
    if bytes.is_empty() {
        return Err(ClientError::cache_format("file is empty"));
    }

    let options = options().with_limit(bytes.len() as u64);
    let mut cursor = Cursor::new(bytes);
    let count: u64 = options.deserialize_from(&mut cursor)?;

    // Every record takes well over one byte, so a larger count is corrupt.
    if count > bytes.len() as u64 {
        return Err(ClientError::cache_format(format!(
            "header declares {count} records in a {} byte file",
            bytes.len()
        )));
    }

    let mut operations = Vec::with_capacity(count as usize);
    for index in 0..count {
        let record: OperationRecord = options
            .deserialize_from(&mut cursor)
            .map_err(|e| ClientError::cache_format(format!("record {index}: {e}")))?;
        operations.push(Operation::try_from(record)?);
    }

    let consumed = cursor.position();
    if consumed != bytes.len() as u64 {
        return Err(ClientError::cache_format(format!(
            "{} trailing bytes after {count} records",
            bytes.len() as u64 - consumed
        )));
    }

    Ok(operations)
}
