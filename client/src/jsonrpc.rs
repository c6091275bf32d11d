//! JSON-RPC 2.0 line helpers for talking to the FileEngine service.
//!
//! Messages are exchanged as newline-delimited JSON (NDJSON) lines over a
//! TCP stream. Requests carry identity in the top-level `meta` member.

use std::io::{BufRead, Read, Write};

use fileengine_core::protocol::messages::{CallMeta, JsonRpcNotification, JsonRpcRequest};
use serde_json::Value;

/// Maximum message size: 1 MiB, the service's line limit.
pub const MAX_LINE_SIZE: usize = 1_048_576;

/// A parsed incoming JSON-RPC 2.0 message.
#[derive(Debug)]
pub enum JsonRpcMessage {
    /// A successful response with a result.
    Response { id: u64, result: Value },
    /// An error response.
    Error {
        id: u64,
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// A server-initiated notification (no id), e.g. a download chunk.
    Notification { method: String, params: Value },
}

/// Parse a single NDJSON line into a `JsonRpcMessage`.
///
/// Distinguishes between response, error, and notification by the
/// presence of `id`, `result`, `error`, and `method` fields.
pub fn parse_message(line: &str) -> Result<JsonRpcMessage, String> {
    let v: Value = serde_json::from_str(line).map_err(|e| format!("Invalid JSON: {}", e))?;

    let obj = v.as_object().ok_or("Expected JSON object")?;

    if let Some(id_val) = obj.get("id").filter(|id| !id.is_null()) {
        let id = id_val.as_u64().ok_or("Expected numeric id")?;

        if let Some(error) = obj.get("error") {
            let error_obj = error.as_object().ok_or("Expected error object")?;
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_i64())
                .unwrap_or(-1);
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            let data = error_obj.get("data").cloned();
            return Ok(JsonRpcMessage::Error {
                id,
                code,
                message,
                data,
            });
        }

        let result = obj.get("result").cloned().unwrap_or(Value::Null);
        return Ok(JsonRpcMessage::Response { id, result });
    }

    if obj.contains_key("error") {
        // Errors with a null id answer a request the service could not parse.
        return Err(format!(
            "Service rejected an unparseable request: {}",
            obj["error"]
        ));
    }

    // No id — must be a notification
    let method = obj
        .get("method")
        .and_then(|m| m.as_str())
        .ok_or("Notification missing method")?
        .to_string();
    let params = obj.get("params").cloned().unwrap_or(Value::Null);
    Ok(JsonRpcMessage::Notification { method, params })
}

/// Serialize and write a JSON-RPC request as a single NDJSON line.
pub fn write_request(
    writer: &mut impl Write,
    id: u64,
    method: &str,
    params: Value,
    meta: Option<&CallMeta>,
) -> Result<(), std::io::Error> {
    let req = JsonRpcRequest::new(id, method, params, meta.cloned());
    write_line(writer, &req)
}

/// Serialize and write a notification (used for upload chunks).
pub fn write_notification(
    writer: &mut impl Write,
    method: &str,
    params: Value,
) -> Result<(), std::io::Error> {
    write_line(writer, &JsonRpcNotification::new(method, params))
}

fn write_line(writer: &mut impl Write, message: &impl serde::Serialize) -> std::io::Result<()> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if line.len() > MAX_LINE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Message exceeds 1 MiB limit ({} bytes)", line.len()),
        ));
    }
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()
}

/// Read one newline-terminated line, without the terminator.
///
/// EOF (clean or mid-line) is `UnexpectedEof`; lines longer than
/// [`MAX_LINE_SIZE`] are `InvalidData`.
pub fn read_line(reader: &mut impl BufRead) -> Result<String, std::io::Error> {
    let mut buf = Vec::with_capacity(4096);
    let limit = MAX_LINE_SIZE as u64 + 1;
    reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if buf.last() != Some(&b'\n') {
        if buf.len() as u64 >= limit {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Message exceeds 1 MiB limit",
            ));
        }
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "Connection closed by service",
        ));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
