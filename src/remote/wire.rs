//! Request and response shapes of the task service

use crate::node::Action;
use crate::{NoteSyncError, Result};
use serde::Serialize;
use serde_json::Value;

const SETUP_BEGIN: &str = "_setup(";
const SETUP_END: &str = ")}</script>";

/// Body of every POST, sent as the form field `r`
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub action_list: &'a [Action],
    pub client_version: i64,
}

impl<'a> Envelope<'a> {
    pub fn new(action_list: &'a [Action], client_version: i64) -> Self {
        Self {
            action_list,
            client_version,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn malformed(msg: impl Into<String>) -> NoteSyncError {
    NoteSyncError::MalformedResponse(msg.into())
}

/// The JSON object the landing page passes to `_setup(...)`
pub fn extract_setup(body: &str) -> Result<Value> {
    let start = body
        .find(SETUP_BEGIN)
        .map(|i| i + SETUP_BEGIN.len())
        .ok_or_else(|| malformed("landing page has no setup call"))?;
    let end = body
        .rfind(SETUP_END)
        .filter(|&end| end >= start)
        .ok_or_else(|| malformed("landing page setup call is not terminated"))?;

    serde_json::from_str(&body[start..end])
        .map_err(|e| malformed(format!("setup object is not JSON: {}", e)))
}

/// Client version (`v`) announced by the setup object
pub fn client_version(setup: &Value) -> Result<i64> {
    setup
        .get("v")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("setup object has no client version"))
}

/// Raw list objects from the setup object (`t.lists`)
pub fn setup_lists(setup: &Value) -> Result<Vec<Value>> {
    setup
        .get("t")
        .and_then(|t| t.get("lists"))
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| malformed("setup object has no task lists"))
}

/// Decode a POST response body
pub fn parse_response(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| malformed(format!("response is not JSON: {}", e)))
}

/// Remote id assigned by a single create (`results[0].new_id`)
pub fn new_id(response: &Value) -> Result<String> {
    response
        .get("results")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("new_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("create response has no new id"))
}

/// Raw task objects of a `get_all` response
pub fn tasks(response: &Value) -> Result<Vec<Value>> {
    response
        .get("tasks")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| malformed("get_all response has no tasks"))
}
