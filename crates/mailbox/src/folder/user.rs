//! User folder requests
//!
//! Each call issues exactly one request and hands back the raw response.
//! None of them touch the tree; a root snapshot resync brings it back in
//! line afterwards.

use serde_json::{Value, json};

use crate::error::Result;
use crate::transport::{Request, Transport};

/// Create a folder, top-level when `parent_id` is `None`
pub fn create(transport: &dyn Transport, name: &str, parent_id: Option<&str>) -> Result<Value> {
    let body = match parent_id {
        Some(parent_id) => json!({ "name": name, "parentId": parent_id }),
        None => json!({ "name": name }),
    };
    log::info!("Creating folder {:?}", name);
    transport.execute(&Request::post("folder").json(body))
}

/// Rename a folder
pub fn update(transport: &dyn Transport, id: &str, name: &str) -> Result<Value> {
    transport.execute(&Request::put(format!("folder/{}", id)).json(json!({ "name": name })))
}

/// Move a folder to the trash
pub fn trash(transport: &dyn Transport, id: &str) -> Result<Value> {
    transport.execute(&Request::put(format!("folder/trash/{}", id)))
}

/// Take a folder out of the trash
pub fn restore(transport: &dyn Transport, id: &str) -> Result<Value> {
    transport.execute(&Request::put(format!("folder/restore/{}", id)))
}

/// Delete a folder forever
pub fn delete(transport: &dyn Transport, id: &str) -> Result<Value> {
    transport.execute(&Request::delete(format!("folder/{}", id)))
}
