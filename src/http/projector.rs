//! Response projector
//!
//! Copies fields out of a reply or event body into the response envelope
//! according to the reply type's [`ResponseDescriptor`]. Source fields may
//! be dotted paths into nested objects (`inventory.uuid`).

use serde_json::Value;
use std::collections::BTreeMap;

use super::envelope::ApiResponse;
use crate::error::ProjectionError;
use crate::routing::{ApiRegistry, Projection, ResponseDescriptor};

/// Envelope for a successful reply or event of type `type_name`
pub fn project(
    registry: &ApiRegistry,
    type_name: &str,
    body: &Value,
    with_schema: bool,
) -> Result<ApiResponse, ProjectionError> {
    let descriptor = registry
        .response(type_name)
        .ok_or_else(|| ProjectionError::NoDescriptor(type_name.to_string()))?;
    let mut response = ApiResponse::default();
    write_response(&mut response, descriptor, body, with_schema)?;
    Ok(response)
}

/// Project `body` into `response`; attach a schema when asked for
pub fn write_response(
    response: &mut ApiResponse,
    descriptor: &ResponseDescriptor,
    body: &Value,
    with_schema: bool,
) -> Result<(), ProjectionError> {
    match descriptor.projection() {
        Projection::All(field) => {
            let value = lookup(descriptor, body, field)?;
            response.fields.insert(field.clone(), value.clone());
        }
        Projection::Fields(pairs) => {
            for (key, source) in pairs {
                let value = lookup(descriptor, body, source)?;
                response.fields.insert(key.clone(), value.clone());
            }
        }
    }

    if with_schema {
        let mut schema = BTreeMap::new();
        for (key, value) in &response.fields {
            describe(key, value, &mut schema);
        }
        response.schema = Some(schema);
    }
    Ok(())
}

fn lookup<'a>(
    descriptor: &ResponseDescriptor,
    body: &'a Value,
    path: &str,
) -> Result<&'a Value, ProjectionError> {
    path.split('.')
        .try_fold(body, |value, segment| value.as_object()?.get(segment))
        .ok_or_else(|| ProjectionError::MissingField {
            field: path.to_string(),
            type_name: descriptor.type_name().to_string(),
        })
}

/// JSON type name of a value
pub const fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Record `path` and, for objects, every nested field below it
fn describe(path: &str, value: &Value, schema: &mut BTreeMap<String, String>) {
    schema.insert(path.to_string(), type_of(value).to_string());
    if let Value::Object(map) = value {
        for (key, child) in map {
            describe(&format!("{path}.{key}"), child, schema);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RestResponse;
    use serde_json::json;

    fn event() -> Value {
        json!({
            "inventory": {"uuid": "vm-1", "state": "Running", "cpuNum": 2},
            "extra": true,
        })
    }

    #[test]
    fn test_wildcard_copies_subtree() {
        let descriptor = ResponseDescriptor::new(
            "APIStartVmInstanceEvent",
            &RestResponse {
                all_to: "inventory",
                fields_to: &[],
            },
        )
        .unwrap();
        let mut response = ApiResponse::default();
        write_response(&mut response, &descriptor, &event(), false).unwrap();

        assert_eq!(response.fields.len(), 1);
        assert_eq!(response.fields["inventory"], event()["inventory"]);
        assert!(response.schema.is_none());
    }

    #[test]
    fn test_named_fields_only() {
        let descriptor = ResponseDescriptor::new(
            "APIRebootVmInstanceEvent",
            &RestResponse {
                all_to: "",
                fields_to: &["id=inventory.uuid", "flag=extra"],
            },
        )
        .unwrap();
        let mut response = ApiResponse::default();
        write_response(&mut response, &descriptor, &event(), false).unwrap();

        assert_eq!(response.fields.len(), 2);
        assert_eq!(response.fields["id"], "vm-1");
        assert_eq!(response.fields["flag"], true);
    }

    #[test]
    fn test_missing_field_is_error() {
        let descriptor = ResponseDescriptor::new(
            "APIQueryVmInstanceReply",
            &RestResponse {
                all_to: "inventories",
                fields_to: &[],
            },
        )
        .unwrap();
        let err = write_response(&mut ApiResponse::default(), &descriptor, &event(), false)
            .unwrap_err();
        assert_eq!(
            err,
            ProjectionError::MissingField {
                field: "inventories".to_string(),
                type_name: "APIQueryVmInstanceReply".to_string(),
            }
        );
    }

    #[test]
    fn test_schema_recurses_into_objects() {
        let descriptor = ResponseDescriptor::new(
            "APIStartVmInstanceEvent",
            &RestResponse {
                all_to: "inventory",
                fields_to: &[],
            },
        )
        .unwrap();
        let mut response = ApiResponse::default();
        write_response(&mut response, &descriptor, &event(), true).unwrap();

        let schema = response.schema.unwrap();
        assert_eq!(schema["inventory"], "object");
        assert_eq!(schema["inventory.uuid"], "string");
        assert_eq!(schema["inventory.cpuNum"], "number");
        assert!(!schema.contains_key("extra"));
    }
}
