//! Bundled VM instance API set
//!
//! A small catalog covering every dispatch shape the gateway supports:
//! - async create (`POST /vm-instances`)
//! - query with a single-resource path (`GET /vm-instances[/{uuid}]`)
//! - async delete (`DELETE /vm-instances/{uuid}`)
//! - two actions sharing `PUT /vm-instances/{uuid}/actions`
//! - a credential-exempt sync login (`PUT /accounts/login`)
//!
//! [`local_bus`] wires in-memory services for all of them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::bridge::LocalBus;
use crate::error::FieldError;
use crate::message::{
    build_message, ApiMessage, ErrorCode, FieldTable, InvalidValue, MessageHeader, MessageKind,
    MessageType, ResponseType, RestMethod, RestRequest, RestResponse,
};
use crate::query::{QueryOp, QueryParams};

/// Error code of services asked about a VM they do not know
pub const VM_NOT_FOUND: &str = "VM.1000";
/// Error code of a rejected login
pub const LOGIN_FAILED: &str = "ID.1001";

/// Implements [`ApiMessage`] over a `header` field and a static field table
macro_rules! api_message {
    ($ty:ident, $name:literal, $fields:ident) => {
        impl ApiMessage for $ty {
            api_message!(@common $name, $fields);
        }
    };
    ($ty:ident, $name:literal, $fields:ident, query) => {
        impl ApiMessage for $ty {
            api_message!(@common $name, $fields);

            fn query_mut(&mut self) -> Option<&mut QueryParams> {
                Some(&mut self.query)
            }

            fn query(&self) -> Option<&QueryParams> {
                Some(&self.query)
            }
        }
    };
    (@common $name:literal, $fields:ident) => {
        fn type_name(&self) -> &'static str {
            $name
        }

        fn header(&self) -> &MessageHeader {
            &self.header
        }

        fn header_mut(&mut self) -> &mut MessageHeader {
            &mut self.header
        }

        fn set_field(&mut self, name: &str, value: &str) -> Result<(), FieldError> {
            $fields.set(self, name, value)
        }

        fn to_json(&self) -> Result<Value, serde_json::Error> {
            wire_json(&self.header, self)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    };
}

/// Header fields merged with the message's own payload
fn wire_json(header: &MessageHeader, body: &impl Serialize) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(body)?;
    if let (Value::Object(map), Value::Object(head)) = (&mut value, serde_json::to_value(header)?) {
        map.extend(head);
    }
    Ok(value)
}

// Setters shared by several field tables

fn set_name<T: Named>(msg: &mut T, value: &str) -> Result<(), InvalidValue> {
    *msg.name_mut() = value.to_string();
    Ok(())
}

fn set_uuid<T: Targeted>(msg: &mut T, value: &str) -> Result<(), InvalidValue> {
    if value.is_empty() {
        return Err(InvalidValue);
    }
    *msg.uuid_mut() = value.to_string();
    Ok(())
}

trait Named {
    fn name_mut(&mut self) -> &mut String;
}

trait Targeted {
    fn uuid_mut(&mut self) -> &mut String;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVmInstanceMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instance_offering_uuid: String,
    #[serde(default)]
    pub image_uuid: String,
    #[serde(default)]
    pub l3_network_uuids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Named for CreateVmInstanceMsg {
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
}

static CREATE_VM_FIELDS: FieldTable<CreateVmInstanceMsg> =
    FieldTable::new("APICreateVmInstanceMsg", &[("name", set_name)]);

api_message!(CreateVmInstanceMsg, "APICreateVmInstanceMsg", CREATE_VM_FIELDS);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryVmInstanceMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(flatten)]
    pub query: QueryParams,
}

static QUERY_VM_FIELDS: FieldTable<QueryVmInstanceMsg> =
    FieldTable::new("APIQueryVmInstanceMsg", &[]);

api_message!(QueryVmInstanceMsg, "APIQueryVmInstanceMsg", QUERY_VM_FIELDS, query);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyVmInstanceMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(default)]
    pub uuid: String,
    /// `Permissive` or `Enforcing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_mode: Option<String>,
}

impl Targeted for DestroyVmInstanceMsg {
    fn uuid_mut(&mut self) -> &mut String {
        &mut self.uuid
    }
}

static DESTROY_VM_FIELDS: FieldTable<DestroyVmInstanceMsg> =
    FieldTable::new("APIDestroyVmInstanceMsg", &[("uuid", set_uuid)]);

api_message!(DestroyVmInstanceMsg, "APIDestroyVmInstanceMsg", DESTROY_VM_FIELDS);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVmInstanceMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(default)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_uuid: Option<String>,
}

impl Targeted for StartVmInstanceMsg {
    fn uuid_mut(&mut self) -> &mut String {
        &mut self.uuid
    }
}

static START_VM_FIELDS: FieldTable<StartVmInstanceMsg> =
    FieldTable::new("APIStartVmInstanceMsg", &[("uuid", set_uuid)]);

api_message!(StartVmInstanceMsg, "APIStartVmInstanceMsg", START_VM_FIELDS);

/// Addresses its VM as `vmInstanceUuid`; the URL variable is mapped onto it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebootVmInstanceMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(default)]
    pub vm_instance_uuid: String,
}

impl Targeted for RebootVmInstanceMsg {
    fn uuid_mut(&mut self) -> &mut String {
        &mut self.vm_instance_uuid
    }
}

static REBOOT_VM_FIELDS: FieldTable<RebootVmInstanceMsg> =
    FieldTable::new("APIRebootVmInstanceMsg", &[("vmInstanceUuid", set_uuid)]);

api_message!(RebootVmInstanceMsg, "APIRebootVmInstanceMsg", REBOOT_VM_FIELDS);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInByAccountMsg {
    #[serde(skip)]
    header: MessageHeader,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub password: String,
}

static LOGIN_FIELDS: FieldTable<LogInByAccountMsg> =
    FieldTable::new("APILogInByAccountMsg", &[]);

api_message!(LogInByAccountMsg, "APILogInByAccountMsg", LOGIN_FIELDS);

const fn all_to(field: &'static str) -> Option<RestResponse> {
    Some(RestResponse {
        all_to: field,
        fields_to: &[],
    })
}

/// Every message type of the catalog, in registration order
pub fn message_types() -> Vec<MessageType> {
    let mut create = RestRequest::new("/vm-instances", RestMethod::Post);
    create.parameter_name = "params";

    let mut query = RestRequest::new("/vm-instances", RestMethod::Get);
    query.optional_paths = &["/vm-instances/{uuid}"];
    query.parameter_name = "params";

    let mut destroy = RestRequest::new("/vm-instances/{uuid}", RestMethod::Delete);
    destroy.parameter_name = "params";

    let mut start = RestRequest::new("/vm-instances/{uuid}/actions", RestMethod::Put);
    start.is_action = true;

    let mut reboot = RestRequest::new("/vm-instances/{uuid}/actions", RestMethod::Put);
    reboot.is_action = true;
    reboot.mapping_fields = &["uuid=vmInstanceUuid"];

    let mut login = RestRequest::new("/accounts/login", RestMethod::Put);
    login.parameter_name = "logInByAccount";

    vec![
        MessageType {
            name: "APICreateVmInstanceMsg",
            kind: MessageKind::Async,
            request: create,
            response: ResponseType {
                name: "APICreateVmInstanceEvent",
                rest: all_to("inventory"),
            },
            suppress_credential_check: false,
            build: build_message::<CreateVmInstanceMsg>,
        },
        MessageType {
            name: "APIQueryVmInstanceMsg",
            kind: MessageKind::Query,
            request: query,
            response: ResponseType {
                name: "APIQueryVmInstanceReply",
                rest: all_to("inventories"),
            },
            suppress_credential_check: false,
            build: build_message::<QueryVmInstanceMsg>,
        },
        MessageType {
            name: "APIDestroyVmInstanceMsg",
            kind: MessageKind::Async,
            request: destroy,
            response: ResponseType {
                name: "APIDestroyVmInstanceEvent",
                rest: Some(RestResponse::default()),
            },
            suppress_credential_check: false,
            build: build_message::<DestroyVmInstanceMsg>,
        },
        MessageType {
            name: "APIStartVmInstanceMsg",
            kind: MessageKind::Async,
            request: start,
            response: ResponseType {
                name: "APIStartVmInstanceEvent",
                rest: all_to("inventory"),
            },
            suppress_credential_check: false,
            build: build_message::<StartVmInstanceMsg>,
        },
        MessageType {
            name: "APIRebootVmInstanceMsg",
            kind: MessageKind::Async,
            request: reboot,
            response: ResponseType {
                name: "APIRebootVmInstanceEvent",
                rest: Some(RestResponse {
                    all_to: "",
                    fields_to: &["uuid=inventory.uuid", "state=inventory.state"],
                }),
            },
            suppress_credential_check: false,
            build: build_message::<RebootVmInstanceMsg>,
        },
        MessageType {
            name: "APILogInByAccountMsg",
            kind: MessageKind::Sync,
            request: login,
            response: ResponseType {
                name: "APILogInReply",
                rest: all_to("inventory"),
            },
            suppress_credential_check: true,
            build: build_message::<LogInByAccountMsg>,
        },
    ]
}

/// VM inventories keyed by uuid, shared by the sample services
type Inventory = Arc<Mutex<BTreeMap<String, Value>>>;

fn downcast<T: 'static>(msg: &dyn ApiMessage) -> Result<&T, ErrorCode> {
    msg.as_any().downcast_ref::<T>().ok_or_else(|| {
        ErrorCode::new("SYS.1001", format!("unexpected message {}", msg.type_name()))
    })
}

fn not_found(uuid: &str) -> ErrorCode {
    ErrorCode::new(
        VM_NOT_FOUND,
        format!("unable to find VM instance[uuid:{uuid}]"),
    )
}

fn new_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn create_vm(vms: &Inventory, msg: &CreateVmInstanceMsg) -> Value {
    let uuid = new_uuid();
    let inventory = json!({
        "uuid": uuid,
        "name": msg.name,
        "description": msg.description,
        "instanceOfferingUuid": msg.instance_offering_uuid,
        "imageUuid": msg.image_uuid,
        "l3NetworkUuids": msg.l3_network_uuids,
        "state": "Running",
    });
    vms.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(uuid, inventory.clone());
    json!({ "inventory": inventory })
}

fn query_vms(vms: &Inventory, query: &QueryParams) -> Value {
    let vms = vms.lock().unwrap_or_else(PoisonError::into_inner);
    let matched: Vec<&Value> = vms
        .values()
        .filter(|vm| {
            query.conditions.iter().all(|cond| match cond.op {
                QueryOp::Eq => vm[&cond.name].as_str() == Some(cond.value.as_str()),
                QueryOp::NotEq => vm[&cond.name].as_str() != Some(cond.value.as_str()),
                // other operators are left to a real query engine
                _ => true,
            })
        })
        .collect();

    let total = matched.len();
    if query.count {
        return json!({ "inventories": [], "total": total });
    }

    let start = usize::try_from(query.start.unwrap_or(0)).unwrap_or(0);
    let limit = query
        .limit
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(usize::MAX);
    let page: Vec<&Value> = matched.into_iter().skip(start).take(limit).collect();

    if query.reply_with_count {
        json!({ "inventories": page, "total": total })
    } else {
        json!({ "inventories": page })
    }
}

fn set_state(vms: &Inventory, uuid: &str, state: &str) -> Result<Value, ErrorCode> {
    let mut vms = vms.lock().unwrap_or_else(PoisonError::into_inner);
    let vm = vms.get_mut(uuid).ok_or_else(|| not_found(uuid))?;
    vm["state"] = json!(state);
    Ok(json!({ "inventory": vm.clone() }))
}

/// In-memory services for every catalog message
pub fn local_bus() -> LocalBus {
    let vms: Inventory = Arc::default();
    let (create, query, destroy, start, reboot) = (
        Arc::clone(&vms),
        Arc::clone(&vms),
        Arc::clone(&vms),
        Arc::clone(&vms),
        vms,
    );

    LocalBus::builder()
        .handler(
            "APICreateVmInstanceMsg",
            "APICreateVmInstanceEvent",
            move |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                Ok(create_vm(&create, downcast(msg.as_ref())?))
            },
        )
        .handler(
            "APIQueryVmInstanceMsg",
            "APIQueryVmInstanceReply",
            move |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                let msg: &QueryVmInstanceMsg = downcast(msg.as_ref())?;
                Ok(query_vms(&query, &msg.query))
            },
        )
        .handler(
            "APIDestroyVmInstanceMsg",
            "APIDestroyVmInstanceEvent",
            move |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                let msg: &DestroyVmInstanceMsg = downcast(msg.as_ref())?;
                destroy
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&msg.uuid)
                    .ok_or_else(|| not_found(&msg.uuid))?;
                Ok(json!({}))
            },
        )
        .handler(
            "APIStartVmInstanceMsg",
            "APIStartVmInstanceEvent",
            move |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                let msg: &StartVmInstanceMsg = downcast(msg.as_ref())?;
                set_state(&start, &msg.uuid, "Running")
            },
        )
        .handler(
            "APIRebootVmInstanceMsg",
            "APIRebootVmInstanceEvent",
            move |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                let msg: &RebootVmInstanceMsg = downcast(msg.as_ref())?;
                set_state(&reboot, &msg.vm_instance_uuid, "Running")
            },
        )
        .handler(
            "APILogInByAccountMsg",
            "APILogInReply",
            |msg: Box<dyn ApiMessage>| -> Result<Value, ErrorCode> {
                let msg: &LogInByAccountMsg = downcast(msg.as_ref())?;
                if msg.account_name.is_empty() || msg.password.is_empty() {
                    return Err(ErrorCode::new(LOGIN_FAILED, "wrong account name or password"));
                }
                Ok(json!({
                    "inventory": {
                        "uuid": new_uuid(),
                        "accountName": msg.account_name,
                    }
                }))
            },
        )
        .build()
}
