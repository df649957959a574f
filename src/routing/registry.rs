//! API registry and routing table
//!
//! Built once at startup from the full list of message types and read-only
//! afterwards, so concurrent lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{ApiDescriptor, ResponseDescriptor};
use super::matcher::{PathPattern, PathVariables};
use crate::error::RegistryError;
use crate::message::MessageType;

/// Descriptor(s) registered under one path template
#[derive(Debug, Clone)]
pub enum Route {
    Unique(Arc<ApiDescriptor>),
    /// Several descriptors share the path; disambiguated per request
    Shared(Vec<Arc<ApiDescriptor>>),
}

impl Route {
    fn push(&mut self, api: Arc<ApiDescriptor>) {
        match self {
            Self::Unique(existing) => {
                *self = Self::Shared(vec![Arc::clone(existing), api]);
            }
            Self::Shared(list) => list.push(api),
        }
    }
}

#[derive(Debug)]
struct RouteEntry {
    pattern: PathPattern,
    route: Route,
}

/// Result of a successful path lookup
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub template: &'a str,
    pub route: &'a Route,
    pub variables: PathVariables,
}

/// Immutable path template -> descriptor(s) map
#[derive(Debug, Default)]
pub struct RoutingTable {
    /// Registration order, scanned when no literal path matches
    entries: Vec<RouteEntry>,
    by_template: HashMap<String, usize>,
}

impl RoutingTable {
    fn register(&mut self, template: &str, api: Arc<ApiDescriptor>) -> Result<(), RegistryError> {
        if let Some(&index) = self.by_template.get(template) {
            self.entries[index].route.push(api);
            return Ok(());
        }

        let pattern = PathPattern::parse(template)?;
        self.by_template
            .insert(template.to_string(), self.entries.len());
        self.entries.push(RouteEntry {
            pattern,
            route: Route::Unique(api),
        });
        Ok(())
    }

    /// Literal template first, then the first pattern that matches
    pub fn lookup(&self, path: &str) -> Option<RouteMatch<'_>> {
        if let Some(&index) = self.by_template.get(path) {
            let entry = &self.entries[index];
            return Some(RouteMatch {
                template: entry.pattern.template(),
                route: &entry.route,
                variables: entry.pattern.extract(path).unwrap_or_default(),
            });
        }

        self.entries.iter().find_map(|entry| {
            entry.pattern.extract(path).map(|variables| RouteMatch {
                template: entry.pattern.template(),
                route: &entry.route,
                variables,
            })
        })
    }

    pub fn get(&self, template: &str) -> Option<&Route> {
        self.by_template
            .get(template)
            .map(|&index| &self.entries[index].route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every routable API plus the response descriptors of their reply types
#[derive(Debug, Default)]
pub struct ApiRegistry {
    table: RoutingTable,
    responses: HashMap<&'static str, ResponseDescriptor>,
    api_count: usize,
}

impl ApiRegistry {
    pub fn build(
        api_version: &str,
        types: impl IntoIterator<Item = MessageType>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for message in types {
            let api = Arc::new(ApiDescriptor::new(api_version, message)?);

            let response = message.response;
            let rest = response.rest.ok_or(RegistryError::MissingResponse {
                response: response.name,
                type_name: message.name,
            })?;
            registry
                .responses
                .insert(response.name, ResponseDescriptor::new(response.name, &rest)?);

            for path in api.paths() {
                registry.table.register(path, Arc::clone(&api))?;
            }
            registry.api_count += 1;
        }

        Ok(registry)
    }

    pub fn lookup(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.table.lookup(path)
    }

    pub const fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn response(&self, type_name: &str) -> Option<&ResponseDescriptor> {
        self.responses.get(type_name)
    }

    pub const fn api_count(&self) -> usize {
        self.api_count
    }
}
