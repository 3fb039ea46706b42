//! # Service Registry
//!
//! The table that maps routing keys (`<service>/<method>`) to method handlers and
//! request types, plus the documentation shown on the browsing page.
//!
//! The registry has two phases, expressed as two types:
//!
//! 1. **[`RegistryBuilder`]**: the single writer. Services are registered once, at
//!    startup. Every error is returned immediately and is meant to abort startup.
//! 2. **[`Registry`]**: the read-only result of [`RegistryBuilder::build`]. It is shared
//!    between request tasks (usually behind an `Arc`) without any locking.
//!
//! ## Example
//!
//! ```rust,ignore
//! use grebe_core::registry::RegistryBuilder;
//! use prost_reflect::DescriptorPool;
//!
//! let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET)?;
//! let mut builder = RegistryBuilder::new();
//! builder.register_from_pool(&pool, GreeterServer::new(MyGreeter))?;
//!
//! // `routes` serves native gRPC clients, `registry` serves the JSON bridge
//! let (registry, routes) = builder.build();
//! ```
use crate::{
    grpc::handler::{MethodHandler, ServiceImpl, unary_handler},
    message::{EncodeError, JsonFormat, MessageType, encode_json},
    populate::populate,
};
use prost_reflect::{DescriptorPool, MethodDescriptor, ServiceDescriptor};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap, hash_map::Entry},
    convert::Infallible,
};
use tonic::{
    body::Body,
    server::NamedService,
    service::{Routes, RoutesBuilder},
};
use tower::Service;
use tracing::{debug, info};

/// Methods whose name starts with this prefix are placeholders, not real RPCs.
const STUB_METHOD_PREFIX: &str = "mustEmbed";

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Service '{0}' was not found in the descriptor pool")]
    UnknownService(String),
    #[error("Implementation of '{implementation}' cannot be registered as '{descriptor}'")]
    NameMismatch {
        implementation: String,
        descriptor: String,
    },
    #[error("Service '{0}' is already registered")]
    DuplicateService(String),
    #[error("Route '{0}' is already registered")]
    DuplicateRoute(String),
    #[error("Route '{route}' is not a valid HTTP path: {source}")]
    InvalidPath {
        route: String,
        #[source]
        source: http::uri::InvalidUri,
    },
    #[error("Failed to build the example request of '{route}': {source}")]
    Example {
        route: String,
        #[source]
        source: EncodeError,
    },
}

/// Documentation of one method, as shown on the browsing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDoc {
    #[serde(rename = "Name")]
    pub name: String,
    /// Fully qualified name of the request message.
    #[serde(rename = "TypeIn")]
    pub type_in: String,
    /// An example request, as indented JSON with every field present.
    #[serde(rename = "ExampleIn")]
    pub example_in: String,
}

/// `service name -> method name -> documentation`
pub type Documentation = BTreeMap<String, BTreeMap<String, MethodDoc>>;

/// A registered service.
#[derive(Clone)]
pub struct ServiceRegistration {
    pub name: String,
    pub descriptor: ServiceDescriptor,
    /// The implementation passed to [`RegistryBuilder::register`]. Method handlers hold
    /// clones of this exact service.
    pub implementation: ServiceImpl,
    /// Routable method names, in declaration order.
    pub methods: Vec<String>,
}

/// A routable method.
#[derive(Clone)]
pub struct RegisteredMethod<'a> {
    pub handler: &'a MethodHandler,
    pub request_type: &'a MessageType,
}

/// The read-only routing table.
#[derive(Default)]
pub struct Registry {
    services: HashMap<String, ServiceRegistration>,
    handlers: HashMap<String, MethodHandler>,
    request_types: HashMap<String, MessageType>,
    documentation: Documentation,
}

impl Registry {
    /// Looks up a registered service by its fully qualified name.
    pub fn service(&self, name: &str) -> Option<&ServiceRegistration> {
        self.services.get(name)
    }

    /// Looks up the handler and request type of `service/method`.
    pub fn method(&self, service: &str, method: &str) -> Option<RegisteredMethod<'_>> {
        let key = routing_key(service, method);
        let handler = self.handlers.get(&key)?;
        let request_type = self.request_types.get(&key)?;

        Some(RegisteredMethod {
            handler,
            request_type,
        })
    }

    /// Names of all registered services, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn documentation(&self) -> &Documentation {
        &self.documentation
    }

    /// The documentation map as a JSON object (the payload of the browsing page).
    pub fn documentation_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.documentation)
    }
}

/// Collects service registrations during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
    routes: RoutesBuilder,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `implementation` using the descriptor named after it in `pool`.
    ///
    /// # Returns
    ///
    /// * `Err(RegistrationError::UnknownService)` - `pool` has no service called `S::NAME`.
    /// * Any error of [`RegistryBuilder::register`].
    pub fn register_from_pool<S>(
        &mut self,
        pool: &DescriptorPool,
        implementation: S,
    ) -> Result<&mut Self, RegistrationError>
    where
        S: Service<http::Request<Body>, Response = http::Response<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let descriptor = pool
            .get_service_by_name(S::NAME)
            .ok_or_else(|| RegistrationError::UnknownService(S::NAME.to_string()))?;

        self.register(descriptor, implementation)
    }

    /// Registers a tonic server for both native gRPC and JSON calls.
    ///
    /// Every unary method of `descriptor` becomes routable and documented. Streaming
    /// methods and placeholder methods are skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(&mut Self)` - The service is registered.
    /// * `Err(RegistrationError)` - Nothing usable was registered; startup should stop.
    pub fn register<S>(
        &mut self,
        descriptor: ServiceDescriptor,
        implementation: S,
    ) -> Result<&mut Self, RegistrationError>
    where
        S: Service<http::Request<Body>, Response = http::Response<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let name = descriptor.full_name().to_string();

        if S::NAME != name {
            return Err(RegistrationError::NameMismatch {
                implementation: S::NAME.to_string(),
                descriptor: name,
            });
        }
        if self.registry.services.contains_key(&name) {
            return Err(RegistrationError::DuplicateService(name));
        }

        let erased = ServiceImpl::new(implementation.clone());
        let mut routes = Vec::new();
        let mut methods = Vec::new();
        let mut docs = BTreeMap::new();

        for method in descriptor.methods() {
            if let Some(reason) = skip_reason(&method) {
                debug!(service = %name, method = %method.name(), reason, "Skipping method");
                continue;
            }

            let route = routing_key(&name, method.name());
            let request_type = MessageType::new(method.input());

            let handler = unary_handler(erased.clone(), method.clone()).map_err(|source| {
                RegistrationError::InvalidPath {
                    route: route.clone(),
                    source,
                }
            })?;

            let example = populate(&request_type);
            let example_in = encode_json(&example, JsonFormat::DOCUMENTATION).map_err(|source| {
                RegistrationError::Example {
                    route: route.clone(),
                    source,
                }
            })?;

            docs.insert(
                method.name().to_string(),
                MethodDoc {
                    name: method.name().to_string(),
                    type_in: request_type.full_name().to_string(),
                    example_in,
                },
            );
            methods.push(method.name().to_string());
            routes.push((route, handler, request_type));
        }

        // Nothing is written before every method of the service resolved
        for (route, handler, request_type) in routes {
            info!(%route, request = %request_type, "Registered method");
            self.insert_route(route, handler, request_type)?;
        }

        self.registry.documentation.insert(name.clone(), docs);
        self.registry.services.insert(
            name.clone(),
            ServiceRegistration {
                name,
                descriptor,
                implementation: erased,
                methods,
            },
        );
        self.routes.add_service(implementation);

        Ok(self)
    }

    /// Finishes registration.
    ///
    /// Returns the JSON routing table and the tonic [`Routes`] that serve the same
    /// services to native gRPC clients.
    pub fn build(self) -> (Registry, Routes) {
        (self.registry, self.routes.routes())
    }

    fn insert_route(
        &mut self,
        route: String,
        handler: MethodHandler,
        request_type: MessageType,
    ) -> Result<(), RegistrationError> {
        // Both maps are written together so that every handler has a request type
        match (
            self.registry.handlers.entry(route.clone()),
            self.registry.request_types.entry(route.clone()),
        ) {
            (Entry::Vacant(handlers), Entry::Vacant(request_types)) => {
                handlers.insert(handler);
                request_types.insert(request_type);
                Ok(())
            }
            _ => Err(RegistrationError::DuplicateRoute(route)),
        }
    }
}

/// The routing key of a method: `<service full name>/<method name>`.
pub fn routing_key(service: &str, method: &str) -> String {
    format!("{service}/{method}")
}

fn skip_reason(method: &MethodDescriptor) -> Option<&'static str> {
    if method.name().starts_with(STUB_METHOD_PREFIX) {
        Some("placeholder method")
    } else if method.is_client_streaming() || method.is_server_streaming() {
        Some("streaming method")
    } else {
        None
    }
}
