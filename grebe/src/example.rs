//! # Demo services
//!
//! The services hosted by the `grebe` binary. Each method replies with its own request,
//! encoded as compact JSON and followed by a tag naming the method that answered.
use example_service::pb::{ExampleRequest, ExampleResponse, Tree};
use example_service::{AlternateService, ExampleService, TreeService};
use futures_util::stream;
use grebe_core::message::{JsonFormat, encode_json};
use grebe_core::prost_reflect::{DescriptorPool, DynamicMessage};
use prost::Message;
use tonic::{Request, Response, Status};

const EXAMPLE_REQUEST: &str = "example.ExampleRequest";
const TREE: &str = "example.Tree";

/// Encodes generated messages as JSON through their descriptors.
#[derive(Clone)]
pub struct Echo {
    pool: DescriptorPool,
}

impl Echo {
    pub fn new(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    fn reply(
        &self,
        message: &impl Message,
        full_name: &str,
        tag: &str,
    ) -> Result<Response<ExampleResponse>, Status> {
        let descriptor = self
            .pool
            .get_message_by_name(full_name)
            .ok_or_else(|| Status::internal(format!("Unknown message type {full_name}")))?;

        let dynamic = DynamicMessage::decode(descriptor, message.encode_to_vec().as_slice())
            .map_err(|err| Status::internal(err.to_string()))?;

        let json = encode_json(&dynamic, JsonFormat::COMPACT)
            .map_err(|err| Status::internal(err.to_string()))?;

        Ok(Response::new(ExampleResponse {
            message: format!("{json} ({tag})"),
        }))
    }
}

pub struct ExampleServiceImpl(pub Echo);

#[tonic::async_trait]
impl ExampleService for ExampleServiceImpl {
    type WatchExamplesStream = stream::Iter<std::vec::IntoIter<Result<ExampleResponse, Status>>>;

    async fn example_method1(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<ExampleResponse>, Status> {
        self.0.reply(request.get_ref(), EXAMPLE_REQUEST, "1")
    }

    async fn example_method2(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<ExampleResponse>, Status> {
        self.0.reply(request.get_ref(), EXAMPLE_REQUEST, "2")
    }

    async fn watch_examples(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<Self::WatchExamplesStream>, Status> {
        let reply = self
            .0
            .reply(request.get_ref(), EXAMPLE_REQUEST, "watch")
            .map(Response::into_inner);

        Ok(Response::new(stream::iter(vec![reply])))
    }
}

pub struct AlternateServiceImpl(pub Echo);

#[tonic::async_trait]
impl AlternateService for AlternateServiceImpl {
    async fn example_method(
        &self,
        request: Request<ExampleRequest>,
    ) -> Result<Response<ExampleResponse>, Status> {
        self.0.reply(request.get_ref(), EXAMPLE_REQUEST, "alt")
    }
}

pub struct TreeServiceImpl(pub Echo);

#[tonic::async_trait]
impl TreeService for TreeServiceImpl {
    async fn walk(&self, request: Request<Tree>) -> Result<Response<ExampleResponse>, Status> {
        self.0.reply(request.get_ref(), TREE, "tree")
    }
}
