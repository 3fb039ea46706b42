use example_service::{
    AlternateServiceServer, ExampleServiceServer, FILE_DESCRIPTOR_SET, TreeServiceServer,
};
use example_service_impl::{AlternateServiceImpl, ExampleServiceImpl, TreeServiceImpl};
use grebe_core::bridge::{BridgeConfig, JsonBridge, JsonBridgeLayer};
use grebe_core::grpc::codec::DynamicCodec;
use grebe_core::prost_reflect::{DescriptorPool, DynamicMessage, Value};
use grebe_core::registry::{Registry, RegistryBuilder};
use grebe_core::tonic::{self, body::Body, service::Routes};
use http::{Method, StatusCode, header::CONTENT_TYPE};
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;
use tower::{Layer, ServiceExt, service_fn};


fn render(json: &str) -> String {
    format!("<html><script>const services = {json};</script></html>")
}

fn setup() -> (Arc<Registry>, Routes, ExampleServiceImpl) {
    let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET).unwrap();
    let example = ExampleServiceImpl::default();
    let mut builder = RegistryBuilder::new();

    builder
        .register_from_pool(&pool, ExampleServiceServer::new(example.clone()))
        .unwrap()
        .register_from_pool(&pool, AlternateServiceServer::new(AlternateServiceImpl))
        .unwrap()
        .register_from_pool(&pool, TreeServiceServer::new(TreeServiceImpl))
        .unwrap();

    let (registry, routes) = builder.build();
    (Arc::new(registry), routes, example)
}

fn setup_bridge() -> (JsonBridge<Routes>, ExampleServiceImpl) {
    let (registry, routes, example) = setup();
    let bridge = JsonBridgeLayer::new(registry, render).layer(routes);
    (bridge, example)
}

fn post(path: &str, body: &str) -> http::Request<Body> {
    http::Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::new(axum::body::Body::from(body.to_string())))
        .unwrap()
}

async fn read_body(response: http::Response<Body>) -> String {
    let bytes = axum::body::to_bytes(axum::body::Body::new(response.into_body()), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn call<S>(service: S, request: http::Request<Body>) -> (StatusCode, String)
where
    S: tower::Service<http::Request<Body>, Response = http::Response<Body>, Error = Infallible>,
{
    let response = service.oneshot(request).await.unwrap();
    let status = response.status();
    (status, read_body(response).await)
}

#[tokio::test]
async fn test_unary_json_call() {
    let (bridge, example) = setup_bridge();

    let (status, body) = call(
        bridge,
        post(
            "/example.ExampleService/ExampleMethod1",
            r#"{"name": "grebe", "count": 2}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["message"], "grebe x2 (1)");
    assert_eq!(example.calls(), 1);
}

#[tokio::test]
async fn test_response_decodes_as_declared_type() {
    let (bridge, _) = setup_bridge();
    let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET).unwrap();
    let response_type = pool.get_message_by_name("example.ExampleResponse").unwrap();

    let (_, body) = call(
        bridge,
        post(
            "/example.ExampleService/ExampleMethod2",
            r#"{"name": "grebe", "items": [{"value": "a"}, {"value": "b"}]}"#,
        ),
    )
    .await;

    let mut deserializer = serde_json::Deserializer::from_str(&body);
    let response = DynamicMessage::deserialize(response_type, &mut deserializer).unwrap();
    assert_eq!(
        response.get_field_by_name("message").unwrap().as_str(),
        Some("grebe with 2 items (2)")
    );
}

#[tokio::test]
async fn test_documented_examples_are_callable() {
    let (registry, routes, _) = setup();
    let bridge = JsonBridgeLayer::new(Arc::clone(&registry), render).layer(routes);

    for (service, methods) in registry.documentation() {
        for (method, doc) in methods {
            let path = format!("/{service}/{method}");
            let (status, body) = call(bridge.clone(), post(&path, &doc.example_in)).await;

            assert_eq!(status, StatusCode::OK, "{path}");
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            // ExampleMethod2 rejects the empty example name with an error envelope
            assert!(
                value.get("message").is_some() || value.get("error").is_some(),
                "{path}: {body}"
            );
        }
    }
}

#[tokio::test]
async fn test_recursive_request_type() {
    let (bridge, _) = setup_bridge();

    let (status, body) = call(
        bridge,
        post(
            "/example.TreeService/Walk",
            r#"{"label": "root", "children": [{"label": "a"}, {"label": "b", "children": [{}]}]}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"message":"root has 2 children"}"#);
}

#[tokio::test]
async fn test_missing_path_segments() {
    for path in ["/", "/example.ExampleService", "/example.ExampleService/"] {
        let (bridge, _) = setup_bridge();

        let (status, body) = call(bridge, post(path, "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert!(body.contains("No path segments"), "{path}: {body}");
    }
}

#[tokio::test]
async fn test_unknown_service() {
    let (bridge, _) = setup_bridge();

    let (status, body) = call(bridge, post("/Foo/ExampleMethod1", "{}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No service for Foo"));
}

#[tokio::test]
async fn test_unknown_method() {
    let (bridge, example) = setup_bridge();

    let (status, body) = call(bridge, post("/example.ExampleService/Bar", "{}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No method for Bar"));
    assert_eq!(example.calls(), 0);
}

#[tokio::test]
async fn test_streaming_methods_are_not_routable() {
    let (bridge, _) = setup_bridge();

    let (status, body) = call(
        bridge,
        post("/example.ExampleService/WatchExamples", "{}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No method for WatchExamples"));
}

#[tokio::test]
async fn test_malformed_json_never_reaches_the_handler() {
    let (bridge, example) = setup_bridge();

    let (status, body) = call(
        bridge,
        post("/example.ExampleService/ExampleMethod1", r#"{"name": "grebe""#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(value["error"].as_str().unwrap().contains("EOF"));
    assert_eq!(example.calls(), 0);
}

#[tokio::test]
async fn test_schema_mismatch_never_reaches_the_handler() {
    let (bridge, example) = setup_bridge();

    let (status, body) = call(
        bridge,
        post("/example.ExampleService/ExampleMethod1", r#"{"ghost": true}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(value["error"].is_string());
    assert_eq!(example.calls(), 0);
}

#[tokio::test]
async fn test_handler_error_is_a_payload() {
    let (bridge, example) = setup_bridge();

    let (status, body) = call(
        bridge,
        post("/example.ExampleService/ExampleMethod2", r#"{"count": 1}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"error":"name is required"}"#);
    assert_eq!(example.calls(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_a_transport_error() {
    let (registry, routes, example) = setup();
    let bridge = JsonBridgeLayer::new(registry, render)
        .with_config(BridgeConfig { max_body_bytes: 8 })
        .layer(routes);

    let (status, body) = call(
        bridge,
        post(
            "/example.ExampleService/ExampleMethod1",
            r#"{"name": "a name that is far too long"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(
        value["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to read request body")
    );
    assert_eq!(example.calls(), 0);
}

#[tokio::test]
async fn test_browse_renders_documentation() {
    let (registry, routes, _) = setup();
    let bridge = JsonBridgeLayer::new(Arc::clone(&registry), render).layer(routes);

    let request = http::Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = bridge.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/html; charset=utf-8"
    );

    let body = read_body(response).await;
    let expected = render(&registry.documentation_json().unwrap());
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_other_requests_are_forwarded() {
    let (registry, _, example) = setup();
    let inner = service_fn(|request: http::Request<Body>| async move {
        let mut response = http::Response::new(Body::empty());
        *response.status_mut() = StatusCode::IM_A_TEAPOT;
        response.headers_mut().insert(
            "x-forwarded-method",
            request.method().as_str().parse().unwrap(),
        );
        Ok::<_, Infallible>(response)
    });
    let bridge = JsonBridgeLayer::new(registry, render).layer(inner);

    let grpc = http::Request::builder()
        .method(Method::POST)
        .uri("/example.ExampleService/ExampleMethod1")
        .header(CONTENT_TYPE, "application/grpc")
        .body(Body::empty())
        .unwrap();
    let response = bridge.clone().oneshot(grpc).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-forwarded-method"], "POST");

    let delete = http::Request::builder()
        .method(Method::DELETE)
        .uri("/example.ExampleService/ExampleMethod1")
        .body(Body::empty())
        .unwrap();
    let response = bridge.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

    let mut http2 = post("/example.ExampleService/ExampleMethod1", r#"{"name": "grebe"}"#);
    *http2.version_mut() = http::Version::HTTP_2;
    let response = bridge.oneshot(http2).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

    assert_eq!(example.calls(), 0);
}

#[tokio::test]
async fn test_native_grpc_shares_the_endpoint() {
    let (bridge, example) = setup_bridge();
    let pool = DescriptorPool::decode(FILE_DESCRIPTOR_SET).unwrap();
    let method = pool
        .get_service_by_name("example.ExampleService")
        .unwrap()
        .methods()
        .find(|m| m.name() == "ExampleMethod1")
        .unwrap();

    let mut request = DynamicMessage::new(method.input());
    request.set_field_by_name("name", Value::String("native".into()));

    let mut client = tonic::client::Grpc::new(bridge);
    client.ready().await.unwrap();
    let response = client
        .unary(
            tonic::Request::new(request),
            http::uri::PathAndQuery::from_str("/example.ExampleService/ExampleMethod1").unwrap(),
            DynamicCodec::new(method.input(), method.output()),
        )
        .await
        .unwrap()
        .into_inner();

    assert_eq!(
        response.get_field_by_name("message").unwrap().as_str(),
        Some("native x0 (1)")
    );
    assert_eq!(example.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_calls() {
    let (bridge, example) = setup_bridge();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let body = format!(r#"{{"name": "task", "count": {i}}}"#);
                call(bridge, post("/example.ExampleService/ExampleMethod1", &body)).await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!(r#"{{"message":"task x{i} (1)"}}"#));
    }

    assert_eq!(example.calls(), 16);
}
