use super::*;
use crate::config::ApiKey;
use wiremock::{
    Mock, MockServer, Request, Respond, ResponseTemplate,
    matchers::{body_json, body_partial_json, header, method, path, query_param},
};

const COLLECTION: &str = "test_docs";

fn test_config(url: &str) -> QdrantConfig {
    QdrantConfig {
        api_key: ApiKey::new("qdrant-key"),
        url: url.to_string(),
        collection: COLLECTION.to_string(),
        dimension: 3,
        ..QdrantConfig::default()
    }
}

fn client_for(server: &MockServer) -> VectorStoreClient {
    VectorStoreClient::new(&test_config(&server.uri())).expect("client should build")
}

fn upsert_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "result": { "operation_id": 1, "status": "completed" },
        "status": "ok",
        "time": 0.001
    }))
}

fn hit(text: &str, score: f32) -> SearchHit {
    SearchHit {
        id: PointId::Num(1),
        score,
        text: text.to_string(),
    }
}

/// Responds to searches with the stored point whose vector equals the query
struct ExactMatchStore {
    points: Vec<IndexedPoint>,
}

impl Respond for ExactMatchStore {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).expect("search body should be json");
        let query: Vec<f32> =
            serde_json::from_value(body["vector"].clone()).expect("vector should be numeric");

        let result: Vec<serde_json::Value> = self
            .points
            .iter()
            .filter(|p| p.vector == query)
            .map(|p| serde_json::json!({ "id": p.id, "score": 1.0, "payload": { "text": p.payload.text } }))
            .collect();

        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": result }))
    }
}

#[test]
fn collection_urls() {
    let client = VectorStoreClient::new(&test_config("http://localhost:6333/"))
        .expect("client should build");

    let url = client
        .collection_url(&["points", "search"])
        .expect("url should build");
    assert_eq!(
        url.as_str(),
        "http://localhost:6333/collections/test_docs/points/search"
    );
    assert_eq!(client.collection(), COLLECTION);
}

#[test]
fn build_context_joins_in_rank_order() {
    let hits = vec![hit("best", 0.9), hit("middle", 0.5), hit("worst", 0.1)];

    assert_eq!(
        build_context(&hits),
        "best\n\n---\n\nmiddle\n\n---\n\nworst"
    );
    assert_eq!(build_context(&hits[..1]), "best");
    assert_eq!(build_context(&[]), "");
}

#[test]
fn point_id_display() {
    assert_eq!(PointId::Num(42).to_string(), "42");
    assert_eq!(
        PointId::Uuid("5c56c793-69f3-4fbf-87e6-c4bf54c28c26".to_string()).to_string(),
        "5c56c793-69f3-4fbf-87e6-c4bf54c28c26"
    );
}

#[tokio::test]
async fn ensure_collection_creates_with_cosine() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs"))
        .and(header("api-key", "qdrant-key"))
        .and(body_json(serde_json::json!({
            "vectors": { "size": 768, "distance": "Cosine" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": true, "status": "ok"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let created = client_for(&mock_server)
        .ensure_collection(768, Distance::Cosine)
        .expect("creation should succeed");
    assert!(created);
}

#[tokio::test]
async fn ensure_collection_twice_tolerates_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": true
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "status": { "error": "Wrong input: Collection `test_docs` already exists!" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.ensure_collection(3, Distance::Cosine).expect("first"));
    assert!(!client.ensure_collection(3, Distance::Cosine).expect("second"));
}

#[tokio::test]
async fn ensure_collection_propagates_other_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let error = client_for(&mock_server)
        .ensure_collection(3, Distance::Cosine)
        .expect_err("403 should fail");

    assert_eq!(error.status(), Some(403));
    assert!(error.to_string().contains("test_docs"));
}

#[tokio::test]
async fn upsert_sends_all_points_in_one_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs/points"))
        .and(query_param("wait", "true"))
        .and(body_json(serde_json::json!({
            "points": [
                { "id": 1, "vector": [1.0, 0.0, 0.0], "payload": { "text": "alpha" } },
                { "id": 2, "vector": [0.0, 1.0, 0.0], "payload": { "text": "beta" } }
            ]
        })))
        .respond_with(upsert_ok())
        .expect(1)
        .mount(&mock_server)
        .await;

    let points = vec![
        IndexedPoint::new(1, vec![1.0, 0.0, 0.0], "alpha"),
        IndexedPoint::new(2, vec![0.0, 1.0, 0.0], "beta"),
    ];
    client_for(&mock_server)
        .upsert(&points)
        .expect("upsert should succeed");
}

#[tokio::test]
async fn upsert_empty_is_noop() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(upsert_ok())
        .expect(0)
        .mount(&mock_server)
        .await;

    client_for(&mock_server)
        .upsert(&[])
        .expect("empty upsert should succeed");
}

#[tokio::test]
async fn upsert_failure_reports_point_count() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs/points"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let points = vec![
        IndexedPoint::new(1, vec![1.0, 0.0, 0.0], "alpha"),
        IndexedPoint::new(2, vec![0.0, 1.0, 0.0], "beta"),
        IndexedPoint::new(3, vec![0.0, 0.0, 1.0], "gamma"),
    ];
    let error = client_for(&mock_server)
        .upsert(&points)
        .expect_err("upsert should fail");

    assert_eq!(error.status(), Some(500));
    assert!(error.to_string().contains("3 points"), "got: {}", error);
}

#[tokio::test]
async fn search_withholds_vectors_and_keeps_rank_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/test_docs/points/search"))
        .and(body_partial_json(serde_json::json!({
            "limit": 3,
            "with_payload": true,
            "with_vector": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": [
                { "id": 2, "version": 0, "score": 0.91, "payload": { "text": "EFGH" } },
                { "id": 1, "version": 0, "score": 0.52, "payload": { "text": "ABCD" } },
                { "id": 3, "version": 0, "score": 0.10, "payload": { "text": "IJ" } }
            ],
            "status": "ok"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let hits = client_for(&mock_server)
        .search(&[0.1, 0.2, 0.3], 3)
        .expect("search should succeed");

    let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(texts, vec!["EFGH", "ABCD", "IJ"]);
    assert_eq!(hits[0].id, PointId::Num(2));
}

#[tokio::test]
async fn exact_vector_search_round_trip() {
    let mock_server = MockServer::start().await;

    let points = vec![
        IndexedPoint::new(1, vec![1.0, 0.0, 0.0], "alpha"),
        IndexedPoint::new(2, vec![0.0, 1.0, 0.0], "beta"),
        IndexedPoint::new(3, vec![0.0, 0.0, 1.0], "gamma"),
    ];

    Mock::given(method("PUT"))
        .and(path("/collections/test_docs/points"))
        .respond_with(upsert_ok())
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collections/test_docs/points/search"))
        .respond_with(ExactMatchStore {
            points: points.clone(),
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.upsert(&points).expect("upsert should succeed");

    for point in &points {
        let hits = client
            .search(&point.vector, 1)
            .expect("search should succeed");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, point.payload.text);
    }
}

#[tokio::test]
async fn empty_search_result_is_valid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/test_docs/points/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": [] })),
        )
        .mount(&mock_server)
        .await;

    let hits = client_for(&mock_server)
        .search(&[0.0, 0.0, 1.0], 3)
        .expect("empty search should succeed");

    assert!(hits.is_empty());
    assert_eq!(build_context(&hits), "");
}

#[tokio::test]
async fn missing_result_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/test_docs/points/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })),
        )
        .mount(&mock_server)
        .await;

    let error = client_for(&mock_server)
        .search(&[0.0, 0.0, 1.0], 3)
        .expect_err("missing result should fail");

    assert!(error.is_protocol(), "unexpected error: {}", error);
}

#[tokio::test]
async fn hit_without_text_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/collections/test_docs/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": [{ "id": 1, "score": 0.5, "payload": { "title": "no text" } }]
        })))
        .mount(&mock_server)
        .await;

    let error = client_for(&mock_server)
        .search(&[0.0, 0.0, 1.0], 3)
        .expect_err("payload without text should fail");

    assert!(error.is_protocol(), "unexpected error: {}", error);
}
