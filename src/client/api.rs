//! HTTP client for the GradeMate grading backend.
//!
//! All connection settings arrive through an explicit [`ClientConfig`];
//! nothing is read from ambient state.

use crate::error::ClientError;
use crate::models::{
    DashboardResponse, DashboardSummary, GradingRequest, LoginRequest, LoginResponse,
    PlagiarismResponse, QuizSummary, QuizzesResponse, RawGradingResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for [`GradeMateClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: u64,
}

impl From<crate::config::ApiConfig> for ClientConfig {
    fn from(api: crate::config::ApiConfig) -> Self {
        Self {
            base_url: api.base_url,
            token: api.token.filter(|t| !t.is_empty()),
            timeout_seconds: api.timeout_seconds,
        }
    }
}

/// Typed client over the backend's REST endpoints.
pub struct GradeMateClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl GradeMateClient {
    /// Create a client with its own connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!("GradeMate backend: {}", config.base_url);
        Ok(Self { config, http })
    }

    #[cfg(test)]
    pub(crate) fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Join a path onto the base URL.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, mapping transport failures and non-success statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.config.timeout_seconds)
            } else if e.is_connect() {
                ClientError::Connect(self.config.base_url.clone())
            } else {
                ClientError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &body),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// POST a JSON body (or nothing) and decode the JSON answer.
    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let mut request = self.http.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        self.post_json("account/login/", Some(&LoginRequest { email, password }))
            .await
    }

    /// Upload a solution and submissions for grading.
    pub async fn upload_quiz(
        &self,
        request: &GradingRequest,
    ) -> Result<RawGradingResponse, ClientError> {
        let mut form = Form::new()
            .text("quizName", request.quiz_name.clone())
            .text("logicWeight", request.logic_weight.to_string())
            .text("similarityThreshold", request.similarity_threshold.to_string())
            .text("total", request.total.to_string())
            .part("solutionImage", image_part(&request.solution_image).await?);

        for submission in &request.submissions {
            form = form.text("studentNames", submission.student_name.clone());
        }
        for submission in &request.submissions {
            form = form.part("studentImages", image_part(&submission.image).await?);
        }

        let url = self.endpoint("api/upload_quiz/");
        info!(
            "Uploading quiz '{}' with {} submissions",
            request.quiz_name,
            request.submissions.len()
        );

        let response = self.send(self.http.post(&url).multipart(form)).await?;
        Self::decode(response).await
    }

    /// Run the backend's plagiarism check for a stored quiz.
    pub async fn check_plagiarism(&self, quiz_id: &str) -> Result<PlagiarismResponse, ClientError> {
        self.post_json(
            "api/check_plagiarism/",
            Some(&json!({ "quizId": quiz_id_value(quiz_id) })),
        )
        .await
    }

    /// List all quizzes.
    pub async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, ClientError> {
        let response: QuizzesResponse = self.post_json::<Value, _>("api/get_all_quizes/", None).await?;
        Ok(response.quizes.into_iter().map(QuizSummary::from).collect())
    }

    /// Fetch dashboard statistics.
    pub async fn dashboard_stats(&self) -> Result<DashboardSummary, ClientError> {
        let response: DashboardResponse =
            self.post_json::<Value, _>("api/dashboard-stats/", None).await?;
        Ok(response.into())
    }

    /// Fetch stored details and grades for one quiz.
    pub async fn quiz_view(&self, quiz_id: &str) -> Result<Value, ClientError> {
        self.post_json(
            "api/quiz_view/",
            Some(&json!({ "quiz_id": quiz_id_value(quiz_id) })),
        )
        .await
    }
}

/// Numeric ids go over the wire as numbers, anything else as a string.
fn quiz_id_value(quiz_id: &str) -> Value {
    match quiz_id.trim().parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(quiz_id),
    }
}

/// Pull a readable message out of an error body.
///
/// Handles `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; otherwise reports the status code.
fn error_message(status: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed.as_ref().and_then(|v| {
        v.get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
            .or_else(|| v.get("message").and_then(Value::as_str))
            .map(String::from)
    });

    message.unwrap_or_else(|| format!("Server responded with status: {}", status))
}

async fn image_part(path: &Path) -> Result<Part, ClientError> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(image_mime(path))?)
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use crate::models::{GradingRequest, Submission};
    use tempfile::TempDir;
    use tokio::task::JoinHandle;
    use tokio_test::{assert_err, assert_ok};

    /// Serve exactly one canned HTTP response; the handle yields the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });

        (format!("http://{}", addr), handle)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let headers = text[..header_end].to_lowercase();
                if headers.contains("transfer-encoding: chunked") {
                    if text.ends_with("0\r\n\r\n") {
                        break;
                    }
                    continue;
                }

                let content_length = headers
                    .lines()
                    .find_map(|line| {
                        line.strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&buf).to_string()
    }

    fn client_for(base_url: String, token: Option<&str>) -> GradeMateClient {
        let config = ClientConfig {
            base_url,
            token: token.map(String::from),
            timeout_seconds: 5,
        };
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        GradeMateClient::with_http_client(config, http)
    }

    #[test]
    fn test_endpoint_joining() {
        let client = client_for("http://localhost:8000/".to_string(), None);
        assert_eq!(
            client.endpoint("/api/quiz_view/"),
            "http://localhost:8000/api/quiz_view/"
        );
    }

    #[test]
    fn test_quiz_id_value() {
        assert_eq!(quiz_id_value("42"), json!(42));
        assert_eq!(quiz_id_value("quiz-a"), json!("quiz-a"));
    }

    #[test]
    fn test_error_message_variants() {
        assert_eq!(error_message(400, r#"{"error": "bad quiz"}"#), "bad quiz");
        assert_eq!(
            error_message(404, r#"{"error": {"message": "missing", "code": 404}}"#),
            "missing"
        );
        assert_eq!(error_message(401, r#"{"message": "login failed"}"#), "login failed");
        assert_eq!(
            error_message(502, "<html>bad gateway</html>"),
            "Server responded with status: 502"
        );
    }

    #[test]
    fn test_image_mime() {
        assert_eq!(image_mime(Path::new("a.PNG")), "image/png");
        assert_eq!(image_mime(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn test_client_config_drops_empty_token() {
        let api = crate::config::ApiConfig {
            token: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(ClientConfig::from(api).token, None);
    }

    #[tokio::test]
    async fn test_check_plagiarism_sends_quiz_id_and_token() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"quiz_name": "History Essay", "quiz_id": 2, "plagiarism_results": [
                {"student1": "Alice", "student2": "Bob", "similarity": 0.8, "flag": true}
            ]}"#,
        )
        .await;
        let client = client_for(url, Some("secret"));

        let response = assert_ok!(client.check_plagiarism("2").await);
        assert_eq!(response.quiz_name.as_deref(), Some("History Essay"));
        assert_eq!(response.plagiarism_results.len(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/check_plagiarism/ "));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(r#"{"quizId":2}"#));
    }

    #[tokio::test]
    async fn test_list_quizzes_maps_student_count() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"quizes": [{"id": 1, "name": "Math Quiz 101", "date": "Apr 10, 2025", "student_count": 24}]}"#,
        )
        .await;
        let client = client_for(url, None);

        let quizzes = assert_ok!(client.list_quizzes().await);
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].name, "Math Quiz 101");
        assert_eq!(quizzes[0].students, 24);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/get_all_quizes/ "));
        assert!(!request.to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_backend_error_message_surfaces() {
        let (url, server) = serve_once("400 Bad Request", r#"{"error": "Quiz not found"}"#).await;
        let client = client_for(url, None);

        let err = assert_err!(client.quiz_view("99").await);
        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Quiz not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let (url, server) = serve_once("200 OK", "not json").await;
        let client = client_for(url, None);

        let err = assert_err!(client.dashboard_stats().await);
        assert!(matches!(err, ClientError::Decode(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr), None);
        let err = assert_err!(client.list_quizzes().await);
        assert!(matches!(err, ClientError::Connect(_)));
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"token": "abc123", "user": {"email": "teacher@school.edu"}}"#,
        )
        .await;
        let client = client_for(url, None);

        let login = assert_ok!(client.login("teacher@school.edu", "hunter2").await);
        assert_eq!(login.token, "abc123");
        assert_eq!(login.user["email"], json!("teacher@school.edu"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /account/login/ "));
        assert!(request.contains(r#"{"email":"teacher@school.edu","password":"hunter2"}"#));
    }

    #[tokio::test]
    async fn test_upload_quiz_multipart_fields() {
        let temp_dir = TempDir::new().unwrap();
        let solution = temp_dir.path().join("solution.png");
        let alice = temp_dir.path().join("alice.png");
        let bob = temp_dir.path().join("bob.jpg");
        std::fs::write(&solution, "solution-bytes").unwrap();
        std::fs::write(&alice, "alice-bytes").unwrap();
        std::fs::write(&bob, "bob-bytes").unwrap();

        let (url, server) = serve_once(
            "200 OK",
            r#"{"quizName": "Loops", "students": [{"name": "Alice", "final_score": 9}]}"#,
        )
        .await;
        let client = client_for(url, Some("secret"));

        let request = GradingRequest {
            quiz_name: "Loops".to_string(),
            logic_weight: 0.7,
            similarity_threshold: 0.3,
            total: 10.0,
            solution_image: solution,
            submissions: vec![
                Submission {
                    student_name: "Alice".to_string(),
                    image: alice,
                },
                Submission {
                    student_name: "Bob".to_string(),
                    image: bob,
                },
            ],
        };

        let response = assert_ok!(client.upload_quiz(&request).await);
        assert_eq!(response.quiz_name.as_deref(), Some("Loops"));
        assert_eq!(response.students.len(), 1);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/upload_quiz/ "));
        assert!(raw.to_lowercase().contains("content-type: multipart/form-data; boundary="));
        assert!(raw.to_lowercase().contains("authorization: bearer secret"));

        let position = |needle: &str| {
            raw.find(needle)
                .unwrap_or_else(|| panic!("missing {} in request", needle))
        };
        let fields = [
            r#"name="quizName""#,
            r#"name="logicWeight""#,
            r#"name="similarityThreshold""#,
            r#"name="total""#,
            r#"name="solutionImage"; filename="solution.png""#,
            "solution-bytes",
            r#"name="studentNames""#,
            r#"name="studentImages"; filename="alice.png""#,
            "alice-bytes",
            r#"name="studentImages"; filename="bob.jpg""#,
            "bob-bytes",
        ];
        let positions: Vec<usize> = fields.iter().map(|f| position(*f)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(raw.matches(r#"name="studentNames""#).count(), 2);
        assert!(raw.contains("\r\n\r\nAlice\r\n"));
        assert!(raw.contains("\r\n\r\nBob\r\n"));
        assert!(raw.contains("\r\n\r\n0.7\r\n"));
        assert!(raw.contains("Content-Type: image/jpeg") || raw.contains("content-type: image/jpeg"));
    }

    #[tokio::test]
    async fn test_check_plagiarism_null_results() {
        let (url, server) =
            serve_once("200 OK", r#"{"quiz_name": "Q", "plagiarism_results": null}"#).await;
        let client = client_for(url, None);

        let response = assert_ok!(client.check_plagiarism("7").await);
        assert!(response.plagiarism_results.is_empty());

        let graph = assert_ok!(crate::analysis::aggregate_raw(&response.plagiarism_results));
        assert_eq!(graph.total_students, 0);
        assert_eq!(graph.average_similarity, 0.0);
        server.await.unwrap();
    }
}
