use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::{ApiClient, ApiRequest, FormPart, RawResponse, RequestBody, Session, Transport};
use crate::model::api::FileInfo;
use crate::model::error::ApiError;
use crate::model::share::{PublicShareInfo, ShareInfo};
use crate::service::feedback::{Confirm, Feedback, Opener};
use crate::service::file_actions::FileActions;
use crate::service::file_api::FileApi;
use crate::service::file_management::FileManagement;
use crate::service::share_api::ShareApi;

pub static BASE_URL: &str = "http://localhost:8080/api";
pub static TOKEN: &str = "test-token";

/// an in-memory stand-in for the api. Keeps real state for files, chunk sessions and shares, so
/// flows can be checked end to end. Clones share the same state
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

#[derive(Default)]
struct ServerState {
    next_id: u64,
    files: Vec<FileInfo>,
    contents: HashMap<String, Vec<u8>>,
    chunk_sessions: HashMap<String, ChunkSession>,
    shares: Vec<FakeShare>,
    /// (method, path) -> fixed response
    canned: HashMap<(String, String), RawResponse>,
    /// (method, path) -> application error message
    failing_paths: HashMap<(String, String), String>,
    /// upload file name -> application error message
    failing_uploads: HashMap<String, String>,
    /// chunk indices that fail the next time they're sent
    failing_chunks: HashSet<u64>,
    requests: Vec<ApiRequest>,
}

struct ChunkSession {
    file_name: String,
    file_size: u64,
    chunk_size: u64,
    total_chunks: u64,
    parent_id: String,
    chunks: BTreeMap<u64, Vec<u8>>,
}

struct FakeShare {
    info: ShareInfo,
    file_name: String,
    password: Option<String>,
    expired: bool,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    /// answers `method path` with exactly this, bypassing the simulated api
    pub fn respond_raw(&self, method: &str, path: &str, status: u16, body: &str) {
        self.lock().canned.insert(
            (method.to_string(), path.to_string()),
            RawResponse::new(status, body),
        );
    }

    /// makes `method path` answer with an application error carrying `message`
    pub fn fail_path(&self, method: &str, path: &str, message: &str) {
        self.lock()
            .failing_paths
            .insert((method.to_string(), path.to_string()), message.to_string());
    }

    pub fn fail_upload(&self, file_name: &str, message: &str) {
        self.lock()
            .failing_uploads
            .insert(file_name.to_string(), message.to_string());
    }

    pub fn recover_upload(&self, file_name: &str) {
        self.lock().failing_uploads.remove(file_name);
    }

    /// the next attempt at chunk `index` fails, later ones succeed
    pub fn fail_chunk_once(&self, index: u64) {
        self.lock().failing_chunks.insert(index);
    }

    pub fn add_file(&self, parent_id: Option<&str>, name: &str, is_folder: bool) -> String {
        let mut state = self.lock();
        let id = state.new_id();
        let mut file = FileInfo::new(&id, name, is_folder);
        file.parent_id = parent_id.map(str::to_string);
        state.files.push(file);
        id
    }

    /// names in `parent_id` (`None` for the root), sorted
    pub fn names_in(&self, parent_id: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .files
            .iter()
            .filter(|f| f.parent_id.as_deref() == parent_id)
            .map(|f| f.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn file(&self, id: &str) -> Option<FileInfo> {
        self.lock().files.iter().find(|f| f.id == id).cloned()
    }

    pub fn contents(&self, id: &str) -> Option<Vec<u8>> {
        self.lock().contents.get(id).cloned()
    }

    pub fn has_chunk_session(&self, upload_id: &str) -> bool {
        self.lock().chunk_sessions.contains_key(upload_id)
    }

    pub fn add_share(
        &self,
        share_id: &str,
        file_name: &str,
        password: Option<&str>,
        expired: bool,
    ) {
        let mut state = self.lock();
        let id = state.shares.len() as u64 + 1;
        state.shares.push(FakeShare {
            info: ShareInfo {
                id,
                share_id: share_id.to_string(),
                file_key: "1".to_string(),
                password: password.map(|_| "$2a$10$hashed".to_string()),
                expire_at: None,
                max_download_count: None,
                view_count: 0,
                download_count: 0,
                create_time: None,
                update_time: None,
            },
            file_name: file_name.to_string(),
            password: password.map(str::to_string),
            expired,
        });
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// how many requests went to `method path`
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method.as_str() == method && r.path == path)
            .count()
    }

    /// chunk indices in the order they were sent, failures included
    pub fn sent_chunks(&self) -> Vec<u64> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.path == "/files/upload/chunk")
            .filter_map(|r| text_part(r, "chunkIndex"))
            .filter_map(|index| index.parse().ok())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let key = (request.method.to_string(), request.path.clone());
        if let Some(response) = state.canned.get(&key) {
            return Ok(response.clone());
        }
        if let Some(message) = state.failing_paths.get(&key) {
            return Ok(failure(message));
        }
        Ok(state.route(&request))
    }
}

fn success<T: Serialize>(data: T) -> RawResponse {
    RawResponse::new(
        200,
        serde_json::to_vec(&json!({ "code": 1, "msg": "success", "data": data })).unwrap(),
    )
}

fn failure(message: &str) -> RawResponse {
    RawResponse::new(
        200,
        serde_json::to_vec(&json!({ "code": 0, "msg": message, "data": null })).unwrap(),
    )
}

fn json_body(request: &ApiRequest) -> Value {
    match &request.body {
        RequestBody::Json(value) => value.clone(),
        _ => Value::Null,
    }
}

fn form_part<'a>(request: &'a ApiRequest, name: &str) -> Option<&'a FormPart> {
    match &request.body {
        RequestBody::Multipart(parts) => parts.iter().find(|part| part.name() == name),
        _ => None,
    }
}

fn text_part(request: &ApiRequest, name: &str) -> Option<String> {
    match form_part(request, name)? {
        FormPart::Text { value, .. } => Some(value.clone()),
        FormPart::File { .. } => None,
    }
}

fn file_part(request: &ApiRequest, name: &str) -> Option<(String, Option<String>, Vec<u8>)> {
    match form_part(request, name)? {
        FormPart::File {
            file_name,
            mime_type,
            data,
            ..
        } => Some((file_name.clone(), mime_type.clone(), data.clone())),
        FormPart::Text { .. } => None,
    }
}

fn string_field(body: &Value, key: &str) -> String {
    body.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl ServerState {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    fn create_file(&mut self, parent_id: &str, name: &str, is_folder: bool) -> FileInfo {
        let id = self.new_id();
        let mut file = FileInfo::new(&id, name, is_folder);
        file.parent_id = Some(parent_id.to_string()).filter(|p| !p.is_empty());
        self.files.push(file.clone());
        file
    }

    fn route(&mut self, request: &ApiRequest) -> RawResponse {
        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["files", "list"]) => {
                let parent = request.query_value("parentId").filter(|p| !p.is_empty());
                let files: Vec<&FileInfo> = self
                    .files
                    .iter()
                    .filter(|f| f.parent_id.as_deref() == parent)
                    .collect();
                success(files)
            }
            ("POST", ["files", "folder"]) => {
                let body = json_body(request);
                let folder = self.create_file(
                    &string_field(&body, "parentId"),
                    &string_field(&body, "folderName"),
                    true,
                );
                success(folder)
            }
            ("POST", ["files", "upload"]) => {
                let Some((file_name, mime_type, data)) = file_part(request, "file") else {
                    return failure("no file");
                };
                if let Some(message) = self.failing_uploads.get(&file_name) {
                    return failure(&message.clone());
                }
                let parent_id = text_part(request, "parentId").unwrap_or_default();
                let mut file = self.create_file(&parent_id, &file_name, false);
                file.size = data.len() as u64;
                file.mime_type = mime_type;
                if let Some(stored) = self.files.iter_mut().find(|f| f.id == file.id) {
                    *stored = file.clone();
                }
                self.contents.insert(file.id.clone(), data);
                success(file)
            }
            ("PUT", ["files", "rename", id]) => {
                let new_name = string_field(&json_body(request), "newName");
                match self.files.iter_mut().find(|f| f.id == *id) {
                    Some(file) => {
                        file.name = new_name;
                        success(Value::Null)
                    }
                    None => failure("file not found"),
                }
            }
            ("DELETE", ["files", id]) => {
                let before = self.files.len();
                self.files.retain(|f| f.id != *id);
                if before == self.files.len() {
                    failure("file not found")
                } else {
                    success(Value::Null)
                }
            }
            ("POST", ["files", "upload", "chunk", "init"]) => self.init_chunks(request),
            ("POST", ["files", "upload", "chunk"]) => self.receive_chunk(request),
            ("POST", ["files", "upload", "chunk", "complete"]) => {
                let upload_id = string_field(&json_body(request), "uploadId");
                self.complete_chunks(&upload_id)
            }
            ("GET", ["files", "upload", "chunk", id, "chunks"]) => {
                let (chunks, total): (Vec<u64>, u64) = match self.chunk_sessions.get(*id) {
                    Some(session) => {
                        (session.chunks.keys().copied().collect(), session.total_chunks)
                    }
                    None => (Vec::new(), 0),
                };
                success(json!({ "chunks": chunks, "totalChunks": total, "uploadId": id }))
            }
            ("DELETE", ["files", "upload", "chunk", id]) => {
                self.chunk_sessions.remove(*id);
                success(Value::Null)
            }
            ("POST", ["files", "share"]) => {
                let body = json_body(request);
                let id = self.shares.len() as u64 + 1;
                let share_id = format!("s{id}");
                let password = body
                    .get("password")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.shares.push(FakeShare {
                    info: ShareInfo {
                        id,
                        share_id,
                        file_key: string_field(&body, "file_key"),
                        password: password.as_ref().map(|_| "$2a$10$hashed".to_string()),
                        expire_at: None,
                        max_download_count: body.get("max_download_count").and_then(Value::as_u64),
                        view_count: 0,
                        download_count: 0,
                        create_time: None,
                        update_time: None,
                    },
                    file_name: "shared".to_string(),
                    password,
                    expired: false,
                });
                success(&self.shares[self.shares.len() - 1].info)
            }
            ("GET", ["files", "share"]) => {
                let list: Vec<&ShareInfo> = self.shares.iter().map(|s| &s.info).collect();
                success(json!({ "total": list.len(), "list": list }))
            }
            ("GET", ["files", "share", id]) => match self.share_by_id(id) {
                Some(share) => success(&share.info),
                None => failure("share not found"),
            },
            ("DELETE", ["files", "share", id]) => {
                let before = self.shares.len();
                self.shares.retain(|s| s.info.id.to_string() != *id);
                if before == self.shares.len() {
                    failure("share not found")
                } else {
                    success(Value::Null)
                }
            }
            ("GET", ["files", "share", _, "logs"]) => success(json!({ "total": 0, "list": [] })),
            ("GET", ["share", share_id]) => match self.share_by_code(share_id) {
                Some(share) => success(PublicShareInfo {
                    share_id: share.info.share_id.clone(),
                    file_name: share.file_name.clone(),
                    file_size: 0,
                    has_password: share.password.is_some(),
                    expire_at: None,
                    is_expired: share.expired,
                    view_count: share.info.view_count,
                    download_count: share.info.download_count,
                    create_time: None,
                }),
                None => failure("share not found"),
            },
            ("POST", ["share", share_id, "verify"]) => {
                let given = string_field(&json_body(request), "password");
                match self.share_by_code(share_id) {
                    Some(share) => {
                        let valid = share.password.as_deref().map_or(true, |p| p == given);
                        if valid {
                            success(json!({
                                "valid": true,
                                "download_token": "dl+token/1",
                                "expires_in": 300,
                            }))
                        } else {
                            success(json!({ "valid": false }))
                        }
                    }
                    None => failure("share not found"),
                }
            }
            _ => RawResponse::new(404, r#"{"msg":"not found"}"#),
        }
    }

    fn share_by_id(&self, id: &str) -> Option<&FakeShare> {
        self.shares.iter().find(|s| s.info.id.to_string() == id)
    }

    /// by the public code rather than the numeric id
    fn share_by_code(&self, share_id: &str) -> Option<&FakeShare> {
        self.shares.iter().find(|s| s.info.share_id == share_id)
    }

    fn init_chunks(&mut self, request: &ApiRequest) -> RawResponse {
        let body = json_body(request);
        let file_size = body.get("fileSize").and_then(Value::as_u64).unwrap_or_default();
        let chunk_size = body.get("chunkSize").and_then(Value::as_u64).unwrap_or_default();
        if file_size == 0 || chunk_size == 0 {
            return failure("invalid file size");
        }
        let upload_id = Some(string_field(&body, "uploadId"))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("upload-{}", self.chunk_sessions.len() + 1));
        // a re-init rewrites the session info but keeps every chunk already stored
        let chunks = self
            .chunk_sessions
            .remove(&upload_id)
            .map(|old| old.chunks)
            .unwrap_or_default();
        let session = self.chunk_sessions.entry(upload_id.clone()).or_insert(ChunkSession {
            file_name: string_field(&body, "fileName"),
            file_size,
            chunk_size,
            total_chunks: file_size.div_ceil(chunk_size),
            parent_id: string_field(&body, "parentId"),
            chunks,
        });
        success(json!({
            "uploadId": upload_id,
            "chunkSize": session.chunk_size,
            "totalChunks": session.total_chunks,
            "fileName": session.file_name,
            "fileSize": session.file_size,
            "parentId": session.parent_id,
        }))
    }

    fn receive_chunk(&mut self, request: &ApiRequest) -> RawResponse {
        let upload_id = text_part(request, "uploadId").unwrap_or_default();
        let index = text_part(request, "chunkIndex").and_then(|i| i.parse::<u64>().ok());
        let Some(index) = index else {
            return failure("bad chunk index");
        };
        if self.failing_chunks.remove(&index) {
            return failure("network timeout");
        }
        let Some((_, _, data)) = file_part(request, "chunk") else {
            return failure("no chunk");
        };
        match self.chunk_sessions.get_mut(&upload_id) {
            Some(session) if index < session.total_chunks => {
                session.chunks.insert(index, data);
                success(Value::Null)
            }
            Some(_) => failure("chunk index out of range"),
            None => failure("upload session not found"),
        }
    }

    fn complete_chunks(&mut self, upload_id: &str) -> RawResponse {
        let Some(session) = self.chunk_sessions.get(upload_id) else {
            return failure("upload session not found");
        };
        if session.chunks.len() as u64 != session.total_chunks {
            return failure("missing chunks");
        }
        let data: Vec<u8> = session.chunks.values().flatten().copied().collect();
        let (parent_id, file_name) = (session.parent_id.clone(), session.file_name.clone());
        self.chunk_sessions.remove(upload_id);
        let mut file = self.create_file(&parent_id, &file_name, false);
        file.size = data.len() as u64;
        if let Some(stored) = self.files.iter_mut().find(|f| f.id == file.id) {
            *stored = file.clone();
        }
        self.contents.insert(file.id.clone(), data);
        success(file)
    }
}

// ---------------------------- doubles for the user-facing traits

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Warning,
    Error,
}

#[derive(Default)]
pub struct RecordingFeedback {
    messages: Mutex<Vec<(FeedbackKind, String)>>,
}

impl RecordingFeedback {
    pub fn messages(&self) -> Vec<(FeedbackKind, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(FeedbackKind, String)> {
        self.messages.lock().unwrap().last().cloned()
    }

    fn push(&self, kind: FeedbackKind, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}

impl Feedback for RecordingFeedback {
    fn success(&self, message: &str) {
        self.push(FeedbackKind::Success, message);
    }

    fn warning(&self, message: &str) {
        self.push(FeedbackKind::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(FeedbackKind::Error, message);
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    urls: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Opener for RecordingOpener {
    fn open(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}

/// always gives the same answer, and remembers what it was asked
pub struct FixedConfirm {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl FixedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirm for FixedConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

// ---------------------------- wiring

/// everything a coordinator test needs, talking to one fake server
pub struct Harness {
    pub server: FakeServer,
    pub feedback: Arc<RecordingFeedback>,
    pub opener: Arc<RecordingOpener>,
    pub api: FileApi,
    pub shares: ShareApi,
    pub listing: FileManagement,
    pub actions: FileActions,
}

pub fn harness() -> Harness {
    harness_with_chunk_size(4)
}

pub fn harness_with_chunk_size(chunk_size: u64) -> Harness {
    let server = FakeServer::new();
    let session = Arc::new(Session::new(Some(TOKEN.to_string())));
    let client = Arc::new(ApiClient::new(BASE_URL, server.clone(), session));
    let api = FileApi::new(client.clone());
    let feedback = Arc::new(RecordingFeedback::default());
    let opener = Arc::new(RecordingOpener::default());
    Harness {
        listing: FileManagement::new(api.clone(), feedback.clone()),
        actions: FileActions::new(api.clone(), feedback.clone(), opener.clone(), chunk_size),
        shares: ShareApi::new(client),
        server,
        feedback,
        opener,
        api,
    }
}
