/// REST command client for the board server.
///
/// Exactly one request is issued per mutation; rapid repeated drags are
/// never deduplicated or coalesced, so completions can resolve out of
/// order and are settled per mutation token by the session.
use chrono::NaiveDate;
use kanban_core::types::{Board, Card, List, User, Workspace};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoardRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub workspace_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListRequest {
    pub name: String,
    pub board_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignee_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Partial card update; absent fields are left unchanged by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCardRequest {
    pub target_list_id: i64,
    pub new_position: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveListRequest {
    pub new_position: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Grant a user a role within a workspace. `role` is one of `OWNER`,
/// `ADMIN` or `MEMBER`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignWorkspaceMemberRequest {
    pub user_id: i64,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub total_workspaces: i64,
    pub total_boards: i64,
    pub total_cards: i64,
}

/// Workspace as seen by the admin boundary, with its boards expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminWorkspace {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: i64,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub boards: Vec<Board>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: String,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    // ── Boards ──────────────────────────────────────────────────────────

    pub async fn get_board(&self, board_id: i64) -> Result<Board, ApiError> {
        self.execute(self.http.get(self.url(&format!("/boards/{board_id}"))))
            .await
    }

    pub async fn create_board(&self, body: &CreateBoardRequest) -> Result<Board, ApiError> {
        self.execute(self.http.post(self.url("/boards")).json(body))
            .await
    }

    pub async fn update_board(
        &self,
        board_id: i64,
        body: &CreateBoardRequest,
    ) -> Result<Board, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/boards/{board_id}")))
                .json(body),
        )
        .await
    }

    pub async fn delete_board(&self, board_id: i64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/boards/{board_id}"))))
            .await
    }

    pub async fn boards_by_workspace(&self, workspace_id: i64) -> Result<Vec<Board>, ApiError> {
        self.execute(
            self.http
                .get(self.url(&format!("/boards/workspace/{workspace_id}"))),
        )
        .await
    }

    // ── Lists ───────────────────────────────────────────────────────────

    pub async fn create_list(&self, body: &CreateListRequest) -> Result<List, ApiError> {
        self.execute(self.http.post(self.url("/lists")).json(body))
            .await
    }

    pub async fn update_list(
        &self,
        list_id: i64,
        body: &CreateListRequest,
    ) -> Result<List, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/lists/{list_id}")))
                .json(body),
        )
        .await
    }

    pub async fn delete_list(&self, list_id: i64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/lists/{list_id}"))))
            .await
    }

    pub async fn move_list(&self, list_id: i64, body: MoveListRequest) -> Result<List, ApiError> {
        self.execute(
            self.http
                .post(self.url(&format!("/lists/{list_id}/move")))
                .json(&body),
        )
        .await
    }

    // ── Cards ───────────────────────────────────────────────────────────

    pub async fn create_card(&self, body: &CreateCardRequest) -> Result<Card, ApiError> {
        self.execute(self.http.post(self.url("/cards")).json(body))
            .await
    }

    pub async fn update_card(
        &self,
        card_id: i64,
        body: &UpdateCardRequest,
    ) -> Result<Card, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/cards/{card_id}")))
                .json(body),
        )
        .await
    }

    pub async fn delete_card(&self, card_id: i64) -> Result<(), ApiError> {
        self.execute_empty(self.http.delete(self.url(&format!("/cards/{card_id}"))))
            .await
    }

    pub async fn move_card(&self, card_id: i64, body: MoveCardRequest) -> Result<Card, ApiError> {
        self.execute(
            self.http
                .post(self.url(&format!("/cards/{card_id}/move")))
                .json(&body),
        )
        .await
    }

    // ── Workspaces and users ────────────────────────────────────────────

    pub async fn my_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        self.execute(self.http.get(self.url("/workspaces/my"))).await
    }

    pub async fn create_workspace(
        &self,
        body: &CreateWorkspaceRequest,
    ) -> Result<Workspace, ApiError> {
        self.execute(self.http.post(self.url("/workspaces")).json(body))
            .await
    }

    pub async fn assign_workspace_member(
        &self,
        workspace_id: i64,
        body: &AssignWorkspaceMemberRequest,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.http
                .post(self.url(&format!("/workspaces/{workspace_id}/assign")))
                .json(body),
        )
        .await
    }

    pub async fn remove_workspace_member(
        &self,
        workspace_id: i64,
        user_id: i64,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.http
                .delete(self.url(&format!("/workspaces/{workspace_id}/members/{user_id}"))),
        )
        .await
    }

    pub async fn board_users(&self, board_id: i64) -> Result<Vec<User>, ApiError> {
        self.execute(self.http.get(self.url(&format!("/users/board/{board_id}"))))
            .await
    }

    // ── Admin boundary ──────────────────────────────────────────────────

    pub async fn admin_users(&self) -> Result<Vec<AdminUser>, ApiError> {
        self.execute(self.http.get(self.url("/admin/users"))).await
    }

    pub async fn admin_set_user_role(
        &self,
        user_id: i64,
        role: &str,
    ) -> Result<AdminUser, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/admin/users/{user_id}/role")))
                .json(&serde_json::json!({ "role": role })),
        )
        .await
    }

    pub async fn admin_toggle_user_status(&self, user_id: i64) -> Result<AdminUser, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/admin/users/{user_id}/toggle-status"))),
        )
        .await
    }

    pub async fn admin_workspaces(&self) -> Result<Vec<AdminWorkspace>, ApiError> {
        self.execute(self.http.get(self.url("/admin/workspaces"))).await
    }

    pub async fn admin_update_workspace(
        &self,
        workspace_id: i64,
        body: &CreateWorkspaceRequest,
    ) -> Result<AdminWorkspace, ApiError> {
        self.execute(
            self.http
                .put(self.url(&format!("/admin/workspaces/{workspace_id}")))
                .json(body),
        )
        .await
    }

    pub async fn admin_delete_workspace(&self, workspace_id: i64) -> Result<(), ApiError> {
        self.execute_empty(
            self.http
                .delete(self.url(&format!("/admin/workspaces/{workspace_id}"))),
        )
        .await
    }

    pub async fn admin_assign_board_member(
        &self,
        board_id: i64,
        user_id: i64,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.http
                .post(self.url(&format!("/admin/boards/{board_id}/members")))
                .json(&serde_json::json!({ "userId": user_id })),
        )
        .await
    }

    pub async fn admin_remove_board_member(
        &self,
        board_id: i64,
        user_id: i64,
    ) -> Result<(), ApiError> {
        self.execute_empty(
            self.http
                .delete(self.url(&format!("/admin/boards/{board_id}/members/{user_id}"))),
        )
        .await
    }

    pub async fn admin_statistics(&self) -> Result<SystemStatistics, ApiError> {
        self.execute(self.http.get(self.url("/admin/statistics")))
            .await
    }
}

/// Pull the human-readable message out of an error body. The server sends
/// `{"message": ...}`; some proxies wrap failures as `{"error": ...}`.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
