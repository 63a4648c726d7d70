//! Typed facade over the admin backend endpoints.
//!
//! Each admin page calls one of these methods instead of building paths by
//! hand. Entity shapes belong to the backend, so payloads are generic
//! (`serde_json::Value` by default, or any serde type the caller chooses).

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::api::{ApiError, ApiResponse, HttpClient, MultipartForm, RequestOptions};

/// Backend collections that support list/get/create/update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminResource {
    Users,
    Groups,
    Prompts,
    Tools,
    Workflows,
    Apps,
    Models,
    Registries,
}

impl AdminResource {
    pub const ALL: [AdminResource; 8] = [
        AdminResource::Users,
        AdminResource::Groups,
        AdminResource::Prompts,
        AdminResource::Tools,
        AdminResource::Workflows,
        AdminResource::Apps,
        AdminResource::Models,
        AdminResource::Registries,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            AdminResource::Users => "/admin/users",
            AdminResource::Groups => "/admin/groups",
            AdminResource::Prompts => "/admin/prompts",
            AdminResource::Tools => "/admin/tools",
            AdminResource::Workflows => "/admin/workflows",
            AdminResource::Apps => "/admin/apps",
            AdminResource::Models => "/admin/models",
            AdminResource::Registries => "/admin/marketplace/registries",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdminResource::Users => "users",
            AdminResource::Groups => "groups",
            AdminResource::Prompts => "prompts",
            AdminResource::Tools => "tools",
            AdminResource::Workflows => "workflows",
            AdminResource::Apps => "apps",
            AdminResource::Models => "models",
            AdminResource::Registries => "registries",
        }
    }

    /// Parse a resource name as typed on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    fn item_path(&self, id: &str) -> Result<String, ApiError> {
        Ok(format!("{}/{}", self.path(), validate_segment(id)?))
    }
}

/// Platform configuration sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Ssl,
    Logging,
    Jira,
}

impl ConfigSection {
    pub fn path(&self) -> &'static str {
        match self {
            ConfigSection::Ssl => "/admin/configs/ssl",
            ConfigSection::Logging => "/admin/configs/logging",
            ConfigSection::Jira => "/admin/configs/jira",
        }
    }
}

const UPLOAD_ASSET_PATH: &str = "/admin/ui/upload-asset";
const ASSETS_PATH: &str = "/admin/ui/assets";
const HEALTH_PATH: &str = "/health";

/// Reject identifiers that would change the path structure.
///
/// Identifiers are used verbatim, so `%` is refused too: the server would
/// decode `%2F` back into a separator.
fn validate_segment(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    let structural = |c: char| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control();
    if id.is_empty() || id.contains(structural) || id == "." || id == ".." {
        return Err(ApiError::InvalidRequest(format!("Invalid identifier: {:?}", id)));
    }
    Ok(id)
}

/// Clone is cheap - both handles share one underlying client.
#[derive(Clone)]
pub struct AdminApi {
    client: HttpClient,
    streaming: HttpClient,
}

impl AdminApi {
    pub fn new(client: HttpClient) -> Self {
        let streaming = client.streaming();
        Self { client, streaming }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    // ===== Generic CRUD =====

    pub async fn list<T: DeserializeOwned>(&self, resource: AdminResource) -> Result<T, ApiError> {
        let response = self.client.get(resource.path()).await?;
        debug!(resource = resource.name(), not_modified = response.not_modified, "Listed resource");
        response.into_json()
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: AdminResource, id: &str) -> Result<T, ApiError> {
        self.client.get(&resource.item_path(id)?).await?.into_json()
    }

    pub async fn create<B, T>(&self, resource: AdminResource, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(resource.path(), body).await?;
        info!(resource = resource.name(), "Created item");
        response.into_json()
    }

    pub async fn update<B, T>(&self, resource: AdminResource, id: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.put(&resource.item_path(id)?, body).await?;
        info!(resource = resource.name(), id, "Updated item");
        response.into_json()
    }

    pub async fn delete(&self, resource: AdminResource, id: &str) -> Result<(), ApiError> {
        self.client.delete(&resource.item_path(id)?).await?;
        info!(resource = resource.name(), id, "Deleted item");
        Ok(())
    }

    // ===== Marketplace =====

    /// Re-sync a registry's catalog. Long-running, so uses the streaming timeout.
    pub async fn sync_registry(&self, id: &str) -> Result<Value, ApiError> {
        let path = format!("{}/sync", AdminResource::Registries.item_path(id)?);
        let response = self.streaming.request(&path, RequestOptions::post()).await?;
        info!(registry = id, "Registry sync finished");
        Ok(response.data)
    }

    // ===== UI assets =====

    pub async fn list_assets(&self) -> Result<Value, ApiError> {
        Ok(self.client.get(ASSETS_PATH).await?.data)
    }

    pub async fn upload_asset(&self, form: MultipartForm) -> Result<Value, ApiError> {
        let response = self
            .client
            .request(UPLOAD_ASSET_PATH, RequestOptions::post().multipart(form))
            .await?;
        Ok(response.data)
    }

    pub async fn delete_asset(&self, name: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", ASSETS_PATH, validate_segment(name)?);
        self.client.delete(&path).await?;
        Ok(())
    }

    // ===== Platform configuration =====

    pub async fn get_config(&self, section: ConfigSection) -> Result<Value, ApiError> {
        Ok(self.client.get(section.path()).await?.data)
    }

    pub async fn update_config<B: Serialize + ?Sized>(
        &self,
        section: ConfigSection,
        body: &B,
    ) -> Result<Value, ApiError> {
        let response = self.client.put(section.path(), body).await?;
        info!(section = section.path(), "Platform configuration updated");
        Ok(response.data)
    }

    pub async fn test_jira_connection(&self) -> Result<Value, ApiError> {
        let path = format!("{}/test", ConfigSection::Jira.path());
        let response = self
            .client
            .request(&path, RequestOptions::post().skip_retry())
            .await?;
        Ok(response.data)
    }

    // ===== Health =====

    /// Backend health probe. Never retried.
    pub async fn health(&self) -> Result<ApiResponse, ApiError> {
        self.client.get(HEALTH_PATH).await
    }
}
