use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::{DatasourceResultMap, SettingsDocument};
use crate::tabs::TopTab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    History,
    Running,
    Setting,
}

impl Resource {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Running => "running",
            Self::Setting => "setting",
        }
    }

    #[must_use]
    pub fn for_tab(tab: TopTab) -> Self {
        match tab {
            TopTab::History => Self::History,
            TopTab::Running => Self::Running,
            TopTab::Setting => Self::Setting,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordResource {
    History,
    Running,
}

impl RecordResource {
    #[must_use]
    pub fn resource(self) -> Resource {
        match self {
            Self::History => Resource::History,
            Self::Running => Resource::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn fetch_records(
        &self,
        resource: RecordResource,
        servers: &str,
    ) -> Result<DatasourceResultMap, GatewayError>;

    async fn fetch_settings(&self, servers: &str) -> Result<SettingsDocument, GatewayError>;

    async fn save_settings(
        &self,
        servers: &str,
        document: &SettingsDocument,
    ) -> Result<SettingsDocument, GatewayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    Load(Resource),
    SaveSettings(SettingsDocument),
}

impl RequestKind {
    #[must_use]
    pub fn resource(&self) -> Resource {
        match self {
            Self::Load(resource) => *resource,
            Self::SaveSettings(_) => Resource::Setting,
        }
    }
}

/// One issued backend call. `id` grows monotonically per session and is used
/// to drop responses that arrive after a newer one was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub id: u64,
    pub kind: RequestKind,
    pub servers: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchPayload {
    Records(DatasourceResultMap),
    Settings(SettingsDocument),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchCompletion {
    pub id: u64,
    pub resource: Resource,
    pub result: Result<FetchPayload, GatewayError>,
}

pub async fn execute<G>(gateway: &G, request: FetchRequest) -> FetchCompletion
where
    G: DataGateway + ?Sized,
{
    let resource = request.kind.resource();
    let servers = request.servers.as_str();
    let result = match &request.kind {
        RequestKind::Load(Resource::History) => gateway
            .fetch_records(RecordResource::History, servers)
            .await
            .map(FetchPayload::Records),
        RequestKind::Load(Resource::Running) => gateway
            .fetch_records(RecordResource::Running, servers)
            .await
            .map(FetchPayload::Records),
        RequestKind::Load(Resource::Setting) => gateway
            .fetch_settings(servers)
            .await
            .map(FetchPayload::Settings),
        RequestKind::SaveSettings(document) => gateway
            .save_settings(servers, document)
            .await
            .map(FetchPayload::Settings),
    };

    FetchCompletion {
        id: request.id,
        resource,
        result,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::json;

    use super::{
        execute, DataGateway, FetchPayload, FetchRequest, GatewayError, RecordResource,
        RequestKind, Resource,
    };
    use crate::records::{DatasourceResultMap, QueryRecord, SettingsDocument};

    #[derive(Debug, Default)]
    pub(crate) struct FakeGateway {
        pub(crate) records: Mutex<VecDeque<Result<DatasourceResultMap, GatewayError>>>,
        pub(crate) settings: Mutex<VecDeque<Result<SettingsDocument, GatewayError>>>,
        pub(crate) calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeGateway {
        pub(crate) fn push_records(&self, result: Result<DatasourceResultMap, GatewayError>) {
            self.records.lock().expect("lock").push_back(result);
        }

        pub(crate) fn push_settings(&self, result: Result<SettingsDocument, GatewayError>) {
            self.settings.lock().expect("lock").push_back(result);
        }

        fn record_call(&self, call: &str, servers: &str) {
            self.calls
                .lock()
                .expect("lock")
                .push((call.to_string(), servers.to_string()));
        }
    }

    #[async_trait::async_trait]
    impl DataGateway for FakeGateway {
        async fn fetch_records(
            &self,
            resource: RecordResource,
            servers: &str,
        ) -> Result<DatasourceResultMap, GatewayError> {
            self.record_call(resource.resource().path(), servers);
            self.records
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(DatasourceResultMap::new()))
        }

        async fn fetch_settings(&self, servers: &str) -> Result<SettingsDocument, GatewayError> {
            self.record_call("setting", servers);
            self.settings
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(SettingsDocument::default()))
        }

        async fn save_settings(
            &self,
            servers: &str,
            _document: &SettingsDocument,
        ) -> Result<SettingsDocument, GatewayError> {
            self.record_call("save-setting", servers);
            self.settings
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(SettingsDocument::default()))
        }
    }

    #[tokio::test]
    async fn execute_routes_loads_to_the_matching_call() {
        let gateway = FakeGateway::default();
        let mut history = DatasourceResultMap::new();
        history.insert("db1".to_string(), vec![QueryRecord::new(7)]);
        gateway.push_records(Ok(history.clone()));

        let completion = execute(
            &gateway,
            FetchRequest {
                id: 3,
                kind: RequestKind::Load(Resource::History),
                servers: "a:8080,b:8080".to_string(),
            },
        )
        .await;

        assert_eq!(completion.id, 3);
        assert_eq!(completion.resource, Resource::History);
        assert_eq!(completion.result, Ok(FetchPayload::Records(history)));
        assert_eq!(
            gateway.calls.lock().expect("lock").as_slice(),
            &[("history".to_string(), "a:8080,b:8080".to_string())]
        );
    }

    #[tokio::test]
    async fn execute_save_reports_setting_resource_and_error() {
        let gateway = FakeGateway::default();
        let error = GatewayError::Status {
            url: "http://x/setting".to_string(),
            status: 500,
        };
        gateway.push_settings(Err(error.clone()));

        let completion = execute(
            &gateway,
            FetchRequest {
                id: 1,
                kind: RequestKind::SaveSettings(SettingsDocument::new(json!({"h": {}}))),
                servers: String::new(),
            },
        )
        .await;

        assert_eq!(completion.resource, Resource::Setting);
        assert_eq!(completion.result, Err(error));
        assert_eq!(gateway.calls.lock().expect("lock")[0].0, "save-setting");
    }
}
