//! 桥接驱动
//!
//! 真正的表格 / 文档应用程序由目标平台上的桥接服务持有，
//! 这里通过 JSON over HTTP 调用它：
//!
//! - `POST {base}/engines`             `{kind, strategy}` → `{handle}`
//! - `POST {base}/engines/{id}/call`   `{op, args}` → `{ok, value | error}`
//! - `DELETE {base}/engines/{id}`      强制终止
//! - `POST {base}/platform/release`、`POST {base}/platform/sweep`

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{DriverError, DriverResult};
use crate::infrastructure::driver::{
    AutomationDriver, BindingStrategy, DocumentEngine, EngineHandle, EngineKind, ImageRef,
    ImageSize, PageGeometry, SheetVisibility, SpreadsheetEngine,
};

#[derive(Debug, Serialize)]
struct LaunchRequest {
    kind: EngineKind,
    strategy: BindingStrategy,
}

#[derive(Debug, Deserialize)]
struct LaunchResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// 桥接服务客户端
#[derive(Debug, Clone)]
pub struct BridgeDriver {
    client: Client,
    base_url: String,
}

impl BridgeDriver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_platform(&self, action: &str) -> DriverResult<()> {
        self.client
            .post(format!("{}/platform/{}", self.base_url, action))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl AutomationDriver for BridgeDriver {
    async fn launch(&self, kind: EngineKind, strategy: BindingStrategy) -> DriverResult<EngineHandle> {
        let response: LaunchResponse = self
            .client
            .post(format!("{}/engines", self.base_url))
            .json(&LaunchRequest { kind, strategy })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("桥接服务已创建{}句柄: {}", kind, response.handle);
        let remote = RemoteEngine {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            id: response.handle,
        };
        Ok(match kind {
            EngineKind::Spreadsheet => EngineHandle::Spreadsheet(Box::new(BridgeSpreadsheet(remote))),
            EngineKind::Document => EngineHandle::Document(Box::new(BridgeDocument(remote))),
        })
    }

    async fn release_platform(&self) {
        if let Err(e) = self.post_platform("release").await {
            warn!("⚠️ 释放平台初始化失败: {}", e);
        }
    }

    async fn sweep(&self) {
        if let Err(e) = self.post_platform("sweep").await {
            debug!("资源回收失败（已忽略）: {}", e);
        }
    }
}

/// 桥接服务上的一个句柄
struct RemoteEngine {
    client: Client,
    base_url: String,
    id: String,
}

impl RemoteEngine {
    async fn call(&self, op: &str, args: Value) -> DriverResult<Value> {
        let response: CallResponse = self
            .client
            .post(format!("{}/engines/{}/call", self.base_url, self.id))
            .json(&json!({ "op": op, "args": args }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.ok {
            Ok(response.value)
        } else {
            Err(DriverError::call(
                op,
                response.error.unwrap_or_else(|| "未知错误".to_string()),
            ))
        }
    }

    async fn call_unit(&self, op: &str, args: Value) -> DriverResult<()> {
        self.call(op, args).await.map(|_| ())
    }

    async fn call_as<T: serde::de::DeserializeOwned>(&self, op: &str, args: Value) -> DriverResult<T> {
        let value = self.call(op, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 同步终止：在当前运行时上派发删除请求，不等待结果
    fn terminate(&self) {
        let url = format!("{}/engines/{}", self.base_url, self.id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.client.clone();
                runtime.spawn(async move {
                    if let Err(e) = client.delete(&url).send().await {
                        warn!("⚠️ 终止桥接句柄失败 ({}): {}", url, e);
                    }
                });
            }
            Err(_) => warn!("⚠️ 没有可用的运行时，无法终止桥接句柄: {}", url),
        }
    }
}

fn path_arg(path: &Path) -> Value {
    json!({ "path": path.to_string_lossy() })
}

struct BridgeSpreadsheet(RemoteEngine);

#[async_trait]
impl SpreadsheetEngine for BridgeSpreadsheet {
    async fn configure_non_interactive(&mut self) -> DriverResult<()> {
        self.0
            .call_unit(
                "configure",
                json!({ "visible": false, "display_alerts": false, "screen_updating": false }),
            )
            .await
    }

    async fn open_workbook(&mut self, path: &Path) -> DriverResult<()> {
        self.0.call_unit("open_workbook", path_arg(path)).await
    }

    async fn sheet_visibility(&mut self, sheet: &str) -> DriverResult<Option<SheetVisibility>> {
        self.0.call_as("sheet_visibility", json!({ "sheet": sheet })).await
    }

    async fn copy_range_as_picture(&mut self, sheet: &str, range: &str) -> DriverResult<()> {
        self.0
            .call_unit(
                "copy_picture",
                json!({ "sheet": sheet, "range": range, "appearance": "screen", "format": "picture" }),
            )
            .await
    }

    async fn close_workbook(&mut self) -> DriverResult<()> {
        self.0.call_unit("close_workbook", json!({ "save": false })).await
    }

    async fn quit(&mut self) -> DriverResult<()> {
        self.0.call_unit("quit", Value::Null).await
    }

    fn terminate(&mut self) {
        self.0.terminate();
    }
}

struct BridgeDocument(RemoteEngine);

#[async_trait]
impl DocumentEngine for BridgeDocument {
    async fn configure_non_interactive(&mut self) -> DriverResult<()> {
        self.0
            .call_unit("configure", json!({ "visible": false, "display_alerts": false }))
            .await
    }

    async fn open_document(&mut self, path: &Path) -> DriverResult<()> {
        self.0.call_unit("open_document", path_arg(path)).await
    }

    async fn reset_cursor(&mut self) -> DriverResult<()> {
        self.0.call_unit("home", Value::Null).await
    }

    async fn find_next(&mut self, text: &str) -> DriverResult<bool> {
        self.0
            .call_as(
                "find",
                json!({ "text": text, "forward": true, "wrap": "continue", "match_wildcards": false }),
            )
            .await
    }

    async fn page_geometry(&mut self) -> DriverResult<PageGeometry> {
        self.0.call_as("page_geometry", Value::Null).await
    }

    async fn selection_vertical_offset(&mut self) -> DriverResult<f64> {
        self.0.call_as("vertical_offset", json!({ "of": "selection" })).await
    }

    async fn range_vertical_offset(&mut self) -> DriverResult<f64> {
        self.0.call_as("vertical_offset", json!({ "of": "range" })).await
    }

    async fn replace_selection_text(&mut self, text: &str) -> DriverResult<()> {
        self.0.call_unit("set_selection_text", json!({ "text": text })).await
    }

    async fn paste(&mut self) -> DriverResult<()> {
        self.0.call_unit("paste", Value::Null).await
    }

    async fn inline_image_in_selection(&mut self) -> DriverResult<Option<ImageRef>> {
        self.0.call_as("inline_image", json!({ "in": "selection" })).await
    }

    async fn inline_image_in_selection_range(&mut self) -> DriverResult<Option<ImageRef>> {
        self.0.call_as("inline_image", json!({ "in": "range" })).await
    }

    async fn extend_selection_back(&mut self) -> DriverResult<()> {
        self.0
            .call_unit("move_left", json!({ "unit": "character", "count": 1, "extend": true }))
            .await
    }

    async fn image_size(&mut self, image: ImageRef) -> DriverResult<ImageSize> {
        self.0.call_as("image_size", json!({ "image": image })).await
    }

    async fn set_image_size(&mut self, image: ImageRef, size: ImageSize) -> DriverResult<()> {
        self.0
            .call_unit(
                "set_image_size",
                json!({ "image": image, "width": size.width, "height": size.height }),
            )
            .await
    }

    async fn save(&mut self) -> DriverResult<()> {
        self.0.call_unit("save", Value::Null).await
    }

    async fn close_document(&mut self) -> DriverResult<()> {
        self.0.call_unit("close_document", json!({ "save": false })).await
    }

    async fn quit(&mut self) -> DriverResult<()> {
        self.0.call_unit("quit", Value::Null).await
    }

    fn terminate(&mut self) {
        self.0.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let driver = BridgeDriver::new("http://127.0.0.1:8765/");
        assert_eq!(driver.base_url(), "http://127.0.0.1:8765");
    }

    #[test]
    fn test_launch_request_shape() {
        let body = serde_json::to_value(LaunchRequest {
            kind: EngineKind::Spreadsheet,
            strategy: BindingStrategy::Permissive,
        })
        .unwrap();
        assert_eq!(body, json!({ "kind": "spreadsheet", "strategy": "permissive" }));
    }

    #[test]
    fn test_call_response_defaults() {
        let ok: CallResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(ok.ok);
        assert!(ok.value.is_null());

        let failed: CallResponse =
            serde_json::from_str(r#"{"ok": false, "error": "sheet locked"}"#).unwrap();
        assert_eq!(failed.error.as_deref(), Some("sheet locked"));
    }

    #[test]
    fn test_nullable_values_decode() {
        let none: Option<SheetVisibility> = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(none, None);
        let hidden: Option<SheetVisibility> = serde_json::from_value(json!("very_hidden")).unwrap();
        assert_eq!(hidden, Some(SheetVisibility::VeryHidden));
    }
}
