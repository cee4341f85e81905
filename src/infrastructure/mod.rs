//! 基础设施层（Infrastructure Layer）
//!
//! 只暴露"驱动外部应用程序"的能力，不认识映射、标记和模板。
//!
//! - `driver`：能力接口（`AutomationDriver` / `SpreadsheetEngine` / `DocumentEngine`）
//! - `handle_factory`：带重试的句柄创建与会话守卫
//! - `retry`：通用重试策略
//! - `transfer`：单槽传输缓冲区
//! - `bridge` / `memory`：两种驱动实现

pub mod bridge;
pub mod driver;
pub mod handle_factory;
pub mod memory;
pub mod retry;
pub mod transfer;

pub use bridge::BridgeDriver;
pub use driver::{
    AutomationDriver, BindingStrategy, DocumentEngine, EngineHandle, EngineKind, ImageRef,
    ImageSize, PageGeometry, SheetVisibility, SpreadsheetEngine,
};
pub use handle_factory::{DocumentSession, RetryingHandleFactory, SpreadsheetSession};
pub use memory::{MemoryDriver, Workbook};
pub use retry::{Attempt, RetryExhausted, RetryPolicy};
pub use transfer::{Snapshot, TransferBuffer};
