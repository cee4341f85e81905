pub mod transfer_ctx;
pub mod transfer_flow;

pub use transfer_ctx::TransferCtx;
pub use transfer_flow::TransferFlow;
