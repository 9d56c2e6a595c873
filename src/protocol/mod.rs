pub mod request;
pub mod response;

pub use request::{
    ClientInfo, GetPromptParams, InitializeParams, JsonRpcRequest, RpcId, ToolCallParams,
};
pub use response::{
    JsonRpcError, JsonRpcResponse, PromptMessage, PromptResult, TextContent, ToolResult,
};
