//! 协议模块
//!
//! HTTP/1.x 消息定义与编解码。

pub mod codec;
pub mod message;

// 重新导出主要类型
pub use codec::HttpCodec;
pub use message::{HttpError, HttpRequest, HttpResponse, Version};
