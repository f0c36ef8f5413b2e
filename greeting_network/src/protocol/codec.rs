//! HTTP/1.x 编解码器
//!
//! 每次解码出恰好一个完整请求（请求头 + Content-Length 指定的请求体）。

use crate::protocol::message::{HttpError, HttpRequest, HttpResponse, Version};
use bytes::{Bytes, BytesMut};
use greeting_router::Method;
use tokio_util::codec::{Decoder, Encoder};

/// 头部数量上限
const MAX_HEADERS: usize = 100;

/// 解码状态
#[derive(Debug)]
enum DecodeState {
    /// 等待完整的请求行和头部
    Head,
    /// 头部已解析，还需要 `remaining` 字节请求体
    Body {
        request: HttpRequest,
        remaining: usize,
    },
}

/// HTTP/1.x 编解码器
///
/// 解码 [`HttpRequest`]，编码 [`HttpResponse`]。
#[derive(Debug)]
pub struct HttpCodec {
    state: DecodeState,
    max_head_size: usize,
    max_body_size: usize,
}

impl HttpCodec {
    /// 默认请求头上限（64KB）
    pub const DEFAULT_MAX_HEAD_SIZE: usize = 64 * 1024;

    /// 默认请求体上限（1MB）
    pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

    /// 创建新的编解码器
    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_HEAD_SIZE, Self::DEFAULT_MAX_BODY_SIZE)
    }

    /// 使用指定上限创建
    pub fn with_limits(max_head_size: usize, max_body_size: usize) -> Self {
        Self {
            state: DecodeState::Head,
            max_head_size,
            max_body_size,
        }
    }

    fn decode_head(&self, src: &mut BytesMut) -> Result<Option<(HttpRequest, usize)>, HttpError> {
        // 容忍请求之间多余的空行
        while src.starts_with(b"\r\n") {
            let _ = src.split_to(2);
        }

        let Some(end) = find_head_end(src) else {
            if src.len() > self.max_head_size {
                return Err(HttpError::HeadTooLarge {
                    limit: self.max_head_size,
                });
            }
            return Ok(None);
        };

        if end > self.max_head_size {
            return Err(HttpError::HeadTooLarge {
                limit: self.max_head_size,
            });
        }

        let head = src.split_to(end);
        let head = std::str::from_utf8(&head).map_err(|_| HttpError::BadRequestLine)?;
        let mut lines = head.split("\r\n");

        let request_line = lines.next().ok_or(HttpError::BadRequestLine)?;
        let (method, target, version) = parse_request_line(request_line)?;

        let mut headers = Vec::new();
        for line in lines.take_while(|line| !line.is_empty()) {
            headers.push(parse_header_line(line)?);
            if headers.len() > MAX_HEADERS {
                return Err(HttpError::BadHeader("头部数量过多".to_string()));
            }
        }

        let body_len = body_length(&headers)?;
        if body_len > self.max_body_size {
            return Err(HttpError::BodyTooLarge {
                size: body_len,
                limit: self.max_body_size,
            });
        }

        let request = HttpRequest {
            method,
            target,
            version,
            headers,
            body: Bytes::new(),
        };
        Ok(Some((request, body_len)))
    }
}

impl Default for HttpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for HttpCodec {
    type Item = HttpRequest;
    type Error = HttpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match std::mem::replace(&mut self.state, DecodeState::Head) {
                DecodeState::Head => match self.decode_head(src)? {
                    None => return Ok(None),
                    Some((request, 0)) => return Ok(Some(request)),
                    Some((request, remaining)) => {
                        self.state = DecodeState::Body { request, remaining };
                    }
                },
                DecodeState::Body {
                    mut request,
                    remaining,
                } => {
                    if src.len() < remaining {
                        src.reserve(remaining - src.len());
                        self.state = DecodeState::Body { request, remaining };
                        return Ok(None);
                    }
                    request.body = src.split_to(remaining).freeze();
                    return Ok(Some(request));
                }
            }
        }
    }
}

impl Encoder<HttpResponse> for HttpCodec {
    type Error = HttpError;

    fn encode(&mut self, item: HttpResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst);
        Ok(())
    }
}

/// 查找 `\r\n\r\n`，返回其后第一个字节的位置
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// 解析请求行 `METHOD SP TARGET SP VERSION`
fn parse_request_line(line: &str) -> Result<(Method, String, Version), HttpError> {
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::BadRequestLine);
    };

    if method.is_empty() || !method.bytes().all(is_token_byte) || target.is_empty() {
        return Err(HttpError::BadRequestLine);
    }

    Ok((Method::from_token(method), target.to_string(), Version::from_token(version)?))
}

/// 解析 `Name: Value` 头部行
fn parse_header_line(line: &str) -> Result<(String, String), HttpError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HttpError::BadHeader(line.to_string()))?;

    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(HttpError::BadHeader(line.to_string()));
    }

    Ok((name.to_string(), value.trim().to_string()))
}

/// 根据头部确定请求体长度
///
/// 只支持 Content-Length；出现 Transfer-Encoding 视为协议错误。
fn body_length(headers: &[(String, String)]) -> Result<usize, HttpError> {
    if let Some((_, te)) = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("transfer-encoding"))
    {
        return Err(HttpError::UnsupportedTransferEncoding(te.clone()));
    }

    let mut length = None;
    for (_, value) in headers
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case("content-length"))
    {
        let parsed: usize = value.parse().map_err(|_| HttpError::BadContentLength)?;
        if length.is_some_and(|prev| prev != parsed) {
            return Err(HttpError::BadContentLength);
        }
        length = Some(parsed);
    }

    Ok(length.unwrap_or(0))
}

/// RFC 7230 tchar
fn is_token_byte(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
            | b'`' | b'|' | b'~' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z'
    )
}
