//! 压测客户端连接
//!
//! 一条长连接上串行发送 `GET /greeting?name=...`，按 Content-Length 读回响应。

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use std::io;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};

/// 响应头上限
const MAX_HEAD_SIZE: usize = 8 * 1024;

/// 一个已解析的响应
#[derive(Debug, Clone)]
pub struct GreetingResponse {
    /// 状态码
    pub status: u16,
    /// 响应体
    pub body: Bytes,
    /// 服务端是否保持连接
    pub keep_alive: bool,
}

/// 客户端侧 HTTP/1.1 编解码器
///
/// 编码请求目标，解码带 Content-Length 的响应。
#[derive(Debug)]
pub struct ResponseCodec {
    host: String,
    head: Option<(u16, usize, bool)>,
}

impl ResponseCodec {
    /// 创建编解码器，`host` 写入 Host 头
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            head: None,
        }
    }

    fn parse_head(head: &str) -> io::Result<(u16, usize, bool)> {
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| invalid(format!("状态行格式错误: {:?}", status_line)))?;

        let mut length = None;
        let mut keep_alive = version == "HTTP/1.1";
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                length = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| invalid(format!("Content-Length 非法: {:?}", value)))?,
                );
            } else if name.eq_ignore_ascii_case("connection") {
                keep_alive = !value.eq_ignore_ascii_case("close");
            }
        }

        let length = length.ok_or_else(|| invalid("响应缺少 Content-Length"))?;
        Ok((status, length, keep_alive))
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

impl Decoder for ResponseCodec {
    type Item = GreetingResponse;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.head.is_none() {
            let Some(end) = src.windows(4).position(|w| w == b"\r\n\r\n") else {
                if src.len() > MAX_HEAD_SIZE {
                    return Err(invalid("响应头过大"));
                }
                return Ok(None);
            };
            let head = std::str::from_utf8(&src[..end])
                .map_err(|_| invalid("响应头不是 UTF-8"))?;
            self.head = Some(Self::parse_head(head)?);
            src.advance(end + 4);
        }

        let Some((status, length, keep_alive)) = self.head else {
            return Ok(None);
        };
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        self.head = None;
        Ok(Some(GreetingResponse {
            status,
            body: src.split_to(length).freeze(),
            keep_alive,
        }))
    }
}

impl Encoder<String> for ResponseCodec {
    type Error = io::Error;

    fn encode(&mut self, target: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(target.len() + self.host.len() + 32);
        dst.put_slice(b"GET ");
        dst.put_slice(target.as_bytes());
        dst.put_slice(b" HTTP/1.1\r\nHost: ");
        dst.put_slice(self.host.as_bytes());
        dst.put_slice(b"\r\n\r\n");
        Ok(())
    }
}

/// 到问候服务的长连接
pub struct GreetingClient {
    framed: Framed<TcpStream, ResponseCodec>,
    closed: bool,
}

impl GreetingClient {
    /// 连接到服务端
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, ResponseCodec::new(addr)),
            closed: false,
        })
    }

    /// 服务端是否已声明关闭连接
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 发送一次问候请求并等待响应
    pub async fn greet(&mut self, name: &str) -> io::Result<GreetingResponse> {
        let target = format!("/greeting?name={}", urlencoding::encode(name));
        self.framed.send(target).await?;

        let response = self
            .framed
            .next()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "服务端关闭连接"))??;
        if !response.keep_alive {
            self.closed = true;
        }
        Ok(response)
    }
}
