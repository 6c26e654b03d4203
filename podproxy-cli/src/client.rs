use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use podproxy_common::{LaunchRequest, ProxyCommand, ProxyResponse, DEFAULT_MAX_FRAME_LENGTH};
use std::io;
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Invalid response from proxy: {0}")]
    InvalidResponse(String),

    #[error("Proxy closed the connection before responding")]
    Closed,
}

/// One connection to the proxy.
///
/// Requests on a connection are answered in the order they were sent.
pub struct ProxyClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl ProxyClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(DEFAULT_MAX_FRAME_LENGTH)
            .new_codec();

        Ok(Self {
            framed: Framed::new(stream, codec),
        })
    }

    /// Send a command and wait for its response.
    pub async fn request(&mut self, command: &ProxyCommand) -> Result<ProxyResponse, ClientError> {
        self.send(command).await?;
        self.receive().await
    }

    pub async fn create(&mut self, request: LaunchRequest) -> Result<ProxyResponse, ClientError> {
        self.request(&ProxyCommand::Create(request)).await
    }

    pub async fn delete(&mut self, name: &str) -> Result<ProxyResponse, ClientError> {
        self.request(&ProxyCommand::Delete(name.to_string())).await
    }

    pub async fn delete_all(&mut self) -> Result<ProxyResponse, ClientError> {
        self.request(&ProxyCommand::DeleteAll).await
    }

    pub async fn resolve_container_id(&mut self, name: &str) -> Result<ProxyResponse, ClientError> {
        self.request(&ProxyCommand::ResolveContainerId(name.to_string()))
            .await
    }

    /// Send without waiting; pair with [`ProxyClient::receive`].
    pub async fn send(&mut self, command: &ProxyCommand) -> Result<(), ClientError> {
        let payload = command
            .encode()
            .map_err(|e| ClientError::Encode(e.to_string()))?;
        self.send_raw(payload).await
    }

    /// Send an arbitrary payload as one frame.
    pub async fn send_raw(&mut self, payload: impl Into<Bytes>) -> Result<(), ClientError> {
        self.framed.send(payload.into()).await?;
        Ok(())
    }

    pub async fn receive(&mut self) -> Result<ProxyResponse, ClientError> {
        let frame = self.framed.next().await.ok_or(ClientError::Closed)??;
        ProxyResponse::decode(&frame).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
