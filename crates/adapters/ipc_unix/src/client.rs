//! Framed Unix socket client implementing [`IpcTransport`].

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use gateway_addon_app::ports::{Channel, IpcTransport};
use gateway_addon_domain::error::AddonError;

use crate::config::IpcConfig;
use crate::error::IpcError;

type Writer<W> = FramedWrite<W, LengthDelimitedCodec>;

/// Client side of the two host channels.
///
/// The rendezvous socket is dialled by [`UnixIpcClient::connect`]; the
/// duplex socket by [`IpcTransport::connect_plugin`].
pub struct UnixIpcClient {
    config: IpcConfig,
    manager_writer: Mutex<Option<Writer<OwnedWriteHalf>>>,
    manager_reader: Mutex<Option<FramedRead<OwnedReadHalf, LengthDelimitedCodec>>>,
    plugin_writer: Mutex<Option<Writer<UnixStream>>>,
    closed: watch::Sender<bool>,
}

impl UnixIpcClient {
    /// Dial the host's rendezvous socket.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Connect`] when the socket cannot be reached.
    #[tracing::instrument(skip(config), fields(path = %config.manager_path().display()))]
    pub async fn connect(config: IpcConfig) -> Result<Self, IpcError> {
        let stream = dial(config.manager_path()).await?;
        let (read_half, write_half) = stream.into_split();
        tracing::info!("manager channel connected");
        Ok(Self {
            config,
            manager_writer: Mutex::new(Some(FramedWrite::new(
                write_half,
                LengthDelimitedCodec::new(),
            ))),
            manager_reader: Mutex::new(Some(FramedRead::new(
                read_half,
                LengthDelimitedCodec::new(),
            ))),
            plugin_writer: Mutex::new(None),
            closed: watch::Sender::new(false),
        })
    }

    #[must_use]
    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn send_frame(&self, channel: Channel, payload: Vec<u8>) -> Result<(), IpcError> {
        let frame = Bytes::from(payload);
        match channel {
            Channel::Manager => {
                let mut writer = self.manager_writer.lock().await;
                let writer = writer.as_mut().ok_or(IpcError::NotConnected(channel))?;
                writer.send(frame).await?;
            }
            Channel::Plugin => {
                let mut writer = self.plugin_writer.lock().await;
                let writer = writer.as_mut().ok_or(IpcError::NotConnected(channel))?;
                writer.send(frame).await?;
            }
        }
        Ok(())
    }

    async fn next_manager_frame(&self) -> Result<Option<Vec<u8>>, IpcError> {
        let mut reader = self.manager_reader.lock().await;
        let Some(reader) = reader.as_mut() else {
            return Ok(None);
        };
        tokio::select! {
            () = wait_closed(self.closed.subscribe()) => Ok(None),
            frame = reader.next() => match frame {
                Some(Ok(bytes)) => Ok(Some(bytes.to_vec())),
                Some(Err(err)) => Err(err.into()),
                None => Ok(None),
            },
        }
    }

    async fn dial_plugin(&self, name: &str) -> Result<(), IpcError> {
        if self.is_closed() {
            return Err(IpcError::Closed);
        }
        let stream = dial(self.config.channel_path(name)).await?;
        let previous = self
            .plugin_writer
            .lock()
            .await
            .replace(FramedWrite::new(stream, LengthDelimitedCodec::new()));
        tracing::info!(channel = name, redial = previous.is_some(), "plugin channel connected");
        Ok(())
    }

    async fn close_sockets(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        self.manager_reader.lock().await.take();
        self.manager_writer.lock().await.take();
        self.plugin_writer.lock().await.take();
        tracing::info!("sockets closed");
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

async fn dial(path: std::path::PathBuf) -> Result<UnixStream, IpcError> {
    UnixStream::connect(&path)
        .await
        .map_err(|source| IpcError::Connect { path, source })
}

impl IpcTransport for UnixIpcClient {
    async fn send(&self, channel: Channel, payload: Vec<u8>) -> Result<(), AddonError> {
        self.send_frame(channel, payload)
            .await
            .map_err(IpcError::into_domain)
    }

    async fn recv_manager(&self) -> Result<Option<Vec<u8>>, AddonError> {
        self.next_manager_frame()
            .await
            .map_err(IpcError::into_domain)
    }

    async fn connect_plugin(&self, name: &str) -> Result<(), AddonError> {
        self.dial_plugin(name).await.map_err(IpcError::into_domain)
    }

    async fn close(&self) -> Result<(), AddonError> {
        self.close_sockets().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use futures_util::future::join_all;
    use tempfile::TempDir;
    use tokio::net::UnixListener;
    use tokio_util::codec::Framed;

    struct FakeHost {
        dir: TempDir,
        manager: UnixListener,
    }

    impl FakeHost {
        fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let manager = UnixListener::bind(dir.path().join("gateway.addonManager")).unwrap();
            Self { dir, manager }
        }

        fn config(&self) -> IpcConfig {
            IpcConfig::default().with_root(self.dir.path())
        }

        fn listen(&self, name: &str) -> UnixListener {
            UnixListener::bind(self.dir.path().join(name)).unwrap()
        }
    }

    async fn accept(listener: &UnixListener) -> Framed<UnixStream, LengthDelimitedCodec> {
        let (stream, _) = listener.accept().await.unwrap();
        Framed::new(stream, LengthDelimitedCodec::new())
    }

    async fn connected() -> (FakeHost, UnixIpcClient, Framed<UnixStream, LengthDelimitedCodec>) {
        let host = FakeHost::start();
        let client = UnixIpcClient::connect(host.config()).await.unwrap();
        let peer = accept(&host.manager).await;
        (host, client, peer)
    }

    #[tokio::test]
    async fn should_return_connect_error_when_host_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let result = UnixIpcClient::connect(IpcConfig::default().with_root(dir.path())).await;
        assert!(matches!(result, Err(IpcError::Connect { .. })));
    }

    #[tokio::test]
    async fn should_deliver_one_frame_per_send() {
        let (_host, client, mut peer) = connected().await;

        client
            .send(Channel::Manager, b"{\"a\":1}".to_vec())
            .await
            .unwrap();
        client.send(Channel::Manager, b"{}".to_vec()).await.unwrap();

        assert_eq!(&peer.next().await.unwrap().unwrap()[..], b"{\"a\":1}");
        assert_eq!(&peer.next().await.unwrap().unwrap()[..], b"{}");
    }

    #[tokio::test]
    async fn should_receive_frames_written_by_host() {
        let (_host, client, mut peer) = connected().await;

        peer.send(Bytes::from_static(b"hello")).await.unwrap();

        let received = client.recv_manager().await.unwrap();
        assert_eq!(received.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn should_return_none_when_host_hangs_up() {
        let (_host, client, peer) = connected().await;
        drop(peer);
        assert!(client.recv_manager().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_refuse_plugin_send_before_dial() {
        let (_host, client, _peer) = connected().await;
        let err = client
            .send(Channel::Plugin, b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
        assert_eq!(err.to_string(), "transport error");
    }

    #[tokio::test]
    async fn should_write_to_latest_plugin_socket_after_redial() {
        let (host, client, _peer) = connected().await;
        let plugin = host.listen("gateway.plugin.test");

        client.connect_plugin("gateway.plugin.test").await.unwrap();
        let mut first = accept(&plugin).await;
        client.connect_plugin("gateway.plugin.test").await.unwrap();
        let mut second = accept(&plugin).await;

        client.send(Channel::Plugin, b"ping".to_vec()).await.unwrap();

        assert_eq!(&second.next().await.unwrap().unwrap()[..], b"ping");
        assert!(first.next().await.is_none());
    }

    #[tokio::test]
    async fn should_keep_frames_whole_when_sending_concurrently() {
        let (host, client, _peer) = connected().await;
        let plugin = host.listen("gateway.plugin.test");
        client.connect_plugin("gateway.plugin.test").await.unwrap();
        let mut peer = accept(&plugin).await;

        let payloads: Vec<Vec<u8>> = (0..50)
            .map(|i| format!("{i:04}").repeat(16 * 1024).into_bytes())
            .collect();

        let sends = join_all(
            payloads
                .iter()
                .map(|payload| client.send(Channel::Plugin, payload.clone())),
        );
        let reads = async {
            let mut frames = Vec::with_capacity(payloads.len());
            for _ in 0..payloads.len() {
                frames.push(peer.next().await.unwrap().unwrap().to_vec());
            }
            frames
        };
        let (results, frames) = tokio::join!(sends, reads);

        assert!(results.iter().all(Result::is_ok));
        let expected: HashSet<Vec<u8>> = payloads.into_iter().collect();
        let received: HashSet<Vec<u8>> = frames.into_iter().collect();
        assert_eq!(received.len(), 50);
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn should_unblock_pending_receive_on_close() {
        let (_host, client, _peer) = connected().await;

        let (received, closed) = tokio::join!(client.recv_manager(), client.close());

        assert!(received.unwrap().is_none());
        closed.unwrap();
        assert!(client.close().await.is_ok());
        assert!(client.connect_plugin("gateway.plugin.test").await.is_err());
        assert!(client.send(Channel::Manager, Vec::new()).await.is_err());
    }
}
