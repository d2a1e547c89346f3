//! Raw connection handed to the caller after a successful handshake

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

pin_project! {
    /// Exclusive owner of an upgraded transport
    ///
    /// Bytes the HTTP layer had already read past the request head are kept
    /// here and returned by the first reads, before anything new is pulled
    /// from the transport. Writes go straight to the transport.
    ///
    /// The connection is not `Clone`: once produced, nothing else may read or
    /// write the transport. Dropping it closes the transport; [`close`]
    /// shuts the write side down first.
    ///
    /// [`close`]: UpgradedConnection::close
    pub struct UpgradedConnection<S> {
        #[pin]
        io: S,
        buffered: Bytes,
    }
}

impl<S> UpgradedConnection<S> {
    /// Wrap a hijacked transport and its unconsumed bytes
    pub fn new(io: S, buffered: Bytes) -> Self {
        Self { io, buffered }
    }

    /// Bytes received before the takeover that have not been read yet
    pub fn buffered(&self) -> &[u8] {
        &self.buffered
    }

    /// Get a reference to the underlying transport
    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Split into the transport and the not-yet-read buffered bytes
    pub fn into_parts(self) -> (S, Bytes) {
        (self.io, self.buffered)
    }
}

impl<S: AsyncWrite + Unpin> UpgradedConnection<S> {
    /// Shut down the write side and release the transport
    pub async fn close(mut self) -> io::Result<()> {
        self.io.shutdown().await
    }
}

impl<S: AsyncRead> AsyncRead for UpgradedConnection<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();

        if !this.buffered.is_empty() {
            let n = this.buffered.len().min(buf.remaining());
            buf.put_slice(&this.buffered[..n]);
            this.buffered.advance(n);
            return Poll::Ready(Ok(()));
        }

        this.io.poll_read(cx, buf)
    }
}

impl<S: AsyncWrite> AsyncWrite for UpgradedConnection<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.project().io.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().io.poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        self.project().io.poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }
}

impl<S> fmt::Debug for UpgradedConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradedConnection")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, duplex};

    #[tokio::test]
    async fn test_buffered_bytes_come_first() {
        let (server, mut client) = duplex(64);
        let mut conn = UpgradedConnection::new(server, Bytes::from_static(b"early"));

        client.write_all(b" late").await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        conn.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"early late");
        assert!(conn.buffered().is_empty());
    }

    #[tokio::test]
    async fn test_small_reads_drain_buffer() {
        let (server, _client) = duplex(64);
        let mut conn = UpgradedConnection::new(server, Bytes::from_static(b"abcdef"));

        let mut chunk = [0u8; 4];
        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"abcd");
        assert_eq!(conn.buffered(), b"ef");

        let n = conn.read(&mut chunk).await.unwrap();
        assert_eq!(&chunk[..n], b"ef");
    }

    #[tokio::test]
    async fn test_write_passes_through() {
        let (server, mut client) = duplex(64);
        let mut conn = UpgradedConnection::new(server, Bytes::new());

        conn.write_all(b"hello").await.unwrap();
        conn.close().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_into_parts() {
        let (server, _client) = duplex(8);
        let conn = UpgradedConnection::new(server, Bytes::from_static(b"xy"));

        let (_io, buffered) = conn.into_parts();
        assert_eq!(&buffered[..], b"xy");
    }
}
