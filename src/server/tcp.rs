// TCP server

use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};

use crate::{log::Logger, log_debug, log_error, log_info, log_warning};

use super::{handle_connection, RtmpServerContext};

/// Log prefix of the server (listener) logger
pub const SERVER_LOG_PREFIX: &str = "[SERVER:TCP] ";

/// First wait after a transient accept error
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(5);

/// Max wait between accept retries
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Source of incoming connections
pub trait ConnectionAcceptor: Send + Sync + 'static {
    /// Transport of an accepted connection
    type Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Waits for the next connection
    fn accept(
        &self,
    ) -> impl Future<Output = io::Result<(Self::Connection, SocketAddr)>> + Send;

    /// Address connections are accepted on
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl ConnectionAcceptor for TcpListener {
    type Connection = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (connection, addr) = TcpListener::accept(self).await?;

        // Small control messages must not wait for Nagle
        _ = connection.set_nodelay(true);

        Ok((connection, addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// Exponential backoff between accept retries
#[derive(Debug, Default)]
pub struct AcceptBackoff {
    current: Duration,
}

impl AcceptBackoff {
    /// Creates a backoff with no delay
    pub fn new() -> AcceptBackoff {
        AcceptBackoff {
            current: Duration::ZERO,
        }
    }

    /// Current delay (zero if no error since the last reset)
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Increases and returns the delay
    pub fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            ACCEPT_BACKOFF_INITIAL
        } else {
            (self.current * 2).min(ACCEPT_BACKOFF_MAX)
        };

        self.current
    }

    /// Resets the delay after a successful accept
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

/// Checks if an accept error is temporary.
/// The listener keeps working after these, so the worker retries.
pub fn is_transient_accept_error(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    is_resource_exhaustion(e)
}

/// EMFILE, ENFILE, ENOBUFS, ENOMEM
#[cfg(target_os = "linux")]
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(24) | Some(23) | Some(105) | Some(12))
}

#[cfg(not(target_os = "linux"))]
fn is_resource_exhaustion(_e: &io::Error) -> bool {
    false
}

/// Handles an accepted connection, spawning a task for it
fn spawn_connection_task<A: ConnectionAcceptor>(
    logger: Arc<Logger>,
    server_context: RtmpServerContext,
    mut connection: A::Connection,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
) {
    tokio::spawn(async move {
        let session_id = match server_context.id_source.next_id() {
            Ok(id) => id,
            Err(e) => {
                log_error!(
                    logger,
                    format!("Could not generate session ID for {}: {}", peer_addr, e)
                );
                _ = connection.shutdown().await;
                return;
            }
        };

        let (read_stream, write_stream) = tokio::io::split(connection);

        handle_connection(
            logger,
            server_context,
            session_id,
            read_stream,
            write_stream,
            peer_addr,
            local_addr,
        )
        .await;
    });
}

/// Accepts connections until a fatal error
async fn accept_worker<A: ConnectionAcceptor>(
    logger: Arc<Logger>,
    acceptor: Arc<A>,
    server_context: RtmpServerContext,
    local_addr: SocketAddr,
) -> io::Result<()> {
    let mut backoff = AcceptBackoff::new();

    loop {
        match acceptor.accept().await {
            Ok((connection, peer_addr)) => {
                backoff.reset();

                spawn_connection_task::<A>(
                    logger.clone(),
                    server_context.clone(),
                    connection,
                    peer_addr,
                    local_addr,
                );
            }
            Err(e) if is_transient_accept_error(&e) => {
                let delay = backoff.next_delay();

                log_warning!(
                    logger,
                    format!("Could not accept connection: {}. Retrying in {:?}", e, delay)
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log_error!(logger, format!("Could not accept connection: {}", e));

                return Err(e);
            }
        }
    }
}

/// Runs the accept workers.
/// Returns when any of them hits a fatal error.
///
/// # Arguments
///
/// * `logger` - The server logger
/// * `acceptor` - Source of connections, shared by every worker
/// * `server_context` - The server context
pub async fn run_accept_loop<A: ConnectionAcceptor>(
    logger: Arc<Logger>,
    acceptor: Arc<A>,
    server_context: RtmpServerContext,
) -> io::Result<()> {
    let local_addr = acceptor.local_addr()?;
    let worker_count = server_context.config.accept_workers.max(1);

    let mut workers = JoinSet::new();

    for i in 0..worker_count {
        workers.spawn(accept_worker(
            Arc::new(logger.make_child_logger(&format!("[WORKER:{}] ", i))),
            acceptor.clone(),
            server_context.clone(),
            local_addr,
        ));
    }

    log_debug!(logger, format!("Started {} accept workers", worker_count));

    while let Some(res) = workers.join_next().await {
        let err = match res {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => io::Error::other(e),
        };

        workers.abort_all();

        return Err(err);
    }

    Ok(())
}

/// Runs the TCP server
///
/// # Arguments
///
/// * `logger` - The server logger
/// * `server_context` - The server context
pub async fn run_server(logger: Arc<Logger>, server_context: RtmpServerContext) -> io::Result<()> {
    let listen_addr = server_context.config.get_tcp_listen_addr();

    let listener = TcpListener::bind(&listen_addr).await?;

    log_info!(logger, format!("Listening on {}", listen_addr));

    run_accept_loop(logger, Arc::new(listener), server_context).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, DuplexStream};

    use crate::server::{DefaultServerHandler, RtmpServerConfiguration, SnowflakeGenerator};

    struct FakeAcceptor {
        results: Mutex<VecDeque<io::Result<DuplexStream>>>,
    }

    impl ConnectionAcceptor for FakeAcceptor {
        type Connection = DuplexStream;

        async fn accept(&self) -> io::Result<(DuplexStream, SocketAddr)> {
            let next = self.results.lock().pop_front();

            match next {
                Some(r) => r.map(|c| (c, "127.0.0.1:50000".parse().unwrap())),
                None => std::future::pending().await,
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:1935".parse().unwrap())
        }
    }

    fn test_context() -> RtmpServerContext {
        let config = RtmpServerConfiguration {
            accept_workers: 1,
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            ..Default::default()
        };

        RtmpServerContext::new(
            Arc::new(config),
            Arc::new(SnowflakeGenerator::new(1).unwrap()),
            Arc::new(DefaultServerHandler),
        )
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = AcceptBackoff::new();

        assert_eq!(backoff.current(), Duration::ZERO);

        let delays: Vec<u64> = (0..10)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![5, 10, 20, 40, 80, 160, 320, 640, 1000, 1000]);

        backoff.reset();

        assert_eq!(backoff.current(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient_accept_error(&io::Error::from(
            io::ErrorKind::ConnectionAborted
        )));
        assert!(!is_transient_accept_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }

    #[test]
    fn test_server_logger_prefix() {
        let logger = Logger::new_disabled().make_child_logger(SERVER_LOG_PREFIX);

        assert_eq!(
            logger.make_child_logger("[#1] ").config.prefix,
            "[SERVER:TCP] [#1] "
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_resource_exhaustion_is_transient() {
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(24)));
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(23)));
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(105)));
        assert!(is_transient_accept_error(&io::Error::from_raw_os_error(12)));
        assert!(!is_transient_accept_error(&io::Error::from_raw_os_error(9)));
    }

    #[tokio::test]
    async fn test_accept_loop_retries_then_fails() {
        let (mut client, server) = tokio::io::duplex(8192);

        let acceptor = Arc::new(FakeAcceptor {
            results: Mutex::new(VecDeque::from(vec![
                Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
                Err(io::Error::from(io::ErrorKind::ConnectionReset)),
                Ok(server),
                Err(io::Error::from(io::ErrorKind::PermissionDenied)),
            ])),
        });

        let start = tokio::time::Instant::now();

        let res = run_accept_loop(
            Arc::new(Logger::new_disabled()),
            acceptor,
            test_context(),
        )
        .await;

        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
        assert!(start.elapsed() >= Duration::from_millis(15));

        // The accepted connection was handed to a session,
        // which closes it on a bad version byte
        client.write_all(&[6u8]).await.unwrap();

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(n, 0);
    }
}
