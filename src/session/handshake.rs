// Server side of the RTMP handshake

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::{
    log::Logger,
    log_debug,
    rtmp::{generate_s1_s2, RTMP_SIG_SIZE, RTMP_VERSION},
};

use super::{SessionError, SessionWriter};

async fn read_handshake_bytes<TR: AsyncRead + Unpin>(
    read_stream: &mut TR,
    buf: &mut [u8],
    read_timeout: Duration,
    what: &'static str,
) -> Result<(), SessionError> {
    match tokio::time::timeout(read_timeout, read_stream.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(SessionError::Handshake(format!("could not read {}: {}", what, e))),
        Err(_) => Err(SessionError::Timeout(what)),
    }
}

/// Performs the handshake with the client.
/// Reads exactly C0, C1 and C2, so the chunk reader can start right after.
///
/// # Arguments
///
/// * `logger` - The session logger
/// * `read_stream` - The stream to read from the client
/// * `writer` - The session writer
/// * `read_timeout` - Max time to wait for each client message
/// * `epoch` - Server timestamp to put in S1
pub async fn perform_handshake<TR: AsyncRead + Unpin, TW: AsyncWrite + Send + Unpin>(
    logger: &Logger,
    read_stream: &mut TR,
    writer: &SessionWriter<TW>,
    read_timeout: Duration,
    epoch: u32,
) -> Result<(), SessionError> {
    let mut version = [0u8; 1];
    read_handshake_bytes(read_stream, &mut version, read_timeout, "C0").await?;

    if version[0] != RTMP_VERSION {
        return Err(SessionError::Handshake(format!(
            "invalid version byte. Expected {}, but got {}",
            RTMP_VERSION, version[0]
        )));
    }

    let mut c1 = vec![0u8; RTMP_SIG_SIZE];
    read_handshake_bytes(read_stream, &mut c1, read_timeout, "C1").await?;

    let response = generate_s1_s2(&c1, epoch)?;

    log_debug!(logger, format!("Handshake mode: {:?}", response.mode));

    let mut s0_s1_s2: Vec<u8> = Vec::with_capacity(1 + 2 * RTMP_SIG_SIZE);
    s0_s1_s2.push(RTMP_VERSION);
    s0_s1_s2.extend(&response.s1);
    s0_s1_s2.extend(&response.s2);

    writer.write_bytes(&s0_s1_s2).await?;

    let mut c2 = vec![0u8; RTMP_SIG_SIZE];
    read_handshake_bytes(read_stream, &mut c2, read_timeout, "C2").await?;

    if !response.validate_c2(&c2) {
        return Err(SessionError::Handshake("C2 does not echo S1".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncWriteExt;

    async fn run_client(mut client: tokio::io::DuplexStream, corrupt_c2: bool) -> Vec<u8> {
        let mut c0_c1 = vec![RTMP_VERSION];
        c0_c1.extend(vec![0u8; 8]);
        c0_c1.extend((0..RTMP_SIG_SIZE - 8).map(|i| (i % 251) as u8));
        client.write_all(&c0_c1).await.unwrap();

        let mut s0_s1_s2 = vec![0u8; 1 + 2 * RTMP_SIG_SIZE];
        client.read_exact(&mut s0_s1_s2).await.unwrap();

        let mut c2 = s0_s1_s2[1..1 + RTMP_SIG_SIZE].to_vec();
        if corrupt_c2 {
            c2[100] ^= 0xFF;
        }
        client.write_all(&c2).await.unwrap();

        s0_s1_s2
    }

    async fn run_server(
        server: tokio::io::DuplexStream,
    ) -> Result<(), SessionError> {
        let (mut read_stream, write_stream) = tokio::io::split(server);
        let writer = SessionWriter::new(write_stream, Duration::from_secs(1));
        perform_handshake(
            &Logger::new_disabled(),
            &mut read_stream,
            &writer,
            Duration::from_secs(1),
            1234,
        )
        .await
    }

    #[tokio::test]
    async fn test_basic_handshake() {
        let (client, server) = tokio::io::duplex(8192);

        let (s0_s1_s2, res) = tokio::join!(run_client(client, false), run_server(server));

        res.unwrap();

        assert_eq!(s0_s1_s2[0], RTMP_VERSION);
        assert_eq!(&s0_s1_s2[1..5], &1234u32.to_be_bytes());

        // S2 echoes C1
        let s2 = &s0_s1_s2[1 + RTMP_SIG_SIZE..];
        assert_eq!(&s2[..8], &[0u8; 8]);
        assert_eq!(s2[8], 0);
        assert_eq!(s2[9], 1);
    }

    #[tokio::test]
    async fn test_corrupted_c2() {
        let (client, server) = tokio::io::duplex(8192);

        let (_, res) = tokio::join!(run_client(client, true), run_server(server));

        assert!(matches!(res, Err(SessionError::Handshake(_))));
    }

    #[tokio::test]
    async fn test_bad_version() {
        let (mut client, server) = tokio::io::duplex(8192);

        client.write_all(&[6u8]).await.unwrap();

        assert!(matches!(
            run_server(server).await,
            Err(SessionError::Handshake(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (_client, server) = tokio::io::duplex(8192);
        let (mut read_stream, write_stream) = tokio::io::split(server);
        let writer = SessionWriter::new(write_stream, Duration::from_secs(1));

        let res = perform_handshake(
            &Logger::new_disabled(),
            &mut read_stream,
            &writer,
            Duration::from_millis(20),
            0,
        )
        .await;

        assert!(matches!(res, Err(SessionError::Timeout(_))));
    }
}
