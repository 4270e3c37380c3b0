//! Minimal SOCKS5 CONNECT client (RFC 1928, RFC 1929 username/password).

use std::io;
use std::net::IpAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const VERSION: u8 = 0x05;
const AUTH_NONE: u8 = 0x00;
const AUTH_PASSWORD: u8 = 0x02;
const AUTH_UNACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Proxy login.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Ask the proxy on `stream` to open a tunnel to `host:port`.
pub async fn connect<S>(
    stream: &mut S,
    host: &str,
    port: u16,
    credentials: Option<Credentials<'_>>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let methods: &[u8] = if credentials.is_some() {
        &[AUTH_NONE, AUTH_PASSWORD]
    } else {
        &[AUTH_NONE]
    };
    let mut greeting = vec![VERSION, methods.len() as u8];
    greeting.extend_from_slice(methods);
    stream.write_all(&greeting).await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != VERSION {
        return Err(io::Error::other(format!("proxy answered with version {}", choice[0])));
    }
    match (choice[1], credentials) {
        (AUTH_NONE, _) => {}
        (AUTH_PASSWORD, Some(credentials)) => authenticate(stream, credentials).await?,
        (AUTH_UNACCEPTABLE, _) => {
            return Err(io::Error::other("proxy accepted none of the offered auth methods"))
        }
        (other, _) => return Err(io::Error::other(format!("proxy chose unsupported auth method {other}"))),
    }

    let mut request = vec![VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let len = u8::try_from(host.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "host name too long for SOCKS5"))?;
            request.push(ATYP_DOMAIN);
            request.push(len);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(io::Error::other(format!("proxy refused connection: {}", reply_message(reply[1]))));
    }
    // Skip the bound address.
    let addr_len = match reply[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => stream.read_u8().await? as usize,
        other => return Err(io::Error::other(format!("proxy sent address type {other}"))),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;
    Ok(())
}

async fn authenticate<S>(stream: &mut S, credentials: Credentials<'_>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let too_long = || io::Error::new(io::ErrorKind::InvalidInput, "proxy credentials too long");
    let user = u8::try_from(credentials.username.len()).map_err(|_| too_long())?;
    let pass = u8::try_from(credentials.password.len()).map_err(|_| too_long())?;

    let mut request = vec![0x01, user];
    request.extend_from_slice(credentials.username.as_bytes());
    request.push(pass);
    request.extend_from_slice(credentials.password.as_bytes());
    stream.write_all(&request).await?;

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await?;
    if status[1] != 0x00 {
        return Err(io::Error::other("proxy rejected credentials"));
    }
    Ok(())
}

fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn connect_by_domain_without_auth() {
        let (mut client, mut proxy) = duplex(256);
        let server = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [5, 1, 0]);
            proxy.write_all(&[5, 0]).await.unwrap();

            let mut head = [0u8; 5];
            proxy.read_exact(&mut head).await.unwrap();
            assert_eq!(head, [5, 1, 0, 3, 11]);
            let mut rest = [0u8; 13];
            proxy.read_exact(&mut rest).await.unwrap();
            assert_eq!(&rest[..11], b"example.org");
            assert_eq!(&rest[11..], &25565u16.to_be_bytes());
            proxy
                .write_all(&[5, 0, 0, 1, 127, 0, 0, 1, 0x1F, 0x90])
                .await
                .unwrap();
        });
        connect(&mut client, "example.org", 25565, None).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_with_password() {
        let (mut client, mut proxy) = duplex(256);
        let server = tokio::spawn(async move {
            let mut greeting = [0u8; 4];
            proxy.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [5, 2, 0, 2]);
            proxy.write_all(&[5, 2]).await.unwrap();

            let mut auth = [0u8; 10];
            proxy.read_exact(&mut auth).await.unwrap();
            assert_eq!(&auth, b"\x01\x04user\x03pwd");
            proxy.write_all(&[1, 0]).await.unwrap();

            let mut request = [0u8; 10];
            proxy.read_exact(&mut request).await.unwrap();
            assert_eq!(&request[..8], &[5, 1, 0, 1, 10, 0, 0, 7]);
            proxy
                .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });
        let credentials = Credentials {
            username: "user",
            password: "pwd",
        };
        connect(&mut client, "10.0.0.7", 25565, Some(credentials))
            .await
            .unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_tunnel_is_an_error() {
        let (mut client, mut proxy) = duplex(256);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            proxy.write_all(&[5, 0]).await.unwrap();
            let mut request = [0u8; 10];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[5, 5, 0, 1, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });
        let err = connect(&mut client, "127.0.0.1", 25565, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "proxy refused connection: connection refused");
    }
}
