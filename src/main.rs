use bytes::BytesMut;
use std::env;
use std::net::SocketAddr;
use std::process;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use rootward::resolver::Resolver;
use rootward::settings::Settings;

async fn listen_udp(resolver: Resolver, socket: UdpSocket) {
    let (tx, mut rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(32);
    let mut buf = vec![0u8; 512];

    loop {
        tokio::select! {
            Ok((size, peer)) = socket.recv_from(&mut buf) => {
                tracing::debug!(%peer, size, "udp request");
                let bytes = BytesMut::from(&buf[..size]);
                let reply = tx.clone();
                let resolver = resolver.clone();
                tokio::spawn(async move {
                    if let Some(response) = resolver.handle_query(bytes.as_ref()).await {
                        if let Err(err) = reply.send((response, peer)).await {
                            tracing::warn!(%peer, %err, "udp reply error");
                        }
                    }
                });
            }

            Some((response, peer)) = rx.recv() => {
                if let Err(err) = socket.send_to(&response, peer).await {
                    tracing::warn!(%peer, %err, "udp send error");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = match env::args().nth(1) {
        Some(filename) => match Settings::new(&filename) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("error loading configuration \"{filename}\": {err:?}");
                process::exit(1);
            }
        },
        None => Settings::default(),
    };

    tracing::info!(interface = %settings.interface, port = settings.port, "binding");

    let udp = match UdpSocket::bind((settings.interface, settings.port)).await {
        Ok(s) => s,
        Err(err) => {
            eprintln!("error binding UDP socket: {err:?}");
            process::exit(1);
        }
    };

    let resolver = Resolver::new(&settings);

    listen_udp(resolver, udp).await;
}
