//! Client-side call helper: one connection, one call, one reply.

use std::net::SocketAddr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::error::{DfsError, DfsResult};
use crate::rpc::codec::{self, CallFrame, Status};
use crate::rpc::{read_record, write_record};

/// Invokes `method` on the remote interface listening at `addr`.
///
/// Any transport failure (connect, I/O, encode, decode) becomes
/// [`DfsError::Remote`]; a logical failure on the remote side is
/// reconstructed as its original kind.
pub async fn call<A, R>(
    addr: SocketAddr,
    method: &str,
    descriptors: &[&str],
    args: &A,
) -> DfsResult<R>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let frame = CallFrame {
        method: method.to_owned(),
        descriptors: descriptors.iter().map(|d| (*d).to_owned()).collect(),
        payload: codec::encode(args)?,
    };
    let mut body = Vec::new();
    codec::write_call(&mut body, &frame)?;

    let mut socket = TcpStream::connect(addr)
        .await
        .map_err(|err| DfsError::remote(format!("connect to {addr}: {err}")))?;
    socket.set_nodelay(true)?;
    write_record(&mut socket, &body).await?;

    let reply_body = read_record(&mut socket).await?;
    let reply = codec::read_reply(&mut reply_body.as_slice())?;
    match reply.status {
        Status::Ok => Ok(codec::decode(&reply.payload)?),
        Status::Error => Err(codec::decode::<DfsError>(&reply.payload)?),
    }
}
