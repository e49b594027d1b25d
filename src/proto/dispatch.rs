//! Server-side dispatchers, one per remote interface.
//!
//! Each dispatcher reads the method identity from a call frame, checks the
//! parameter type descriptors, deserializes the argument tuple, invokes the
//! backing implementation and marshals the result. An unknown method or a
//! descriptor mismatch is a transport-level error, reported to the caller
//! as [`DfsError::Remote`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DfsError, DfsResult};
use crate::path::DfsPath;
use crate::proto::methods::{self, Method};
use crate::proto::{CommandOp, Registration, Service, StorageOp};
use crate::rpc::codec::{self, CallFrame, ReplyFrame, Status};
use crate::rpc::Dispatch;

fn ok_frame<T: Serialize>(value: &T) -> ReplyFrame {
    match codec::encode(value) {
        Ok(payload) => ReplyFrame { status: Status::Ok, payload },
        Err(err) => error_frame(&DfsError::remote(format!("encode return value: {err}"))),
    }
}

fn error_frame(error: &DfsError) -> ReplyFrame {
    ReplyFrame { status: Status::Error, payload: codec::encode(error).unwrap_or_default() }
}

fn reply<T: Serialize>(result: &DfsResult<T>) -> ReplyFrame {
    match result {
        Ok(value) => ok_frame(value),
        Err(error) => error_frame(error),
    }
}

fn check(call: &CallFrame, method: Method) -> DfsResult<()> {
    if call.descriptors.len() != method.1.len()
        || call.descriptors.iter().zip(method.1).any(|(actual, expected)| actual != expected)
    {
        return Err(DfsError::remote(format!(
            "parameter descriptors {:?} do not match {} {:?}",
            call.descriptors, method.0, method.1
        )));
    }
    Ok(())
}

fn arguments<T: DeserializeOwned>(call: &CallFrame, method: Method) -> DfsResult<T> {
    check(call, method)?;
    codec::decode(&call.payload)
        .map_err(|err| DfsError::remote(format!("decode arguments of {}: {err}", method.0)))
}

/// Serves a [`Service`] implementation.
pub struct ServiceDispatcher<S> {
    inner: Arc<S>,
}

impl<S: Service + 'static> ServiceDispatcher<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: Service + 'static> Dispatch for ServiceDispatcher<S> {
    fn interface(&self) -> &'static str {
        "Service"
    }

    async fn dispatch(&self, call: CallFrame) -> ReplyFrame {
        let result = async {
            Ok(match call.method.as_str() {
                m if m == methods::SERVICE_LOCK.0 => {
                    let (path, exclusive): (DfsPath, bool) =
                        arguments(&call, methods::SERVICE_LOCK)?;
                    reply(&self.inner.lock(&path, exclusive).await)
                }
                m if m == methods::SERVICE_UNLOCK.0 => {
                    let (path, exclusive): (DfsPath, bool) =
                        arguments(&call, methods::SERVICE_UNLOCK)?;
                    reply(&self.inner.unlock(&path, exclusive).await)
                }
                m if m == methods::SERVICE_IS_DIRECTORY.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::SERVICE_IS_DIRECTORY)?;
                    reply(&self.inner.is_directory(&path).await)
                }
                m if m == methods::SERVICE_LIST.0 => {
                    let (directory,): (DfsPath,) = arguments(&call, methods::SERVICE_LIST)?;
                    reply(&self.inner.list(&directory).await)
                }
                m if m == methods::SERVICE_CREATE_FILE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::SERVICE_CREATE_FILE)?;
                    reply(&self.inner.create_file(&path).await)
                }
                m if m == methods::SERVICE_CREATE_DIRECTORY.0 => {
                    let (directory,): (DfsPath,) =
                        arguments(&call, methods::SERVICE_CREATE_DIRECTORY)?;
                    reply(&self.inner.create_directory(&directory).await)
                }
                m if m == methods::SERVICE_DELETE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::SERVICE_DELETE)?;
                    reply(&self.inner.delete(&path).await)
                }
                m if m == methods::SERVICE_GET_STORAGE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::SERVICE_GET_STORAGE)?;
                    reply(&self.inner.get_storage(&path).await)
                }
                unknown => {
                    return Err(DfsError::remote(format!("unknown method Service::{unknown}")))
                }
            })
        }
        .await;
        result.unwrap_or_else(|error| error_frame(&error))
    }
}

/// Serves a [`Registration`] implementation.
pub struct RegistrationDispatcher<R> {
    inner: Arc<R>,
}

impl<R: Registration + 'static> RegistrationDispatcher<R> {
    pub fn new(inner: Arc<R>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Registration + 'static> Dispatch for RegistrationDispatcher<R> {
    fn interface(&self) -> &'static str {
        "Registration"
    }

    async fn dispatch(&self, call: CallFrame) -> ReplyFrame {
        if call.method != methods::REGISTRATION_REGISTER.0 {
            return error_frame(&DfsError::remote(format!(
                "unknown method Registration::{}",
                call.method
            )));
        }
        match arguments(&call, methods::REGISTRATION_REGISTER) {
            Ok((storage, command, paths)) => {
                reply(&self.inner.register(storage, command, paths).await)
            }
            Err(error) => error_frame(&error),
        }
    }
}

/// Serves a [`StorageOp`] implementation.
pub struct StorageDispatcher<S> {
    inner: Arc<S>,
}

impl<S: StorageOp + 'static> StorageDispatcher<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: StorageOp + 'static> Dispatch for StorageDispatcher<S> {
    fn interface(&self) -> &'static str {
        "Storage"
    }

    async fn dispatch(&self, call: CallFrame) -> ReplyFrame {
        let result = async {
            Ok(match call.method.as_str() {
                m if m == methods::STORAGE_SIZE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::STORAGE_SIZE)?;
                    reply(&self.inner.size(&path).await)
                }
                m if m == methods::STORAGE_READ.0 => {
                    let (path, offset, length): (DfsPath, u64, u32) =
                        arguments(&call, methods::STORAGE_READ)?;
                    reply(&self.inner.read(&path, offset, length).await)
                }
                m if m == methods::STORAGE_WRITE.0 => {
                    let (path, offset, data): (DfsPath, u64, Vec<u8>) =
                        arguments(&call, methods::STORAGE_WRITE)?;
                    reply(&self.inner.write(&path, offset, &data).await)
                }
                unknown => {
                    return Err(DfsError::remote(format!("unknown method Storage::{unknown}")))
                }
            })
        }
        .await;
        result.unwrap_or_else(|error| error_frame(&error))
    }
}

/// Serves a [`CommandOp`] implementation.
pub struct CommandDispatcher<C> {
    inner: Arc<C>,
}

impl<C: CommandOp + 'static> CommandDispatcher<C> {
    pub fn new(inner: Arc<C>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: CommandOp + 'static> Dispatch for CommandDispatcher<C> {
    fn interface(&self) -> &'static str {
        "Command"
    }

    async fn dispatch(&self, call: CallFrame) -> ReplyFrame {
        let result = async {
            Ok(match call.method.as_str() {
                m if m == methods::COMMAND_CREATE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::COMMAND_CREATE)?;
                    reply(&self.inner.create(&path).await)
                }
                m if m == methods::COMMAND_DELETE.0 => {
                    let (path,): (DfsPath,) = arguments(&call, methods::COMMAND_DELETE)?;
                    reply(&self.inner.delete(&path).await)
                }
                m if m == methods::COMMAND_COPY.0 => {
                    let (path, source): (DfsPath, std::net::SocketAddr) =
                        arguments(&call, methods::COMMAND_COPY)?;
                    reply(&self.inner.copy(&path, source).await)
                }
                unknown => {
                    return Err(DfsError::remote(format!("unknown method Command::{unknown}")))
                }
            })
        }
        .await;
        result.unwrap_or_else(|error| error_frame(&error))
    }
}
