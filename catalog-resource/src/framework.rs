use std::{
    io::{BufRead, BufReader, Write},
    os::fd::{AsRawFd, FromRawFd},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::unistd::{dup, dup2};

use crate::schema::v0;

#[async_trait]
pub trait ResourceProvider {
    async fn create(&self, request: v0::CreateResourceRequest)
        -> Result<v0::CreateResourceResponse>;
    async fn update(&self, request: v0::UpdateResourceRequest)
        -> Result<v0::UpdateResourceResponse>;
    async fn read(&self, request: v0::ReadResourceRequest) -> Result<v0::ReadResourceResponse>;
    // TODO: destroy, once the deployment tool sends destroy requests
}

pub async fn run_main(provider: impl ResourceProvider) {
    let pipe = {
        let pipe = init_stdio().unwrap_or_exit();
        pipe_fds_to_files(pipe)
    };

    // Read the request from the input

    let mut in_ = BufReader::new(pipe.in_);

    let request: v0::Request = {
        let mut line = String::new();
        in_.read_line(&mut line)
            .with_context(|| "Could not read line for request message")
            .unwrap_or_exit();
        serde_json::from_str(&line)
            .with_context(|| "Could not parse request message")
            .unwrap_or_exit()
    };

    let response = handle_request(&provider, request).await.unwrap_or_exit();

    // Write the response to the output

    let mut out = pipe.out;
    serde_json::to_writer(&mut out, &response)
        .with_context(|| "Could not write response message")
        .unwrap_or_exit();
    out.write_all(b"\n")
        .and_then(|_| out.flush())
        .with_context(|| "Could not flush response message")
        .unwrap_or_exit();
}

/// Dispatch a single request to the provider.
pub async fn handle_request(
    provider: &impl ResourceProvider,
    request: v0::Request,
) -> Result<v0::Response> {
    match request {
        v0::Request::CreateResourceRequest(r) => {
            tracing::debug!(type_ = %r.type_, "handling create request");
            let resp = provider
                .create(r)
                .await
                .with_context(|| "Could not create resource")?;
            Ok(v0::Response::CreateResourceResponse(resp))
        }
        v0::Request::UpdateResourceRequest(r) => {
            tracing::debug!(type_ = %r.resource.type_, "handling update request");
            let resp = provider
                .update(r)
                .await
                .with_context(|| "Could not update resource")?;
            Ok(v0::Response::UpdateResourceResponse(resp))
        }
        v0::Request::ReadResourceRequest(r) => {
            tracing::debug!(type_ = %r.resource.type_, "handling read request");
            let resp = provider
                .read(r)
                .await
                .with_context(|| "Could not read resource")?;
            Ok(v0::Response::ReadResourceResponse(resp))
        }
    }
}

/// A pair of `T` values: one for input and one for output.
struct InOut<T> {
    in_: T,
    out: T,
}

/// A file descriptor
type Fd = i32;

/// Configure the standard input/output streams for the process.
/// This returns the communication channels with the deployment tool, and
/// reconfigures the stdio file descriptor as follows:
///
/// ```text
/// 0: /dev/null
/// 1: stderr
/// 2: stderr
/// ```
fn init_stdio() -> Result<InOut<Fd>> {
    let r = InOut {
        in_: dup(0).with_context(|| "dup(0)")?,
        out: dup(1).with_context(|| "dup(1)")?,
    };

    // 0: dev/null
    {
        let dev_null =
            std::fs::File::open("/dev/null").with_context(|| "Could not open /dev/null")?;
        dup2(dev_null.as_raw_fd(), 0).with_context(|| "Could not dup2(/dev/null, 0)")?;
    }

    // 1: stderr
    dup2(2, 1).with_context(|| "Could not dup2(2, 1)")?;

    // 2: stderr is left as is

    Ok(r)
}

fn pipe_fds_to_files(pipe: InOut<Fd>) -> InOut<std::fs::File> {
    // Both descriptors were freshly dup'ed by init_stdio and are owned by nobody else.
    InOut {
        in_: unsafe { std::fs::File::from_raw_fd(pipe.in_) },
        out: unsafe { std::fs::File::from_raw_fd(pipe.out) },
    }
}

trait ProviderMainError<T> {
    type V;
    fn unwrap_or_exit(self) -> Self::V;
}
impl<T> ProviderMainError<Result<T>> for Result<T> {
    type V = T;
    fn unwrap_or_exit(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error: {:?}", e);
                std::process::exit(1);
            }
        }
    }
}
