//! Error boundary for handler registrations.
//!
//! [`guarded`] wraps a handler so any failure is logged once and replaced by
//! the operation's typed failure response.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::protocol::{Operation, ReadCodeResponse, SaveNotebookResponse};

/// The reply an operation sends when its handler fails.
pub trait FailureResponse {
    fn failure() -> Self;
}

impl FailureResponse for SaveNotebookResponse {
    fn failure() -> Self {
        Self::failed()
    }
}

impl FailureResponse for ReadCodeResponse {
    fn failure() -> Self {
        Self::new("")
    }
}

/// Wrap `handler` so that an `Err` becomes `O::Response::failure()`.
pub fn guarded<O, F, Fut, E>(
    handler: F,
) -> impl Fn(O::Request) -> BoxFuture<'static, anyhow::Result<O::Response>> + Send + Sync + 'static
where
    O: Operation,
    O::Response: FailureResponse,
    F: Fn(O::Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O::Response, E>> + Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    move |request| {
        let response = handler(request);
        async move {
            match response.await {
                Ok(response) => Ok(response),
                Err(e) => {
                    let error: anyhow::Error = e.into();
                    tracing::warn!(
                        operation = %O::NAME,
                        error = %format!("{error:#}"),
                        "Handler failed, replying with failure response"
                    );
                    Ok(O::Response::failure())
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ReadCode, ReadCodeRequest, SaveNotebook, SaveNotebookRequest};
    use crate::responder::{Handlers, Responder};
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("not connected")]
    struct NotConnected;

    #[tokio::test]
    async fn failure_becomes_typed_response() {
        let handler = guarded::<SaveNotebook, _, _, _>(|_| async { Err(NotConnected) });
        let response = handler(SaveNotebookRequest::default()).await.unwrap();
        assert_eq!(response, SaveNotebookResponse::failed());
    }

    #[tokio::test]
    async fn success_passes_through() {
        let handler = guarded::<ReadCode, _, _, _>(|_| async {
            Ok::<_, anyhow::Error>(ReadCodeResponse::new("print(1)"))
        });
        let response = handler(ReadCodeRequest::default()).await.unwrap();
        assert_eq!(response.contents, "print(1)");
    }

    #[tokio::test]
    async fn guarded_handlers_never_reject() {
        let responder = Responder::new(
            Handlers::new()
                .on_save_notebook(guarded::<SaveNotebook, _, _, _>(|_| async {
                    Err(NotConnected)
                }))
                .on_read_code(guarded::<ReadCode, _, _, _>(|_| async {
                    Err(anyhow::anyhow!("kernel gone"))
                })),
        );

        let saved = responder
            .dispatch(json!({"operation": "saveNotebook", "request": {}}))
            .await
            .unwrap();
        assert_eq!(saved, json!({"success": false}));

        let code = responder
            .dispatch(json!({"operation": "readCode"}))
            .await
            .unwrap();
        assert_eq!(code, json!({"contents": ""}));
    }
}
