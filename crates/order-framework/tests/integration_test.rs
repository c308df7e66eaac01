use async_trait::async_trait;
use order_framework::{Code, Deadline, Handler, Response, RpcServer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

// --- Test Handler ---

#[derive(Debug)]
enum CounterRequest {
    Increment {
        by: usize,
        respond_to: Response<usize>,
    },
    /// Waits on the barrier before answering; proves requests run concurrently.
    Rendezvous { respond_to: Response<()> },
    Sleep {
        duration: Duration,
        respond_to: Response<()>,
    },
    Forget { respond_to: Response<()> },
}

struct CounterHandler {
    total: AtomicUsize,
    barrier: Arc<Barrier>,
    completed: Arc<AtomicUsize>,
}

#[async_trait]
impl Handler for CounterHandler {
    type Request = CounterRequest;

    async fn handle(&self, request: CounterRequest, _deadline: Deadline) {
        match request {
            CounterRequest::Increment { by, respond_to } => {
                let total = self.total.fetch_add(by, Ordering::SeqCst) + by;
                let _ = respond_to.send(Ok(total));
            }
            CounterRequest::Rendezvous { respond_to } => {
                self.barrier.wait().await;
                let _ = respond_to.send(Ok(()));
            }
            CounterRequest::Sleep {
                duration,
                respond_to,
            } => {
                tokio::time::sleep(duration).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
                let _ = respond_to.send(Ok(()));
            }
            CounterRequest::Forget { respond_to } => drop(respond_to),
        }
    }
}

fn counter(parties: usize) -> (CounterHandler, Arc<AtomicUsize>) {
    let completed = Arc::new(AtomicUsize::new(0));
    let handler = CounterHandler {
        total: AtomicUsize::new(0),
        barrier: Arc::new(Barrier::new(parties)),
        completed: Arc::clone(&completed),
    };
    (handler, completed)
}

#[tokio::test]
async fn test_request_roundtrip() {
    let (handler, _) = counter(1);
    let (server, client) = RpcServer::new(handler, 10);
    let handle = tokio::spawn(server.run());

    let first = client
        .call(Deadline::none(), |respond_to| CounterRequest::Increment {
            by: 2,
            respond_to,
        })
        .await
        .unwrap();
    let second = client
        .call(Deadline::none(), |respond_to| CounterRequest::Increment {
            by: 3,
            respond_to,
        })
        .await
        .unwrap();
    assert_eq!((first, second), (2, 5));

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_requests_are_handled_concurrently() {
    // Both requests must be in the handler at the same time to pass the barrier.
    let (handler, _) = counter(2);
    let (server, client) = RpcServer::new(handler, 10);
    let handle = tokio::spawn(server.run());

    let a = client.clone();
    let b = client.clone();
    let (ra, rb) = tokio::time::timeout(Duration::from_secs(5), async move {
        tokio::join!(
            a.call(Deadline::none(), |respond_to| CounterRequest::Rendezvous { respond_to }),
            b.call(Deadline::none(), |respond_to| CounterRequest::Rendezvous { respond_to }),
        )
    })
    .await
    .expect("requests were serialized");
    assert!(ra.is_ok() && rb.is_ok());

    drop(client);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_deadline_exceeded() {
    let (handler, completed) = counter(1);
    let (server, client) = RpcServer::new(handler, 10);
    let handle = tokio::spawn(server.run());

    let result = client
        .call(Deadline::after(Duration::from_millis(100)), |respond_to| {
            CounterRequest::Sleep {
                duration: Duration::from_secs(10),
                respond_to,
            }
        })
        .await;

    let status = result.unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);

    drop(client);
    handle.await.unwrap();
    // The handler future was dropped rather than left running.
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dropped_responder_is_internal() {
    let (handler, _) = counter(1);
    let (server, client) = RpcServer::new(handler, 10);
    let handle = tokio::spawn(server.run());

    let status = client
        .call(Deadline::none(), |respond_to| CounterRequest::Forget { respond_to })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_closed_server_is_unavailable() {
    let (handler, _) = counter(1);
    let (server, client) = RpcServer::new(handler, 10);
    drop(server);

    assert!(client.is_closed());
    let status = client
        .call(Deadline::none(), |respond_to| CounterRequest::Increment {
            by: 1,
            respond_to,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_in_flight_requests() {
    let (handler, completed) = counter(1);
    let (server, client) = RpcServer::new(handler, 10);
    let handle = tokio::spawn(server.run());

    let caller = client.clone();
    let pending = tokio::spawn(async move {
        caller
            .call(Deadline::none(), |respond_to| CounterRequest::Sleep {
                duration: Duration::from_millis(200),
                respond_to,
            })
            .await
    });

    // Let the request reach the server before the last client goes away.
    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(client);

    assert!(pending.await.unwrap().is_ok());
    handle.await.unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
