pub mod fixtures;
pub mod network;
pub mod node;
pub mod rendezvous;

/// Route the logs of the spawned nodes to the test output.
///
/// Filtered like a node's output, `RUST_LOG` overrides the default
/// directives. Only the first call in a test binary installs the subscriber.
pub fn setup_logging() {
    _ = tracing_subscriber::fmt()
        .with_env_filter(weave_telemetry::create_filter(0))
        .with_test_writer()
        .try_init();
}

/// Wait for an item of a stream or channel matching the pattern, panics after
/// the timeout (in milliseconds, 100 by default).
///
/// `$node` is an expression producing a future resolving to `Option<event>`,
/// such as `events.next()` or `receiver.recv()`.
#[macro_export]
macro_rules! wait_for_event {
    ($node:expr, matches: $( $pattern:pat_param )|+ $( if $guard: expr )?, $error_msg:expr) => {
        wait_for_event!($node, matches: $( $pattern )|+ $( if $guard )?, $error_msg, 100);
    };

    ($node:expr, matches: $( $pattern:pat_param )|+ $( if $guard: expr )?, $error_msg:expr, $timeout:expr) => {
        let assertion = async {
            while let Some(event) = $node.await {
                if matches!(event, $( $pattern )|+ $( if $guard )?) {
                    break;
                }
            }
        };

        if let Err(_) = tokio::time::timeout(std::time::Duration::from_millis($timeout), assertion).await
        {
            panic!("Timed out waiting ({}ms) for event: {}", $timeout, $error_msg);
        }
    };
}
